//! External HLSL compiler adapters.
//!
//! The compiler is reached either in-process through the shared library's
//! C ABI or out-of-process through the standalone executable. Both accept
//! the same request and produce owned object bytes plus the full
//! diagnostic text.

use std::env::temp_dir;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use indexmap::IndexMap;

use crate::dxc::DxcLibrary;
use crate::PipelineError;

#[derive(Clone, Copy, Debug)]
pub struct CompileRequest<'a> {
    pub source: &'a [u8],
    pub entry_point: &'a str,
    pub target_profile: &'a str,
    pub defines: &'a IndexMap<String, String>,
    pub include_paths: &'a [PathBuf],
    pub args: &'a [String],
}

#[derive(Clone, Debug)]
pub struct CompileOutput {
    pub success: bool,
    pub object: Vec<u8>,
    pub diagnostics: String,
}

/// The contract the pipeline compiles through.
///
/// Callers drive the compiler from one task at a time; no Send bound is
/// promised on the returned futures.
#[allow(async_fn_in_trait)]
pub trait ShaderCompiler {
    async fn compile(
        &mut self,
        request: CompileRequest<'_>,
    ) -> Result<CompileOutput, PipelineError>;
}

/// The standard argument list both adapters feed the compiler.
pub fn build_args(request: &CompileRequest<'_>) -> Vec<String> {
    let mut args = vec![
        "-E".to_owned(),
        request.entry_point.to_owned(),
        "-T".to_owned(),
        request.target_profile.to_owned(),
    ];

    for (name, value) in request.defines {
        args.push("-D".to_owned());
        if value.is_empty() {
            args.push(name.clone());
        } else {
            args.push(format!("{name}={value}"));
        }
    }

    for path in request.include_paths {
        args.push("-I".to_owned());
        args.push(path.to_string_lossy().into_owned());
    }

    args.extend(request.args.iter().cloned());
    args
}

#[derive(Clone, Debug)]
enum CompilerMode {
    Library { path: Option<PathBuf> },
    Executable { path: PathBuf },
}

enum CompilerKind {
    Library(DxcLibrary),
    Executable(DxcExecutable),
}

/// An owned compiler instance. The backing library or executable is
/// acquired lazily on first use and released explicitly or on drop;
/// calls are serialized by `&mut self` because the underlying API is not
/// re-entrant.
pub struct Compiler {
    mode: CompilerMode,
    active: Option<CompilerKind>,
}

impl Compiler {
    /// In-process compilation through the compiler shared library,
    /// resolved from the system path when `path` is `None`.
    pub fn library(path: Option<PathBuf>) -> Self {
        Self {
            mode: CompilerMode::Library { path },
            active: None,
        }
    }

    /// Out-of-process compilation through the standalone executable.
    pub fn executable(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: CompilerMode::Executable { path: path.into() },
            active: None,
        }
    }

    /// Tears the instance down. A released compiler re-initializes on the
    /// next call; releasing twice is a no-op.
    pub fn release(&mut self) {
        self.active = None;
    }

    fn activate(&mut self) -> Result<&mut CompilerKind, PipelineError> {
        if self.active.is_none() {
            let kind = match &self.mode {
                CompilerMode::Library { path } => {
                    CompilerKind::Library(DxcLibrary::open(path.as_deref())?)
                }
                CompilerMode::Executable { path } => {
                    CompilerKind::Executable(DxcExecutable { path: path.clone() })
                }
            };
            self.active = Some(kind);
        }

        Ok(self.active.as_mut().expect("just initialized"))
    }
}

impl ShaderCompiler for Compiler {
    async fn compile(
        &mut self,
        request: CompileRequest<'_>,
    ) -> Result<CompileOutput, PipelineError> {
        match self.activate()? {
            CompilerKind::Library(library) => library.compile(&request),
            CompilerKind::Executable(executable) => executable.compile(&request).await,
        }
    }
}

impl Drop for Compiler {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("mode", &self.mode)
            .field("active", &self.active.is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
struct DxcExecutable {
    path: PathBuf,
}

impl DxcExecutable {
    async fn compile(
        &self,
        request: &CompileRequest<'_>,
    ) -> Result<CompileOutput, PipelineError> {
        let tag = format!("{}{}", std::process::id(), rand::random::<u64>());
        let source_path = RemoveOnDrop(temp_dir().join(format!("{tag}.hlsl")));
        let object_path = RemoveOnDrop(temp_dir().join(format!("{tag}.cso")));

        tokio::fs::write(&*source_path, request.source)
            .await
            .map_err(|err| PipelineError::CompilerInvocation(err.to_string()))?;

        let mut args = build_args(request);
        args.push("-Fo".to_owned());
        args.push(object_path.to_string_lossy().into_owned());
        args.push(source_path.to_string_lossy().into_owned());

        tracing::info!("{} {}", self.path.display(), args.join(" "));

        let output = tokio::process::Command::new(&self.path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| PipelineError::CompilerInvocation(err.to_string()))?;

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));

        if !output.status.success() {
            return Ok(CompileOutput {
                success: false,
                object: Vec::new(),
                diagnostics,
            });
        }

        let object = tokio::fs::read(&*object_path)
            .await
            .map_err(|err| PipelineError::CompilerInvocation(err.to_string()))?;

        Ok(CompileOutput {
            success: true,
            object,
            diagnostics,
        })
    }
}

#[derive(Debug)]
struct RemoveOnDrop(PathBuf);

impl Deref for RemoveOnDrop {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        std::fs::remove_file(&self.0).ok();
    }
}
