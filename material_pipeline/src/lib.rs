//! Compilation pipeline: manifest in, material container out.
//!
//! Resolves the per-shader define and argument sets, drives the external
//! HLSL compiler, wraps the produced object code in the container's
//! shader wrapper and serializes a complete single-pass material.

pub mod compiler;
mod dxc;
pub mod manifest;
pub mod source;

use std::path::PathBuf;

use indexmap::IndexMap;
use material_format::bgfx::BgfxShader;
use material_format::enums::{ContainerVersion, Encryption, ShaderPlatform};
use material_format::material::Material;
use material_format::pass::{Pass, SupportedPlatforms, Variant};
use material_format::shader::ShaderDefinition;
use material_format::FormatError;
use thiserror::Error;

pub use crate::compiler::{CompileOutput, CompileRequest, Compiler, ShaderCompiler};
pub use crate::manifest::{MaterialManifest, ShaderEntry};
pub use crate::source::ShaderSource;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("shader source {0:?} not found")]
    SourceNotFound(String),
    #[error("failed to load shader compiler from {path:?}: {reason}")]
    CompilerLoad { path: String, reason: String },
    #[error("compiler invocation failed: {0}")]
    CompilerInvocation(String),
    #[error("failed to compile {file_name}:\n{diagnostics}")]
    Compilation {
        file_name: String,
        diagnostics: String,
    },
    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Everything the pipeline needs besides the manifest.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub platform: ShaderPlatform,
    pub user_defines: IndexMap<String, String>,
    /// Register bindings extracted from a base material, injected between
    /// the user defines and the per-shader defines.
    pub register_defines: IndexMap<String, String>,
    pub include_paths: Vec<PathBuf>,
    pub additional_args: Vec<String>,
}

impl CompileOptions {
    pub fn new(platform: ShaderPlatform) -> Self {
        Self {
            platform,
            user_defines: IndexMap::new(),
            register_defines: IndexMap::new(),
            include_paths: Vec::new(),
            additional_args: Vec::new(),
        }
    }
}

/// Compiles every shader of `manifest` and assembles the result into a
/// latest-version material with a single pass and a single variant.
///
/// Shaders compile in manifest order; the first failure aborts the whole
/// manifest.
pub async fn compile_material<C>(
    manifest: &MaterialManifest,
    options: &CompileOptions,
    source: &ShaderSource,
    compiler: &mut C,
) -> Result<Material, PipelineError>
where
    C: ShaderCompiler,
{
    let mut shaders = Vec::with_capacity(manifest.shaders.len());

    for entry in &manifest.shaders {
        let bytes = source.load(&entry.file_name).await?;

        // Effective defines, rightmost wins: user < register < shader.
        let mut defines = options.user_defines.clone();
        defines.extend(
            options
                .register_defines
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        defines.extend(entry.defines.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut args = options.additional_args.clone();
        args.extend(manifest.compiler_options.iter().cloned());
        args.extend(entry.compiler_options.iter().cloned());

        tracing::info!(
            "compiling {} ({} {})",
            entry.file_name,
            entry.target_profile,
            entry.entry_point
        );

        let output = compiler
            .compile(CompileRequest {
                source: &bytes,
                entry_point: &entry.entry_point,
                target_profile: &entry.target_profile,
                defines: &defines,
                include_paths: &options.include_paths,
                args: &args,
            })
            .await?;

        if !output.success {
            return Err(PipelineError::Compilation {
                file_name: entry.file_name.clone(),
                diagnostics: output.diagnostics,
            });
        }

        shaders.push(ShaderDefinition {
            stage: entry.stage,
            platform: options.platform,
            inputs: Vec::new(),
            hash: 0,
            shader: BgfxShader::new(entry.stage, output.object)?,
        });
    }

    Ok(Material {
        version: ContainerVersion::LATEST,
        name: manifest.material_name.clone(),
        encryption: Encryption::None,
        parent: String::new(),
        buffers: Vec::new(),
        uniforms: Vec::new(),
        uniform_overrides: IndexMap::new(),
        passes: vec![Pass {
            name: manifest.pass_name.clone(),
            supported_platforms: SupportedPlatforms::all(),
            fallback_pass: String::new(),
            default_blend_mode: None,
            default_variant: IndexMap::new(),
            framebuffer_binding: 0,
            variants: vec![Variant {
                is_supported: true,
                flags: IndexMap::new(),
                shaders,
            }],
        }],
        secret: None,
    })
}

/// [`compile_material`], serialized to container bytes.
pub async fn compile_material_bytes<C>(
    manifest: &MaterialManifest,
    options: &CompileOptions,
    source: &ShaderSource,
    compiler: &mut C,
) -> Result<Vec<u8>, PipelineError>
where
    C: ShaderCompiler,
{
    let material = compile_material(manifest, options, source, compiler).await?;
    Ok(material.write()?)
}
