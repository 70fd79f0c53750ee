use std::collections::HashMap;
use std::path::PathBuf;

use crate::PipelineError;

/// Where shader source files come from.
#[derive(Clone, Debug)]
pub enum ShaderSource {
    /// Files under a directory on disk.
    Directory(PathBuf),
    /// An in-memory name to content map.
    Embedded(HashMap<String, Vec<u8>>),
}

impl ShaderSource {
    pub async fn load(&self, file_name: &str) -> Result<Vec<u8>, PipelineError> {
        match self {
            Self::Directory(root) => {
                let path = root.join(file_name);
                tokio::fs::read(&path)
                    .await
                    .map_err(|_| PipelineError::SourceNotFound(file_name.to_owned()))
            }
            Self::Embedded(files) => files
                .get(file_name)
                .cloned()
                .ok_or_else(|| PipelineError::SourceNotFound(file_name.to_owned())),
        }
    }
}
