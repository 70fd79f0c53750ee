use indexmap::IndexMap;
use material_format::enums::ShaderStage;
use serde::{Deserialize, Deserializer};

use crate::PipelineError;

/// Per-material build manifest: which shader sources make up one pass and
/// how each is compiled.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialManifest {
    pub material_name: String,
    pub pass_name: String,
    #[serde(default)]
    pub shaders: Vec<ShaderEntry>,
    #[serde(default)]
    pub compiler_options: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderEntry {
    pub name: String,
    pub file_name: String,
    #[serde(deserialize_with = "stage_from_name")]
    pub stage: ShaderStage,
    pub entry_point: String,
    pub target_profile: String,
    #[serde(default)]
    pub defines: IndexMap<String, String>,
    #[serde(default)]
    pub compiler_options: Vec<String>,
}

impl MaterialManifest {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn stage_from_name<'de, D>(deserializer: D) -> Result<ShaderStage, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    ShaderStage::from_name(&name).map_err(serde::de::Error::custom)
}
