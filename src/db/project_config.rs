use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use derive_more::Display;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;

use super::json_file::{read_json_file, write_json_file};

pub const PROJECT_CONFIG_FILENAME: &str = "config.json";

/// Where the manifest of record lives for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ManifestSource {
    #[default]
    #[display("local")]
    Local,
    #[display("remote")]
    Remote,
}

impl FromStr for ManifestSource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(ManifestSource::Local),
            "remote" => Ok(ManifestSource::Remote),
            other => Err(AppError::ProjectConfigManifestSource(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct ProjectConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    manifest: Option<ManifestConfig>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct ManifestConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    source: String,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Reads and writes `.slack/config.json` of a project.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    path: PathBuf,
}

impl ProjectConfig {
    pub fn new(project_dir: &Path) -> ProjectConfig {
        ProjectConfig {
            path: project_dir.join(".slack").join(PROJECT_CONFIG_FILENAME),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn get_manifest_source(&self) -> Result<ManifestSource, AppError> {
        let config: ProjectConfigFile = read_json_file(&self.path)?;

        match config.manifest.map(|manifest| manifest.source) {
            Some(source) if !source.is_empty() => source.parse(),
            _ => Ok(ManifestSource::default()),
        }
    }

    pub fn set_manifest_source(&self, source: ManifestSource) -> Result<(), AppError> {
        let mut config: ProjectConfigFile = read_json_file(&self.path)?;

        config.manifest.get_or_insert_with(ManifestConfig::default).source = source.to_string();
        write_json_file(&self.path, &config)?;

        tracing::debug!(source = %source, "Saved project manifest source");
        Ok(())
    }
}
