use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use derive_more::Display;
use ring::digest;
use serde::Serialize;
use serde_derive::{Deserialize, Serialize as SerializeDerive};

use crate::errors::AppError;

use super::json_file::{read_json_file, write_json_file};

/// Digest of a manifest, compared only for equality.
#[derive(SerializeDerive, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash, Display)]
#[serde(transparent)]
pub struct ManifestHash(String);

impl ManifestHash {
    /// SHA-256 of the JSON form with object keys sorted, so equal values hash
    /// the same regardless of key order.
    pub fn of<T: Serialize>(value: &T) -> Result<ManifestHash, AppError> {
        let canonical = serde_json::to_vec(&serde_json::to_value(value)?)?;

        Ok(ManifestHash::of_bytes(&canonical))
    }

    pub fn of_bytes(bytes: &[u8]) -> ManifestHash {
        let digest = digest::digest(&digest::SHA256, bytes);
        ManifestHash(hex::encode(digest.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(SerializeDerive, Deserialize, Debug, Clone, Default)]
struct ManifestCacheEntry {
    #[serde(default)]
    hash: ManifestHash,

    /// Hash of the project manifest last written to app settings.
    #[serde(default, skip_serializing_if = "ManifestHash::is_empty")]
    local: ManifestHash,
}

/// Last synced manifest hash per app, kept in `.slack/cache/manifests.json`.
#[derive(Debug, Clone)]
pub struct ManifestCache {
    path: PathBuf,
}

impl ManifestCache {
    pub fn new(project_dir: &Path) -> ManifestCache {
        ManifestCache {
            path: project_dir.join(".slack").join("cache").join("manifests.json"),
        }
    }

    /// Empty when the app was never cached.
    pub fn get_manifest_hash(&self, app_id: &str) -> Result<ManifestHash, AppError> {
        let cache: BTreeMap<String, ManifestCacheEntry> = read_json_file(&self.path)?;

        Ok(cache.get(app_id).map(|entry| entry.hash.clone()).unwrap_or_default())
    }

    pub fn new_manifest_hash<T: Serialize>(&self, manifest: &T) -> Result<ManifestHash, AppError> {
        ManifestHash::of(manifest)
    }

    pub fn set_manifest_hash(&self, app_id: &str, hash: &ManifestHash) -> Result<(), AppError> {
        self.update_entry(app_id, |entry| entry.hash = hash.clone())
    }

    pub fn get_local_manifest_hash(&self, app_id: &str) -> Result<ManifestHash, AppError> {
        let cache: BTreeMap<String, ManifestCacheEntry> = read_json_file(&self.path)?;

        Ok(cache.get(app_id).map(|entry| entry.local.clone()).unwrap_or_default())
    }

    pub fn set_local_manifest_hash(&self, app_id: &str, hash: &ManifestHash) -> Result<(), AppError> {
        self.update_entry(app_id, |entry| entry.local = hash.clone())
    }

    fn update_entry(&self, app_id: &str, update: impl FnOnce(&mut ManifestCacheEntry)) -> Result<(), AppError> {
        let mut cache: BTreeMap<String, ManifestCacheEntry> = read_json_file(&self.path)?;
        update(cache.entry(app_id.to_string()).or_default());

        write_json_file(&self.path, &cache)
    }
}
