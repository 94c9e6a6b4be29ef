mod app_records;
mod credentials;
mod json_file;
mod manifest_cache;
mod project_config;

pub use app_records::{AppRecordStore, DEPLOYED_APPS_FILENAME, LOCAL_APPS_FILENAME};
pub(crate) use json_file::read_json_file;
pub use credentials::{is_team_id, CredentialStore};
pub use manifest_cache::{ManifestCache, ManifestHash};
pub use project_config::{ManifestSource, ProjectConfig};
