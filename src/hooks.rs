use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Command,
};

use serde_derive::Deserialize;

use crate::{db::read_json_file, errors::AppError, types::AppManifest};

pub const GET_MANIFEST_HOOK: &str = "get-manifest";
const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Deserialize, Debug, Default)]
struct HooksFile {
    #[serde(default)]
    hooks: BTreeMap<String, String>,
}

/// Scripts a project declares in `.slack/hooks.json`.
#[derive(Debug, Clone)]
pub struct ProjectHooks {
    project_dir: PathBuf,
}

impl ProjectHooks {
    pub fn new(project_dir: &Path) -> ProjectHooks {
        ProjectHooks {
            project_dir: project_dir.to_path_buf(),
        }
    }

    fn hooks_path(&self) -> PathBuf {
        self.project_dir.join(".slack").join("hooks.json")
    }

    /// A project has a hooks file or one of the older `slack.json` files.
    pub fn validate_project_directory(&self) -> Result<(), AppError> {
        let candidates = [
            self.hooks_path(),
            self.project_dir.join("slack.json"),
            self.project_dir.join(".slack").join("slack.json"),
        ];

        if candidates.iter().any(|path| path.is_file()) {
            Ok(())
        } else {
            Err(AppError::InvalidAppDirectory(self.project_dir.clone()))
        }
    }

    fn hook_command(&self, name: &str) -> Result<Option<String>, AppError> {
        let file: HooksFile = read_json_file(&self.hooks_path())?;

        Ok(file.hooks.get(name).map(|command| command.trim().to_string()).filter(|command| !command.is_empty()))
    }

    /// Reads the manifest from the project, preferring the `get-manifest`
    /// hook over a `manifest.json` next to the project files.
    pub fn get_manifest_local(&self, team_domain: &str, is_dev: bool) -> Result<AppManifest, AppError> {
        let Some(command) = self.hook_command(GET_MANIFEST_HOOK)? else {
            let manifest_path = self.project_dir.join(MANIFEST_FILENAME);
            if manifest_path.is_file() {
                tracing::debug!(path = %manifest_path.display(), "Reading manifest file");
                return read_json_file(&manifest_path);
            }
            return Err(AppError::SdkHookNotFound(GET_MANIFEST_HOOK.to_string()));
        };

        let environment = if is_dev { "local" } else { "deployed" };
        let output = self.execute(&command, &[("SLACK_WORKSPACE", team_domain), ("SLACK_ENV", environment)])?;

        parse_manifest_output(&output)
    }

    pub fn is_slack_hosted_project(&self, team_domain: &str) -> bool {
        self.get_manifest_local(team_domain, false)
            .map(|manifest| manifest.is_function_runtime_slack_hosted())
            .unwrap_or(false)
    }

    fn execute(&self, command: &str, envs: &[(&str, &str)]) -> Result<String, AppError> {
        let args = shlex::split(command)
            .filter(|args| !args.is_empty())
            .ok_or_else(|| AppError::InvalidManifest(format!("Unable to parse the hook command `{}`", command)))?;

        tracing::debug!(command, "Running project hook");
        let output = Command::new(&args[0])
            .args(&args[1..])
            .current_dir(&self.project_dir)
            .envs(envs.iter().copied())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::InvalidManifest(format!(
                "The hook `{}` exited with {}: {}",
                command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Hook output can carry log lines before the manifest JSON.
fn parse_manifest_output(output: &str) -> Result<AppManifest, AppError> {
    let start = output
        .find('{')
        .ok_or_else(|| AppError::InvalidManifest("Invalid app manifest format, must be valid JSON".to_string()))?;

    serde_json::from_str(&output[start..])
        .map_err(|err| AppError::InvalidManifest(format!("Please check your manifest file: {}", err)))
}
