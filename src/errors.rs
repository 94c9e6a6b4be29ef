use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: `{0:?}`")]
    IOError(#[from] std::io::Error),

    #[error("Failed to serialize or parse JSON: `{0:?}`")]
    JsonError(#[from] serde_json::Error),

    #[error("Reqwest error: `{0:?}`")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Failed to read from the terminal: `{0:?}`")]
    PromptError(#[from] dialoguer::Error),

    #[error("The input device is not a TTY or does not support interactivity: `{0}`")]
    NoInteractivity(String),

    #[error("Slack API error from `{method}`: `{code}`")]
    SlackError {
        method: String,
        code: String,
        details: Vec<String>,
    },

    #[error("No authentication found for this team: `{0}`")]
    CredentialsNotFound(String),

    #[error("The app was not found: `{0}`")]
    AppNotFound(String),

    #[error("An app was found: `{0}`")]
    AppFound(String),

    #[error("A different org workspace grant already exists for the installed app: `{0}`")]
    OrgGrantExists(String),

    #[error("The provided flags cannot be used together: `{0}`")]
    MismatchedFlags(String),

    #[error("A required flag was not provided: `{0}`")]
    MissingFlag(String),

    #[error("This is an invalid Slack app project directory: `{0:?}`")]
    InvalidAppDirectory(PathBuf),

    #[error("The app manifest was not updated: `{message}`")]
    AppManifestUpdate {
        message: String,
        remediation: Vec<String>,
    },

    #[error("The app manifest contains breaking changes to datastores: `{message}`")]
    SchemaCompatibility {
        message: String,
        command: String,
    },

    #[error("A valid installation of this app is required to take this action: `{0}`")]
    InstallationRequired(String),

    #[error("Couldn't install your app to a workspace: {0}")]
    AppInstall(Box<AppError>),

    #[error("Couldn't remove your app: {0}")]
    AppRemove(Box<AppError>),

    #[error("team_id is required to create or update this app: `{0}`")]
    MissingAppTeamID(String),

    #[error("Project manifest source is not valid: `{0}`")]
    ProjectConfigManifestSource(String),

    #[error("Failed to parse a JSON file at `{path:?}`: `{source:?}`")]
    UnableToParseJSON {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to get app manifest details: `{0}`")]
    InvalidManifest(String),

    #[error("The `{0}` hook script was not found")]
    SdkHookNotFound(String),

    #[error("The provided token is not valid: `{0}`")]
    InvalidAuth(String),

    #[error("No OAuth2 provider was found: `{0}`")]
    ProviderNotFound(String),

    #[error("This app is currently denied for installation")]
    AppApprovalRequestDenied,

    #[error("Cancelled due to user input")]
    Cancelled,

    #[error("Unexpected error: `{0:?}`")]
    UnexpectedError(String),
}

impl AppError {
    pub fn slack(method: &str, code: &str) -> AppError {
        AppError::SlackError {
            method: method.to_string(),
            code: code.to_string(),
            details: vec![],
        }
    }

    /// Stable identifier printed alongside the message.
    pub fn code(&self) -> String {
        let code = match self {
            AppError::IOError(_) => "io_error",
            AppError::JsonError(_) => "json_error",
            AppError::ReqwestError(_) => "http_request_failed",
            AppError::PromptError(_) | AppError::NoInteractivity(_) => "prompt_error",
            AppError::SlackError { code, .. } => return code.clone(),
            AppError::CredentialsNotFound(_) => "credentials_not_found",
            AppError::AppNotFound(_) => "app_not_found",
            AppError::AppFound(_) => "app_found",
            AppError::OrgGrantExists(_) => "org_grant_exists",
            AppError::MismatchedFlags(_) => "mismatched_flags",
            AppError::MissingFlag(_) => "missing_flag",
            AppError::InvalidAppDirectory(_) => "invalid_app_directory",
            AppError::AppManifestUpdate { .. } => "app_manifest_update",
            AppError::SchemaCompatibility { .. } => "schema_compatibility_error",
            AppError::InstallationRequired(_) => "installation_required",
            AppError::AppInstall(_) => "app_install",
            AppError::AppRemove(_) => "app_remove",
            AppError::MissingAppTeamID(_) => "missing_app_team_id",
            AppError::ProjectConfigManifestSource(_) => "project_config_manifest_source",
            AppError::UnableToParseJSON { .. } => "unable_to_parse_json",
            AppError::InvalidManifest(_) => "invalid_manifest",
            AppError::SdkHookNotFound(_) => "sdk_hook_not_found",
            AppError::InvalidAuth(_) => "invalid_auth",
            AppError::ProviderNotFound(_) => "provider_not_found",
            AppError::AppApprovalRequestDenied => "app_approval_request_denied",
            AppError::Cancelled => "process_interrupted",
            AppError::UnexpectedError(_) => "unexpected_error",
        };

        code.to_string()
    }

    pub fn remediation(&self) -> Option<String> {
        match self {
            AppError::NoInteractivity(_) => Some("Learn more about the flags of this command with `--help`".to_string()),
            AppError::CredentialsNotFound(_) => Some("Run `slack-app auth login` to authorize your team".to_string()),
            AppError::AppFound(_) => Some("Remove the app from this project or try again with --force".to_string()),
            AppError::OrgGrantExists(_) => {
                Some("Use --org-workspace-grant with the existing workspace, or `all`".to_string())
            }
            AppError::InvalidAppDirectory(_) => Some("Run this command inside a Slack app project directory".to_string()),
            AppError::AppManifestUpdate { remediation, .. } => Some(remediation.join("\n")),
            AppError::SchemaCompatibility { command, .. } => Some(format!(
                "Run `slack-app {} --force` to apply the changes anyway, datastore data may be lost",
                command
            )),
            AppError::InstallationRequired(_) => Some("Install the app with `slack-app app install`".to_string()),
            AppError::AppInstall(inner) | AppError::AppRemove(inner) => inner.remediation(),
            AppError::MissingAppTeamID(_) => Some("Use the --team flag to select a team by its ID".to_string()),
            AppError::ProjectConfigManifestSource(_) => {
                Some("Set \"manifest.source\" in .slack/config.json to \"local\" or \"remote\"".to_string())
            }
            AppError::UnableToParseJSON { path, .. } => Some(format!("Check that {} is valid JSON", path.display())),
            AppError::SdkHookNotFound(hook) => Some(format!("Add a `{}` script to .slack/hooks.json", hook)),
            AppError::ProviderNotFound(_) => {
                Some("Add an OAuth2 provider to the app manifest and reinstall the app".to_string())
            }
            AppError::AppApprovalRequestDenied => Some(
                "Reach out to an admin for additional information, or try requesting again with different scopes and outgoing domains"
                    .to_string(),
            ),
            AppError::SlackError { details, .. } if !details.is_empty() => Some(details.join("\n")),
            _ => None,
        }
    }

    /// True for API errors reporting breaking datastore changes in a manifest.
    pub fn is_schema_compatibility(&self) -> bool {
        match self {
            AppError::SchemaCompatibility { .. } => true,
            AppError::SlackError { code, details, .. } => {
                code.contains("schema_compatibility_error")
                    || details.iter().any(|detail| detail.contains("schema_compatibility_error"))
            }
            _ => false,
        }
    }
}
