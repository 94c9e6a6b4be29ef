use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{errors::AppError, types::AppManifest};

use super::slack::{
    AppApprovalRequest, AppStatusInfo, AppStatusResult, AuthSession, DeveloperInstallOutcome,
    DeveloperInstallRequest, DeveloperInstallResult, ExchangedAuth, ExternalAuthorization, ManifestIssue,
    ManifestUpdateResult, ManifestValidation, RotatedToken, SlackApi, TeamsPage,
};

/// Canned responses and the requests that reached them.
#[derive(Default)]
pub struct MockState {
    pub calls: Vec<String>,

    pub session: AuthSession,
    pub session_error: Option<String>,
    pub validation_warnings: Vec<ManifestIssue>,
    pub validation_error: Option<AppError>,
    pub create_result: ManifestUpdateResult,
    pub create_error: Option<String>,
    pub update_error: Option<String>,
    pub exported_manifest: AppManifest,
    pub install_outcomes: Vec<DeveloperInstallOutcome>,
    pub install_error: Option<String>,
    pub status_result: Option<AppStatusResult>,
    pub status_error: Option<String>,
    pub delete_error: Option<String>,
    pub uninstall_error: Option<String>,
    pub icon_error: Option<String>,
    pub rotated_token: RotatedToken,
    pub auth_ticket: String,
    pub exchanged_auth: ExchangedAuth,
    pub external_auths: Vec<ExternalAuthorization>,
    pub auth_teams: TeamsPage,

    pub updated_manifests: Vec<AppManifest>,
    pub created_manifests: Vec<AppManifest>,
    pub update_flags: Vec<(bool, bool)>,
    pub install_requests: Vec<DeveloperInstallRequest>,
    pub approval_requests: Vec<AppApprovalRequest>,
    pub uploaded_icons: Vec<PathBuf>,
    pub revoked_tokens: Vec<String>,
    pub uninstalled: Vec<(String, String)>,
    pub status_requests: Vec<(Vec<String>, String)>,
    pub secrets: Vec<(String, String, String)>,
    pub removed_providers: Vec<(String, String)>,
}

pub struct MockSlackApi {
    state: Mutex<MockState>,
}

impl MockSlackApi {
    pub fn new() -> MockSlackApi {
        let state = MockState {
            session: AuthSession {
                user_name: Some("ada".to_string()),
                user_id: Some("U0000000001".to_string()),
                team_id: Some("T0000000001".to_string()),
                team_name: Some("team1".to_string()),
                url: Some("https://team1.slack.com/".to_string()),
                ..Default::default()
            },
            create_result: ManifestUpdateResult { app_id: "A0000000001".to_string(), ..Default::default() },
            ..Default::default()
        };

        MockSlackApi { state: Mutex::new(state) }
    }

    /// Adjusts the canned responses or reads what was recorded.
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|state| state.calls.clone())
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.with(|state| state.calls.iter().filter(|call| call.as_str() == method).count())
    }

    fn record(&self, method: &str) {
        self.with(|state| state.calls.push(method.to_string()));
    }
}

fn fail_with(method: &str, code: &Option<String>) -> Result<(), AppError> {
    match code {
        Some(code) => Err(AppError::slack(method, code)),
        None => Ok(()),
    }
}

#[async_trait]
impl SlackApi for MockSlackApi {
    fn host(&self) -> String {
        "https://slack.com".to_string()
    }

    async fn validate_session(&self, _token: &str) -> Result<AuthSession, AppError> {
        self.record("auth.test");
        self.with(|state| {
            fail_with("auth.test", &state.session_error)?;
            Ok(state.session.clone())
        })
    }

    async fn revoke_token(&self, token: &str) -> Result<(), AppError> {
        self.record("auth.revoke");
        self.with(|state| state.revoked_tokens.push(token.to_string()));
        Ok(())
    }

    async fn rotate_token(&self, _refresh_token: &str) -> Result<RotatedToken, AppError> {
        self.record("tooling.tokens.rotate");
        Ok(self.with(|state| state.rotated_token.clone()))
    }

    async fn generate_auth_ticket(&self) -> Result<String, AppError> {
        self.record("apps.hosted.generateAuthTicket");
        Ok(self.with(|state| state.auth_ticket.clone()))
    }

    async fn exchange_auth_ticket(&self, _ticket: &str, _challenge: &str) -> Result<ExchangedAuth, AppError> {
        self.record("apps.hosted.exchangeAuthTicket");
        Ok(self.with(|state| state.exchanged_auth.clone()))
    }

    async fn validate_app_manifest(&self, _token: &str, _manifest: &AppManifest, _app_id: &str) -> Result<ManifestValidation, AppError> {
        self.record("apps.manifest.validate");
        Ok(self.with(|state| ManifestValidation {
            warnings: state.validation_warnings.clone(),
            error: state.validation_error.take(),
        }))
    }

    async fn create_app(&self, _token: &str, manifest: &AppManifest) -> Result<ManifestUpdateResult, AppError> {
        self.record("apps.manifest.create");
        self.with(|state| {
            fail_with("apps.manifest.create", &state.create_error)?;
            state.created_manifests.push(manifest.clone());
            Ok(state.create_result.clone())
        })
    }

    async fn update_app(
        &self,
        _token: &str,
        app_id: &str,
        manifest: &AppManifest,
        force_update: bool,
        consent_breaking_changes: bool,
    ) -> Result<ManifestUpdateResult, AppError> {
        self.record("apps.manifest.update");
        self.with(|state| {
            fail_with("apps.manifest.update", &state.update_error)?;
            state.updated_manifests.push(manifest.clone());
            state.update_flags.push((force_update, consent_breaking_changes));
            Ok(ManifestUpdateResult { app_id: app_id.to_string(), ..Default::default() })
        })
    }

    async fn export_app_manifest(&self, _token: &str, _app_id: &str) -> Result<AppManifest, AppError> {
        self.record("apps.manifest.export");
        Ok(self.with(|state| state.exported_manifest.clone()))
    }

    async fn developer_app_install(&self, _token: &str, request: &DeveloperInstallRequest) -> Result<DeveloperInstallOutcome, AppError> {
        self.record("apps.developerInstall");
        self.with(|state| {
            fail_with("apps.developerInstall", &state.install_error)?;
            state.install_requests.push(request.clone());

            if state.install_outcomes.is_empty() {
                return Ok(DeveloperInstallOutcome::Installed(DeveloperInstallResult {
                    app_id: request.app_id.clone(),
                    ..Default::default()
                }));
            }
            Ok(state.install_outcomes.remove(0))
        })
    }

    async fn request_app_approval(&self, _token: &str, request: &AppApprovalRequest) -> Result<(), AppError> {
        self.record("apps.approvals.requests.create");
        self.with(|state| state.approval_requests.push(request.clone()));
        Ok(())
    }

    async fn cancel_app_approval_request(&self, _token: &str, _app_id: &str) -> Result<(), AppError> {
        self.record("apps.approvals.requests.cancel");
        Ok(())
    }

    async fn uninstall_app(&self, _token: &str, app_id: &str, team_id: &str) -> Result<(), AppError> {
        self.record("apps.developerUninstall");
        self.with(|state| {
            fail_with("apps.developerUninstall", &state.uninstall_error)?;
            state.uninstalled.push((app_id.to_string(), team_id.to_string()));
            Ok(())
        })
    }

    async fn delete_app(&self, _token: &str, _app_id: &str) -> Result<(), AppError> {
        self.record("apps.delete");
        self.with(|state| fail_with("apps.delete", &state.delete_error))
    }

    async fn get_app_status(&self, _token: &str, app_ids: &[String], team_id: &str) -> Result<AppStatusResult, AppError> {
        self.record("apps.status");
        self.with(|state| {
            fail_with("apps.status", &state.status_error)?;
            state.status_requests.push((app_ids.to_vec(), team_id.to_string()));

            Ok(state.status_result.clone().unwrap_or_else(|| AppStatusResult {
                apps: app_ids
                    .iter()
                    .map(|app_id| AppStatusInfo { app_id: app_id.clone(), installed: true, ..Default::default() })
                    .collect(),
                team: None,
            }))
        })
    }

    async fn upload_icon(&self, _token: &str, _app_id: &str, icon_path: &Path) -> Result<(), AppError> {
        self.record("apps.hosted.icon");
        self.with(|state| {
            fail_with("apps.hosted.icon", &state.icon_error)?;
            state.uploaded_icons.push(icon_path.to_path_buf());
            Ok(())
        })
    }

    async fn list_auth_teams(&self, _token: &str, _limit: usize) -> Result<TeamsPage, AppError> {
        self.record("auth.teams.list");
        Ok(self.with(|state| state.auth_teams.clone()))
    }

    async fn list_external_auths(&self, _token: &str, _app_id: &str) -> Result<Vec<ExternalAuthorization>, AppError> {
        self.record("apps.auth.external.list");
        Ok(self.with(|state| state.external_auths.clone()))
    }

    async fn add_external_auth_client_secret(
        &self,
        _token: &str,
        app_id: &str,
        provider_key: &str,
        client_secret: &str,
    ) -> Result<(), AppError> {
        self.record("apps.auth.external.clientSecret.add");
        self.with(|state| {
            state.secrets.push((app_id.to_string(), provider_key.to_string(), client_secret.to_string()))
        });
        Ok(())
    }

    async fn remove_external_auth(&self, _token: &str, app_id: &str, provider_key: &str) -> Result<(), AppError> {
        self.record("apps.auth.external.delete");
        self.with(|state| state.removed_providers.push((app_id.to_string(), provider_key.to_string())));
        Ok(())
    }
}
