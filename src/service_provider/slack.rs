use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use derive_more::Display;
use reqwest::{multipart, Client, RequestBuilder};
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    errors::AppError,
    types::{is_enterprise_team_id, App, AppManifest, EnterpriseGrant, GRANT_ALL_ORG_WORKSPACES},
};

#[derive(Deserialize, Debug)]
struct SlackResponse<T> {
    ok: bool,
    error: Option<String>,

    #[serde(default)]
    errors: Vec<ManifestIssue>,

    #[serde(default)]
    warnings: Vec<ManifestIssue>,

    #[serde(flatten)]
    data: T,
}

impl<T> SlackResponse<T> {
    fn into_result(self, method: &str) -> Result<T, AppError> {
        if self.ok && self.errors.is_empty() {
            return Ok(self.data);
        }

        let code = self.error.unwrap_or_else(|| "unknown_error".to_string());
        tracing::debug!(method, code = %code, "Slack API returned an error");

        Err(AppError::SlackError {
            method: method.to_string(),
            code,
            details: self.errors.iter().map(ToString::to_string).collect(),
        })
    }
}

#[derive(Deserialize, Debug)]
struct EmptyResponse {}

/// A single problem reported while validating a manifest.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Display)]
#[display("{} ({}): {}", code, pointer, message)]
pub struct ManifestIssue {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub pointer: String,
}

/// Warnings are returned alongside any validation error.
#[derive(Debug, Default)]
pub struct ManifestValidation {
    pub warnings: Vec<ManifestIssue>,
    pub error: Option<AppError>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AuthSession {
    #[serde(rename = "user")]
    pub user_name: Option<String>,
    pub user_id: Option<String>,
    pub team_id: Option<String>,
    #[serde(rename = "team")]
    pub team_name: Option<String>,
    pub enterprise_id: Option<String>,
    pub is_enterprise_install: Option<bool>,
    pub url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExchangedAuth {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub team_domain: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub enterprise_id: String,
    #[serde(default, rename = "exp")]
    pub expires_at: i64,
    #[serde(default)]
    pub is_enterprise_install: bool,
    #[serde(default)]
    pub is_ready: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RotatedToken {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, rename = "iat")]
    pub issued_at: i64,
    #[serde(default, rename = "exp")]
    pub expires_at: i64,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct GenerateAuthTicketResponse {
    #[serde(default)]
    ticket: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub verification_token: String,
    #[serde(default)]
    pub signing_secret: String,
}

/// Result of both creating and updating an app manifest.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ManifestUpdateResult {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub credentials: AppCredentials,
    #[serde(default)]
    pub oauth_authorize_url: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct ExportManifestResponse {
    #[serde(default)]
    manifest: AppManifest,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiAccessTokens {
    #[serde(default)]
    pub bot: String,
    #[serde(default)]
    pub app_level: String,
    #[serde(default)]
    pub user: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeveloperInstallResult {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub api_access_tokens: ApiAccessTokens,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct DeveloperInstallResponse {
    #[serde(flatten)]
    result: DeveloperInstallResult,
    #[serde(default)]
    team_id: String,
}

/// Admin approval states reported instead of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AppApprovalState {
    #[display("app_approval_request_eligible")]
    Eligible,
    #[display("app_approval_request_pending")]
    Pending,
    #[display("app_approval_request_denied")]
    Denied,
}

impl AppApprovalState {
    pub fn parse(code: &str) -> Option<AppApprovalState> {
        match code.to_lowercase().as_str() {
            "app_approval_request_eligible" => Some(AppApprovalState::Eligible),
            "app_approval_request_pending" => Some(AppApprovalState::Pending),
            "app_approval_request_denied" => Some(AppApprovalState::Denied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeveloperInstallOutcome {
    Installed(DeveloperInstallResult),
    ApprovalRequired { state: AppApprovalState, team_id: String },
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeveloperInstallRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bot_scopes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outgoing_domains: Vec<String>,
    #[serde(rename = "team_id", skip_serializing_if = "String::is_empty")]
    pub grant_team_id: String,
}

impl DeveloperInstallRequest {
    /// Org grants only apply to apps created on an org; "all" grants every
    /// workspace through the enterprise ID.
    pub fn new(app: &App, bot_scopes: Vec<String>, outgoing_domains: Vec<String>, org_grant_workspace_id: &str) -> Self {
        let grant_team_id = if !is_enterprise_team_id(&app.team_id) {
            String::new()
        } else if org_grant_workspace_id == GRANT_ALL_ORG_WORKSPACES {
            app.enterprise_id.clone()
        } else {
            org_grant_workspace_id.to_string()
        };

        DeveloperInstallRequest {
            app_id: app.app_id.clone(),
            bot_scopes,
            outgoing_domains,
            grant_team_id,
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppApprovalRequest {
    #[serde(rename = "app")]
    pub app_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bot_scopes: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(rename = "domains", skip_serializing_if = "Vec::is_empty")]
    pub outgoing_domains: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub team_id: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStatusInfo {
    pub app_id: String,
    #[serde(default, rename = "is_installed")]
    pub installed: bool,
    #[serde(default, rename = "is_hosted")]
    pub hosted: bool,
    #[serde(default)]
    pub enterprise_grants: Vec<EnterpriseGrant>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStatusTeam {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub team_domain: String,
    #[serde(default)]
    pub is_enterprise: bool,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStatusResult {
    #[serde(default)]
    pub apps: Vec<AppStatusInfo>,
    #[serde(default)]
    pub team: Option<AppStatusTeam>,
}

/// A workspace the token can reach.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamsPage {
    #[serde(default)]
    pub teams: Vec<TeamInfo>,
    /// Set when the org has more workspaces than were returned.
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Deserialize, Debug, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize, Debug, Default)]
struct AuthTeamsListResponse {
    #[serde(default)]
    teams: Vec<TeamInfo>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalToken {
    #[serde(default)]
    pub external_token_id: String,
    #[serde(default)]
    pub external_user_id: String,
    #[serde(default)]
    pub date_updated: i64,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq, Display)]
#[display("{} ({})", provider_name, provider_key)]
pub struct ExternalAuthorization {
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub provider_key: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret_exists: bool,
    #[serde(default)]
    pub valid_token_exists: bool,
    #[serde(default)]
    pub external_tokens: Vec<ExternalToken>,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct ExternalAuthListResponse {
    #[serde(default)]
    authorizations: Vec<ExternalAuthorization>,
}

/// Slack web API methods used to manage apps and developer sessions.
#[async_trait]
pub trait SlackApi: Send + Sync {
    fn host(&self) -> String;

    async fn validate_session(&self, token: &str) -> Result<AuthSession, AppError>;
    async fn revoke_token(&self, token: &str) -> Result<(), AppError>;
    async fn rotate_token(&self, refresh_token: &str) -> Result<RotatedToken, AppError>;
    async fn generate_auth_ticket(&self) -> Result<String, AppError>;
    async fn exchange_auth_ticket(&self, ticket: &str, challenge: &str) -> Result<ExchangedAuth, AppError>;

    async fn validate_app_manifest(&self, token: &str, manifest: &AppManifest, app_id: &str) -> Result<ManifestValidation, AppError>;
    async fn create_app(&self, token: &str, manifest: &AppManifest) -> Result<ManifestUpdateResult, AppError>;
    async fn update_app(
        &self,
        token: &str,
        app_id: &str,
        manifest: &AppManifest,
        force_update: bool,
        consent_breaking_changes: bool,
    ) -> Result<ManifestUpdateResult, AppError>;
    async fn export_app_manifest(&self, token: &str, app_id: &str) -> Result<AppManifest, AppError>;

    async fn developer_app_install(&self, token: &str, request: &DeveloperInstallRequest) -> Result<DeveloperInstallOutcome, AppError>;
    async fn request_app_approval(&self, token: &str, request: &AppApprovalRequest) -> Result<(), AppError>;
    async fn cancel_app_approval_request(&self, token: &str, app_id: &str) -> Result<(), AppError>;
    async fn uninstall_app(&self, token: &str, app_id: &str, team_id: &str) -> Result<(), AppError>;
    async fn delete_app(&self, token: &str, app_id: &str) -> Result<(), AppError>;
    async fn get_app_status(&self, token: &str, app_ids: &[String], team_id: &str) -> Result<AppStatusResult, AppError>;
    async fn upload_icon(&self, token: &str, app_id: &str, icon_path: &Path) -> Result<(), AppError>;
    /// Workspaces of an org the token can reach, sorted by name.
    async fn list_auth_teams(&self, token: &str, limit: usize) -> Result<TeamsPage, AppError>;

    async fn list_external_auths(&self, token: &str, app_id: &str) -> Result<Vec<ExternalAuthorization>, AppError>;
    async fn add_external_auth_client_secret(
        &self,
        token: &str,
        app_id: &str,
        provider_key: &str,
        client_secret: &str,
    ) -> Result<(), AppError>;
    async fn remove_external_auth(&self, token: &str, app_id: &str, provider_key: &str) -> Result<(), AppError>;
}

pub struct Slack {
    http_client: Arc<Box<Client>>,
    api_host: String,
}

impl Slack {
    pub fn new(http_client: Arc<Box<Client>>, api_host: &str) -> Slack {
        Slack {
            http_client,
            api_host: api_host.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.api_host, endpoint)
    }

    async fn post_json<T>(&self, endpoint: &str, token: &str, payload: &Value) -> Result<SlackResponse<T>, AppError>
    where
        T: for<'a> serde::Deserialize<'a>,
    {
        let request_builder = self
            .http_client
            .post(self.url(endpoint))
            .bearer_auth(token)
            .header("Content-Type", "application/json; charset=utf-8")
            .body(payload.to_string());

        self.send_request(endpoint, request_builder).await
    }

    async fn post_form<T>(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<SlackResponse<T>, AppError>
    where
        T: for<'a> serde::Deserialize<'a>,
    {
        let request_builder = self.http_client.post(self.url(endpoint)).form(form);

        self.send_request(endpoint, request_builder).await
    }

    async fn send_request<T>(&self, endpoint: &str, request_builder: RequestBuilder) -> Result<SlackResponse<T>, AppError>
    where
        T: for<'a> serde::Deserialize<'a>,
    {
        tracing::debug!(endpoint, "Sending Slack API request");
        let response = request_builder.send().await?;

        if !response.status().is_success() {
            tracing::warn!(endpoint, status = %response.status(), "Failed sending request to Slack");
            return Err(AppError::SlackError {
                method: endpoint.to_string(),
                code: "http_request_failed".to_string(),
                details: vec![format!("Failed sending request to Slack, status: {}", response.status())],
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| {
            tracing::debug!(endpoint, error = %err, "Failed to parse Slack API response");
            AppError::SlackError {
                method: endpoint.to_string(),
                code: "http_response_invalid".to_string(),
                details: vec![err.to_string()],
            }
        })
    }
}

#[async_trait]
impl SlackApi for Slack {
    fn host(&self) -> String {
        self.api_host.clone()
    }

    async fn validate_session(&self, token: &str) -> Result<AuthSession, AppError> {
        let method = "auth.test";
        let session: AuthSession = self.post_json(method, token, &json!({})).await?.into_result(method)?;

        if session.user_id.is_none() {
            return Err(AppError::InvalidAuth("The session is missing a user ID".to_string()));
        }
        Ok(session)
    }

    async fn revoke_token(&self, token: &str) -> Result<(), AppError> {
        let method = "auth.revoke";
        self.post_form::<EmptyResponse>(method, &[("token", token)]).await?.into_result(method)?;
        Ok(())
    }

    async fn rotate_token(&self, refresh_token: &str) -> Result<RotatedToken, AppError> {
        let method = "tooling.tokens.rotate";
        self.post_form(method, &[("refresh_token", refresh_token)]).await?.into_result(method)
    }

    async fn generate_auth_ticket(&self) -> Result<String, AppError> {
        let method = "apps.hosted.generateAuthTicket";
        let response: GenerateAuthTicketResponse = self
            .post_form(method, &[("cli_version", env!("CARGO_PKG_VERSION"))])
            .await?
            .into_result(method)?;

        Ok(response.ticket)
    }

    async fn exchange_auth_ticket(&self, ticket: &str, challenge: &str) -> Result<ExchangedAuth, AppError> {
        let method = "apps.hosted.exchangeAuthTicket";
        self.post_form(
            method,
            &[("ticket", ticket), ("challenge", challenge), ("cli_version", env!("CARGO_PKG_VERSION"))],
        )
        .await?
        .into_result(method)
    }

    async fn validate_app_manifest(&self, token: &str, manifest: &AppManifest, app_id: &str) -> Result<ManifestValidation, AppError> {
        let method = "apps.manifest.validate";
        let mut payload = json!({ "manifest": manifest });
        if !app_id.is_empty() {
            payload["app_id"] = json!(app_id);
        }

        let response: SlackResponse<EmptyResponse> = self.post_json(method, token, &payload).await?;
        let warnings = response.warnings.clone();

        Ok(ManifestValidation {
            warnings,
            error: response.into_result(method).err(),
        })
    }

    async fn create_app(&self, token: &str, manifest: &AppManifest) -> Result<ManifestUpdateResult, AppError> {
        let method = "apps.manifest.create";
        self.post_json(method, token, &json!({ "manifest": manifest })).await?.into_result(method)
    }

    async fn update_app(
        &self,
        token: &str,
        app_id: &str,
        manifest: &AppManifest,
        force_update: bool,
        consent_breaking_changes: bool,
    ) -> Result<ManifestUpdateResult, AppError> {
        let method = "apps.manifest.update";
        let payload = json!({
            "manifest": manifest,
            "app_id": app_id,
            "force_update": force_update,
            "consent_breaking_changes": consent_breaking_changes,
        });

        self.post_json(method, token, &payload).await?.into_result(method)
    }

    async fn export_app_manifest(&self, token: &str, app_id: &str) -> Result<AppManifest, AppError> {
        let method = "apps.manifest.export";
        let response: ExportManifestResponse =
            self.post_json(method, token, &json!({ "app_id": app_id })).await?.into_result(method)?;

        Ok(response.manifest)
    }

    async fn developer_app_install(&self, token: &str, request: &DeveloperInstallRequest) -> Result<DeveloperInstallOutcome, AppError> {
        let method = "apps.developerInstall";
        let response: SlackResponse<DeveloperInstallResponse> =
            self.post_json(method, token, &serde_json::to_value(request)?).await?;

        if !response.ok {
            if let Some(state) = response.error.as_deref().and_then(AppApprovalState::parse) {
                return Ok(DeveloperInstallOutcome::ApprovalRequired {
                    state,
                    team_id: response.data.team_id,
                });
            }
        }

        Ok(DeveloperInstallOutcome::Installed(response.into_result(method)?.result))
    }

    async fn request_app_approval(&self, token: &str, request: &AppApprovalRequest) -> Result<(), AppError> {
        let method = "apps.approvals.requests.create";
        self.post_json::<EmptyResponse>(method, token, &serde_json::to_value(request)?)
            .await?
            .into_result(method)?;
        Ok(())
    }

    async fn cancel_app_approval_request(&self, token: &str, app_id: &str) -> Result<(), AppError> {
        let method = "apps.approvals.requests.cancel";
        self.post_json::<EmptyResponse>(method, token, &json!({ "app_id": app_id }))
            .await?
            .into_result(method)?;
        Ok(())
    }

    async fn uninstall_app(&self, token: &str, app_id: &str, team_id: &str) -> Result<(), AppError> {
        let method = "apps.developerUninstall";
        self.post_json::<EmptyResponse>(method, token, &json!({ "app_id": app_id, "team_id": team_id }))
            .await?
            .into_result(method)?;
        Ok(())
    }

    async fn delete_app(&self, token: &str, app_id: &str) -> Result<(), AppError> {
        let method = "apps.delete";
        self.post_json::<EmptyResponse>(method, token, &json!({ "app_id": app_id }))
            .await?
            .into_result(method)?;
        Ok(())
    }

    async fn get_app_status(&self, token: &str, app_ids: &[String], team_id: &str) -> Result<AppStatusResult, AppError> {
        let method = "apps.status";
        let mut payload = json!({ "app_ids": app_ids });
        if !team_id.is_empty() {
            payload["team_id"] = json!(team_id);
        }

        self.post_json(method, token, &payload).await?.into_result(method)
    }

    async fn upload_icon(&self, token: &str, app_id: &str, icon_path: &Path) -> Result<(), AppError> {
        let method = "apps.hosted.icon";
        let bytes = std::fs::read(icon_path)?;
        let file_name = icon_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "icon.png".to_string());

        let form = multipart::Form::new()
            .text("app_id", app_id.to_string())
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));
        let request_builder = self.http_client.post(self.url(method)).bearer_auth(token).multipart(form);

        self.send_request::<EmptyResponse>(method, request_builder).await?.into_result(method)?;
        Ok(())
    }

    async fn list_auth_teams(&self, token: &str, limit: usize) -> Result<TeamsPage, AppError> {
        let method = "auth.teams.list";
        let response: AuthTeamsListResponse =
            self.post_json(method, token, &json!({ "limit": limit })).await?.into_result(method)?;

        let mut teams = response.teams;
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(TeamsPage { teams, next_cursor: response.response_metadata.next_cursor })
    }

    async fn list_external_auths(&self, token: &str, app_id: &str) -> Result<Vec<ExternalAuthorization>, AppError> {
        let method = "apps.auth.external.list";
        let response: ExternalAuthListResponse =
            self.post_json(method, token, &json!({ "app_id": app_id })).await?.into_result(method)?;

        Ok(response.authorizations)
    }

    async fn add_external_auth_client_secret(
        &self,
        token: &str,
        app_id: &str,
        provider_key: &str,
        client_secret: &str,
    ) -> Result<(), AppError> {
        let method = "apps.auth.external.clientSecret.add";
        let payload = json!({
            "app_id": app_id,
            "provider_key": provider_key,
            "client_secret": client_secret,
        });

        self.post_json::<EmptyResponse>(method, token, &payload).await?.into_result(method)?;
        Ok(())
    }

    async fn remove_external_auth(&self, token: &str, app_id: &str, provider_key: &str) -> Result<(), AppError> {
        let method = "apps.auth.external.delete";
        let mut payload = json!({ "app_id": app_id });
        if !provider_key.is_empty() {
            payload["provider_key"] = json!(provider_key);
        }

        self.post_json::<EmptyResponse>(method, token, &payload).await?.into_result(method)?;
        Ok(())
    }
}
