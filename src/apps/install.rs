use std::{path::Path, time::Instant};

use crate::{
    clients::Clients,
    config::Experiment,
    db::{ManifestHash, ManifestSource},
    errors::AppError,
    progress::InstallEvent,
    service_provider::slack::{
        AppApprovalRequest, AppApprovalState, AuthSession, DeveloperInstallOutcome, DeveloperInstallRequest,
        DeveloperInstallResult, ManifestIssue,
    },
    types::{App, AppManifest, FunctionRuntime, InstallState, SlackAuth},
};

const BREAKING_CHANGE: &str = "breaking_change";
const ADDITIONAL_MANIFEST_INFO_NOTICE: &str = "App manifest contains some components that may require additional information";
const APPROVAL_ALTERNATIVE: &str = "Alternatively, retry on a workspace without administrator approval turned on";

pub const SLACK_APP_TOKEN: &str = "SLACK_APP_TOKEN";
pub const SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Workspace granted access to an app installed on an org, or "all".
    pub org_grant_workspace_id: String,
    /// Stops after the manifest is created or updated.
    pub only_create_update: bool,
}

/// Result of an install. `state` is empty when nothing was installed.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub app: App,
    pub state: Option<InstallState>,
    pub result: Option<DeveloperInstallResult>,
}

impl InstallOutcome {
    fn unchanged(app: App) -> InstallOutcome {
        InstallOutcome { app, state: None, result: None }
    }
}

/// Creates or updates an app manifest when needed, records the app in the
/// project and installs it to the team.
pub struct InstallReconciler<'a> {
    clients: &'a Clients,
}

impl<'a> InstallReconciler<'a> {
    pub fn new(clients: &'a Clients) -> InstallReconciler<'a> {
        InstallReconciler { clients }
    }

    /// Installs a deployed app.
    pub async fn install(&self, auth: &SlackAuth, mut app: App, options: &InstallOptions) -> Result<InstallOutcome, AppError> {
        let source = self.clients.project_config.get_manifest_source()?;
        let local_manifest = self.read_local_manifest(auth, &app, source, false)?;

        let updates = self.should_update_manifest(&app, auth, source, local_manifest.as_ref()).await?;
        let creates = self.should_create_manifest(&app, source);
        if !self.clients.config.with_experiment(Experiment::BoltInstall) && !updates && !creates {
            tracing::debug!(app_id = %app.app_id, "App manifest is up to date");
            return Ok(InstallOutcome::unchanged(app));
        }

        let session = self.validate_session(auth).await?;
        if let Some(enterprise_id) = session.enterprise_id.as_deref().filter(|id| !id.is_empty()) {
            app.enterprise_id = enterprise_id.to_string();
        }

        let mut manifest = match &local_manifest {
            Some(manifest) => manifest.clone(),
            None => self.clients.api.export_app_manifest(&auth.token, &app.app_id).await?,
        };
        if manifest.is_function_runtime_slack_hosted() {
            manifest.configure_hosted_runtime(&self.clients.api.host());
        }

        self.validate_manifest_for_install(&auth.token, &app, &manifest).await?;

        let start = Instant::now();
        let team_name = session.team_name.clone().unwrap_or_else(|| auth.team_domain.clone());
        if updates {
            self.update_manifest(auth, &app, &manifest, &team_name).await?;
        } else if creates {
            let app_id = self.create_manifest(auth, &manifest, &team_name).await?;
            app.app_id = app_id;
            app.team_id = session.team_id.clone().unwrap_or_else(|| auth.team_id.clone());
            app.team_domain = auth.team_domain.clone();
        }

        if !self.clients.config.skip_local_fs {
            self.clients.apps.save_deployed(&app)?;
        }
        self.cache_manifest(&app, auth, source, local_manifest.as_ref()).await?;

        if options.only_create_update {
            return Ok(InstallOutcome::unchanged(app));
        }

        let (result, state) = self.install_to_team(auth, &app, &manifest, &team_name, options).await?;
        let Some(result) = result else {
            self.clients.emit(InstallEvent::InstallIncomplete { state });
            return Ok(InstallOutcome { app, state: Some(state), result: None });
        };

        if manifest.function_runtime() != Some(FunctionRuntime::SlackHosted) {
            self.set_app_environment_tokens(&result);
        }
        self.update_icon(auth, &app, &manifest).await;

        self.clients.emit(InstallEvent::Completed { elapsed: start.elapsed() });
        Ok(InstallOutcome { app, state: Some(state), result: Some(result) })
    }

    /// Installs a deployed app to the team of `auth` and keeps a record of
    /// it in the project, even when nothing was created.
    pub async fn add(&self, auth: &SlackAuth, mut app: App, options: &InstallOptions) -> Result<InstallOutcome, AppError> {
        if app.team_id.is_empty() {
            app.team_id = auth.team_id.clone();
        }

        let outcome = self.install(auth, app, options).await?;
        if self.clients.config.skip_local_fs {
            return Ok(outcome);
        }

        match self.clients.apps.new_deployed(&outcome.app.team_id) {
            Ok(_) | Err(AppError::AppFound(_)) => Ok(outcome),
            Err(err) => Err(err),
        }
    }

    /// Installs an app run from the developer's machine.
    pub async fn install_local_app(&self, auth: &SlackAuth, mut app: App, options: &InstallOptions) -> Result<InstallOutcome, AppError> {
        let source = self.clients.project_config.get_manifest_source()?;
        let local_manifest = self.read_local_manifest(auth, &app, source, true)?;

        let updates = self.should_update_manifest(&app, auth, source, local_manifest.as_ref()).await?;
        let creates = self.should_create_manifest(&app, source);
        if !self.clients.config.with_experiment(Experiment::BoltInstall) && !updates && !creates {
            tracing::debug!(app_id = %app.app_id, "Local app manifest is up to date");
            return Ok(InstallOutcome::unchanged(app));
        }

        let session = self.validate_session(auth).await?;

        let mut manifest = match &local_manifest {
            Some(manifest) => manifest.clone(),
            None => self.clients.api.export_app_manifest(&auth.token, &app.app_id).await?,
        };
        manifest.append_local_to_display_name();
        if manifest.is_function_runtime_slack_hosted() {
            manifest.configure_local_runtime();
        }

        self.validate_manifest_for_install(&auth.token, &app, &manifest).await?;

        let start = Instant::now();
        let team_name = session.team_name.clone().unwrap_or_else(|| auth.team_domain.clone());
        if updates {
            self.update_manifest(auth, &app, &manifest, &team_name).await?;
        } else if creates {
            let app_id = self.create_manifest(auth, &manifest, &team_name).await?;
            app.app_id = app_id;
            app.team_id = session.team_id.clone().unwrap_or_else(|| auth.team_id.clone());
            app.team_domain = auth.team_domain.clone();
            app.enterprise_id = session.enterprise_id.clone().unwrap_or_default();
            app.user_id = session.user_id.clone().unwrap_or_else(|| auth.user_id.clone());
        }
        app.is_dev = true;

        if !self.clients.config.skip_local_fs {
            self.clients.apps.save_local(&app)?;
        }
        self.cache_manifest(&app, auth, source, local_manifest.as_ref()).await?;

        if options.only_create_update {
            return Ok(InstallOutcome::unchanged(app));
        }

        // Org workspace grants only apply to deployed apps.
        let options = InstallOptions { org_grant_workspace_id: String::new(), ..options.clone() };
        let (result, state) = self.install_to_team(auth, &app, &manifest, &team_name, &options).await?;
        let Some(result) = result else {
            self.clients.emit(InstallEvent::InstallIncomplete { state });
            return Ok(InstallOutcome { app, state: Some(state), result: None });
        };

        self.set_app_environment_tokens(&result);

        self.clients.emit(InstallEvent::Completed { elapsed: start.elapsed() });
        Ok(InstallOutcome { app, state: Some(state), result: Some(result) })
    }

    /// The project manifest, when it is the source used for this install.
    fn read_local_manifest(
        &self,
        auth: &SlackAuth,
        app: &App,
        source: ManifestSource,
        is_dev: bool,
    ) -> Result<Option<AppManifest>, AppError> {
        // Remote sources never update, so only a create needs the body.
        if source == ManifestSource::Remote && !self.should_create_manifest(app, source) {
            return Ok(None);
        }

        self.clients.hooks.get_manifest_local(&auth.team_domain, is_dev).map(Some)
    }

    async fn validate_session(&self, auth: &SlackAuth) -> Result<AuthSession, AppError> {
        self.clients
            .api
            .validate_session(&auth.token)
            .await
            .map_err(|err| AppError::InvalidAuth(err.to_string()))
    }

    async fn update_manifest(&self, auth: &SlackAuth, app: &App, manifest: &AppManifest, team_name: &str) -> Result<(), AppError> {
        tracing::debug!(app_id = %app.app_id, "Updating app manifest");
        self.clients
            .api
            .update_app(&auth.token, &app.app_id, manifest, self.clients.config.force, true)
            .await?;

        self.clients.emit(InstallEvent::ManifestUpdated {
            app_name: manifest.display_information.name.clone(),
            team_name: team_name.to_string(),
        });
        Ok(())
    }

    async fn create_manifest(&self, auth: &SlackAuth, manifest: &AppManifest, team_name: &str) -> Result<String, AppError> {
        self.clients.emit(InstallEvent::ManifestCreating {
            app_name: manifest.display_information.name.clone(),
            team_name: team_name.to_string(),
        });

        let result = self
            .clients
            .api
            .create_app(&auth.token, manifest)
            .await
            .map_err(|err| AppError::AppInstall(Box::new(err)))?;

        tracing::debug!(app_id = %result.app_id, "Created a new app");
        Ok(result.app_id)
    }

    /// New apps are created from the project manifest unless the project keeps
    /// its manifest in app settings.
    pub fn should_create_manifest(&self, app: &App, source: ManifestSource) -> bool {
        let config = &self.clients.config;
        if !config.with_experiment(Experiment::BoltFrameworks) || config.with_experiment(Experiment::BoltInstall) {
            return app.app_id.is_empty();
        }

        app.app_id.is_empty() && source == ManifestSource::Local
    }

    /// Decides if app settings should be overwritten with the project manifest.
    /// Unchanged manifests on both sides skip the update. Changes made in app
    /// settings since the last install need confirmation.
    pub async fn should_update_manifest(
        &self,
        app: &App,
        auth: &SlackAuth,
        source: ManifestSource,
        local_manifest: Option<&AppManifest>,
    ) -> Result<bool, AppError> {
        if app.app_id.is_empty() || source == ManifestSource::Remote {
            return Ok(false);
        }
        if self.clients.config.force {
            return Ok(true);
        }
        let Some(local_manifest) = local_manifest else {
            return Ok(true);
        };
        if local_manifest.is_function_runtime_slack_hosted() {
            return Ok(true);
        }

        let cache = &self.clients.manifest_cache;
        let saved = cache.get_manifest_hash(&app.app_id)?;
        let upstream = self.clients.api.export_app_manifest(&auth.token, &app.app_id).await?;
        let upstream_hash = cache.new_manifest_hash(&upstream)?;

        if saved == upstream_hash {
            let local_hash = cache.new_manifest_hash(local_manifest)?;
            return Ok(cache.get_local_manifest_hash(&app.app_id)? != local_hash);
        }

        let notice = if saved.is_empty() {
            "Manifest values for this app are overwritten on reinstall"
        } else {
            "The manifest on app settings has been changed since last update!"
        };
        self.clients.emit(InstallEvent::Notice {
            title: "App Manifest".to_string(),
            details: vec![notice.to_string()],
        });

        if !self.clients.prompter.is_interactive() {
            return Err(error_app_manifest_update(app, true));
        }
        let proceed = self
            .clients
            .prompter
            .confirm("Update app settings with changes to the local manifest?", false)?;
        if !proceed {
            return Err(error_app_manifest_update(app, false));
        }
        Ok(true)
    }

    pub fn should_cache_manifest(&self, app: &App, source: ManifestSource, local_manifest: Option<&AppManifest>) -> Result<bool, AppError> {
        if source == ManifestSource::Remote {
            return Ok(false);
        }
        match local_manifest {
            Some(manifest) if !manifest.is_function_runtime_slack_hosted() => {}
            _ => return Ok(false),
        }
        if !self.clients.manifest_cache.get_manifest_hash(&app.app_id)?.is_empty() {
            return Ok(true);
        }

        Ok(!self.clients.config.skip_local_fs)
    }

    async fn cache_manifest(
        &self,
        app: &App,
        auth: &SlackAuth,
        source: ManifestSource,
        local_manifest: Option<&AppManifest>,
    ) -> Result<(), AppError> {
        if !self.should_cache_manifest(app, source, local_manifest)? {
            return Ok(());
        }
        let Some(local_manifest) = local_manifest else {
            return Ok(());
        };

        let cache = &self.clients.manifest_cache;
        let saved = cache.get_manifest_hash(&app.app_id)?;
        let upstream = self.clients.api.export_app_manifest(&auth.token, &app.app_id).await?;
        let upstream_hash = cache.new_manifest_hash(&upstream)?;
        if upstream_hash != saved {
            cache.set_manifest_hash(&app.app_id, &upstream_hash)?;
        }

        let local_hash = ManifestHash::of(local_manifest)?;
        if cache.get_local_manifest_hash(&app.app_id)? != local_hash {
            cache.set_local_manifest_hash(&app.app_id, &local_hash)?;
        }
        Ok(())
    }

    /// Checks the manifest with the API. Breaking changes need confirmation
    /// unless forced, and datastore schema changes always need `--force`.
    pub async fn validate_manifest_for_install(&self, token: &str, app: &App, manifest: &AppManifest) -> Result<(), AppError> {
        let validation = self.clients.api.validate_app_manifest(token, manifest, &app.app_id).await?;

        let found_warning = validation.warnings.iter().any(|warning| warning.code != BREAKING_CHANGE);
        if app.app_id.is_empty() && !found_warning {
            return match validation.error {
                Some(err) => Err(err),
                None => Ok(()),
            };
        }

        if let Some(err) = validation.error {
            if !err.is_schema_compatibility() {
                tracing::debug!(app_id = %app.app_id, error = %err, "Manifest validation failed");
                return Err(err);
            }
            if !self.clients.config.force {
                return Err(AppError::SchemaCompatibility {
                    message: err.to_string(),
                    command: "app install".to_string(),
                });
            }
        }

        if !validation.warnings.is_empty() && !self.clients.config.force && !self.continue_despite_warning(&validation.warnings)? {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    fn continue_despite_warning(&self, warnings: &[ManifestIssue]) -> Result<bool, AppError> {
        let details = warnings.iter().map(ToString::to_string).collect();

        if !warnings.iter().any(|warning| warning.code == BREAKING_CHANGE) {
            self.clients.emit(InstallEvent::Warning {
                title: ADDITIONAL_MANIFEST_INFO_NOTICE.to_string(),
                details,
            });
            return Ok(true);
        }

        self.clients.emit(InstallEvent::Warning {
            title: "App manifest contains possible breaking changes".to_string(),
            details,
        });
        let confirmed = self.clients.prompter.confirm("Confirm changes?", false)?;
        if confirmed {
            self.clients.emit(InstallEvent::Notice {
                title: "Changes confirmed: Continuing with install.".to_string(),
                details: vec![],
            });
        }
        Ok(confirmed)
    }

    async fn install_to_team(
        &self,
        auth: &SlackAuth,
        app: &App,
        manifest: &AppManifest,
        team_name: &str,
        options: &InstallOptions,
    ) -> Result<(Option<DeveloperInstallResult>, InstallState), AppError> {
        self.clients.emit(InstallEvent::InstallStarted {
            app_name: manifest.display_information.name.clone(),
            team_name: team_name.to_string(),
        });

        self.developer_install(auth, app, manifest, &options.org_grant_workspace_id)
            .await
            .map_err(|err| AppError::AppInstall(Box::new(err)))
    }

    async fn developer_install(
        &self,
        auth: &SlackAuth,
        app: &App,
        manifest: &AppManifest,
        org_grant_workspace_id: &str,
    ) -> Result<(Option<DeveloperInstallResult>, InstallState), AppError> {
        let request = DeveloperInstallRequest::new(app, manifest.bot_scopes(), manifest.outgoing_domains(), org_grant_workspace_id);

        match self.clients.api.developer_app_install(&auth.token, &request).await? {
            DeveloperInstallOutcome::Installed(result) => Ok((Some(result), InstallState::Success)),
            DeveloperInstallOutcome::ApprovalRequired { state, team_id } => {
                // Approval requests only accept a workspace ID.
                let team_id = if team_id == app.enterprise_id { String::new() } else { team_id };
                let approval = AppApprovalRequest {
                    app_id: app.app_id.clone(),
                    bot_scopes: request.bot_scopes.join(","),
                    reason: String::new(),
                    outgoing_domains: request.outgoing_domains.clone(),
                    team_id,
                };

                let state = self.handle_approval_state(&auth.token, state, approval).await?;
                Ok((None, state))
            }
        }
    }

    async fn handle_approval_state(
        &self,
        token: &str,
        state: AppApprovalState,
        approval: AppApprovalRequest,
    ) -> Result<InstallState, AppError> {
        match state {
            AppApprovalState::Eligible => self.request_approval(token, approval).await,
            AppApprovalState::Pending => {
                self.clients.emit(InstallEvent::Notice {
                    title: "This app has a pending request to be installed".to_string(),
                    details: vec!["Your request will be reviewed by an admin".to_string()],
                });

                let cancel = self
                    .clients
                    .prompter
                    .confirm("Cancel the current request to install this app?", false)?;
                if !cancel {
                    return Ok(InstallState::RequestPending);
                }

                self.clients.api.cancel_app_approval_request(token, &approval.app_id).await?;
                match self.request_approval(token, approval).await? {
                    InstallState::RequestPending => Ok(InstallState::RequestPending),
                    _ => Ok(InstallState::RequestCancelled),
                }
            }
            AppApprovalState::Denied => Err(AppError::AppApprovalRequestDenied),
        }
    }

    async fn request_approval(&self, token: &str, mut approval: AppApprovalRequest) -> Result<InstallState, AppError> {
        self.clients.emit(InstallEvent::Notice {
            title: "Administrator approval is required to install this app".to_string(),
            details: vec![APPROVAL_ALTERNATIVE.to_string()],
        });

        if !self.clients.prompter.confirm("Request approval to install this app?", true)? {
            return Ok(InstallState::RequestNotSent);
        }

        approval.reason = self.clients.prompter.input("Enter a reason for installing this app:", false)?;
        self.clients.api.request_app_approval(token, &approval).await?;
        Ok(InstallState::RequestPending)
    }

    /// Exports tokens for the app process without replacing values set by the user.
    fn set_app_environment_tokens(&self, result: &DeveloperInstallResult) {
        let tokens = [
            (SLACK_APP_TOKEN, &result.api_access_tokens.app_level),
            (SLACK_BOT_TOKEN, &result.api_access_tokens.bot),
        ];

        for (variable, token) in tokens {
            match std::env::var(variable) {
                Err(_) => std::env::set_var(variable, token),
                Ok(existing) if existing != *token => self.clients.emit(InstallEvent::TokenMismatch {
                    variable: variable.to_string(),
                }),
                Ok(_) => {}
            }
        }
    }

    /// Uploads the app icon. Failures are reported and never fail the install.
    async fn update_icon(&self, auth: &SlackAuth, app: &App, manifest: &AppManifest) {
        let icon_path = match manifest.icon.as_deref().filter(|icon| !icon.is_empty()) {
            Some(icon) => self.clients.config.project_dir.join(icon),
            None => {
                let default_icon = self.clients.config.project_dir.join("icon.png");
                if !default_icon.is_file() {
                    return;
                }
                default_icon
            }
        };

        let display_path = display_icon_path(&icon_path, &self.clients.config.project_dir);
        match self.clients.api.upload_icon(&auth.token, &app.app_id, &icon_path).await {
            Ok(()) => self.clients.emit(InstallEvent::IconUpdated { path: display_path }),
            Err(err) => {
                tracing::debug!(error = %err, "Failed to upload the app icon");
                self.clients.emit(InstallEvent::IconFailed {
                    error: format!("{} {}", err, display_path),
                })
            }
        }
    }
}

fn display_icon_path(icon_path: &Path, project_dir: &Path) -> String {
    icon_path
        .strip_prefix(project_dir)
        .unwrap_or(icon_path)
        .display()
        .to_string()
}

/// Error for app settings that changed outside of this project, with links to compare.
pub fn error_app_manifest_update(app: &App, force_option: bool) -> AppError {
    let url = match (app.app_id.as_str(), app.enterprise_id.as_str(), app.team_id.as_str()) {
        ("", _, _) => "https://api.slack.com/apps".to_string(),
        (app_id, enterprise_id, _) if !enterprise_id.is_empty() => {
            format!("https://app.slack.com/app-settings/{}/{}/app-manifest", enterprise_id, app_id)
        }
        (app_id, _, team_id) if !team_id.is_empty() => {
            format!("https://app.slack.com/app-settings/{}/{}/app-manifest", team_id, app_id)
        }
        (app_id, _, _) => format!("https://api.slack.com/apps/{}", app_id),
    };

    let mut remediation = vec![
        "Check the local manifest values of this project".to_string(),
        format!("Compare app settings: {}", url),
    ];
    if force_option {
        remediation.push("Write local manifest values to app settings using `--force`".to_string());
    }

    AppError::AppManifestUpdate {
        message: "The app manifest was changed in app settings".to_string(),
        remediation,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serial_test::serial;

    use crate::{
        clients::testing::{team1_auth, TestProject},
        config::Experiment,
        db::ManifestSource,
        errors::AppError,
        progress::InstallEvent,
        prompts::mock::Answer,
        service_provider::slack::{
            ApiAccessTokens, AppApprovalState, DeveloperInstallOutcome, DeveloperInstallResult, ManifestIssue,
        },
        types::{App, InstallState},
    };

    use super::{error_app_manifest_update, InstallOptions, InstallReconciler, SLACK_APP_TOKEN, SLACK_BOT_TOKEN};

    fn clear_token_env() {
        std::env::remove_var(SLACK_APP_TOKEN);
        std::env::remove_var(SLACK_BOT_TOKEN);
    }

    fn installed(bot: &str, app_level: &str) -> DeveloperInstallOutcome {
        DeveloperInstallOutcome::Installed(DeveloperInstallResult {
            app_id: "A0000000001".to_string(),
            api_access_tokens: ApiAccessTokens {
                bot: bot.to_string(),
                app_level: app_level.to_string(),
                ..Default::default()
            },
        })
    }

    #[tokio::test]
    #[serial]
    async fn installs_a_new_app() -> Result<(), AppError> {
        clear_token_env();
        let project = TestProject::new(vec![])?;
        project.api.with(|state| state.install_outcomes.push(installed("xoxb-1", "xapp-1")));
        let clients = project.clients(|_| {});

        let outcome = InstallReconciler::new(&clients)
            .install(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await?;

        assert_eq!(outcome.state, Some(InstallState::Success));
        assert_eq!(outcome.app.app_id, "A0000000001");
        assert_eq!(outcome.app.team_domain, "team1");
        assert_eq!(project.api.call_count("apps.manifest.create"), 1);
        assert_eq!(project.api.call_count("apps.developerInstall"), 1);
        assert_eq!(project.api.call_count("apps.manifest.update"), 0);

        let saved = clients.apps.get_deployed("T0000000001")?;
        assert_eq!(saved.app_id, "A0000000001");
        assert!(!saved.is_dev);

        let request = project.api.with(|state| state.install_requests[0].clone());
        assert_eq!(request.bot_scopes, vec!["chat:write"]);
        assert_eq!(request.outgoing_domains, vec!["api.example.com"]);

        let messages = project.event_messages();
        assert!(messages.contains(&"Creating app manifest for \"focus\" in \"team1\"".to_string()));
        assert!(messages.contains(&"Installing \"focus\" app to \"team1\"".to_string()));
        assert!(messages.last().map(|message| message.starts_with("Finished in")).unwrap_or(false));
        assert_eq!(std::env::var(SLACK_BOT_TOKEN).ok().as_deref(), Some("xoxb-1"));
        clear_token_env();
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn repeated_installs_skip_unchanged_manifests() -> Result<(), AppError> {
        clear_token_env();
        let project = TestProject::new(vec![])?;
        let clients = project.clients(|_| {});
        let reconciler = InstallReconciler::new(&clients);

        let first = reconciler
            .install(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await?;
        let second = reconciler.install(&team1_auth(), first.app.clone(), &InstallOptions::default()).await?;

        assert_eq!(second.state, None);
        assert_eq!(project.api.call_count("apps.manifest.create"), 1);
        assert_eq!(project.api.call_count("apps.manifest.update"), 0);
        assert_eq!(project.api.call_count("apps.developerInstall"), 1);

        project.write_manifest(&json!({"display_information": {"name": "focus v2"}}))?;
        let third = reconciler.install(&team1_auth(), first.app, &InstallOptions::default()).await?;

        assert_eq!(third.state, Some(InstallState::Success));
        assert_eq!(project.api.call_count("apps.manifest.update"), 1);
        assert!(project.event_messages().contains(&"Updated app manifest for \"focus v2\" in \"team1\"".to_string()));
        clear_token_env();
        Ok(())
    }

    #[tokio::test]
    async fn pending_requests_are_reported() -> Result<(), AppError> {
        let project = TestProject::new(vec![Answer::Confirm(false)])?;
        project.api.with(|state| {
            state.install_outcomes.push(DeveloperInstallOutcome::ApprovalRequired {
                state: AppApprovalState::Pending,
                team_id: "T0000000001".to_string(),
            })
        });
        let clients = project.clients(|_| {});

        let outcome = InstallReconciler::new(&clients)
            .install(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await?;

        assert_eq!(outcome.state, Some(InstallState::RequestPending));
        assert_eq!(outcome.app.app_id, "A0000000001");
        assert!(outcome.result.is_none());
        assert!(project.event_messages().iter().any(|message| message.contains("pending")));
        assert_eq!(project.api.call_count("apps.approvals.requests.cancel"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn eligible_installs_can_request_approval() -> Result<(), AppError> {
        let project = TestProject::new(vec![Answer::Confirm(true), Answer::Input("Team rollout".to_string())])?;
        project.api.with(|state| {
            state.install_outcomes.push(DeveloperInstallOutcome::ApprovalRequired {
                state: AppApprovalState::Eligible,
                team_id: "T0000000001".to_string(),
            })
        });
        let clients = project.clients(|_| {});

        let outcome = InstallReconciler::new(&clients)
            .install(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await?;

        assert_eq!(outcome.state, Some(InstallState::RequestPending));
        let request = project.api.with(|state| state.approval_requests[0].clone());
        assert_eq!(request.reason, "Team rollout");
        assert_eq!(request.bot_scopes, "chat:write");
        assert_eq!(request.team_id, "T0000000001");
        Ok(())
    }

    #[tokio::test]
    async fn cancelling_a_pending_request_and_declining_a_new_one() -> Result<(), AppError> {
        let project = TestProject::new(vec![Answer::Confirm(true), Answer::Confirm(false)])?;
        project.api.with(|state| {
            state.install_outcomes.push(DeveloperInstallOutcome::ApprovalRequired {
                state: AppApprovalState::Pending,
                team_id: String::new(),
            })
        });
        let clients = project.clients(|_| {});

        let outcome = InstallReconciler::new(&clients)
            .install(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await?;

        assert_eq!(outcome.state, Some(InstallState::RequestCancelled));
        assert_eq!(project.api.call_count("apps.approvals.requests.cancel"), 1);
        assert_eq!(project.api.call_count("apps.approvals.requests.create"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn denied_requests_fail_the_install() -> Result<(), AppError> {
        let project = TestProject::new(vec![])?;
        project.api.with(|state| {
            state.install_outcomes.push(DeveloperInstallOutcome::ApprovalRequired {
                state: AppApprovalState::Denied,
                team_id: String::new(),
            })
        });
        let clients = project.clients(|_| {});

        let result = InstallReconciler::new(&clients)
            .install(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await;

        match result {
            Err(AppError::AppInstall(inner)) => assert!(matches!(*inner, AppError::AppApprovalRequestDenied)),
            other => panic!("expected a denied install, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn create_failures_are_wrapped() -> Result<(), AppError> {
        let project = TestProject::new(vec![])?;
        project.api.with(|state| state.create_error = Some("invalid_manifest".to_string()));
        let clients = project.clients(|_| {});

        let result = InstallReconciler::new(&clients)
            .install(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await;

        assert!(matches!(result, Err(AppError::AppInstall(_))));
        assert!(clients.apps.get_deployed("T0000000001")?.is_new());
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn local_apps_are_tagged_and_saved_as_dev() -> Result<(), AppError> {
        clear_token_env();
        std::env::set_var(SLACK_BOT_TOKEN, "xoxb-existing");
        let project = TestProject::new(vec![])?;
        project.api.with(|state| state.install_outcomes.push(installed("xoxb-new", "xapp-new")));
        let clients = project.clients(|_| {});

        let outcome = InstallReconciler::new(&clients)
            .install_local_app(&team1_auth(), App::new_for_team("T0000000001"), &InstallOptions::default())
            .await?;

        assert!(outcome.app.is_dev);
        assert_eq!(outcome.app.user_id, "U0000000001");
        assert_eq!(clients.apps.get_local("T0000000001")?.app_id, "A0000000001");
        assert!(clients.apps.get_deployed("T0000000001")?.is_new());

        let created = project.api.with(|state| state.created_manifests[0].clone());
        assert_eq!(created.display_information.name, "focus (local)");

        assert_eq!(std::env::var(SLACK_BOT_TOKEN).ok().as_deref(), Some("xoxb-existing"));
        assert_eq!(std::env::var(SLACK_APP_TOKEN).ok().as_deref(), Some("xapp-new"));
        assert!(project
            .observer
            .events()
            .contains(&InstallEvent::TokenMismatch { variable: SLACK_BOT_TOKEN.to_string() }));
        clear_token_env();
        Ok(())
    }

    #[tokio::test]
    async fn only_create_update_skips_the_install() -> Result<(), AppError> {
        let project = TestProject::new(vec![])?;
        let clients = project.clients(|config| config.skip_local_fs = true);
        let options = InstallOptions { only_create_update: true, ..Default::default() };

        let outcome = InstallReconciler::new(&clients)
            .install(&team1_auth(), App::new_for_team("T0000000001"), &options)
            .await?;

        assert_eq!(outcome.app.app_id, "A0000000001");
        assert_eq!(outcome.state, None);
        assert_eq!(project.api.call_count("apps.developerInstall"), 0);
        assert!(clients.apps.get_deployed("T0000000001")?.is_new());
        Ok(())
    }

    #[tokio::test]
    async fn breaking_changes_need_confirmation() -> Result<(), AppError> {
        let project = TestProject::new(vec![Answer::Confirm(false)])?;
        project.api.with(|state| {
            state.validation_warnings.push(ManifestIssue {
                code: "breaking_change".to_string(),
                message: "function removed".to_string(),
                pointer: "/functions/greet".to_string(),
            })
        });
        let clients = project.clients(|config| config.force = false);
        let app = App { app_id: "A0000000001".to_string(), team_id: "T0000000001".to_string(), ..Default::default() };

        let result = InstallReconciler::new(&clients)
            .validate_manifest_for_install("xoxp-team1", &app, &Default::default())
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(project.prompter.questions(), vec!["Confirm changes?"]);
        Ok(())
    }

    #[tokio::test]
    async fn schema_changes_need_force() -> Result<(), AppError> {
        let project = TestProject::new(vec![])?;
        let app = App { app_id: "A0000000001".to_string(), team_id: "T0000000001".to_string(), ..Default::default() };

        project.api.with(|state| {
            state.validation_error = Some(AppError::slack("apps.manifest.validate", "schema_compatibility_error"))
        });
        let clients = project.clients(|_| {});
        let result = InstallReconciler::new(&clients)
            .validate_manifest_for_install("xoxp-team1", &app, &Default::default())
            .await;
        assert!(matches!(result, Err(AppError::SchemaCompatibility { .. })));

        project.api.with(|state| {
            state.validation_error = Some(AppError::slack("apps.manifest.validate", "schema_compatibility_error"))
        });
        let forced = project.clients(|config| config.force = true);
        InstallReconciler::new(&forced)
            .validate_manifest_for_install("xoxp-team1", &app, &Default::default())
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn changed_app_settings_block_non_interactive_updates() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        project.api.with(|state| state.exported_manifest.display_information.name = "edited".to_string());
        let clients = project.clients(|_| {});
        let app = App { app_id: "A0000000001".to_string(), team_id: "T0000000001".to_string(), ..Default::default() };
        clients.manifest_cache.set_manifest_hash("A0000000001", &crate::db::ManifestHash::of_bytes(b"old"))?;

        let local = clients.hooks.get_manifest_local("team1", false)?;
        let result = InstallReconciler::new(&clients)
            .should_update_manifest(&app, &team1_auth(), ManifestSource::Local, Some(&local))
            .await;

        match result {
            Err(AppError::AppManifestUpdate { remediation, .. }) => {
                assert!(remediation.iter().any(|line| line.contains("--force")));
                assert!(remediation
                    .iter()
                    .any(|line| line.contains("https://app.slack.com/app-settings/T0000000001/A0000000001/app-manifest")));
            }
            other => panic!("expected a manifest update error, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn adding_an_app_records_it_for_the_team() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        let clients = project.clients(|config| config.experiments = vec![Experiment::BoltFrameworks]);
        clients.project_config.set_manifest_source(ManifestSource::Remote)?;

        let outcome = InstallReconciler::new(&clients)
            .add(&team1_auth(), App::default(), &InstallOptions::default())
            .await?;

        assert_eq!(outcome.state, None);
        assert_eq!(outcome.app.team_id, "T0000000001");
        let (apps, _) = clients.apps.get_deployed_all()?;
        assert_eq!(apps.len(), 1);
        assert!(apps[0].app_id.is_empty());
        assert!(project.api.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn adding_an_installed_app_keeps_its_record() -> Result<(), AppError> {
        clear_token_env();
        let project = TestProject::new(vec![])?;
        let clients = project.clients(|_| {});

        let outcome = InstallReconciler::new(&clients)
            .add(&team1_auth(), App::default(), &InstallOptions::default())
            .await?;

        assert_eq!(outcome.state, Some(InstallState::Success));
        assert_eq!(clients.apps.get_deployed("T0000000001")?.app_id, "A0000000001");
        clear_token_env();
        Ok(())
    }

    #[test]
    fn create_decisions_follow_the_manifest_source() -> Result<(), AppError> {
        let project = TestProject::new(vec![])?;
        let new_app = App::new_for_team("T1");
        let existing = App { app_id: "A1".to_string(), ..Default::default() };

        let plain = project.clients(|_| {});
        let plain = InstallReconciler::new(&plain);
        assert!(plain.should_create_manifest(&new_app, ManifestSource::Remote));
        assert!(!plain.should_create_manifest(&existing, ManifestSource::Local));

        let bolt = project.clients(|config| config.experiments = vec![Experiment::BoltFrameworks]);
        let bolt = InstallReconciler::new(&bolt);
        assert!(bolt.should_create_manifest(&new_app, ManifestSource::Local));
        assert!(!bolt.should_create_manifest(&new_app, ManifestSource::Remote));

        let bolt_install = project.clients(|config| {
            config.experiments = vec![Experiment::BoltFrameworks, Experiment::BoltInstall]
        });
        assert!(InstallReconciler::new(&bolt_install).should_create_manifest(&new_app, ManifestSource::Remote));
        Ok(())
    }

    #[tokio::test]
    async fn update_decisions_skip_remote_sources_and_follow_force() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        let existing = App { app_id: "A0000000001".to_string(), team_id: "T0000000001".to_string(), ..Default::default() };
        let clients = project.clients(|_| {});
        let local = clients.hooks.get_manifest_local("team1", false)?;

        let reconciler = InstallReconciler::new(&clients);
        assert!(!reconciler
            .should_update_manifest(&existing, &team1_auth(), ManifestSource::Remote, Some(&local))
            .await?);
        assert!(!reconciler
            .should_update_manifest(&App::new_for_team("T0000000001"), &team1_auth(), ManifestSource::Local, Some(&local))
            .await?);

        let forced = project.clients(|config| config.force = true);
        let forced = InstallReconciler::new(&forced);
        assert!(forced
            .should_update_manifest(&existing, &team1_auth(), ManifestSource::Local, Some(&local))
            .await?);
        assert!(!forced
            .should_update_manifest(&existing, &team1_auth(), ManifestSource::Remote, Some(&local))
            .await?);
        assert!(project.api.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn hosted_manifests_always_update() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        project.write_manifest(&json!({
            "display_information": {"name": "focus"},
            "settings": {"function_runtime": "slack"}
        }))?;
        let clients = project.clients(|_| {});
        let existing = App { app_id: "A0000000001".to_string(), team_id: "T0000000001".to_string(), ..Default::default() };
        let local = clients.hooks.get_manifest_local("team1", false)?;

        let updates = InstallReconciler::new(&clients)
            .should_update_manifest(&existing, &team1_auth(), ManifestSource::Local, Some(&local))
            .await?;

        assert!(updates);
        assert_eq!(project.api.call_count("apps.manifest.export"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn remote_sources_install_linked_apps_without_a_project_manifest() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        std::fs::remove_file(project.path().join("manifest.json"))?;
        let clients = project.clients(|_| {});
        clients.project_config.set_manifest_source(ManifestSource::Remote)?;
        let linked = App { app_id: "A0000000042".to_string(), team_id: "T0000000001".to_string(), ..Default::default() };
        let reconciler = InstallReconciler::new(&clients);

        let deployed = reconciler.install(&team1_auth(), linked.clone(), &InstallOptions::default()).await?;
        assert_eq!(deployed.state, None);
        assert_eq!(deployed.app.app_id, "A0000000042");

        let local = reconciler
            .install_local_app(&team1_auth(), App { is_dev: true, ..linked }, &InstallOptions::default())
            .await?;
        assert_eq!(local.state, None);
        assert!(project.api.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn local_installs_never_send_an_org_grant() -> Result<(), AppError> {
        clear_token_env();
        let project = TestProject::new(vec![])?;
        project.api.with(|state| {
            state.session.team_id = Some("E0000000001".to_string());
            state.session.enterprise_id = Some("E0000000001".to_string());
            state.install_outcomes.push(installed("xoxb-1", "xapp-1"));
        });
        let clients = project.clients(|_| {});
        let options = InstallOptions { org_grant_workspace_id: "all".to_string(), ..Default::default() };

        let outcome = InstallReconciler::new(&clients)
            .install_local_app(&team1_auth(), App::new_for_team("E0000000001"), &options)
            .await?;

        assert_eq!(outcome.app.team_id, "E0000000001");

        let request = project.api.with(|state| state.install_requests[0].clone());
        assert_eq!(request.grant_team_id, "");
        clear_token_env();
        Ok(())
    }

    #[test]
    fn manifest_update_errors_link_to_app_settings() {
        let org_app = App {
            app_id: "A1".to_string(),
            team_id: "T1".to_string(),
            enterprise_id: "E1".to_string(),
            ..Default::default()
        };

        match error_app_manifest_update(&org_app, false) {
            AppError::AppManifestUpdate { remediation, .. } => {
                assert_eq!(remediation.len(), 2);
                assert!(remediation[1].ends_with("https://app.slack.com/app-settings/E1/A1/app-manifest"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
