use crate::{
    clients::Clients,
    db::ManifestSource,
    errors::AppError,
    progress::InstallEvent,
    types::{App, InstallStatus},
};

use super::select::{prompt_environment, prompt_team_auth, AppEnvironment};

const LINK_CONFIRM_PROMPT: &str = "Do you want to add an existing app?";
const MANIFEST_SOURCE_PROMPT: &str = "Do you want to update the manifest source to remote?";
const TEAM_PROMPT: &str = "Select the existing app team";
const APP_ID_PROMPT: &str = "Enter the existing app ID";

#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Asks before linking, used when another command offers to link.
    pub should_confirm: bool,
    pub environment: Option<String>,
}

/// Records an app that already exists in app settings into the project.
/// Manifests are never read or written here.
pub struct LinkReconciler<'a> {
    clients: &'a Clients,
}

impl<'a> LinkReconciler<'a> {
    pub fn new(clients: &'a Clients) -> LinkReconciler<'a> {
        LinkReconciler { clients }
    }

    /// Returns the linked app, or `None` when the user chose not to link.
    pub async fn link(&self, options: &LinkOptions) -> Result<Option<App>, AppError> {
        self.header(options.should_confirm);

        if options.should_confirm && !self.clients.prompter.confirm(LINK_CONFIRM_PROMPT, true)? {
            return Ok(None);
        }

        if !self.ensure_remote_manifest_source()? {
            return Ok(None);
        }

        let auth = prompt_team_auth(self.clients, TEAM_PROMPT)?;
        let app_id = match self.clients.config.app.as_deref().filter(|app| !app.is_empty()) {
            Some(app_id) => app_id.to_string(),
            None => self.clients.prompter.input(APP_ID_PROMPT, true)?,
        };
        if app_id.is_empty() {
            return Err(AppError::MissingFlag("An app ID is required to link an app".to_string()));
        }

        let environment_flag = options
            .environment
            .as_deref()
            .filter(|environment| !environment.is_empty())
            .map(AppEnvironment::parse)
            .transpose()?;
        let environment = prompt_environment(self.clients, environment_flag)?;

        let mut app = App {
            app_id,
            enterprise_id: auth.enterprise_id.clone(),
            team_domain: auth.team_domain.clone(),
            team_id: auth.team_id.clone(),
            ..Default::default()
        };
        if environment.is_dev() {
            app.is_dev = true;
            app.user_id = auth.user_id.clone();
        }

        let status = self
            .clients
            .api
            .get_app_status(&auth.token, &[app.app_id.clone()], &app.team_id)
            .await?;
        if let Some(info) = status.apps.iter().find(|info| info.app_id == app.app_id) {
            app.install_status = if info.installed { InstallStatus::Installed } else { InstallStatus::Uninstalled };
            app.enterprise_grants = info.enterprise_grants.clone();
        }

        self.save_app(&app)?;
        tracing::info!(app_id = %app.app_id, team_id = %app.team_id, environment = app.environment(), "Linked app");

        self.clients.emit(InstallEvent::Notice {
            title: "App Link".to_string(),
            details: vec![
                format!("{} {} ({})", app.team_domain, app.app_id, app.environment()),
                "Added existing app to project".to_string(),
            ],
        });
        Ok(Some(app))
    }

    fn header(&self, should_confirm: bool) {
        let mut details = vec![
            "Add an existing app from app settings".to_string(),
            "Find your existing apps at: https://api.slack.com/apps".to_string(),
        ];
        if should_confirm {
            details.push("Manually add apps later with `slack-app app link`".to_string());
        }

        self.clients.emit(InstallEvent::Notice { title: "App Link".to_string(), details });
    }

    /// Linked apps keep their manifest in app settings, so a project that
    /// manages it locally must agree to switch. Hosted projects skip this.
    fn ensure_remote_manifest_source(&self) -> Result<bool, AppError> {
        let source = self.clients.project_config.get_manifest_source();
        if matches!(source, Ok(ManifestSource::Remote)) {
            return Ok(true);
        }
        if source.is_ok() && self.clients.hooks.is_slack_hosted_project("") {
            return Ok(true);
        }

        let current = source.unwrap_or(ManifestSource::Local);
        self.clients.emit(InstallEvent::Warning {
            title: "Linking an existing app requires the app manifest source to be managed by app settings".to_string(),
            details: vec![
                format!("App manifest source can be \"{}\" or \"{}\":", ManifestSource::Local, ManifestSource::Remote),
                format!("- {}: uses manifest from your project's source code for all apps", ManifestSource::Local),
                format!("- {}: uses manifest from app settings for each app", ManifestSource::Remote),
                format!("Your manifest source is \"{}\"", current),
                format!(
                    "The manifest source in .slack/config.json will be changed to \"manifest.source\": \"{}\"",
                    ManifestSource::Remote
                ),
            ],
        });

        if !self.clients.prompter.confirm(MANIFEST_SOURCE_PROMPT, false)? {
            return Ok(false);
        }

        if let Err(err) = self.clients.project_config.set_manifest_source(ManifestSource::Remote) {
            tracing::debug!(error = %err, "Failed to save the manifest source");
            self.clients.emit(InstallEvent::Warning {
                title: format!("Failed to update the manifest source to {}", ManifestSource::Remote),
                details: vec![format!(
                    "You can manually set \"manifest.source\": \"{}\" in .slack/config.json",
                    ManifestSource::Remote
                )],
            });
        }
        Ok(true)
    }

    /// A saved app for the same team and environment is never replaced
    /// unless `--force` is set.
    pub fn save_app(&self, app: &App) -> Result<(), AppError> {
        let deployed = self.clients.apps.get_deployed(&app.team_id)?;
        let local = self.clients.apps.get_local(&app.team_id)?;
        let force = self.clients.config.force;

        if app.is_dev {
            if force || (local.is_new() && deployed.app_id != app.app_id) {
                return self.clients.apps.save_local(app);
            }
        } else if force || (deployed.is_new() && local.app_id != app.app_id) {
            return self.clients.apps.save_deployed(app);
        }

        Err(AppError::AppFound("A saved app was found and cannot be overwritten".to_string()))
    }
}
