use derive_more::Display;

use crate::{
    apps::list,
    auth::{auth_label, resolve_auth, rotate_if_needed},
    clients::Clients,
    errors::AppError,
    progress::InstallEvent,
    types::{
        is_app_flag_deploy, is_app_flag_environment, is_app_flag_local, is_app_id, is_enterprise_team_id, App,
        InstallStatus, SlackAuth, GRANT_ALL_ORG_WORKSPACES,
    },
};

const ENVIRONMENT_PROMPT: &str = "Choose the app environment";
const ENVIRONMENT_OPTIONS: [&str; 2] = ["Local", "Deployed"];
pub const INVALID_ENVIRONMENT: &str = "The environment flag must be either 'local' or 'deployed'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AppEnvironment {
    #[display("local")]
    Local,
    #[display("deployed")]
    Deployed,
}

impl AppEnvironment {
    pub fn parse(value: &str) -> Result<AppEnvironment, AppError> {
        let value = value.trim().to_lowercase();
        if is_app_flag_local(&value) {
            Ok(AppEnvironment::Local)
        } else if is_app_flag_deploy(&value) {
            Ok(AppEnvironment::Deployed)
        } else {
            Err(AppError::MismatchedFlags(INVALID_ENVIRONMENT.to_string()))
        }
    }

    pub fn is_dev(&self) -> bool {
        *self == AppEnvironment::Local
    }
}

/// A saved or new app paired with the credential used to manage it.
#[derive(Debug, Clone)]
pub struct SelectedApp {
    pub auth: SlackAuth,
    pub app: App,
}

/// Combines `--app`, `--environment` and `--team` into the environment an
/// install targets. `None` means the app is chosen by its ID or by a prompt.
pub fn install_environment(clients: &Clients, environment_flag: Option<&str>) -> Result<Option<AppEnvironment>, AppError> {
    let app_flag = clients.config.app.as_deref().unwrap_or_default();
    let environment_flag = environment_flag.filter(|flag| !flag.is_empty());

    if is_app_id(app_flag) {
        if environment_flag.is_some() {
            return Err(AppError::MismatchedFlags(
                "When '--app <app_id>' is set, please do not set the flag --environment".to_string(),
            ));
        }
        return Ok(None);
    }

    if is_app_flag_environment(app_flag) {
        let from_app = AppEnvironment::parse(app_flag)?;
        if let Some(flag) = environment_flag {
            if AppEnvironment::parse(flag)? != from_app {
                return Err(AppError::MismatchedFlags(
                    "When '--app local' or '--app deployed' is set, please set the flag --environment to match the --app flag"
                        .to_string(),
                ));
            }
        }
        return Ok(Some(from_app));
    }

    if let Some(flag) = environment_flag {
        return AppEnvironment::parse(flag).map(Some);
    }

    if clients.config.team.as_deref().is_some_and(|team| !team.is_empty()) {
        clients.emit(InstallEvent::Warning {
            title: "Default App Environment".to_string(),
            details: vec![
                "App environment is set to deployed when only the --team flag is provided".to_string(),
                "Add '--environment deployed' to keep this behavior explicit".to_string(),
            ],
        });
        return Ok(Some(AppEnvironment::Deployed));
    }

    Ok(None)
}

/// Uses the environment given by flags or asks for one.
pub fn prompt_environment(clients: &Clients, environment: Option<AppEnvironment>) -> Result<AppEnvironment, AppError> {
    if let Some(environment) = environment {
        return Ok(environment);
    }

    let options: Vec<String> = ENVIRONMENT_OPTIONS.iter().map(ToString::to_string).collect();
    let index = clients.prompter.select(ENVIRONMENT_PROMPT, &options)?;
    AppEnvironment::parse(options.get(index).map(String::as_str).unwrap_or_default())
}

/// Finds the app a command acts on. An app ID given with `--app` is looked
/// up in the project files, otherwise the team and environment decide.
pub async fn select_app(clients: &Clients, environment: Option<AppEnvironment>) -> Result<SelectedApp, AppError> {
    let app_flag = clients.config.app.as_deref().unwrap_or_default();

    if is_app_id(app_flag) {
        return select_saved_app(clients, app_flag).await;
    }

    let auth = resolve_auth(clients, "Choose a team").await?;
    let environment = prompt_environment(clients, environment)?;

    let mut app = if environment.is_dev() {
        clients.apps.get_local(&auth.team_id)?
    } else {
        clients.apps.get_deployed(&auth.team_id)?
    };
    if app.team_domain.is_empty() {
        app.team_domain = auth.team_domain.clone();
    }
    if environment.is_dev() {
        app.is_dev = true;
        app.user_id = auth.user_id.clone();
    }

    Ok(SelectedApp { auth, app })
}

async fn select_saved_app(clients: &Clients, app_id: &str) -> Result<SelectedApp, AppError> {
    let (deployed, _) = clients.apps.get_deployed_all()?;
    let local = clients.apps.get_local_all()?;

    let app = deployed
        .into_iter()
        .chain(local)
        .find(|app| app.app_id == app_id)
        .ok_or_else(|| AppError::AppNotFound(format!("No app with the ID {} is saved to this project", app_id)))?;

    let auth = match clients.config.token.as_deref().filter(|token| !token.is_empty()) {
        Some(_) => resolve_auth(clients, "Choose a team").await?,
        None => rotate_if_needed(clients, clients.credentials.auth_with_team_id(&app.team_id)?).await?,
    };
    Ok(SelectedApp { auth, app })
}

const ORG_WORKSPACE_PROMPT: &str = "Choose a workspace to grant access:";
const ALL_WORKSPACES_OPTION: &str = "All of them";
const AUTH_TEAMS_PAGE_SIZE: usize = 100;

/// Checks `--org-workspace-grant` against the selected deployed app and
/// returns the grant to install with. Apps outside an org never carry a
/// grant. New and uninstalled org apps ask for one when the flag is empty.
pub async fn validate_org_workspace_grant(
    clients: &Clients,
    selected: &SelectedApp,
    grant_flag: Option<&str>,
) -> Result<String, AppError> {
    let auth = &selected.auth;
    let mut app = selected.app.clone();
    let mut grant = grant_flag.unwrap_or_default().to_string();

    let new_org_app = app.is_new() && auth.is_enterprise_install;
    if !new_org_app && !is_enterprise_team_id(&app.team_id) {
        if !grant.is_empty() {
            tracing::debug!(grant = %grant, "--org-workspace-grant ignored for an app that wasn't created on an org");
        }
        return Ok(String::new());
    }

    if !app.app_id.is_empty() && app.install_status == InstallStatus::Unknown {
        if let Some(known) = list::fetch_install_states(clients, vec![app.clone()]).await?.pop() {
            app = known;
        }
    }

    if !grant.is_empty() && grant != GRANT_ALL_ORG_WORKSPACES && app.install_status == InstallStatus::Installed {
        let existing = app.enterprise_grants.first().map(|existing| existing.workspace_id.as_str()).unwrap_or_default();
        if app.enterprise_grants.len() != 1 || existing != grant {
            return Err(AppError::OrgGrantExists(format!(
                "A different org workspace grant already exists for installed app '{}'\n   Workspace Grant: {}",
                app.app_id, existing
            )));
        }
    }

    let uninstalled_org_app = app.install_status == InstallStatus::Uninstalled;
    if grant.is_empty() && (new_org_app || uninstalled_org_app) {
        let domain = if app.team_domain.is_empty() { &auth.team_domain } else { &app.team_domain };
        grant = prompt_org_workspace(clients, domain, &auth.token).await?;
    }
    Ok(grant)
}

/// Asks which workspace of the org gets access, with every workspace as the
/// first option.
async fn prompt_org_workspace(clients: &Clients, org_domain: &str, token: &str) -> Result<String, AppError> {
    let page = clients.api.list_auth_teams(token, AUTH_TEAMS_PAGE_SIZE).await?;

    let mut details = vec!["If you'd like, you can restrict access to only users in a particular workspace".to_string()];
    if !page.next_cursor.is_empty() {
        details.push("Workspace not listed? Use the `--org-workspace-grant=<team_id>` flag".to_string());
    }
    clients.emit(InstallEvent::Notice {
        title: format!("Your app will be installed to the \"{}\" organization", org_domain),
        details,
    });

    let options: Vec<String> = std::iter::once(ALL_WORKSPACES_OPTION.to_string())
        .chain(page.teams.iter().map(|team| format!("{} {}", team.name, team.id)))
        .collect();
    let index = clients.prompter.select(ORG_WORKSPACE_PROMPT, &options)?;

    match index {
        0 => Ok(GRANT_ALL_ORG_WORKSPACES.to_string()),
        index => page
            .teams
            .get(index - 1)
            .map(|team| team.id.clone())
            .ok_or_else(|| AppError::UnexpectedError(format!("Selected workspace {} is out of range", index))),
    }
}

/// Chooses a team among every saved credential. `--team` may hold a team ID
/// or a domain shared by no other credential.
pub fn prompt_team_auth(clients: &Clients, prompt: &str) -> Result<SlackAuth, AppError> {
    let auths = clients.credentials.get_auths()?;

    let Some(team) = clients.config.team.as_deref().filter(|team| !team.is_empty()) else {
        if auths.is_empty() {
            return Err(AppError::CredentialsNotFound("You are not logged in to any Slack teams".to_string()));
        }
        let labels: Vec<String> = auths.iter().map(auth_label).collect();
        let index = clients.prompter.select(prompt, &labels)?;
        return auths
            .into_iter()
            .nth(index)
            .ok_or_else(|| AppError::UnexpectedError(format!("Selected team {} is out of range", index)));
    };

    let mut matches = auths.into_iter().filter(|auth| auth.team_id == team || auth.team_domain == team);
    match (matches.next(), matches.next()) {
        (Some(auth), None) => Ok(auth),
        (Some(_), Some(_)) => Err(AppError::MissingAppTeamID(
            "The team cannot be determined by team domain".to_string(),
        )),
        _ => Err(AppError::CredentialsNotFound(format!("No credentials found for the team \"{}\"", team))),
    }
}
