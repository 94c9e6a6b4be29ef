use clap::{Args, Subcommand};

use crate::{
    apps::{
        external_auth, list, remove,
        select::{install_environment, select_app, validate_org_workspace_grant},
        settings, InstallOptions, InstallReconciler, LinkOptions, LinkReconciler, SelectedApp,
    },
    clients::Clients,
    errors::AppError,
    types::{InstallState, InstallStatus},
};

#[derive(Debug, Args, Default)]
pub struct EnvironmentArgs {
    /// Either `local` or `deployed`
    #[arg(short = 'E', long)]
    pub environment: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct InstallArgs {
    #[clap(flatten)]
    pub target: EnvironmentArgs,

    /// Workspace of an org to grant the app access to, or `all`
    #[arg(long)]
    pub org_workspace_grant: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct ListArgs {
    /// Show every workspace granted to org apps
    #[arg(long)]
    pub all_org_workspace_grants: bool,
}

#[derive(Debug, Args, Default)]
pub struct ProviderArgs {
    /// Key of the OAuth2 provider in the app manifest
    #[arg(short = 'p', long)]
    pub provider: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct AddSecretArgs {
    #[clap(flatten)]
    pub provider: ProviderArgs,

    /// Client secret issued by the provider
    #[arg(short = 'x', long)]
    pub secret: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ExternalAuthCommand {
    /// List the OAuth2 providers of an app
    List,
    /// Save the client secret of a provider
    AddSecret(AddSecretArgs),
    /// Remove the tokens saved for a provider
    Remove(ProviderArgs),
}

#[derive(Debug, Subcommand)]
pub enum AppCommand {
    /// Create or update the app and install it to a team
    Install(InstallArgs),
    /// Add an existing app to the project
    Link(EnvironmentArgs),
    /// Remove an app from the project without deleting it
    Unlink(EnvironmentArgs),
    /// Uninstall the app from a team
    Uninstall(EnvironmentArgs),
    /// Delete the app
    Delete(EnvironmentArgs),
    /// List the apps of the project
    List(ListArgs),
    /// Open app settings in a browser
    Settings(EnvironmentArgs),
    /// Manage OAuth2 providers of an app
    #[clap(subcommand)]
    ExternalAuth(ExternalAuthCommand),
}

impl AppCommand {
    pub async fn run(self, clients: &Clients) -> Result<Vec<String>, AppError> {
        if !matches!(self, AppCommand::Settings(_)) {
            clients.hooks.validate_project_directory()?;
        }

        match self {
            AppCommand::Install(args) => install(clients, &args).await,
            AppCommand::Link(args) => {
                let options = LinkOptions { should_confirm: false, environment: args.environment };
                match LinkReconciler::new(clients).link(&options).await? {
                    Some(app) => Ok(list::format_apps(&[app], false)),
                    None => Ok(vec![]),
                }
            }
            AppCommand::Unlink(args) => {
                let selected = select(clients, &args).await?;
                remove::unlink(clients, &selected.app)?;
                Ok(vec![])
            }
            AppCommand::Uninstall(args) => {
                let selected = select(clients, &args).await?;
                remove::uninstall(clients, &selected).await?;
                Ok(vec![])
            }
            AppCommand::Delete(args) => {
                let selected = select(clients, &args).await?;
                remove::delete(clients, &selected).await?;
                Ok(vec![])
            }
            AppCommand::List(args) => {
                let apps = list::list(clients).await?;
                Ok(list::format_apps(&apps, args.all_org_workspace_grants))
            }
            AppCommand::Settings(args) => {
                let url = settings_url(clients, &args).await?;
                settings::open_settings(&url);
                Ok(vec![format!("App settings: {}", url)])
            }
            AppCommand::ExternalAuth(command) => external_auth_command(clients, command).await,
        }
    }
}

async fn select(clients: &Clients, args: &EnvironmentArgs) -> Result<SelectedApp, AppError> {
    let environment = install_environment(clients, args.environment.as_deref())?;
    select_app(clients, environment).await
}

async fn install(clients: &Clients, args: &InstallArgs) -> Result<Vec<String>, AppError> {
    let selected = select(clients, &args.target).await?;

    let reconciler = InstallReconciler::new(clients);
    let outcome = if selected.app.is_dev {
        reconciler.install_local_app(&selected.auth, selected.app, &InstallOptions::default()).await?
    } else {
        let options = InstallOptions {
            org_grant_workspace_id: validate_org_workspace_grant(clients, &selected, args.org_workspace_grant.as_deref())
                .await?,
            only_create_update: false,
        };
        reconciler.add(&selected.auth, selected.app, &options).await?
    };

    let mut app = outcome.app;
    match outcome.state {
        Some(InstallState::Success) => {
            app.install_status = InstallStatus::Installed;
            Ok(list::format_apps(&[app], false))
        }
        Some(_) => Ok(vec![]),
        None if app.app_id.is_empty() => Ok(vec![]),
        None => Ok(vec![format!("{} {} is up to date", app.team_domain, app.app_id)]),
    }
}

/// Settings of the selected app, or the list of every app when the
/// project has none yet.
async fn settings_url(clients: &Clients, args: &EnvironmentArgs) -> Result<String, AppError> {
    if clients.hooks.validate_project_directory().is_err() {
        return settings::settings_url(&clients.config.api_host, "");
    }

    match select(clients, args).await {
        Ok(selected) => {
            let api_host = selected.auth.api_host.as_deref().unwrap_or(&clients.config.api_host);
            settings::settings_url(api_host, &selected.app.app_id)
        }
        Err(AppError::CredentialsNotFound(_)) | Err(AppError::InstallationRequired(_)) => {
            settings::settings_url(&clients.config.api_host, "")
        }
        Err(err) => Err(err),
    }
}

async fn external_auth_command(clients: &Clients, command: ExternalAuthCommand) -> Result<Vec<String>, AppError> {
    let selected = select(clients, &EnvironmentArgs::default()).await?;

    match command {
        ExternalAuthCommand::List => {
            let providers = external_auth::list(clients, &selected).await?;
            if providers.is_empty() {
                return Ok(vec!["No OAuth2 providers found for this app".to_string()]);
            }
            Ok(providers.iter().flat_map(external_auth::format_provider).collect())
        }
        ExternalAuthCommand::AddSecret(args) => {
            let provider = external_auth::add_secret(
                clients,
                &selected,
                args.provider.provider.as_deref(),
                args.secret.as_deref(),
            )
            .await?;
            Ok(vec![format!("Saved the client secret of the {} provider", provider.provider_key)])
        }
        ExternalAuthCommand::Remove(args) => match external_auth::remove(clients, &selected, args.provider.as_deref()).await? {
            Some(provider) => Ok(vec![format!("Removed the tokens of the {} provider", provider.provider_key)]),
            None => Ok(vec![]),
        },
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::{
        apps::install::{SLACK_APP_TOKEN, SLACK_BOT_TOKEN},
        clients::testing::{team1_auth, TestProject},
        errors::AppError,
        types::{App, SlackAuth},
    };

    use super::{settings_url, AppCommand, EnvironmentArgs, InstallArgs, ListArgs};

    fn clear_token_env() {
        std::env::remove_var(SLACK_APP_TOKEN);
        std::env::remove_var(SLACK_BOT_TOKEN);
    }

    fn deployed() -> EnvironmentArgs {
        EnvironmentArgs { environment: Some("deployed".to_string()) }
    }

    #[tokio::test]
    async fn lists_an_empty_project() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        let clients = project.clients(|_| {});

        let lines = AppCommand::List(ListArgs::default()).run(&clients).await?;

        assert_eq!(lines, vec!["This project has no apps"]);
        Ok(())
    }

    #[tokio::test]
    async fn unlinks_the_app_of_the_chosen_team() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        let clients = project.clients(|config| {
            config.team = Some("team1".to_string());
            config.force = true;
        });
        clients.credentials.set_auth(&team1_auth())?;
        clients.apps.save_deployed(&App {
            app_id: "A0000000001".to_string(),
            team_id: "T0000000001".to_string(),
            team_domain: "team1".to_string(),
            ..Default::default()
        })?;

        AppCommand::Unlink(deployed()).run(&clients).await?;

        assert!(clients.apps.get_deployed("T0000000001")?.is_new());
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn org_installs_send_the_chosen_workspace() -> Result<(), AppError> {
        clear_token_env();
        let project = TestProject::new(vec![])?;
        let clients = project.clients(|config| config.team = Some("acme-org".to_string()));
        clients.credentials.set_auth(&SlackAuth {
            token: "xoxp-org".to_string(),
            team_domain: "acme-org".to_string(),
            team_id: "E0000000001".to_string(),
            is_enterprise_install: true,
            ..Default::default()
        })?;
        project.api.with(|state| {
            state.session.team_id = Some("E0000000001".to_string());
            state.session.enterprise_id = Some("E0000000001".to_string());
        });
        let args = InstallArgs { target: deployed(), org_workspace_grant: Some("T0000000002".to_string()) };

        let lines = AppCommand::Install(args).run(&clients).await?;

        assert!(lines.contains(&"  App  ID: A0000000001".to_string()));
        let request = project.api.with(|state| state.install_requests[0].clone());
        assert_eq!(request.grant_team_id, "T0000000002");
        assert_eq!(clients.apps.get_deployed("E0000000001")?.app_id, "A0000000001");
        assert!(project.prompter.questions().is_empty());
        clear_token_env();
        Ok(())
    }

    #[tokio::test]
    async fn app_commands_need_a_project() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        std::fs::remove_file(project.path().join(".slack").join("hooks.json"))?;
        let clients = project.clients(|_| {});

        let result = AppCommand::List(ListArgs::default()).run(&clients).await;
        assert!(matches!(result, Err(AppError::InvalidAppDirectory(_))));

        let url = settings_url(&clients, &EnvironmentArgs::default()).await?;
        assert_eq!(url, "https://api.slack.com/apps");
        Ok(())
    }
}
