use std::path::PathBuf;

use chrono::Utc;

use crate::{
    clients::Clients,
    errors::AppError,
    progress::InstallEvent,
    service_provider::slack::ExchangedAuth,
    types::SlackAuth,
};

use super::{auth_with_token, custom_api_host};

pub const INVALID_NO_PROMPT_FLAGS: &str = "Invalid arguments, both --ticket and --challenge flag values are required";
const CHALLENGE_PROMPT: &str = "Enter challenge code";

#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    pub ticket: Option<String>,
    pub challenge: Option<String>,
    /// Returns the new credential without writing it to disk.
    pub skip_save: bool,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub auth: SlackAuth,
    /// Where the credential was written, empty for unsaved logins.
    pub credentials_path: Option<PathBuf>,
}

/// Authorizes the CLI with a team. Returns `None` when only a ticket was
/// generated and the login continues in a later `--ticket --challenge` run.
pub async fn login(clients: &Clients, options: &LoginOptions) -> Result<Option<LoginResult>, AppError> {
    if let Some(token) = clients.config.token.as_deref().filter(|token| !token.is_empty()) {
        tracing::debug!("Logging in with a token from the --token flag");
        return login_with_token(clients, token, options).await.map(Some);
    }

    let ticket = options.ticket.as_deref().filter(|ticket| !ticket.is_empty());
    let challenge = options.challenge.as_deref().filter(|challenge| !challenge.is_empty());

    if clients.config.no_prompt || ticket.is_some() || challenge.is_some() {
        return match (ticket, challenge) {
            (Some(ticket), Some(challenge)) => {
                let exchanged = exchange_ticket(clients, ticket, challenge).await?;
                save_new_auth(clients, exchanged, options).map(Some)
            }
            (None, None) => {
                request_auth_ticket(clients, true).await?;
                Ok(None)
            }
            _ => Err(AppError::MismatchedFlags(INVALID_NO_PROMPT_FLAGS.to_string())),
        };
    }

    let ticket = request_auth_ticket(clients, false).await?;
    let challenge = clients.prompter.input(CHALLENGE_PROMPT, true)?;
    if challenge.is_empty() {
        return Err(AppError::MissingFlag("A challenge code is required to log in".to_string()));
    }

    let exchanged = exchange_ticket(clients, &ticket, &challenge).await?;
    save_new_auth(clients, exchanged, options).map(Some)
}

async fn login_with_token(clients: &Clients, token: &str, options: &LoginOptions) -> Result<LoginResult, AppError> {
    let mut auth = auth_with_token(clients, token).await?;

    // Keep rotation details of an earlier login to the same team.
    if let Ok(existing) = clients.credentials.auth_with_team_id(&auth.team_id) {
        if !existing.refresh_token.is_empty() && existing.token == token {
            auth.refresh_token = existing.refresh_token;
            auth.expires_at = existing.expires_at;
        }
    }

    save(clients, auth, options)
}

async fn request_auth_ticket(clients: &Clients, resume_with_flags: bool) -> Result<String, AppError> {
    let ticket = clients.api.generate_auth_ticket().await?;

    let mut details = vec![
        "This will open a modal with user permissions for you to approve".to_string(),
        "Once approved, a challenge code will be generated in Slack".to_string(),
        String::new(),
        format!("/slackauthticket {}", ticket),
    ];
    if resume_with_flags {
        details.push(String::new());
        details.push(format!(
            "Then run `slack-app auth login --no-prompt --ticket {} --challenge <challenge code>`",
            ticket
        ));
    }

    clients.emit(InstallEvent::Notice {
        title: "Run the following slash command in any Slack channel or DM".to_string(),
        details,
    });
    Ok(ticket)
}

async fn exchange_ticket(clients: &Clients, ticket: &str, challenge: &str) -> Result<ExchangedAuth, AppError> {
    let exchanged = clients.api.exchange_auth_ticket(ticket, challenge).await?;

    if !exchanged.is_ready || exchanged.token.is_empty() {
        return Err(AppError::InvalidAuth(
            "The authorization ticket has not been approved or the challenge code has expired".to_string(),
        ));
    }
    Ok(exchanged)
}

fn save_new_auth(clients: &Clients, exchanged: ExchangedAuth, options: &LoginOptions) -> Result<LoginResult, AppError> {
    let auth = SlackAuth {
        token: exchanged.token,
        refresh_token: exchanged.refresh_token,
        expires_at: exchanged.expires_at,
        team_domain: exchanged.team_domain,
        team_id: exchanged.team_id,
        user_id: exchanged.user_id,
        enterprise_id: exchanged.enterprise_id,
        is_enterprise_install: exchanged.is_enterprise_install,
        last_updated: Some(Utc::now()),
        api_host: custom_api_host(clients),
    };

    save(clients, auth, options)
}

fn save(clients: &Clients, auth: SlackAuth, options: &LoginOptions) -> Result<LoginResult, AppError> {
    if options.skip_save {
        return Ok(LoginResult { auth, credentials_path: None });
    }

    let auth = clients.credentials.set_auth(&auth)?;
    tracing::info!(team_id = %auth.team_id, user_id = %auth.user_id, "Logged in");

    Ok(LoginResult {
        auth,
        credentials_path: Some(clients.credentials.path().to_path_buf()),
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        clients::testing::TestProject,
        errors::AppError,
        prompts::mock::Answer,
        service_provider::slack::ExchangedAuth,
        types::SlackAuth,
    };

    use super::{login, LoginOptions};

    fn approved() -> ExchangedAuth {
        ExchangedAuth {
            token: "xoxe.xoxp-new".to_string(),
            refresh_token: "xoxe-1".to_string(),
            team_id: "T0000000001".to_string(),
            team_domain: "team1".to_string(),
            user_id: "U0000000001".to_string(),
            expires_at: 1_900_000_000,
            is_ready: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn prompts_for_the_challenge_code() -> Result<(), AppError> {
        let project = TestProject::new(vec![Answer::Input("c0ffee".to_string())])?;
        project.api.with(|state| {
            state.auth_ticket = "ticket-1".to_string();
            state.exchanged_auth = approved();
        });
        let clients = project.clients(|_| {});

        let result = login(&clients, &LoginOptions::default()).await?.ok_or(AppError::Cancelled)?;

        assert_eq!(result.auth.token, "xoxe.xoxp-new");
        assert_eq!(result.credentials_path.as_deref(), Some(clients.credentials.path()));
        assert_eq!(clients.credentials.auth_with_team_domain("team1")?.expires_at, 1_900_000_000);
        assert_eq!(project.prompter.questions(), vec!["Enter challenge code"]);
        assert!(project.event_messages()[0].contains("/slackauthticket ticket-1"));
        Ok(())
    }

    #[tokio::test]
    async fn no_prompt_logins_need_both_ticket_and_challenge() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        project.api.with(|state| {
            state.auth_ticket = "ticket-2".to_string();
            state.exchanged_auth = approved();
        });
        let clients = project.clients(|config| config.no_prompt = true);

        let first = login(&clients, &LoginOptions::default()).await?;
        assert!(first.is_none());
        assert!(project.event_messages()[0].contains("--ticket ticket-2"));

        let partial = LoginOptions { ticket: Some("ticket-2".to_string()), ..Default::default() };
        assert!(matches!(login(&clients, &partial).await, Err(AppError::MismatchedFlags(_))));

        let complete = LoginOptions {
            ticket: Some("ticket-2".to_string()),
            challenge: Some("c0ffee".to_string()),
            ..Default::default()
        };
        let result = login(&clients, &complete).await?.ok_or(AppError::Cancelled)?;
        assert_eq!(result.auth.team_id, "T0000000001");
        assert_eq!(project.api.call_count("apps.hosted.exchangeAuthTicket"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unapproved_tickets_are_rejected() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        project.api.with(|state| state.exchanged_auth = ExchangedAuth::default());
        let clients = project.clients(|_| {});
        let options = LoginOptions {
            ticket: Some("ticket-3".to_string()),
            challenge: Some("c0ffee".to_string()),
            ..Default::default()
        };

        assert!(matches!(login(&clients, &options).await, Err(AppError::InvalidAuth(_))));
        assert!(clients.credentials.get_auths()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn token_logins_keep_rotation_details() -> Result<(), AppError> {
        let project = TestProject::non_interactive()?;
        let clients = project.clients(|config| config.token = Some("xoxe.xoxp-held".to_string()));
        clients.credentials.set_auth(&SlackAuth {
            token: "xoxe.xoxp-held".to_string(),
            team_id: "T0000000001".to_string(),
            team_domain: "team1".to_string(),
            refresh_token: "xoxe-9".to_string(),
            expires_at: 1_900_000_000,
            ..Default::default()
        })?;

        let result = login(&clients, &LoginOptions::default()).await?.ok_or(AppError::Cancelled)?;

        assert_eq!(result.auth.refresh_token, "xoxe-9");
        assert_eq!(result.auth.user_id, "U0000000001");
        assert_eq!(project.api.call_count("apps.hosted.generateAuthTicket"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unsaved_logins_leave_credentials_alone() -> Result<(), AppError> {
        let project = TestProject::new(vec![Answer::Input("c0ffee".to_string())])?;
        project.api.with(|state| state.exchanged_auth = approved());
        let clients = project.clients(|_| {});

        let options = LoginOptions { skip_save: true, ..Default::default() };
        let result = login(&clients, &options).await?.ok_or(AppError::Cancelled)?;

        assert_eq!(result.auth.token, "xoxe.xoxp-new");
        assert!(result.credentials_path.is_none());
        assert!(clients.credentials.get_auths()?.is_empty());
        Ok(())
    }
}
