use clap::{Args, Subcommand};

use crate::{
    auth::{self, LoginOptions},
    clients::Clients,
    errors::AppError,
};

#[derive(Debug, Args, Default)]
pub struct LoginArgs {
    /// Ticket shown by an earlier `auth login --no-prompt`
    #[arg(long)]
    pub ticket: Option<String>,

    /// Challenge code shown in Slack after the ticket was approved
    #[arg(long)]
    pub challenge: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct LogoutArgs {
    /// Log out of every team
    #[arg(short = 'A', long)]
    pub all: bool,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Log in to a Slack team
    Login(LoginArgs),
    /// Log out of a Slack team
    Logout(LogoutArgs),
    /// List the saved authorizations
    List,
    /// Revoke a token
    Revoke,
    /// Create a token without saving it
    Token(LoginArgs),
}

impl AuthCommand {
    pub async fn run(self, clients: &Clients) -> Result<Vec<String>, AppError> {
        match self {
            AuthCommand::Login(args) => {
                let options = LoginOptions { ticket: args.ticket, challenge: args.challenge, skip_save: false };
                let Some(result) = auth::login(clients, &options).await? else {
                    return Ok(vec![]);
                };

                let mut lines = vec!["You've successfully authenticated!".to_string()];
                if let Some(path) = result.credentials_path {
                    lines.push(format!("Authorization data was saved to {}", path.display()));
                }
                Ok(lines)
            }
            AuthCommand::Logout(args) => {
                let removed = auth::logout(clients, args.all).await?;
                Ok(match removed.as_slice() {
                    [] => vec!["You are not logged in to any Slack accounts".to_string()],
                    [auth] => vec![format!("Authorization successfully revoked for {}", auth.team_domain)],
                    _ => vec!["Authorization successfully revoked for all teams".to_string()],
                })
            }
            AuthCommand::List => {
                let auths = auth::list(clients)?;
                if auths.is_empty() {
                    return Ok(vec!["You are not logged in to any Slack accounts".to_string()]);
                }
                Ok(auths.iter().map(auth::format_auth).collect())
            }
            AuthCommand::Revoke => {
                auth::revoke(clients).await?;
                Ok(vec!["Authorization successfully revoked".to_string()])
            }
            AuthCommand::Token(args) => {
                let options = LoginOptions { ticket: args.ticket, challenge: args.challenge, skip_save: true };
                match auth::login(clients, &options).await? {
                    Some(result) => Ok(vec![result.auth.token]),
                    None => Ok(vec![]),
                }
            }
        }
    }
}
