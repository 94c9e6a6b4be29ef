use crate::{clients::Clients, errors::AppError, types::SlackAuth};

use super::{auth_label, find_team_auth};

const REVOKE_PROMPT: &str = "Select an authorization to revoke";
const TOKEN_PROMPT: &str = "Enter a token to revoke";

/// Revokes the tokens of the chosen teams and forgets their credentials.
/// Returns the removed credentials, empty when none were saved.
pub async fn logout(clients: &Clients, all: bool) -> Result<Vec<SlackAuth>, AppError> {
    let team = clients.config.team.as_deref().filter(|team| !team.is_empty());
    if all && team.is_some() {
        return Err(AppError::MismatchedFlags("The --team flag cannot be used with --all".to_string()));
    }

    let auths = clients.credentials.get_auths()?;
    let selected = match team {
        Some(team) => vec![find_team_auth(&auths, team)?],
        None if all || auths.len() <= 1 => auths,
        None => {
            if !clients.prompter.is_interactive() {
                return Err(AppError::MissingFlag("Choose a team with --team or log out of every team with --all".to_string()));
            }
            let labels: Vec<String> = auths.iter().map(auth_label).collect();
            let index = clients.prompter.select(REVOKE_PROMPT, &labels)?;
            auths.into_iter().nth(index).into_iter().collect()
        }
    };

    for auth in &selected {
        remove_auth(clients, auth).await?;
    }
    Ok(selected)
}

async fn remove_auth(clients: &Clients, auth: &SlackAuth) -> Result<(), AppError> {
    clients.api.revoke_token(&auth.token).await?;
    if !auth.refresh_token.is_empty() {
        clients.api.revoke_token(&auth.refresh_token).await?;
    }

    clients.credentials.delete_auth(auth)?;
    tracing::info!(team_id = %auth.team_id, "Removed credentials");
    Ok(())
}

/// Revokes a token that may not be saved, such as one from `auth token`.
pub async fn revoke(clients: &Clients) -> Result<(), AppError> {
    let token = match clients.config.token.as_deref().filter(|token| !token.is_empty()) {
        Some(token) => token.to_string(),
        None if clients.prompter.is_interactive() => clients.prompter.password(TOKEN_PROMPT)?,
        None => return Err(AppError::MissingFlag("Provide the token to revoke with --token".to_string())),
    };
    if token.is_empty() {
        return Err(AppError::MissingFlag("Provide the token to revoke with --token".to_string()));
    }

    clients.api.revoke_token(&token).await
}
