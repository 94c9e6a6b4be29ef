use chrono::Utc;
use reqwest::Url;

use crate::{
    clients::Clients,
    config::DEFAULT_API_HOST,
    db::is_team_id,
    errors::AppError,
    types::SlackAuth,
};

pub mod list;
pub mod login;
pub mod logout;

pub use list::{format_auth, list};
pub use login::{login, LoginOptions, LoginResult};
pub use logout::{logout, revoke};

/// The credential a command runs with: a `--token` if one was given, the
/// `--team` credential, or the one the user picks.
pub async fn resolve_auth(clients: &Clients, prompt: &str) -> Result<SlackAuth, AppError> {
    let auth = match clients.config.token.as_deref().filter(|token| !token.is_empty()) {
        Some(token) => auth_with_token(clients, token).await?,
        None => select_team_auth(clients, prompt)?,
    };

    rotate_if_needed(clients, auth).await
}

/// Builds a credential from a token the user already holds.
pub async fn auth_with_token(clients: &Clients, token: &str) -> Result<SlackAuth, AppError> {
    let session = clients
        .api
        .validate_session(token)
        .await
        .map_err(|err| AppError::InvalidAuth(err.to_string()))?;

    let team_domain = match session.url.as_deref() {
        Some(url) => team_domain_from_url(url)?,
        None => String::new(),
    };

    Ok(SlackAuth {
        token: token.to_string(),
        team_domain,
        team_id: session.team_id.unwrap_or_default(),
        enterprise_id: session.enterprise_id.unwrap_or_default(),
        user_id: session.user_id.unwrap_or_default(),
        is_enterprise_install: session.is_enterprise_install.unwrap_or(false),
        last_updated: Some(Utc::now()),
        api_host: custom_api_host(clients),
        ..Default::default()
    })
}

/// Exchanges the refresh token when the access token is about to expire.
/// A failed rotation keeps the current token.
pub async fn rotate_if_needed(clients: &Clients, mut auth: SlackAuth) -> Result<SlackAuth, AppError> {
    if !auth.should_rotate_token(Utc::now()) {
        return Ok(auth);
    }

    let rotated = match clients.api.rotate_token(&auth.refresh_token).await {
        Ok(rotated) => rotated,
        Err(err) => {
            tracing::debug!(team_id = %auth.team_id, error = %err, "Token rotation failed");
            return Ok(auth);
        }
    };

    auth.token = rotated.token;
    auth.refresh_token = rotated.refresh_token;
    auth.expires_at = rotated.expires_at;
    auth.last_updated = Some(Utc::now());

    tracing::debug!(team_id = %auth.team_id, expires_at = auth.expires_at, "Rotated token");
    clients.credentials.set_auth(&auth)
}

/// Picks a saved credential with the `--team` flag, or asks when there is
/// more than one.
pub fn select_team_auth(clients: &Clients, prompt: &str) -> Result<SlackAuth, AppError> {
    let auths = clients.credentials.get_auths()?;

    if let Some(team) = clients.config.team.as_deref().filter(|team| !team.is_empty()) {
        return find_team_auth(&auths, team);
    }

    match auths.len() {
        0 => Err(AppError::CredentialsNotFound("You are not logged in to any Slack teams".to_string())),
        1 => Ok(auths[0].clone()),
        _ => {
            let labels: Vec<String> = auths.iter().map(auth_label).collect();
            let index = clients.prompter.select(prompt, &labels)?;
            auths
                .get(index)
                .cloned()
                .ok_or_else(|| AppError::UnexpectedError(format!("Selected team {} is out of range", index)))
        }
    }
}

/// Matches a team ID first, then a team domain that is not shared by
/// several saved credentials.
pub fn find_team_auth(auths: &[SlackAuth], team: &str) -> Result<SlackAuth, AppError> {
    if let Some(auth) = auths.iter().find(|auth| auth.team_id == team) {
        return Ok(auth.clone());
    }

    let matches: Vec<&SlackAuth> = auths.iter().filter(|auth| auth.team_domain == team).collect();
    match matches.as_slice() {
        [auth] => Ok((*auth).clone()),
        [] if is_team_id(team) => {
            Err(AppError::CredentialsNotFound(format!("No credentials found with the team ID \"{}\"", team)))
        }
        [] => Err(AppError::CredentialsNotFound(format!(
            "No credentials found with the team domain \"{}\"",
            team
        ))),
        _ => Err(AppError::MissingAppTeamID("The team cannot be determined by team domain".to_string())),
    }
}

pub fn auth_label(auth: &SlackAuth) -> String {
    format!("{} {} ({})", auth.team_domain, auth.team_id, auth.auth_level())
}

/// Workspace URLs look like `https://<domain>.slack.com/`.
pub fn team_domain_from_url(url: &str) -> Result<String, AppError> {
    let url = Url::parse(url).map_err(|err| AppError::InvalidAuth(format!("Invalid team URL `{}`: {}", url, err)))?;

    url.host_str()
        .and_then(|host| host.split('.').next())
        .filter(|domain| !domain.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| AppError::InvalidAuth(format!("No team domain in `{}`", url)))
}

/// Credentials are tagged with the API host unless it is the production one.
fn custom_api_host(clients: &Clients) -> Option<String> {
    let host = clients.api.host();
    if host.trim_end_matches('/') == DEFAULT_API_HOST {
        None
    } else {
        Some(host)
    }
}
