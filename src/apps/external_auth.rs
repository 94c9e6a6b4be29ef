use chrono::{TimeZone, Utc};

use crate::{clients::Clients, errors::AppError, service_provider::slack::ExternalAuthorization};

use super::select::SelectedApp;

const PROVIDER_PROMPT: &str = "Select a provider";
const SECRET_PROMPT: &str = "Enter the client secret";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// OAuth2 providers configured for the app.
pub async fn list(clients: &Clients, selected: &SelectedApp) -> Result<Vec<ExternalAuthorization>, AppError> {
    require_installed_app(selected)?;
    clients.api.list_external_auths(&selected.auth.token, &selected.app.app_id).await
}

/// Saves the client secret of one provider.
pub async fn add_secret(
    clients: &Clients,
    selected: &SelectedApp,
    provider: Option<&str>,
    secret: Option<&str>,
) -> Result<ExternalAuthorization, AppError> {
    let providers = list(clients, selected).await?;
    let provider = select_provider(clients, providers, provider)?;

    let secret = match secret.filter(|secret| !secret.is_empty()) {
        Some(secret) => secret.to_string(),
        None => clients.prompter.password(SECRET_PROMPT)?,
    };
    if secret.is_empty() {
        return Err(AppError::MissingFlag("A client secret is required, provide one with --secret".to_string()));
    }

    clients
        .api
        .add_external_auth_client_secret(&selected.auth.token, &selected.app.app_id, &provider.provider_key, &secret)
        .await?;
    tracing::info!(app_id = %selected.app.app_id, provider = %provider.provider_key, "Saved client secret");
    Ok(provider)
}

/// Removes the tokens saved for one provider. Returns `None` when the user
/// declined.
pub async fn remove(
    clients: &Clients,
    selected: &SelectedApp,
    provider: Option<&str>,
) -> Result<Option<ExternalAuthorization>, AppError> {
    let providers = list(clients, selected).await?;
    let provider = select_provider(clients, providers, provider)?;

    if !clients.config.force {
        let prompt = format!("Remove all tokens of the {} provider from this app?", provider.provider_key);
        if !clients.prompter.confirm(&prompt, false)? {
            return Ok(None);
        }
    }

    clients
        .api
        .remove_external_auth(&selected.auth.token, &selected.app.app_id, &provider.provider_key)
        .await?;
    Ok(Some(provider))
}

pub fn format_provider(provider: &ExternalAuthorization) -> Vec<String> {
    let yes_no = |value: bool| if value { "Yes" } else { "No" };

    let mut lines = vec![
        format!("Provider Key: {}", provider.provider_key),
        format!("  Provider Name: {}", provider.provider_name),
        format!("  Client ID: {}", provider.client_id),
        format!("  Client Secret Exists? {}", yes_no(provider.client_secret_exists)),
    ];

    if provider.external_tokens.is_empty() {
        lines.push(format!("  Valid Token Exists? {}", yes_no(provider.valid_token_exists)));
    }
    for token in &provider.external_tokens {
        let updated = Utc
            .timestamp_opt(token.date_updated, 0)
            .single()
            .map(|date| date.format(TIME_FORMAT).to_string())
            .unwrap_or_default();
        lines.push(format!("  Account: {}, Last Updated: {}", token.external_user_id, updated));
    }
    lines
}

fn select_provider(
    clients: &Clients,
    providers: Vec<ExternalAuthorization>,
    provider_flag: Option<&str>,
) -> Result<ExternalAuthorization, AppError> {
    if providers.is_empty() {
        return Err(AppError::ProviderNotFound("No OAuth2 providers found for this app".to_string()));
    }

    if let Some(key) = provider_flag.filter(|key| !key.is_empty()) {
        return providers
            .into_iter()
            .find(|provider| provider.provider_key == key)
            .ok_or_else(|| AppError::ProviderNotFound(format!("No provider with the key \"{}\"", key)));
    }

    let labels: Vec<String> = providers.iter().map(ToString::to_string).collect();
    let index = clients.prompter.select(PROVIDER_PROMPT, &labels)?;
    providers
        .into_iter()
        .nth(index)
        .ok_or_else(|| AppError::UnexpectedError(format!("Selected provider {} is out of range", index)))
}

fn require_installed_app(selected: &SelectedApp) -> Result<(), AppError> {
    if selected.app.app_id.is_empty() {
        return Err(AppError::InstallationRequired(format!(
            "No app is saved for team {}",
            selected.auth.team_domain
        )));
    }
    Ok(())
}
