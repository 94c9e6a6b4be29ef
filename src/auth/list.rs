use crate::{clients::Clients, errors::AppError, types::SlackAuth};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// Saved credentials ordered by team domain.
pub fn list(clients: &Clients) -> Result<Vec<SlackAuth>, AppError> {
    clients.credentials.get_auths()
}

pub fn format_auth(auth: &SlackAuth) -> String {
    let mut lines = vec![
        format!("{} (Team ID: {})", auth.team_domain, auth.team_id),
        format!("User ID: {}", auth.user_id),
    ];
    if let Some(api_host) = &auth.api_host {
        lines.push(format!("API Host: {}", api_host));
    }
    if let Some(last_updated) = auth.last_updated {
        lines.push(format!("Last Updated: {}", last_updated.format(TIME_FORMAT)));
    }

    let level = auth.auth_level().to_string();
    let mut chars = level.chars();
    let level = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => level,
    };
    lines.push(format!("Authorization Level: {}", level));

    lines.join("\n")
}
