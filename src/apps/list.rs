use std::collections::{BTreeMap, HashMap};

use futures::StreamExt;

use crate::{
    auth::auth_with_token,
    clients::Clients,
    errors::AppError,
    types::{App, EnterpriseGrant, InstallStatus},
};

const LOCAL_TAG: &str = "(local)";
const GRANT_LIMIT: usize = 3;

/// Every app saved to the project, deployed apps first, with the install
/// status reported by Slack.
pub async fn list(clients: &Clients) -> Result<Vec<App>, AppError> {
    let (mut apps, _) = clients.apps.get_deployed_all()?;
    let mut local_apps = clients.apps.get_local_all()?;

    for app in local_apps.iter_mut() {
        if let Ok(auth) = clients.credentials.auth_with_team_id(&app.team_id) {
            app.team_domain = auth.team_domain;
        }
    }
    apps.extend(local_apps);

    let mut apps = fetch_install_states(clients, apps).await?;
    apps.sort_by(|a, b| a.team_domain.cmp(&b.team_domain).then_with(|| a.is_dev.cmp(&b.is_dev)));
    Ok(apps)
}

/// Asks each saved team about its apps. Teams that fail to answer leave
/// their apps with an unknown status.
pub async fn fetch_install_states(clients: &Clients, apps: Vec<App>) -> Result<Vec<App>, AppError> {
    let mut app_ids_by_team: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for app in apps.iter().filter(|app| !app.app_id.is_empty()) {
        app_ids_by_team.entry(app.team_id.clone()).or_default().push(app.app_id.clone());
        if app.is_enterprise_workspace_app() {
            app_ids_by_team.entry(app.enterprise_id.clone()).or_default().push(app.app_id.clone());
        }
    }

    let mut auths = clients.credentials.get_auths()?;
    if let Some(token) = clients.config.token.as_deref().filter(|token| !token.is_empty()) {
        auths.push(auth_with_token(clients, token).await?);
    }

    let app_ids_by_team = &app_ids_by_team;
    let results: Vec<_> = futures::stream::iter(auths.iter().filter(|auth| app_ids_by_team.contains_key(&auth.team_id)))
        .then(|auth| async move {
            let app_ids = app_ids_by_team.get(&auth.team_id).map(Vec::as_slice).unwrap_or_default();
            (auth, clients.api.get_app_status(&auth.token, app_ids, &auth.team_id).await)
        })
        .collect()
        .await;

    let mut statuses: HashMap<String, (InstallStatus, Vec<EnterpriseGrant>)> = HashMap::new();
    for (auth, result) in results {
        match result {
            Ok(result) => {
                for info in result.apps {
                    let status = if info.installed { InstallStatus::Installed } else { InstallStatus::Uninstalled };
                    statuses.insert(info.app_id, (status, info.enterprise_grants));
                }
            }
            Err(err) => {
                tracing::debug!(team_id = %auth.team_id, error = %err, "Failed to fetch installation status");
            }
        }
    }

    Ok(apps
        .into_iter()
        .map(|mut app| {
            match statuses.get(&app.app_id) {
                Some((status, grants)) => {
                    app.install_status = *status;
                    app.enterprise_grants = grants.clone();
                }
                None => app.install_status = InstallStatus::Unknown,
            }
            app
        })
        .collect())
}

/// Lines describing each app. Org apps show at most three workspace grants
/// unless `all_grants` is set.
pub fn format_apps(apps: &[App], all_grants: bool) -> Vec<String> {
    let mut lines = vec![];

    for app in apps.iter().filter(|app| !app.app_id.is_empty()) {
        let team_domain = if app.is_dev && !app.team_domain.ends_with(LOCAL_TAG) {
            format!("{} {}", app.team_domain, LOCAL_TAG)
        } else {
            app.team_domain.clone()
        };

        lines.push(format!("{}:", team_domain));
        lines.push(format!("  App  ID: {}", app.app_id));
        lines.push(format!("  Team ID: {}", app.team_id));
        if !app.user_id.is_empty() {
            lines.push(format!("  User ID: {}", app.user_id));
        }
        lines.push(format!("  Status:  {}", app.install_status));

        if app.is_enterprise_app() && !app.enterprise_grants.is_empty() {
            lines.extend(format_grants(&app.enterprise_grants, all_grants));
        }
    }

    if lines.is_empty() {
        lines.push("This project has no apps".to_string());
    }
    lines
}

fn format_grants(grants: &[EnterpriseGrant], all_grants: bool) -> Vec<String> {
    let mut grants = grants.to_vec();
    grants.sort_by(|a, b| a.workspace_domain.cmp(&b.workspace_domain));

    let limit = if all_grants { grants.len() } else { GRANT_LIMIT };
    let label = if grants.len() == 1 { "Grant" } else { "Grants" };

    let mut lines = vec![format!("  Workspace {}:", label)];
    lines.extend(grants.iter().take(limit).map(|grant| format!("    {}", grant)));

    if grants.len() > limit {
        let remaining = grants.len() - limit;
        let noun = if remaining == 1 { "workspace" } else { "workspaces" };
        lines.push(format!("    ... and {} other {}", remaining, noun));
    }
    lines
}
