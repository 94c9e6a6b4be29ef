use crate::{clients::Clients, errors::AppError, progress::InstallEvent, types::App};

use super::select::SelectedApp;

/// Forgets a saved app without touching it in Slack. Returns `None` when
/// the user declined.
pub fn unlink(clients: &Clients, app: &App) -> Result<Option<App>, AppError> {
    clients.emit(InstallEvent::Notice {
        title: "App Unlink".to_string(),
        details: vec![
            format!("App ({}) will be removed from this project", app.app_id),
            "The app will not be deleted from Slack".to_string(),
            "You can re-link it later with `slack-app app link`".to_string(),
        ],
    });

    if !clients.config.force && !clients.prompter.confirm("Are you sure you want to unlink this app?", false)? {
        clients.emit(InstallEvent::Notice { title: "Your app will not be unlinked".to_string(), details: vec![] });
        return Ok(None);
    }

    let removed = clients.apps.remove(app)?;
    clients.apps.clean_up();

    clients.emit(InstallEvent::Notice {
        title: format!("Removed app {} from project", removed.app_id),
        details: vec![format!("Team: {}", removed.team_domain)],
    });
    Ok(Some(removed))
}

/// Uninstalls the app from its team. Saved records stay in the project.
pub async fn uninstall(clients: &Clients, selected: &SelectedApp) -> Result<Option<App>, AppError> {
    let team_name = validate_for_removal(clients, selected).await?;
    let app = &selected.app;

    if !clients.config.force {
        clients.emit(InstallEvent::Warning {
            title: "Danger zone".to_string(),
            details: vec![
                format!("App ({}) will be uninstalled from {} ({})", app.app_id, app.team_domain, app.team_id),
                "All triggers, workflows, and functions will be deleted".to_string(),
                "All datastores for this app will be deleted".to_string(),
            ],
        });
        if !clients.prompter.confirm("Are you sure you want to uninstall?", false)? {
            clients.emit(InstallEvent::Notice { title: "Your app will not be uninstalled".to_string(), details: vec![] });
            return Ok(None);
        }
    }

    clients.api.uninstall_app(&selected.auth.token, &app.app_id, &app.team_id).await?;
    tracing::info!(app_id = %app.app_id, team_id = %app.team_id, "Uninstalled app");

    clients.emit(InstallEvent::Notice {
        title: format!("Uninstalled the app \"{}\" from \"{}\"", app.app_id, team_name),
        details: vec!["Run `slack-app app delete` to fully remove your app".to_string()],
    });
    Ok(Some(app.clone()))
}

/// Deletes the app from Slack and then from the project files.
pub async fn delete(clients: &Clients, selected: &SelectedApp) -> Result<Option<App>, AppError> {
    let team_name = validate_for_removal(clients, selected).await?;
    let app = &selected.app;

    if !clients.config.force {
        clients.emit(InstallEvent::Warning {
            title: "Danger zone".to_string(),
            details: vec![
                format!("App ({}) will be permanently deleted", app.app_id),
                "All triggers, workflows, and functions will be deleted".to_string(),
                "All datastores for this app will be deleted".to_string(),
                "Once you delete this app, there is no going back".to_string(),
            ],
        });
        if !clients.prompter.confirm("Are you sure you want to delete the app?", false)? {
            clients.emit(InstallEvent::Notice { title: "Your app will not be deleted".to_string(), details: vec![] });
            return Ok(None);
        }
    }

    clients.api.delete_app(&selected.auth.token, &app.app_id).await?;
    tracing::info!(app_id = %app.app_id, "Deleted app");

    match clients.apps.remove(app) {
        Ok(_) => clients.apps.clean_up(),
        Err(AppError::AppNotFound(_)) => {
            tracing::debug!(app_id = %app.app_id, team_id = %app.team_id, "Deleted app was not saved to the project")
        }
        Err(err) => return Err(err),
    }

    clients.emit(InstallEvent::Notice {
        title: format!("Deleted the app manifest for \"{}\" from \"{}\"", app.app_id, team_name),
        details: vec![],
    });
    Ok(Some(app.clone()))
}

/// Checks the credential and that an app was saved for the team.
/// Returns the team name to show.
async fn validate_for_removal(clients: &Clients, selected: &SelectedApp) -> Result<String, AppError> {
    let session = clients
        .api
        .validate_session(&selected.auth.token)
        .await
        .map_err(|err| AppError::AppRemove(Box::new(AppError::InvalidAuth(err.to_string()))))?;

    if selected.app.app_id.is_empty() {
        let not_found = AppError::AppNotFound(format!("App not found for team '{}'", selected.auth.team_domain));
        return Err(AppError::AppRemove(Box::new(not_found)));
    }

    Ok(session.team_name.unwrap_or_else(|| selected.auth.team_domain.clone()))
}
