use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde_derive::{Deserialize, Serialize};

use crate::{errors::AppError, types::App};

use super::json_file::{read_json_file, write_json_file};

pub const DEPLOYED_APPS_FILENAME: &str = "apps.json";
pub const LOCAL_APPS_FILENAME: &str = "apps.dev.json";

#[derive(Serialize, Deserialize, Debug, Default)]
struct DeployedAppsFile {
    #[serde(default)]
    apps: BTreeMap<String, App>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    default: String,

    /// Local apps were once kept in apps.json under this key.
    #[serde(default, skip_serializing)]
    dev: BTreeMap<String, App>,
}

type LocalAppsFile = BTreeMap<String, App>;

/// Apps saved to a project, one per team for each of the deployed and local environments.
#[derive(Debug, Clone)]
pub struct AppRecordStore {
    config_dir: PathBuf,
    protected_dir: Option<PathBuf>,
}

impl AppRecordStore {
    pub fn new(project_dir: &Path) -> AppRecordStore {
        AppRecordStore {
            config_dir: project_dir.join(".slack"),
            protected_dir: None,
        }
    }

    /// Never removes this directory during clean up, used for the home `.slack` folder.
    pub fn with_protected_dir(mut self, dir: PathBuf) -> AppRecordStore {
        self.protected_dir = Some(dir);
        self
    }

    pub fn deployed_path(&self) -> PathBuf {
        self.config_dir.join(DEPLOYED_APPS_FILENAME)
    }

    pub fn local_path(&self) -> PathBuf {
        self.config_dir.join(LOCAL_APPS_FILENAME)
    }

    /// Saves an empty deployed app for the team, failing when one already exists.
    pub fn new_deployed(&self, team_id: &str) -> Result<App, AppError> {
        let app = self.get_deployed(team_id)?;
        if !app.is_new() {
            return Err(AppError::AppFound(format!("A deployed app already exists for team {}", team_id)));
        }

        self.save_deployed(&app)?;
        Ok(app)
    }

    /// Finds the deployed app for a team. An empty team ID falls back to the
    /// legacy default team domain.
    pub fn get_deployed(&self, team_id: &str) -> Result<App, AppError> {
        let file = self.read_deployed()?;

        if team_id.is_empty() {
            let app = file.apps.values().find(|app| !file.default.is_empty() && app.team_domain == file.default);
            return Ok(match app {
                Some(app) => app.clone(),
                None => App { team_domain: file.default.clone(), ..App::new_for_team("") },
            });
        }

        Ok(find_by_team_id(&file.apps, team_id))
    }

    /// Returns every deployed app and the default team domain.
    pub fn get_deployed_all(&self) -> Result<(Vec<App>, String), AppError> {
        let file = self.read_deployed()?;

        Ok((file.apps.into_values().collect(), file.default))
    }

    pub fn save_deployed(&self, app: &App) -> Result<(), AppError> {
        if app.is_dev {
            return self.save_local(app);
        }
        if app.team_id.is_empty() {
            return Err(AppError::MissingAppTeamID(app.app_id.clone()));
        }

        let mut file = self.read_deployed()?;
        let mut saved = app.clone();
        saved.mark_saved();
        file.apps.insert(app.team_id.clone(), saved);

        if file.apps.len() == 1 {
            file.default = app.team_domain.clone();
        }

        self.write_deployed(&file)
    }

    pub fn remove_deployed(&self, team_id: &str) -> Result<App, AppError> {
        let mut file = self.read_deployed()?;

        let removed = file
            .apps
            .remove(team_id)
            .ok_or_else(|| AppError::AppNotFound(format!("No deployed app is saved for team {}", team_id)))?;

        if file.apps.is_empty() {
            file.default = String::new();
        } else if file.default == removed.team_domain {
            file.default = file.apps.values().next().map(|app| app.team_domain.clone()).unwrap_or_default();
        }

        self.write_deployed(&file)?;
        Ok(removed)
    }

    pub fn get_local(&self, team_id: &str) -> Result<App, AppError> {
        let apps = self.read_local()?;

        Ok(find_by_team_id(&apps, team_id))
    }

    pub fn get_local_all(&self) -> Result<Vec<App>, AppError> {
        Ok(self.read_local()?.into_values().collect())
    }

    pub fn save_local(&self, app: &App) -> Result<(), AppError> {
        if app.team_id.is_empty() {
            return Err(AppError::MissingAppTeamID(app.app_id.clone()));
        }

        let mut apps = self.read_local()?;
        let mut saved = app.clone();
        saved.is_dev = true;
        saved.mark_saved();
        apps.insert(app.team_id.clone(), saved);

        write_json_file(&self.local_path(), &apps)
    }

    pub fn remove_local(&self, team_id: &str) -> Result<App, AppError> {
        let mut apps = self.read_local()?;

        let removed = apps
            .remove(team_id)
            .ok_or_else(|| AppError::AppNotFound(format!("No local app is saved for team {}", team_id)))?;

        write_json_file(&self.local_path(), &apps)?;
        Ok(removed)
    }

    /// Removes the saved app from whichever file matches its environment.
    pub fn remove(&self, app: &App) -> Result<App, AppError> {
        if app.is_dev {
            self.remove_local(&app.team_id)
        } else {
            self.remove_deployed(&app.team_id)
        }
    }

    /// Deletes app files without apps, and the project `.slack` folder when
    /// nothing else is left in it. Failures are ignored.
    pub fn clean_up(&self) {
        if self.protected_dir.as_deref() == Some(self.config_dir.as_path()) {
            return;
        }

        let (deployed, local) = match (self.get_deployed_all(), self.get_local_all()) {
            (Ok((deployed, _)), Ok(local)) => (deployed, local),
            _ => return,
        };

        if deployed.is_empty() {
            let _ = fs::remove_file(self.deployed_path());
        }
        if local.is_empty() {
            let _ = fs::remove_file(self.local_path());
        }

        let is_empty_dir = fs::read_dir(&self.config_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty_dir {
            let _ = fs::remove_dir(&self.config_dir);
        }
    }

    fn read_deployed(&self) -> Result<DeployedAppsFile, AppError> {
        let mut file: DeployedAppsFile = read_json_file(&self.deployed_path())?;
        file.apps = map_by_team_id(std::mem::take(&mut file.apps))?;

        if !file.dev.is_empty() {
            tracing::info!("Moving local apps from apps.json into apps.dev.json");
            let mut local = self.read_local()?;
            for (_, mut app) in map_by_team_id(std::mem::take(&mut file.dev))? {
                app.is_dev = true;
                local.entry(app.team_id.clone()).or_insert(app);
            }
            write_json_file(&self.local_path(), &local)?;
            self.write_deployed(&file)?;
        }

        Ok(file)
    }

    fn write_deployed(&self, file: &DeployedAppsFile) -> Result<(), AppError> {
        write_json_file(&self.deployed_path(), file)
    }

    fn read_local(&self) -> Result<LocalAppsFile, AppError> {
        let apps: LocalAppsFile = read_json_file(&self.local_path())?;
        map_by_team_id(apps)
    }
}

fn find_by_team_id(apps: &BTreeMap<String, App>, team_id: &str) -> App {
    apps.get(team_id).cloned().unwrap_or_else(|| App::new_for_team(team_id))
}

/// Keys apps by team ID, moving legacy "name" values into the team domain.
fn map_by_team_id(apps: BTreeMap<String, App>) -> Result<BTreeMap<String, App>, AppError> {
    let mut by_team_id = BTreeMap::new();

    for (key, mut app) in apps {
        if app.team_id.is_empty() {
            return Err(AppError::MissingAppTeamID(key));
        }
        if app.team_domain.is_empty() && !app.legacy_name.is_empty() {
            app.team_domain = std::mem::take(&mut app.legacy_name);
        }
        by_team_id.insert(app.team_id.clone(), app);
    }

    Ok(by_team_id)
}
