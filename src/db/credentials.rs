use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{errors::AppError, types::SlackAuth};

use super::json_file::{read_json_file, write_json_file};

pub const CREDENTIALS_FILENAME: &str = "credentials.json";

lazy_static! {
    static ref TEAM_ID: Regex = Regex::new(r"^[TE][A-Z0-9]{8,}$").unwrap();
}

pub fn is_team_id(value: &str) -> bool {
    TEAM_ID.is_match(value)
}

/// Saved user tokens, one per team, in `~/.slack/credentials.json`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(system_dir: &Path) -> CredentialStore {
        CredentialStore {
            path: system_dir.join(CREDENTIALS_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All saved credentials ordered by team domain.
    pub fn get_auths(&self) -> Result<Vec<SlackAuth>, AppError> {
        let mut auths: Vec<SlackAuth> = self.read()?.into_values().collect();
        auths.sort_by(|a, b| a.team_domain.cmp(&b.team_domain).then_with(|| a.team_id.cmp(&b.team_id)));

        Ok(auths)
    }

    pub fn auth_with_team_id(&self, team_id: &str) -> Result<SlackAuth, AppError> {
        self.read()?
            .remove(team_id)
            .ok_or_else(|| AppError::CredentialsNotFound(format!("No credentials found with the team ID \"{}\"", team_id)))
    }

    pub fn auth_with_team_domain(&self, team_domain: &str) -> Result<SlackAuth, AppError> {
        self.get_auths()?
            .into_iter()
            .find(|auth| auth.team_domain == team_domain)
            .ok_or_else(|| {
                AppError::CredentialsNotFound(format!("No credentials found with the team domain \"{}\"", team_domain))
            })
    }

    /// Saves the credential under its team ID and stamps the update time.
    pub fn set_auth(&self, auth: &SlackAuth) -> Result<SlackAuth, AppError> {
        if auth.team_id.is_empty() {
            return Err(AppError::MissingAppTeamID(auth.team_domain.clone()));
        }

        let mut auths = self.read()?;
        let mut saved = auth.clone();
        saved.last_updated = Some(Utc::now());
        auths.insert(saved.team_id.clone(), saved.clone());

        self.write(&auths)?;
        tracing::debug!(team_id = %saved.team_id, "Saved credentials");
        Ok(saved)
    }

    pub fn delete_auth(&self, auth: &SlackAuth) -> Result<SlackAuth, AppError> {
        let mut auths = self.read()?;

        let removed = auths.remove(&auth.team_id).ok_or_else(|| {
            AppError::CredentialsNotFound(format!("No credentials found with the team ID \"{}\"", auth.team_id))
        })?;

        self.write(&auths)?;
        Ok(removed)
    }

    fn read(&self) -> Result<BTreeMap<String, SlackAuth>, AppError> {
        let auths: BTreeMap<String, SlackAuth> = read_json_file(&self.path)?;

        if auths.keys().all(|key| is_team_id(key)) {
            return Ok(auths);
        }

        // Older versions keyed credentials by team domain.
        let mut migrated = BTreeMap::new();
        for (key, auth) in auths {
            let team_id = if is_team_id(&key) { key.clone() } else { auth.team_id.clone() };
            if team_id.is_empty() {
                tracing::warn!(key = %key, "Skipping saved credentials without a team ID");
                continue;
            }
            migrated.insert(team_id, auth);
        }

        self.write(&migrated)?;
        Ok(migrated)
    }

    fn write(&self, auths: &BTreeMap<String, SlackAuth>) -> Result<(), AppError> {
        write_json_file(&self.path, auths)
    }
}
