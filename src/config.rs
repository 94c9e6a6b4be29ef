use std::path::PathBuf;

use derive_more::Display;

use crate::errors::AppError;

pub const DEFAULT_API_HOST: &str = "https://slack.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Experiment {
    #[display("bolt")]
    BoltFrameworks,
    #[display("bolt-install")]
    BoltInstall,
}

impl Experiment {
    pub fn parse(name: &str) -> Option<Experiment> {
        match name.trim() {
            "bolt" => Some(Experiment::BoltFrameworks),
            "bolt-install" => Some(Experiment::BoltInstall),
            _ => None,
        }
    }
}

/// Settings shared by every command of a single invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub system_dir: PathBuf,
    pub api_host: String,

    pub force: bool,
    pub team: Option<String>,
    pub app: Option<String>,
    pub token: Option<String>,
    pub no_prompt: bool,
    pub skip_local_fs: bool,
    pub experiments: Vec<Experiment>,
}

impl Config {
    pub fn new(project_dir: PathBuf, system_dir: PathBuf) -> Config {
        Config {
            project_dir,
            system_dir,
            api_host: DEFAULT_API_HOST.to_string(),

            force: false,
            team: None,
            app: None,
            token: None,
            no_prompt: false,
            skip_local_fs: false,
            experiments: vec![],
        }
    }

    /// Uses the working directory as the project and `~/.slack` for credentials.
    pub fn from_env() -> Result<Config, AppError> {
        let project_dir = std::env::current_dir()?;
        let home_dir = dirs::home_dir()
            .ok_or_else(|| AppError::UnexpectedError("Could not find the home directory".to_string()))?;

        Ok(Config::new(project_dir, home_dir.join(".slack")))
    }

    pub fn with_experiments(mut self, names: &[String]) -> Config {
        for name in names.iter().flat_map(|names| names.split(',')) {
            match Experiment::parse(name) {
                Some(experiment) if !self.experiments.contains(&experiment) => self.experiments.push(experiment),
                Some(_) => {}
                None => tracing::warn!(experiment = name, "Ignoring unknown experiment"),
            }
        }
        self
    }

    pub fn with_experiment(&self, experiment: Experiment) -> bool {
        self.experiments.contains(&experiment)
    }

    pub fn project_config_dir(&self) -> PathBuf {
        self.project_dir.join(".slack")
    }
}
