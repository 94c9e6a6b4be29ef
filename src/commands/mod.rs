use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::{
    build_http_client,
    clients::Clients,
    config::Config,
    errors::AppError,
    progress::TerminalObserver,
    prompts::TerminalPrompter,
    service_provider::slack::Slack,
};

pub mod app;
pub mod auth;

#[derive(Parser, Debug)]
#[command(name = "slack-app", author, version, about = "Create, install and manage Slack apps", long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    pub global: GlobalArgs,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default)]
pub struct GlobalArgs {
    /// Host of the Slack API
    #[arg(long, global = true, env = "SLACK_API_HOST")]
    pub api_host: Option<String>,

    /// Skip confirmations and overwrite saved values
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Team ID or domain
    #[arg(short, long, global = true)]
    pub team: Option<String>,

    /// App ID, or `local` / `deployed`
    #[arg(short, long, global = true)]
    pub app: Option<String>,

    /// Use this token instead of a saved credential
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Never ask for input
    #[arg(long, global = true)]
    pub no_prompt: bool,

    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not write app records to the project
    #[arg(long, global = true)]
    pub skip_local_fs: bool,

    /// Turn on experiments, separated by commas
    #[arg(short, long = "experiment", global = true, value_delimiter = ',')]
    pub experiments: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install, link and remove apps
    #[clap(subcommand)]
    App(app::AppCommand),
    /// Log in and out of Slack teams
    #[clap(subcommand)]
    Auth(auth::AuthCommand),
}

impl GlobalArgs {
    /// Applies the flags on top of the defaults of the environment.
    pub fn apply(&self, config: Config) -> Config {
        let mut config = config.with_experiments(&self.experiments);

        if let Some(api_host) = self.api_host.as_deref().filter(|host| !host.is_empty()) {
            config.api_host = api_host.trim_end_matches('/').to_string();
        }
        config.force = self.force;
        config.team = self.team.clone();
        config.app = self.app.clone();
        config.token = self.token.clone();
        config.no_prompt = self.no_prompt;
        config.skip_local_fs = self.skip_local_fs;
        config
    }
}

impl Cli {
    /// Runs the command against Slack and the terminal. Returns the lines
    /// to print on stdout.
    pub async fn run(self) -> Result<Vec<String>, AppError> {
        let config = self.global.apply(Config::from_env()?);

        let http_client = Arc::new(Box::new(build_http_client()?));
        let clients = Clients::new(
            config.clone(),
            Arc::new(Slack::new(http_client, &config.api_host)),
            Arc::new(TerminalPrompter::new(config.no_prompt)),
            Arc::new(TerminalObserver),
        );

        self.command.run(&clients).await
    }
}

impl Command {
    pub async fn run(self, clients: &Clients) -> Result<Vec<String>, AppError> {
        match self {
            Command::App(command) => command.run(clients).await,
            Command::Auth(command) => command.run(clients).await,
        }
    }
}
