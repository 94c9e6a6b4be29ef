pub mod apps;
pub mod auth;
pub mod clients;
pub mod commands;
pub mod config;
pub mod db;
pub mod errors;
pub mod hooks;
mod http_client;
pub mod progress;
pub mod prompts;
pub mod service_provider;
pub mod types;

pub use http_client::build_http_client;
