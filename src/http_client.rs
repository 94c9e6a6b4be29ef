use std::time::Duration;

use reqwest::Client;

use crate::errors::AppError;

pub fn build_http_client() -> Result<Client, AppError> {
    let client = Client::builder()
        .user_agent(concat!("slack-app-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .build()?;

    Ok(client)
}
