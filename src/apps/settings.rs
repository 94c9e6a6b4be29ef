use reqwest::Url;

use crate::errors::AppError;

/// Address of app settings for the API host, such as
/// `https://api.slack.com/apps/A0123`. Without an app ID it lists every app.
pub fn settings_url(api_host: &str, app_id: &str) -> Result<String, AppError> {
    let mut url = Url::parse(api_host)
        .map_err(|err| AppError::UnexpectedError(format!("Invalid API host `{}`: {}", api_host, err)))?;

    let host = url
        .host_str()
        .map(|host| format!("api.{}", host))
        .ok_or_else(|| AppError::UnexpectedError(format!("No host in `{}`", api_host)))?;
    url.set_host(Some(&host))
        .map_err(|err| AppError::UnexpectedError(format!("Invalid API host `{}`: {}", api_host, err)))?;

    let base = url.as_str().trim_end_matches('/');
    Ok(if app_id.is_empty() {
        format!("{}/apps", base)
    } else {
        format!("{}/apps/{}", base, app_id)
    })
}

/// Opens the page in a browser. Failing to open it is not an error since
/// the address is printed as well.
pub fn open_settings(url: &str) {
    if let Err(err) = webbrowser::open(url) {
        tracing::debug!(url, error = %err, "Failed to open a browser");
    }
}
