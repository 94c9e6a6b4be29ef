use derive_more::Display;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

const LOCAL_RUN_NAME_TAG: &str = "(local)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FunctionRuntime {
    #[display("local")]
    LocallyRun,
    #[display("remote")]
    Remote,
    #[display("slack")]
    SlackHosted,
}

impl FunctionRuntime {
    pub fn parse(value: &str) -> Option<FunctionRuntime> {
        match value {
            "local" => Some(FunctionRuntime::LocallyRun),
            "remote" => Some(FunctionRuntime::Remote),
            "slack" => Some(FunctionRuntime::SlackHosted),
            _ => None,
        }
    }
}

/// App manifest. Only the fields this tool reads or adjusts are typed, the
/// rest is carried through untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AppManifest {
    #[serde(default)]
    pub display_information: DisplayInformation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Features>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_config: Option<OAuthConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing_domains: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<AppSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DisplayInformation {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Features {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_user: Option<BotUser>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BotUser {
    #[serde(default)]
    pub display_name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OAuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<OAuthScopes>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OAuthScopes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bot: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_runtime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_mode_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactivity: Option<Interactivity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_subscriptions: Option<EventSubscriptions>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Interactivity {
    #[serde(default)]
    pub is_enabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_menu_options_url: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EventSubscriptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_url: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppManifest {
    pub fn function_runtime(&self) -> Option<FunctionRuntime> {
        self.settings
            .as_ref()
            .and_then(|settings| settings.function_runtime.as_deref())
            .and_then(FunctionRuntime::parse)
    }

    pub fn is_function_runtime_slack_hosted(&self) -> bool {
        self.function_runtime() == Some(FunctionRuntime::SlackHosted)
    }

    pub fn bot_scopes(&self) -> Vec<String> {
        self.oauth_config
            .as_ref()
            .and_then(|oauth| oauth.scopes.as_ref())
            .map(|scopes| scopes.bot.clone())
            .unwrap_or_default()
    }

    pub fn outgoing_domains(&self) -> Vec<String> {
        self.outgoing_domains.clone().unwrap_or_default()
    }

    /// Tags the app and bot names so local apps stand out in the workspace.
    pub fn append_local_to_display_name(&mut self) {
        self.display_information.name = local_run_display_name(&self.display_information.name);

        if let Some(bot_user) = self.features.as_mut().and_then(|features| features.bot_user.as_mut()) {
            bot_user.display_name = local_run_display_name(&bot_user.display_name);
        }
    }

    /// Defaults for apps that run on the developer's machine over socket mode.
    pub fn configure_local_runtime(&mut self) {
        let settings = self.settings.get_or_insert_with(AppSettings::default);
        settings.function_runtime = Some(FunctionRuntime::LocallyRun.to_string());
        settings.socket_mode_enabled = Some(true);

        let interactivity = settings.interactivity.get_or_insert_with(Interactivity::default);
        interactivity.is_enabled = true;
        interactivity.request_url = String::new();
        interactivity.message_menu_options_url = String::new();

        let event_subscriptions = settings.event_subscriptions.get_or_insert_with(EventSubscriptions::default);
        event_subscriptions.request_url = String::new();
    }

    /// Points request URLs at the platform for apps hosted by Slack.
    pub fn configure_hosted_runtime(&mut self, api_host: &str) {
        let settings = self.settings.get_or_insert_with(AppSettings::default);
        settings.function_runtime = Some(FunctionRuntime::SlackHosted.to_string());

        let interactivity = settings.interactivity.get_or_insert_with(Interactivity::default);
        interactivity.is_enabled = true;
        interactivity.request_url = api_host.to_string();
        interactivity.message_menu_options_url = api_host.to_string();

        let event_subscriptions = settings.event_subscriptions.get_or_insert_with(EventSubscriptions::default);
        event_subscriptions.request_url = api_host.to_string();
    }
}

pub fn local_run_display_name(name: &str) -> String {
    format!("{} {}", name, LOCAL_RUN_NAME_TAG)
}
