use chrono::{DateTime, Utc};
use derive_more::Display;
use serde_derive::{Deserialize, Serialize};

/// Tokens expiring within this many seconds are rotated before use.
const ROTATION_WINDOW_SECONDS: i64 = 60 * 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AuthLevel {
    #[display("organization")]
    Organization,
    #[display("workspace")]
    Workspace,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackAuth {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default)]
    pub team_domain: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enterprise_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_host: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
    #[serde(rename = "exp", default, skip_serializing_if = "is_zero")]
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_enterprise_install: bool,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !value
}

impl SlackAuth {
    pub fn auth_level(&self) -> AuthLevel {
        if self.is_enterprise_install {
            AuthLevel::Organization
        } else {
            AuthLevel::Workspace
        }
    }

    pub fn should_rotate_token(&self, now: DateTime<Utc>) -> bool {
        if self.expires_at == 0 || self.refresh_token.is_empty() {
            return false;
        }

        self.expires_at - now.timestamp() <= ROTATION_WINDOW_SECONDS
    }
}
