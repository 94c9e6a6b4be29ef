use derive_more::Display;
use serde_derive::{Deserialize, Serialize};

/// Outcome of installing an app to a workspace, including the admin approval gate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallState {
    #[display("SUCCESS")]
    Success,
    #[display("REQUEST_PENDING")]
    RequestPending,
    #[display("REQUEST_CANCELLED")]
    RequestCancelled,
    #[display("REQUEST_NOT_SENT")]
    RequestNotSent,
}

impl InstallState {
    pub fn is_success(&self) -> bool {
        *self == InstallState::Success
    }
}
