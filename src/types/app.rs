use derive_more::Display;
use serde_derive::{Deserialize, Serialize};

pub const GRANT_ALL_ORG_WORKSPACES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum InstallStatus {
    #[default]
    #[display("Unknown")]
    Unknown,
    #[display("Installed")]
    Installed,
    #[display("Uninstalled")]
    Uninstalled,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Display)]
#[display("{} ({})", workspace_domain, workspace_id)]
pub struct EnterpriseGrant {
    pub workspace_id: String,
    pub workspace_domain: String,
}

/// An app saved to the project for one team, either deployed or run locally.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct App {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enterprise_id: String,

    /// Older project files stored the team domain under "name".
    #[serde(rename = "name", default, skip_serializing_if = "String::is_empty")]
    pub legacy_name: String,

    #[serde(rename = "IsDev", default, skip_serializing_if = "is_false")]
    pub is_dev: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub team_domain: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub team_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,

    #[serde(skip)]
    pub install_status: InstallStatus,

    #[serde(skip)]
    pub enterprise_grants: Vec<EnterpriseGrant>,

    #[serde(skip)]
    pub(crate) is_new: bool,
}

fn is_false(value: &bool) -> bool {
    !value
}

impl App {
    /// An app that has not been written to the project yet.
    pub fn new_for_team(team_id: &str) -> App {
        App { team_id: team_id.to_string(), is_new: true, ..Default::default() }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn mark_saved(&mut self) {
        self.is_new = false;
    }

    pub fn environment(&self) -> &'static str {
        if self.is_dev {
            "local"
        } else {
            "deployed"
        }
    }

    pub fn is_enterprise_workspace_app(&self) -> bool {
        is_app_id(&self.app_id)
            && is_workspace_team_id(&self.team_id)
            && is_enterprise_team_id(&self.enterprise_id)
            && self.team_id != self.enterprise_id
    }

    pub fn is_enterprise_app(&self) -> bool {
        is_app_id(&self.app_id)
            && is_enterprise_team_id(&self.team_id)
            && is_enterprise_team_id(&self.enterprise_id)
            && self.team_id == self.enterprise_id
    }
}

/// Loose check of the app ID shape, server side rules may differ.
pub fn is_app_id(value: &str) -> bool {
    value.starts_with('A') && value.to_uppercase() == value
}

pub fn is_app_flag_local(value: &str) -> bool {
    value == "local"
}

pub fn is_app_flag_deploy(value: &str) -> bool {
    value == "deploy" || value == "deployed"
}

pub fn is_app_flag_environment(value: &str) -> bool {
    is_app_flag_local(value) || is_app_flag_deploy(value)
}

pub fn is_enterprise_team_id(value: &str) -> bool {
    value.starts_with('E')
}

pub fn is_workspace_team_id(value: &str) -> bool {
    value.starts_with('T')
}
