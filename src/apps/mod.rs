pub mod external_auth;
pub mod install;
pub mod link;
pub mod list;
pub mod remove;
pub mod select;
pub mod settings;

pub use install::{InstallOptions, InstallOutcome, InstallReconciler};
pub use link::{LinkOptions, LinkReconciler};
pub use select::{AppEnvironment, SelectedApp};
