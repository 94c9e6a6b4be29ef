mod app;
mod auth;
mod install_state;
mod manifest;

pub use app::*;
pub use auth::*;
pub use install_state::InstallState;
pub use manifest::*;
