use std::{fmt, sync::Mutex, time::Duration};

use crate::types::InstallState;

/// Progress reported by the install and link flows.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallEvent {
    ManifestCreating { app_name: String, team_name: String },
    ManifestUpdated { app_name: String, team_name: String },
    InstallStarted { app_name: String, team_name: String },
    IconUpdated { path: String },
    IconFailed { error: String },
    TokenMismatch { variable: String },
    Notice { title: String, details: Vec<String> },
    Warning { title: String, details: Vec<String> },
    InstallIncomplete { state: InstallState },
    Completed { elapsed: Duration },
}

impl fmt::Display for InstallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallEvent::ManifestCreating { app_name, team_name } => {
                write!(f, "Creating app manifest for \"{}\" in \"{}\"", app_name, team_name)
            }
            InstallEvent::ManifestUpdated { app_name, team_name } => {
                write!(f, "Updated app manifest for \"{}\" in \"{}\"", app_name, team_name)
            }
            InstallEvent::InstallStarted { app_name, team_name } => {
                write!(f, "Installing \"{}\" app to \"{}\"", app_name, team_name)
            }
            InstallEvent::IconUpdated { path } => write!(f, "Updated app icon: {}", path),
            InstallEvent::IconFailed { error } => write!(f, "Error updating app icon: {}", error),
            InstallEvent::TokenMismatch { variable } => write!(
                f,
                "The environment variable \"{}\" already holds a different token, the existing value is kept",
                variable
            ),
            InstallEvent::Notice { title, details } | InstallEvent::Warning { title, details } => {
                write!(f, "{}", title)?;
                for detail in details {
                    write!(f, "\n   {}", detail)?;
                }
                Ok(())
            }
            InstallEvent::InstallIncomplete { state } => match state {
                InstallState::RequestPending => write!(
                    f,
                    "Your request to install the app is pending\n   \
                     You will receive a Slackbot message after an admin has reviewed your request\n   \
                     Once your request is approved, complete installation by re-running `slack-app app install`"
                ),
                InstallState::RequestCancelled => write!(f, "Your request to install the app has been cancelled"),
                InstallState::RequestNotSent => write!(
                    f,
                    "You've declined to send a request to an admin\n   \
                     Please submit a request to install or update your app"
                ),
                InstallState::Success => write!(f, "App installed"),
            },
            InstallEvent::Completed { elapsed } => write!(f, "Finished in {:.1}s", elapsed.as_secs_f64()),
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &InstallEvent);
}

/// Writes events to the terminal, warnings on stderr.
pub struct TerminalObserver;

impl ProgressObserver for TerminalObserver {
    fn on_event(&self, event: &InstallEvent) {
        match event {
            InstallEvent::Warning { .. } | InstallEvent::IconFailed { .. } | InstallEvent::TokenMismatch { .. } => {
                eprintln!("Warning: {}", event)
            }
            _ => println!("{}", event),
        }
    }
}

/// Keeps every event, used by tests and by callers that render later.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<InstallEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<InstallEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: &InstallEvent) {
        tracing::debug!(event = %event, "Install progress");
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
