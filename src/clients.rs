use std::sync::Arc;

use crate::{
    config::Config,
    db::{AppRecordStore, CredentialStore, ManifestCache, ProjectConfig},
    hooks::ProjectHooks,
    progress::{InstallEvent, ProgressObserver},
    prompts::Prompter,
    service_provider::slack::SlackApi,
};

/// Collaborators handed to every command.
pub struct Clients {
    pub config: Config,
    pub api: Arc<dyn SlackApi>,
    pub prompter: Arc<dyn Prompter>,
    pub observer: Arc<dyn ProgressObserver>,

    pub apps: AppRecordStore,
    pub credentials: CredentialStore,
    pub project_config: ProjectConfig,
    pub manifest_cache: ManifestCache,
    pub hooks: ProjectHooks,
}

impl Clients {
    pub fn new(
        config: Config,
        api: Arc<dyn SlackApi>,
        prompter: Arc<dyn Prompter>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Clients {
        Clients {
            apps: AppRecordStore::new(&config.project_dir).with_protected_dir(config.system_dir.clone()),
            credentials: CredentialStore::new(&config.system_dir),
            project_config: ProjectConfig::new(&config.project_dir),
            manifest_cache: ManifestCache::new(&config.project_dir),
            hooks: ProjectHooks::new(&config.project_dir),
            config,
            api,
            prompter,
            observer,
        }
    }

    pub fn emit(&self, event: InstallEvent) {
        self.observer.on_event(&event);
    }
}
