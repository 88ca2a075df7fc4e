pub mod chunk;
pub mod config;
pub mod init;
pub mod reveal;
pub mod session;
pub mod store;
pub mod workspace;

use anyhow::Context as _;
use std::path::Path;
use std::sync::Arc;
use wizard_core::config::Config;
use wizard_core::paths;
use wizard_core::workspace::{WorkspaceRegistry, WorkspaceStore};
use wizard_core::WizardError;

/// Loaded config plus the registry over the persisted store.
pub(crate) struct Context {
    pub config: Config,
    pub registry: WorkspaceRegistry,
}

impl Context {
    /// Requires an initialised root (`wizard init`).
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        if !paths::wizard_dir(root).is_dir() {
            return Err(WizardError::NotInitialized.into());
        }
        let config = Config::load(root).context("failed to load config")?;
        let registry = WorkspaceRegistry::open(root, &config.storage);
        Ok(Self {
            config,
            registry,
        })
    }

    pub fn active_store(&self) -> anyhow::Result<Arc<WorkspaceStore>> {
        self.registry
            .bootstrap()
            .context("no active workspace: run 'wizard workspace use <id>'")
    }
}

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}

pub(crate) fn read_text(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}
