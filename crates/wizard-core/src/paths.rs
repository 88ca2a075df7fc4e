use crate::error::{Result, WizardError};
use crate::types::{FlowKind, ToolKey};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const WIZARD_DIR: &str = ".wizard";
pub const CONFIG_FILE: &str = ".wizard/config.yaml";
pub const STORE_DIR: &str = ".wizard/store";

pub fn wizard_dir(root: &Path) -> PathBuf {
    root.join(WIZARD_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_dir(root: &Path) -> PathBuf {
    root.join(STORE_DIR)
}

// ---------------------------------------------------------------------------
// Persisted key layout
// ---------------------------------------------------------------------------

/// Bootstrap key holding the active workspace selection.
pub const ACTIVE_WORKSPACE_KEY: &str = "workspace.active";

/// Prefix for disposable cached responses (profile option lists etc.).
pub const CACHE_PREFIX: &str = "cache.";

pub fn session_key(flow: FlowKind, workspace_id: &str) -> String {
    format!("wizard.{}.{}", flow.as_str(), workspace_id)
}

pub fn options_cache_key(workspace_id: &str) -> String {
    format!("{CACHE_PREFIX}options.{workspace_id}")
}

pub fn amplifier_form_key(tool: ToolKey) -> String {
    format!("amplifier.form.{}", tool.as_str())
}

pub fn amplifier_scroll_key(tool: ToolKey) -> String {
    format!("amplifier.scroll.{}", tool.as_str())
}

/// Whether `key` holds data owned by `workspace_id`.
///
/// Workspace-owned keys end in `.<workspace_id>`.
pub fn key_belongs_to(key: &str, workspace_id: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, tail)| tail == workspace_id)
        .unwrap_or(false)
}

pub fn validate_workspace_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && !id.contains(['.', '/', '\\'])
        && id.chars().all(|c| !c.is_whitespace());
    if ok {
        Ok(())
    } else {
        Err(WizardError::InvalidWorkspace(id.to_string()))
    }
}
