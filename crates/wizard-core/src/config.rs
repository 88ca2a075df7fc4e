use crate::error::Result;
use crate::kv::DEFAULT_HISTORY_KEEP;
use crate::paths;
use crate::reveal::{RevealMode, RevealOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer token. The token itself is
    /// never written to the config file.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_token_env() -> String {
    "WIZARD_API_TOKEN".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
        }
    }
}

impl ApiConfig {
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Byte budget for the persisted store; `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<usize>,
    #[serde(default = "default_history_keep")]
    pub history_keep: usize,
}

fn default_history_keep() -> usize {
    DEFAULT_HISTORY_KEEP
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            quota_bytes: None,
            history_keep: default_history_keep(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reveal: RevealOptions,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            reveal: RevealOptions::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<root>/.wizard/config.yaml`; a missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        let Some(data) = crate::io::read_optional(&path)? else {
            return Ok(Self::new());
        };
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            warn(
                WarnLevel::Error,
                format!("api.base_url '{url}' must start with http:// or https://"),
            );
        }
        if self.api.token_env.trim().is_empty() {
            warn(WarnLevel::Warning, "api.token_env is empty; requests will be unauthenticated".into());
        }

        if self.storage.quota_bytes == Some(0) {
            warn(WarnLevel::Error, "storage.quota_bytes is 0; nothing can be persisted".into());
        }
        if self.storage.history_keep == 0 {
            warn(
                WarnLevel::Warning,
                "storage.history_keep is 0; chat history is dropped on the first quota error".into(),
            );
        }

        if self.reveal.min_chunk_length == 0 {
            warn(
                WarnLevel::Warning,
                "reveal.min_chunk_length is 0; every sentence becomes its own chunk".into(),
            );
        }
        if self.reveal.mode == RevealMode::Typewriter && self.reveal.typewriter_tick_ms == 0 {
            warn(
                WarnLevel::Warning,
                "reveal.typewriter_tick_ms is 0; typewriter mode will not animate".into(),
            );
        }
        if self.reveal.stagger_ms > 10_000 {
            warn(
                WarnLevel::Warning,
                format!("reveal.stagger_ms={} (>10s is unusual)", self.reveal.stagger_ms),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
