//! Request and response envelopes of the session HTTP API.

use serde::{Deserialize, Serialize};
use wizard_core::api::ProfileOption;
use wizard_core::session::WizardSession;

#[derive(Debug, Serialize)]
pub(crate) struct StartRequest<'a> {
    pub workspace_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionEnvelope {
    #[serde(default)]
    pub session: Option<WizardSession>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfilesEnvelope {
    #[serde(default)]
    pub profiles: Vec<ProfileOption>,
}

/// Error body. Older servers send only `error` or `message` text.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub expected_step: Option<u32>,
    #[serde(default)]
    pub current_step: Option<u32>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
