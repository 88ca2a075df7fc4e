use thiserror::Error;

use crate::types::FlowKind;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("not initialized: run 'wizard init'")]
    NotInitialized,

    #[error("invalid workspace id '{0}': must be non-empty and contain no '.' or '/'")]
    InvalidWorkspace(String),

    #[error("invalid flow: {0}")]
    InvalidFlow(String),

    #[error("invalid tool key: {0}")]
    InvalidToolKey(String),

    #[error("invalid reveal mode: {0}")]
    InvalidRevealMode(String),

    #[error("unknown step {step} for flow {flow}")]
    UnknownStep { flow: FlowKind, step: u32 },

    #[error("no active session for flow {0}")]
    NoSession(FlowKind),

    #[error("nothing to export: no document sections")]
    EmptyDocument,

    #[error("download unavailable: server export failed ({server}) and local export failed ({local})")]
    ExportUnavailable { server: String, local: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WizardError>;

/// Failure modes of a storage backend write.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("storage quota exceeded writing '{key}' ({needed} bytes, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KvError {
    pub fn is_quota(&self) -> bool {
        matches!(self, KvError::QuotaExceeded { .. })
    }
}

/// Errors surfaced by the remote session API.
///
/// `StepConflict` is the structured form of "expected step K but current
/// step is M": the server has already moved past the step being submitted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("step conflict: expected step {expected} but current step is {current}")]
    StepConflict { expected: u32, current: u32 },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
