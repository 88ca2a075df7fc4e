use thiserror::Error;
use wizard_core::api::parse_conflict_message;
use wizard_core::ApiError;

use crate::wire::ErrorBody;

/// Failures inside the HTTP layer, before they are mapped onto the
/// transport-independent [`ApiError`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode response body: {source}\n  body: {body}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Step the request was submitting, used to complete legacy
        /// conflict messages that only name the current step.
        expected_step: Option<u32>,
    },
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() => ApiError::Decode(e.to_string()),
            ClientError::Http(e) => ApiError::Transport(e.to_string()),
            ClientError::Decode { source, .. } => ApiError::Decode(source.to_string()),
            ClientError::Status {
                status,
                body,
                expected_step,
            } => map_status(status, &body, expected_step),
        }
    }
}

fn map_status(status: u16, body: &str, expected_step: Option<u32>) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    let conflict_code = parsed.code.as_deref() == Some("step_conflict");
    if conflict_code || status == 409 {
        if let Some(current) = parsed.current_step {
            return ApiError::StepConflict {
                expected: parsed.expected_step.or(expected_step).unwrap_or(current),
                current,
            };
        }
    }
    if let Some(conflict) = parse_conflict_message(&message, expected_step) {
        return conflict;
    }

    match status {
        404 => ApiError::SessionNotFound(message),
        _ => ApiError::Server { status, message },
    }
}
