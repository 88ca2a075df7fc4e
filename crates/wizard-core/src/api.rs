//! Contract of the remote session API.
//!
//! The core only depends on [`SessionApi`]; the HTTP implementation lives in
//! the `wizard-client` crate and tests use in-memory fakes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::session::{FieldValue, WizardSession};
use crate::types::{FlowKind, NextAction};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One step's answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    pub step: u32,
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub completed_steps: u32,
    pub total_steps: u32,
}

/// A generated content fragment (also the unit of document export).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceResponse {
    pub session: WizardSession,
    #[serde(default)]
    pub next_action: NextAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<DocumentSection>,
}

impl AdvanceResponse {
    /// Reject responses that belong to a different flow or session, and
    /// fold the top-level `next_action` into the session.
    pub fn validate(mut self, flow: FlowKind, session_id: &str) -> Result<Self, ApiError> {
        if self.session.flow != flow {
            return Err(ApiError::Decode(format!(
                "expected a {flow} session, got {}",
                self.session.flow
            )));
        }
        if self.session.id != session_id {
            return Err(ApiError::Decode(format!(
                "response is for session '{}', not '{session_id}'",
                self.session.id
            )));
        }
        if self.session.next_action.as_str().is_empty() && !self.next_action.as_str().is_empty() {
            self.session.next_action = self.next_action.clone();
        }
        Ok(self)
    }
}

/// A selectable entity offered by a step (e.g. a saved client profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOption {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// SessionApi
// ---------------------------------------------------------------------------

pub trait SessionApi: Send + Sync {
    fn start_session(
        &self,
        flow: FlowKind,
        workspace_id: &str,
    ) -> impl Future<Output = Result<WizardSession, ApiError>> + Send;

    /// The server's current session for `{flow, workspace}`, if any.
    fn fetch_session(
        &self,
        flow: FlowKind,
        workspace_id: &str,
    ) -> impl Future<Output = Result<Option<WizardSession>, ApiError>> + Send;

    fn advance_step(
        &self,
        flow: FlowKind,
        session_id: &str,
        payload: &StepPayload,
    ) -> impl Future<Output = Result<AdvanceResponse, ApiError>> + Send;

    fn fetch_options(
        &self,
        workspace_id: &str,
    ) -> impl Future<Output = Result<Vec<ProfileOption>, ApiError>> + Send;

    fn export_document(
        &self,
        flow: FlowKind,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send;
}

// ---------------------------------------------------------------------------
// Legacy conflict messages
// ---------------------------------------------------------------------------

fn conflict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)expected step\s+(\d+)\D+?current step is\s+(\d+)")
            .expect("conflict regex is valid")
    })
}

fn current_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)current step is\s+(\d+)").expect("current-step regex is valid"))
}

/// Recognise servers that still report step conflicts as free text
/// ("Expected step 2 but current step is 3").
///
/// `expected_hint` fills in the expected step when the message only names
/// the current one.
pub fn parse_conflict_message(message: &str, expected_hint: Option<u32>) -> Option<ApiError> {
    if let Some(c) = conflict_re().captures(message) {
        let expected = c[1].parse().ok()?;
        let current = c[2].parse().ok()?;
        return Some(ApiError::StepConflict { expected, current });
    }
    let c = current_only_re().captures(message)?;
    let current = c[1].parse().ok()?;
    Some(ApiError::StepConflict {
        expected: expected_hint?,
        current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_conflict_message() {
        assert_eq!(
            parse_conflict_message("Expected step 2 but current step is 3", None),
            Some(ApiError::StepConflict {
                expected: 2,
                current: 3
            })
        );
    }

    #[test]
    fn parses_current_only_with_hint() {
        assert_eq!(
            parse_conflict_message("Invalid step: current step is 3", Some(2)),
            Some(ApiError::StepConflict {
                expected: 2,
                current: 3
            })
        );
        assert_eq!(parse_conflict_message("current step is 3", None), None);
    }

    #[test]
    fn ignores_unrelated_messages() {
        assert_eq!(parse_conflict_message("internal server error", Some(2)), None);
    }

    #[test]
    fn validate_rejects_foreign_session() {
        let resp = AdvanceResponse {
            session: WizardSession::new("other", FlowKind::Ava),
            next_action: NextAction::default(),
            progress: None,
            message: None,
            sections: vec![],
        };
        assert!(matches!(
            resp.clone().validate(FlowKind::Ava, "s1"),
            Err(ApiError::Decode(_))
        ));
        assert!(matches!(
            resp.validate(FlowKind::Vera, "other"),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn validate_folds_next_action_into_session() {
        let resp = AdvanceResponse {
            session: WizardSession::new("s1", FlowKind::Ava),
            next_action: NextAction::new("step1_complete"),
            progress: None,
            message: None,
            sections: vec![],
        };
        let ok = resp.validate(FlowKind::Ava, "s1").unwrap();
        assert_eq!(ok.session.next_action.completed_step(), Some(1));
    }

    #[test]
    fn advance_response_deserializes_minimal_body() {
        let json = r#"{
            "session": {"id": "s1", "flow": "margo", "current_step": 2},
            "next_action": "step1_complete",
            "message": "Great, let's keep going."
        }"#;
        let resp: AdvanceResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.session.current_step, 2);
        assert!(resp.sections.is_empty());
        assert_eq!(resp.message.as_deref(), Some("Great, let's keep going."));
    }
}
