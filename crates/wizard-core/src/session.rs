use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields;
use crate::kv::Truncate;
use crate::types::{FlowKind, NextAction};

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A named answer: free text, a list of selected ids, or structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Selection(Vec<String>),
    Structured(serde_json::Value),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value counts as an answer.
    pub fn is_answered(&self) -> bool {
        match self {
            FieldValue::Text(s) => !s.trim().is_empty(),
            FieldValue::Selection(ids) => !ids.is_empty(),
            FieldValue::Structured(v) => !v.is_null(),
        }
    }
}

// ---------------------------------------------------------------------------
// WizardSession
// ---------------------------------------------------------------------------

/// The server's view of one user's progress through a guided flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    pub id: String,
    pub flow: FlowKind,
    pub current_step: u32,
    #[serde(default)]
    pub next_action: NextAction,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub completed: BTreeMap<u32, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WizardSession {
    pub fn new(id: impl Into<String>, flow: FlowKind) -> Self {
        Self {
            id: id.into(),
            flow,
            current_step: 1,
            next_action: NextAction::default(),
            fields: BTreeMap::new(),
            completed: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn is_step_completed(&self, step: u32) -> bool {
        self.completed.get(&step).copied().unwrap_or(false)
            || self.current_step > step
            || self.next_action.completed_step() == Some(step)
    }

    pub fn mark_completed(&mut self, step: u32) {
        self.completed.insert(step, true);
    }

    /// Move `current_step` forward to `step`; never backwards.
    pub fn advance_to(&mut self, step: u32) {
        self.current_step = self.current_step.max(step);
    }

    pub fn answer(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).filter(|v| v.is_answered())
    }
}

// ---------------------------------------------------------------------------
// Chat history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Assistant,
    User,
}

/// One bubble in the conversational transcript shown alongside a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub step: u32,
    pub text: String,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// StepDrafts
// ---------------------------------------------------------------------------

/// Unsaved edits keyed by step index, then field key.
pub type StepDrafts = BTreeMap<u32, BTreeMap<String, FieldValue>>;

// ---------------------------------------------------------------------------
// FlowRecord (persisted per {flow, workspace})
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<WizardSession>,
    #[serde(default)]
    pub drafts: StepDrafts,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Truncate for FlowRecord {
    /// Keeps the most recent `keep` messages.
    fn truncate_history(&mut self, keep: usize) -> bool {
        if self.messages.len() <= keep {
            return false;
        }
        let excess = self.messages.len() - keep;
        self.messages.drain(..excess);
        true
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub session: WizardSession,
    pub drafts: StepDrafts,
    /// The server reported a lower step than already seen locally.
    pub stale_server: bool,
}

/// Merge an authoritative server session into local state.
///
/// The server wins for every field it has a value for, and its drafts are
/// dropped. `current_step` never regresses: a lower server step is kept at
/// the local value and flagged as stale. Completion flags are unioned so a
/// step known to be done stays done.
pub fn reconcile(
    local: Option<&WizardSession>,
    drafts: &StepDrafts,
    server: WizardSession,
) -> Reconciled {
    let mut session = server;
    let mut stale_server = false;

    if let Some(local) = local.filter(|l| l.id == session.id) {
        if local.current_step > session.current_step {
            stale_server = true;
            session.current_step = local.current_step;
        }
        for (step, done) in &local.completed {
            if *done {
                session.completed.insert(*step, true);
            }
        }
    }

    let mut merged: StepDrafts = BTreeMap::new();
    for (step, values) in drafts {
        if session.is_step_completed(*step) {
            continue;
        }
        let kept: BTreeMap<String, FieldValue> = values
            .iter()
            .filter(|(key, _)| session.answer(key).is_none())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !kept.is_empty() {
            merged.insert(*step, kept);
        }
    }

    Reconciled {
        session,
        drafts: merged,
        stale_server,
    }
}

/// Seed drafts for `step` from the session's confirmed answers so an edit
/// form opens pre-filled.
pub fn drafts_from_session(session: &WizardSession, step: u32) -> BTreeMap<String, FieldValue> {
    fields::fields_for_step(session.flow, step)
        .filter_map(|spec| {
            session
                .answer(spec.key)
                .map(|v| (spec.key.to_string(), v.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
