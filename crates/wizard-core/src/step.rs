//! Per-step controller: derives the current question, validates answers,
//! submits them and folds the server's answer back into the store.
//!
//! ```text
//! Locked ──(previous step done)──▶ Awaiting ──submit──▶ Submitting ──▶ Completed
//!                                     ▲                     │
//!                                     └── more questions ───┘
//!                                     └── transient error ──┘
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::api::{DocumentSection, Progress, SessionApi, StepPayload};
use crate::error::{ApiError, Result, WizardError};
use crate::fields::{self, FieldError, FieldSpec};
use crate::session::{ChatMessage, FieldValue, Speaker};
use crate::types::FlowKind;
use crate::workspace::WorkspaceStore;

pub const ALREADY_COMPLETED_NOTICE: &str = "This step was already completed. Picking up where you left off.";

// ---------------------------------------------------------------------------
// StepState / SubmitOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// A previous step is incomplete (or there is no session); not rendered.
    Locked,
    /// Waiting for an answer to `question`. `None` means every field has an
    /// answer but the server has not closed the step yet.
    Awaiting { question: Option<&'static FieldSpec> },
    Submitting,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// This submit closed the step.
    Completed {
        current_step: u32,
        message: Option<String>,
        progress: Option<Progress>,
        sections: Vec<DocumentSection>,
    },
    /// Accepted; another question in this step is next.
    NextQuestion {
        question: &'static FieldSpec,
        message: Option<String>,
    },
    /// The server had already moved past this step. Neutral, not an error.
    AlreadyCompleted { current_step: u32, notice: String },
    /// Validation failed; nothing was sent.
    Rejected(FieldError),
    /// Another submit for this step is in flight; nothing was sent.
    Busy,
    /// Dismissible failure; the answer is kept as a draft for retry.
    Failed { message: String, retryable: bool },
    /// Interaction cannot continue (no session, locked step, ...).
    Blocked { message: String },
}

impl SubmitOutcome {
    /// Whether this outcome newly completed the step.
    pub fn is_new_completion(&self) -> bool {
        matches!(self, SubmitOutcome::Completed { .. })
    }
}

// ---------------------------------------------------------------------------
// StepController
// ---------------------------------------------------------------------------

pub struct StepController<A> {
    flow: FlowKind,
    step: u32,
    store: Arc<WorkspaceStore>,
    api: Arc<A>,
    submitting: AtomicBool,
}

/// Clears the in-flight flag however the submit future ends.
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: SessionApi> StepController<A> {
    pub fn new(
        flow: FlowKind,
        step: u32,
        store: Arc<WorkspaceStore>,
        api: Arc<A>,
    ) -> Result<Self> {
        if !fields::has_step(flow, step) {
            return Err(WizardError::UnknownStep { flow, step });
        }
        Ok(Self {
            flow,
            step,
            store,
            api,
            submitting: AtomicBool::new(false),
        })
    }

    pub fn flow(&self) -> FlowKind {
        self.flow
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    pub fn state(&self) -> StepState {
        let Some(session) = self.store.session(self.flow) else {
            return StepState::Locked;
        };
        if session.is_step_completed(self.step) {
            return StepState::Completed;
        }
        if self.step > session.current_step {
            return StepState::Locked;
        }
        if self.is_submitting() {
            return StepState::Submitting;
        }
        StepState::Awaiting {
            question: self.current_question(),
        }
    }

    /// First field of this step without a confirmed server answer.
    pub fn current_question(&self) -> Option<&'static FieldSpec> {
        let session = self.store.session(self.flow);
        fields::fields_for_step(self.flow, self.step).find(|spec| {
            session
                .as_ref()
                .and_then(|s| s.answer(spec.key))
                .is_none()
        })
    }

    /// Record an unsaved edit for a field of this step.
    pub fn set_draft(&self, field: &str, value: FieldValue) {
        self.store.set_draft(self.flow, self.step, field, value);
    }

    pub fn draft(&self, field: &str) -> Option<FieldValue> {
        self.store.draft(self.flow, self.step, field)
    }

    /// Answer the current question.
    ///
    /// The target field is resolved at call time, so repeating a call after
    /// it succeeded answers the next question of the step. Retries of a
    /// specific answer should go through [`submit_field`](Self::submit_field).
    pub async fn submit(&self, value: FieldValue) -> SubmitOutcome {
        match self.state() {
            StepState::Completed => return self.already_completed(),
            StepState::Locked => return self.locked(),
            _ => {}
        }
        match self.current_question() {
            Some(spec) => self.submit_field(spec.key, value).await,
            None => SubmitOutcome::Blocked {
                message: "Every question in this step is answered; waiting for the server."
                    .to_string(),
            },
        }
    }

    /// Answer a specific field of this step.
    pub async fn submit_field(&self, field: &str, value: FieldValue) -> SubmitOutcome {
        match self.state() {
            StepState::Completed => return self.already_completed(),
            StepState::Locked => return self.locked(),
            _ => {}
        }

        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(flow = %self.flow, step = self.step, "submit ignored: already in flight");
            return SubmitOutcome::Busy;
        }
        let _guard = SubmitGuard(&self.submitting);

        let Some(spec) = fields::field(self.flow, field).filter(|s| s.step == self.step) else {
            return SubmitOutcome::Blocked {
                message: format!("'{field}' is not a question in step {}.", self.step),
            };
        };
        if let Err(e) = fields::validate(spec, &value) {
            return SubmitOutcome::Rejected(e);
        }

        self.set_draft(spec.key, value.clone());

        let Some(session) = self.store.session(self.flow) else {
            return SubmitOutcome::Blocked {
                message: "No active session. Restart this flow to continue.".to_string(),
            };
        };

        let payload = StepPayload {
            step: self.step,
            fields: BTreeMap::from([(spec.key.to_string(), value.clone())]),
        };

        tracing::info!(flow = %self.flow, step = self.step, field = spec.key, "submitting answer");
        let result = self
            .api
            .advance_step(self.flow, &session.id, &payload)
            .await
            .and_then(|resp| resp.validate(self.flow, &session.id));

        match result {
            Ok(resp) => {
                let reconciled = self.store.set_session(resp.session);
                self.record_exchange(&value, resp.message.as_deref());

                if reconciled.session.is_step_completed(self.step) {
                    self.store.update_session(self.flow, |s| s.mark_completed(self.step));
                    self.store.clear_step_drafts(self.flow, self.step);
                    return SubmitOutcome::Completed {
                        current_step: reconciled.session.current_step,
                        message: resp.message,
                        progress: resp.progress,
                        sections: resp.sections,
                    };
                }
                match self.current_question() {
                    Some(question) => SubmitOutcome::NextQuestion {
                        question,
                        message: resp.message,
                    },
                    None => SubmitOutcome::Blocked {
                        message: "Every question in this step is answered; waiting for the server."
                            .to_string(),
                    },
                }
            }
            Err(e) => self.handle_error(e),
        }
    }

    fn handle_error(&self, err: ApiError) -> SubmitOutcome {
        match err {
            ApiError::StepConflict { expected, current } if current > self.step => {
                tracing::info!(
                    flow = %self.flow,
                    step = self.step,
                    expected,
                    current,
                    "server already past this step; resyncing"
                );
                let step = self.step;
                self.store.update_session(self.flow, |s| {
                    s.advance_to(current);
                    s.mark_completed(step);
                });
                self.store.clear_step_drafts(self.flow, self.step);
                self.already_completed()
            }
            ApiError::StepConflict { expected, current } => {
                tracing::warn!(flow = %self.flow, step = self.step, expected, current, "server is behind local progress");
                SubmitOutcome::Failed {
                    message: "Your progress is out of sync with the server. Reload to continue."
                        .to_string(),
                    retryable: false,
                }
            }
            ApiError::SessionNotFound(id) => {
                tracing::warn!(flow = %self.flow, session = %id, "session missing on server");
                SubmitOutcome::Blocked {
                    message: "This session no longer exists. Restart the flow to continue."
                        .to_string(),
                }
            }
            other => {
                tracing::warn!(flow = %self.flow, step = self.step, error = %other, "submit failed");
                SubmitOutcome::Failed {
                    message: format!("Could not save your answer: {other}"),
                    retryable: other.is_transient(),
                }
            }
        }
    }

    fn record_exchange(&self, answer: &FieldValue, reply: Option<&str>) {
        let now = Utc::now();
        if let Some(text) = answer.as_text() {
            self.store.push_message(
                self.flow,
                ChatMessage {
                    speaker: Speaker::User,
                    step: self.step,
                    text: text.to_string(),
                    at: now,
                },
            );
        }
        if let Some(reply) = reply.filter(|r| !r.trim().is_empty()) {
            self.store.push_message(
                self.flow,
                ChatMessage {
                    speaker: Speaker::Assistant,
                    step: self.step,
                    text: reply.to_string(),
                    at: now,
                },
            );
        }
    }

    fn already_completed(&self) -> SubmitOutcome {
        let current_step = self
            .store
            .session(self.flow)
            .map(|s| s.current_step)
            .unwrap_or(self.step);
        SubmitOutcome::AlreadyCompleted {
            current_step,
            notice: ALREADY_COMPLETED_NOTICE.to_string(),
        }
    }

    fn locked(&self) -> SubmitOutcome {
        let message = if self.store.session(self.flow).is_none() {
            "No active session. Start this flow to continue."
        } else {
            "Finish the previous step first."
        };
        SubmitOutcome::Blocked {
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
