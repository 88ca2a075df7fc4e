//! In-memory fake of the remote session API for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{AdvanceResponse, ProfileOption, SessionApi, StepPayload};
use crate::error::ApiError;
use crate::session::WizardSession;
use crate::types::{FlowKind, NextAction};

#[derive(Default)]
pub struct FakeApi {
    pub advance_calls: AtomicUsize,
    pub export_calls: AtomicUsize,
    pub payloads: Mutex<Vec<StepPayload>>,
    advance_results: Mutex<VecDeque<Result<AdvanceResponse, ApiError>>>,
    pub server_session: Mutex<Option<WizardSession>>,
    pub options: Mutex<Option<Result<Vec<ProfileOption>, ApiError>>>,
    pub export_result: Mutex<Option<Result<Vec<u8>, ApiError>>>,
    pub latency: Option<Duration>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_advance(&self, result: Result<AdvanceResponse, ApiError>) {
        self.advance_results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.advance_calls.load(Ordering::SeqCst)
    }
}

pub fn advanced(session: WizardSession, message: Option<&str>) -> AdvanceResponse {
    AdvanceResponse {
        next_action: session.next_action.clone(),
        session,
        progress: None,
        message: message.map(str::to_string),
        sections: Vec::new(),
    }
}

pub fn session_at(flow: FlowKind, step: u32) -> WizardSession {
    let mut s = WizardSession::new("s1", flow);
    s.current_step = step;
    s.next_action = NextAction::new(format!("continue_step{step}"));
    s
}

impl SessionApi for FakeApi {
    async fn start_session(
        &self,
        flow: FlowKind,
        _workspace_id: &str,
    ) -> Result<WizardSession, ApiError> {
        let s = WizardSession::new("new-session", flow);
        *self.server_session.lock().unwrap() = Some(s.clone());
        Ok(s)
    }

    async fn fetch_session(
        &self,
        _flow: FlowKind,
        _workspace_id: &str,
    ) -> Result<Option<WizardSession>, ApiError> {
        Ok(self.server_session.lock().unwrap().clone())
    }

    async fn advance_step(
        &self,
        _flow: FlowKind,
        _session_id: &str,
        payload: &StepPayload,
    ) -> Result<AdvanceResponse, ApiError> {
        self.advance_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        self.advance_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted response".into())))
    }

    async fn fetch_options(&self, _workspace_id: &str) -> Result<Vec<ProfileOption>, ApiError> {
        self.options.lock().unwrap().clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn export_document(
        &self,
        _flow: FlowKind,
        _session_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        self.export_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Server {
                status: 503,
                message: "export service down".into(),
            }))
    }
}
