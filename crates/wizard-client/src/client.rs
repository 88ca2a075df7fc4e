use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use wizard_core::api::{AdvanceResponse, ProfileOption, SessionApi, StepPayload};
use wizard_core::config::ApiConfig;
use wizard_core::session::WizardSession;
use wizard_core::{ApiError, FlowKind};

use crate::error::ClientError;
use crate::wire::{ProfilesEnvelope, SessionEnvelope, StartRequest};

// ─── HttpSessionApi ───────────────────────────────────────────────────────

/// [`SessionApi`] over HTTP with JSON bodies and an optional bearer token.
///
/// No client-side timeout is configured; requests rely on the transport's
/// own behaviour.
#[derive(Debug, Clone)]
pub struct HttpSessionApi {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpSessionApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Build from config, reading the token from `api.token_env`.
    pub fn from_config(cfg: &ApiConfig) -> Self {
        Self::new(cfg.base_url.as_str()).with_token(cfg.token())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%method, %url, "session api request");
        let rb = self.client.request(method, url);
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn send(&self, rb: RequestBuilder, expected_step: Option<u32>) -> Result<Response, ClientError> {
        let resp = rb.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "session api error response");
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
            expected_step,
        })
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
            body: String::from_utf8_lossy(&bytes).into_owned(),
            source,
        })
    }
}

// ─── SessionApi ───────────────────────────────────────────────────────────

fn session_path(flow: FlowKind) -> String {
    format!("/api/{}/sessions", flow.as_str())
}

impl SessionApi for HttpSessionApi {
    async fn start_session(
        &self,
        flow: FlowKind,
        workspace_id: &str,
    ) -> Result<WizardSession, ApiError> {
        let rb = self
            .request(Method::POST, &session_path(flow))
            .json(&StartRequest { workspace_id });
        let resp = self.send(rb, None).await?;
        let envelope: SessionEnvelope = Self::json(resp).await?;
        envelope
            .session
            .ok_or_else(|| ApiError::Decode("start response has no session".to_string()))
    }

    async fn fetch_session(
        &self,
        flow: FlowKind,
        workspace_id: &str,
    ) -> Result<Option<WizardSession>, ApiError> {
        let rb = self
            .request(Method::GET, &session_path(flow))
            .query(&[("workspace_id", workspace_id)]);
        let resp = match self.send(rb, None).await {
            Ok(resp) => resp,
            Err(ClientError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };
        let envelope: SessionEnvelope = Self::json(resp).await?;
        Ok(envelope.session)
    }

    async fn advance_step(
        &self,
        flow: FlowKind,
        session_id: &str,
        payload: &StepPayload,
    ) -> Result<AdvanceResponse, ApiError> {
        let path = format!("{}/{session_id}/advance", session_path(flow));
        let rb = self.request(Method::POST, &path).json(payload);
        let resp = self.send(rb, Some(payload.step)).await?;
        let advanced: AdvanceResponse = Self::json(resp).await?;
        advanced.validate(flow, session_id)
    }

    async fn fetch_options(&self, workspace_id: &str) -> Result<Vec<ProfileOption>, ApiError> {
        let path = format!("/api/workspaces/{workspace_id}/profiles");
        let resp = self.send(self.request(Method::GET, &path), None).await?;
        let envelope: ProfilesEnvelope = Self::json(resp).await?;
        Ok(envelope.profiles)
    }

    async fn export_document(
        &self,
        flow: FlowKind,
        session_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let path = format!("{}/{session_id}/export", session_path(flow));
        let rb = self
            .request(Method::GET, &path)
            .header(reqwest::header::ACCEPT, "application/pdf");
        let resp = self.send(rb, None).await?;
        let bytes = resp.bytes().await.map_err(ClientError::from)?;
        Ok(bytes.to_vec())
    }
}
