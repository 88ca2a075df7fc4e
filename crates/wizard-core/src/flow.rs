//! Load-time orchestration: resume a flow from the server or start one, and
//! fetch selectable options with an offline cache.

use crate::api::{ProfileOption, SessionApi};
use crate::error::{Result, WizardError};
use crate::kv::QuotaSafeStore;
use crate::paths;
use crate::session::WizardSession;
use crate::types::FlowKind;
use crate::workspace::WorkspaceStore;

/// Reconcile the local session for `flow` against the server.
///
/// The server session, when there is one, overwrites local drafts for the
/// fields it has answered. With no server session a new one is started.
/// If the server is unreachable the locally persisted session is resumed.
pub async fn resume_or_start<A: SessionApi>(
    api: &A,
    store: &WorkspaceStore,
    flow: FlowKind,
) -> Result<WizardSession> {
    let ws = store.workspace_id();
    match api.fetch_session(flow, ws).await {
        Ok(Some(server)) => {
            let reconciled = store.set_session(server);
            tracing::info!(flow = %flow, workspace = ws, step = reconciled.session.current_step, "resumed session");
            Ok(reconciled.session)
        }
        Ok(None) => start(api, store, flow).await,
        Err(e) if e.is_transient() => match store.session(flow) {
            Some(local) => {
                tracing::warn!(flow = %flow, workspace = ws, error = %e, "server unreachable; resuming local session");
                Ok(local)
            }
            None => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    }
}

/// Start a fresh server session for `flow`, replacing any local one.
pub async fn start<A: SessionApi>(
    api: &A,
    store: &WorkspaceStore,
    flow: FlowKind,
) -> Result<WizardSession> {
    let session = api.start_session(flow, store.workspace_id()).await?;
    if session.flow != flow {
        return Err(WizardError::InvalidFlow(session.flow.to_string()));
    }
    tracing::info!(flow = %flow, workspace = store.workspace_id(), session = %session.id, "started session");
    Ok(store.set_session(session).session)
}

/// Profile options for `workspace_id`. Successful responses are cached;
/// on failure the cached list is returned when there is one.
pub async fn load_options<A: SessionApi>(
    api: &A,
    kv: &QuotaSafeStore,
    workspace_id: &str,
) -> Result<Vec<ProfileOption>> {
    let key = paths::options_cache_key(workspace_id);
    match api.fetch_options(workspace_id).await {
        Ok(options) => {
            kv.set(&key, &options);
            Ok(options)
        }
        Err(e) => match kv.get::<Vec<ProfileOption>>(&key) {
            Some(cached) => {
                tracing::warn!(workspace = workspace_id, error = %e, "using cached profile options");
                Ok(cached)
            }
            None => Err(e.into()),
        },
    }
}
