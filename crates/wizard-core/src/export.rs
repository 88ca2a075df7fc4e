use std::fmt;

use crate::api::{DocumentSection, SessionApi};
use crate::error::{Result, WizardError};
use crate::fields;
use crate::pdf;
use crate::session::{FieldValue, WizardSession};
use crate::types::FlowKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSource {
    Server,
    Local,
}

impl fmt::Display for ExportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportSource::Server => f.write_str("server"),
            ExportSource::Local => f.write_str("local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub source: ExportSource,
}

impl ExportedDocument {
    pub fn file_name(flow: FlowKind, session_id: &str) -> String {
        format!("{}-{session_id}.pdf", flow.as_str())
    }
}

/// One section per answered field, in question order.
pub fn sections_from_session(session: &WizardSession) -> Vec<DocumentSection> {
    fields::table(session.flow)
        .iter()
        .filter_map(|spec| {
            let body = match session.answer(spec.key)? {
                FieldValue::Text(s) => s.clone(),
                FieldValue::Selection(ids) => ids.join(", "),
                FieldValue::Structured(v) => serde_json::to_string_pretty(v).ok()?,
            };
            Some(DocumentSection {
                title: spec.prompt.to_string(),
                body,
            })
        })
        .collect()
}

/// Download the server-rendered PDF, or build one locally from `sections`
/// when the server path fails. Errors only when both paths fail.
pub async fn export_document<A: SessionApi>(
    api: &A,
    flow: FlowKind,
    session_id: &str,
    sections: &[DocumentSection],
) -> Result<ExportedDocument> {
    let server_err = match api.export_document(flow, session_id).await {
        Ok(bytes) if !bytes.is_empty() => {
            return Ok(ExportedDocument {
                bytes,
                source: ExportSource::Server,
            })
        }
        Ok(_) => "empty response body".to_string(),
        Err(e) => e.to_string(),
    };
    tracing::warn!(flow = %flow, session = session_id, error = %server_err, "server export failed; using local generator");

    match pdf::render_pdf(flow.title(), sections) {
        Ok(bytes) => Ok(ExportedDocument {
            bytes,
            source: ExportSource::Local,
        }),
        Err(local) => Err(WizardError::ExportUnavailable {
            server: server_err,
            local: local.to_string(),
        }),
    }
}
