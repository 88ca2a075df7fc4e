//! `wizard-client`: HTTP implementation of the wizard session API.
//!
//! # Architecture
//!
//! ```text
//! StepController / flow::resume_or_start
//!     │  (generic over wizard_core::api::SessionApi)
//!     ▼
//! HttpSessionApi  ← reqwest, JSON bodies, bearer token
//!     │
//!     ▼
//! ClientError     ← HTTP status + body
//!     │  From<ClientError> for ApiError
//!     ▼
//! ApiError        ← StepConflict / SessionNotFound / Server / Transport / Decode
//! ```
//!
//! # Endpoints
//!
//! | Operation          | Request                                         |
//! |--------------------|-------------------------------------------------|
//! | `start_session`    | `POST /api/{flow}/sessions`                     |
//! | `fetch_session`    | `GET  /api/{flow}/sessions?workspace_id={ws}`   |
//! | `advance_step`     | `POST /api/{flow}/sessions/{id}/advance`        |
//! | `fetch_options`    | `GET  /api/workspaces/{ws}/profiles`            |
//! | `export_document`  | `GET  /api/{flow}/sessions/{id}/export`         |

pub mod client;
pub mod error;
mod wire;


pub use client::HttpSessionApi;
pub use error::ClientError;
