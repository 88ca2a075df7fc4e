pub mod amplifier;
pub mod api;
pub mod chunk;
pub mod config;
pub mod error;
pub mod export;
pub mod fields;
pub mod flow;
pub mod io;
pub mod kv;
pub mod paths;
pub mod pdf;
pub mod reveal;
pub mod session;
pub mod step;
pub mod types;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::{ApiError, KvError, Result, WizardError};
pub use types::{FlowKind, NextAction, ToolKey};
