//! Resumable amplifier form drafts and scroll positions.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::kv::{QuotaSafeStore, WriteOutcome};
use crate::paths;
use crate::types::ToolKey;

pub type FormDraft = Map<String, Value>;

/// Form drafts keyed by amplifier tool. Writes that would not change the
/// stored value are skipped entirely.
#[derive(Debug, Clone)]
pub struct AmplifierDrafts {
    kv: Arc<QuotaSafeStore>,
}

impl AmplifierDrafts {
    pub fn new(kv: Arc<QuotaSafeStore>) -> Self {
        Self { kv }
    }

    pub fn draft(&self, tool: ToolKey) -> Option<FormDraft> {
        self.kv.get(&paths::amplifier_form_key(tool))
    }

    /// Store `draft` for `tool`. Returns `None` when the new draft is
    /// shallow-equal to the stored one and nothing was written.
    pub fn save_draft(&self, tool: ToolKey, draft: &FormDraft) -> Option<WriteOutcome> {
        if self
            .draft(tool)
            .is_some_and(|existing| shallow_equal(&existing, draft))
        {
            return None;
        }
        Some(self.kv.set(&paths::amplifier_form_key(tool), draft))
    }

    /// Merge a single field into the draft for `tool`.
    pub fn update_field(&self, tool: ToolKey, field: &str, value: Value) -> Option<WriteOutcome> {
        let mut draft = self.draft(tool).unwrap_or_default();
        draft.insert(field.to_string(), value);
        self.save_draft(tool, &draft)
    }

    pub fn clear_draft(&self, tool: ToolKey) {
        self.kv.remove(&paths::amplifier_form_key(tool));
        self.kv.remove(&paths::amplifier_scroll_key(tool));
    }

    pub fn scroll_position(&self, tool: ToolKey) -> Option<u32> {
        self.kv.get(&paths::amplifier_scroll_key(tool))
    }

    pub fn save_scroll_position(&self, tool: ToolKey, offset: u32) -> Option<WriteOutcome> {
        if self.scroll_position(tool) == Some(offset) {
            return None;
        }
        Some(self.kv.set(&paths::amplifier_scroll_key(tool), &offset))
    }
}

/// Same key set and `==` values at the top level.
pub fn shallow_equal(a: &FormDraft, b: &FormDraft) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}
