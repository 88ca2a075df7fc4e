//! Static per-flow question tables and answer validation.

use serde::Serialize;

use crate::session::FieldValue;
use crate::types::FlowKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    /// Pick one or more ids from a server-provided option list.
    Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub step: u32,
    pub prompt: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Minimum answer length in characters (text fields) or selected ids.
    pub min_len: usize,
}

const fn text(key: &'static str, step: u32, prompt: &'static str, min_len: usize) -> FieldSpec {
    FieldSpec {
        key,
        step,
        prompt,
        kind: FieldKind::Text,
        required: true,
        min_len,
    }
}

const fn optional(key: &'static str, step: u32, prompt: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        step,
        prompt,
        kind: FieldKind::Text,
        required: false,
        min_len: 0,
    }
}

const fn select(key: &'static str, step: u32, prompt: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        step,
        prompt,
        kind: FieldKind::Selection,
        required: true,
        min_len: 1,
    }
}

static AVA: &[FieldSpec] = &[
    text("business_name", 1, "What is the name of your business?", 2),
    text("product_description", 1, "Describe what you sell in a few sentences.", 20),
    text("ideal_client", 2, "Who is your ideal client?", 10),
    text("pain_points", 2, "What keeps them up at night?", 10),
    text("desired_outcome", 2, "What result do they want most?", 10),
    text("objections", 3, "Why might they hesitate to buy?", 10),
    optional("competitors", 3, "Who else are they considering?"),
];

static MARGO: &[FieldSpec] = &[
    select("profile_ids", 1, "Which client profile is this offer for?"),
    text("offer_name", 2, "What is the offer called?", 3),
    text("core_promise", 2, "What transformation does it promise?", 15),
    text("price_anchor", 3, "How do you justify the price?", 10),
    optional("bonuses", 3, "Any bonuses included?"),
];

static VERA: &[FieldSpec] = &[
    text("brand_story", 1, "Tell the story of how the business started.", 30),
    text("voice_words", 2, "Three words that describe your voice.", 5),
    text("banned_phrases", 2, "Phrases you never want to use.", 3),
    text("sample_copy", 3, "Paste a paragraph you love.", 40),
];

static PRODUCT_REFINER: &[FieldSpec] = &[
    select("profile_ids", 1, "Which client profile should shape the product?"),
    text("product_idea", 2, "Describe the product idea.", 20),
    text("delivery_format", 2, "How will it be delivered?", 5),
    text("success_metric", 3, "How will a customer measure success?", 10),
];

/// Every field of `flow`, in step order.
pub fn table(flow: FlowKind) -> &'static [FieldSpec] {
    match flow {
        FlowKind::Ava => AVA,
        FlowKind::Margo => MARGO,
        FlowKind::Vera => VERA,
        FlowKind::ProductRefiner => PRODUCT_REFINER,
    }
}

pub fn fields_for_step(flow: FlowKind, step: u32) -> impl Iterator<Item = &'static FieldSpec> {
    table(flow).iter().filter(move |f| f.step == step)
}

pub fn field(flow: FlowKind, key: &str) -> Option<&'static FieldSpec> {
    table(flow).iter().find(|f| f.key == key)
}

pub fn step_count(flow: FlowKind) -> u32 {
    table(flow).iter().map(|f| f.step).max().unwrap_or(0)
}

pub fn has_step(flow: FlowKind, step: u32) -> bool {
    fields_for_step(flow, step).next().is_some()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A field-scoped, human-readable validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

pub fn validate(spec: &FieldSpec, value: &FieldValue) -> Result<(), FieldError> {
    let err = |message: String| FieldError {
        field: spec.key,
        message,
    };

    if !value.is_answered() {
        if spec.required {
            return Err(err("This field is required.".to_string()));
        }
        return Ok(());
    }

    match (spec.kind, value) {
        (FieldKind::Text, FieldValue::Text(s)) => {
            let len = s.trim().chars().count();
            if len < spec.min_len {
                return Err(err(format!(
                    "Please enter at least {} characters ({} so far).",
                    spec.min_len, len
                )));
            }
        }
        (FieldKind::Selection, FieldValue::Selection(ids)) => {
            if ids.len() < spec.min_len {
                return Err(err(format!("Please select at least {}.", spec.min_len)));
            }
        }
        (FieldKind::Text, _) => return Err(err("Expected a text answer.".to_string())),
        (FieldKind::Selection, _) => return Err(err("Expected a selection.".to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_flow_has_contiguous_steps() {
        for &flow in FlowKind::all() {
            let n = step_count(flow);
            assert!(n > 0);
            for step in 1..=n {
                assert!(has_step(flow, step), "{flow} missing step {step}");
            }
        }
    }

    #[test]
    fn short_answer_is_rejected_with_count() {
        let spec = field(FlowKind::Ava, "ideal_client").unwrap();
        let e = validate(spec, &FieldValue::text("ok")).unwrap_err();
        assert_eq!(e.field, "ideal_client");
        assert!(e.message.contains("at least 10 characters"));
    }

    #[test]
    fn min_length_counts_trimmed_characters() {
        let spec = field(FlowKind::Ava, "business_name").unwrap();
        assert!(validate(spec, &FieldValue::text("  é  ")).is_err());
        assert!(validate(spec, &FieldValue::text("éé")).is_ok());
    }

    #[test]
    fn optional_field_accepts_empty() {
        let spec = field(FlowKind::Ava, "competitors").unwrap();
        assert!(validate(spec, &FieldValue::text("")).is_ok());
    }

    #[test]
    fn required_field_rejects_blank() {
        let spec = field(FlowKind::Vera, "brand_story").unwrap();
        let e = validate(spec, &FieldValue::text("   ")).unwrap_err();
        assert_eq!(e.message, "This field is required.");
    }

    #[test]
    fn selection_requires_ids() {
        let spec = field(FlowKind::Margo, "profile_ids").unwrap();
        assert!(validate(spec, &FieldValue::Selection(vec![])).is_err());
        assert!(validate(spec, &FieldValue::Selection(vec!["p1".into()])).is_ok());
        assert!(validate(spec, &FieldValue::text("p1")).is_err());
    }
}
