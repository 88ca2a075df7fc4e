use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// FlowKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Ava,
    Margo,
    Vera,
    ProductRefiner,
}

impl FlowKind {
    pub fn all() -> &'static [FlowKind] {
        &[
            FlowKind::Ava,
            FlowKind::Margo,
            FlowKind::Vera,
            FlowKind::ProductRefiner,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::Ava => "ava",
            FlowKind::Margo => "margo",
            FlowKind::Vera => "vera",
            FlowKind::ProductRefiner => "product_refiner",
        }
    }

    /// Human-facing title used in exported documents.
    pub fn title(self) -> &'static str {
        match self {
            FlowKind::Ava => "AVA Ideal Client Profile",
            FlowKind::Margo => "MARGO Offer Positioning",
            FlowKind::Vera => "VERA Brand Voice",
            FlowKind::ProductRefiner => "Product Refiner",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlowKind {
    type Err = crate::error::WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ava" => Ok(FlowKind::Ava),
            "margo" => Ok(FlowKind::Margo),
            "vera" => Ok(FlowKind::Vera),
            "product_refiner" | "product-refiner" => Ok(FlowKind::ProductRefiner),
            _ => Err(crate::error::WizardError::InvalidFlow(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolKey
// ---------------------------------------------------------------------------

/// Amplifier tools whose forms can be drafted and resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKey {
    EmailSequence,
    SalesPage,
    AdCopy,
    Headlines,
    LeadMagnet,
    WebinarScript,
    SocialPosts,
    VideoScript,
}

impl ToolKey {
    pub fn all() -> &'static [ToolKey] {
        &[
            ToolKey::EmailSequence,
            ToolKey::SalesPage,
            ToolKey::AdCopy,
            ToolKey::Headlines,
            ToolKey::LeadMagnet,
            ToolKey::WebinarScript,
            ToolKey::SocialPosts,
            ToolKey::VideoScript,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolKey::EmailSequence => "email_sequence",
            ToolKey::SalesPage => "sales_page",
            ToolKey::AdCopy => "ad_copy",
            ToolKey::Headlines => "headlines",
            ToolKey::LeadMagnet => "lead_magnet",
            ToolKey::WebinarScript => "webinar_script",
            ToolKey::SocialPosts => "social_posts",
            ToolKey::VideoScript => "video_script",
        }
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKey {
    type Err = crate::error::WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKey::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s || t.as_str().replace('_', "-") == s)
            .ok_or_else(|| crate::error::WizardError::InvalidToolKey(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// NextAction
// ---------------------------------------------------------------------------

/// What the UI should do next, as named by the server
/// (`start_product_interview`, `step7_complete`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NextAction(pub String);

impl NextAction {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `Some(n)` for actions of the form `step{n}_complete`.
    pub fn completed_step(&self) -> Option<u32> {
        self.0
            .strip_prefix("step")?
            .strip_suffix("_complete")?
            .parse()
            .ok()
    }

    pub fn is_flow_complete(&self) -> bool {
        self.0 == "flow_complete"
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_kind_parses_both_spellings() {
        assert_eq!(
            "product-refiner".parse::<FlowKind>().unwrap(),
            FlowKind::ProductRefiner
        );
        assert_eq!("vera".parse::<FlowKind>().unwrap(), FlowKind::Vera);
        assert!("bogus".parse::<FlowKind>().is_err());
    }

    #[test]
    fn tool_key_roundtrips_through_str() {
        for &tool in ToolKey::all() {
            assert_eq!(tool.as_str().parse::<ToolKey>().unwrap(), tool);
        }
        assert_eq!("ad-copy".parse::<ToolKey>().unwrap(), ToolKey::AdCopy);
    }

    #[test]
    fn next_action_recognises_step_completion() {
        assert_eq!(NextAction::new("step7_complete").completed_step(), Some(7));
        assert_eq!(NextAction::new("start_product_interview").completed_step(), None);
        assert_eq!(NextAction::new("stepx_complete").completed_step(), None);
    }
}
