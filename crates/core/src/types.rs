//! Shared domain enums and small value types.
//!
//! All enums serialize to the lowercase / snake_case tokens used on the wire
//! and in the persisted JSON tables.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Commit lifecycle
// ---------------------------------------------------------------------------

/// Terminal status of a persisted generation commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStatus {
    Success,
    Failed,
}

// ---------------------------------------------------------------------------
// Eval run lifecycle
// ---------------------------------------------------------------------------

/// Coarse run status reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    CompletedDegraded,
    Failed,
}

impl RunStatus {
    /// Whether the run has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::CompletedDegraded | RunStatus::Failed
        )
    }
}

/// Fine-grained pipeline stage. Advances strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Queued,
    Planning,
    Generating,
    Evaluating,
    Refining,
    Completed,
    CompletedDegraded,
    Failed,
}

/// Per-variant status lattice. Transitions never move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    Planned,
    GenerationFailed,
    Generated,
    EvaluationSkipped,
    Evaluated,
    EvaluatedDegraded,
}

impl VariantStatus {
    /// Only evaluated variants participate in ranking.
    pub fn is_rankable(self) -> bool {
        matches!(self, VariantStatus::Evaluated | VariantStatus::EvaluatedDegraded)
    }
}

// ---------------------------------------------------------------------------
// Compare verdict
// ---------------------------------------------------------------------------

/// Outcome of a baseline/candidate comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

// ---------------------------------------------------------------------------
// Request option enums
// ---------------------------------------------------------------------------

/// What the judge optimizes for when scoring variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectivePreset {
    #[default]
    Adherence,
    Aesthetic,
    Product,
}

impl ObjectivePreset {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectivePreset::Adherence => "adherence",
            ObjectivePreset::Aesthetic => "aesthetic",
            ObjectivePreset::Product => "product",
        }
    }
}

/// Upstream image generation quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

// ---------------------------------------------------------------------------
// Structural drift enums
// ---------------------------------------------------------------------------

/// Lighting change magnitude reported by the structural signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightingShift {
    None,
    Low,
    Moderate,
    High,
}

impl LightingShift {
    /// Parse upstream model output, defaulting to `Moderate` on anything
    /// outside the contract.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => LightingShift::None,
            "low" => LightingShift::Low,
            "high" => LightingShift::High,
            _ => LightingShift::Moderate,
        }
    }
}

/// Style drift magnitude reported by the structural signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleDrift {
    Low,
    Moderate,
    High,
}

impl StyleDrift {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => StyleDrift::Low,
            "high" => StyleDrift::High,
            _ => StyleDrift::Moderate,
        }
    }
}

// ---------------------------------------------------------------------------
// Planning constraints
// ---------------------------------------------------------------------------

/// User-supplied phrase constraints threaded through planning and judging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub must_avoid: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_terminality() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::CompletedDegraded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn variant_rankability() {
        assert!(VariantStatus::Evaluated.is_rankable());
        assert!(VariantStatus::EvaluatedDegraded.is_rankable());
        assert!(!VariantStatus::Generated.is_rankable());
        assert!(!VariantStatus::EvaluationSkipped.is_rankable());
    }

    #[test]
    fn enums_serialize_to_wire_tokens() {
        assert_eq!(
            serde_json::to_string(&RunStatus::CompletedDegraded).unwrap(),
            "\"completed_degraded\""
        );
        assert_eq!(
            serde_json::to_string(&VariantStatus::GenerationFailed).unwrap(),
            "\"generation_failed\""
        );
        assert_eq!(serde_json::to_string(&Verdict::Inconclusive).unwrap(), "\"inconclusive\"");
        assert_eq!(serde_json::to_string(&CommitStatus::Success).unwrap(), "\"success\"");
    }

    #[test]
    fn lenient_enum_parsing_defaults_to_moderate() {
        assert_eq!(LightingShift::parse_lenient("NONE"), LightingShift::None);
        assert_eq!(LightingShift::parse_lenient("extreme"), LightingShift::Moderate);
        assert_eq!(StyleDrift::parse_lenient("low"), StyleDrift::Low);
        assert_eq!(StyleDrift::parse_lenient("??"), StyleDrift::Moderate);
    }
}
