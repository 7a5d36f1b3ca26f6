//! Scoring algebra shared by the eval pipeline and the compare pipeline.
//!
//! Two aggregations live here: the per-variant composite rubric score and the
//! baseline/candidate drift score with its verdict rules. Both are pure and
//! deterministic; identical inputs always produce identical outputs to four
//! decimal places.

use serde::{Deserialize, Serialize};

use crate::types::Verdict;

// ---------------------------------------------------------------------------
// Composite score weights
// ---------------------------------------------------------------------------

pub const WEIGHT_PROMPT_ADHERENCE: f64 = 0.35;
pub const WEIGHT_SUBJECT_FIDELITY: f64 = 0.20;
pub const WEIGHT_COMPOSITION_QUALITY: f64 = 0.20;
pub const WEIGHT_STYLE_COHERENCE: f64 = 0.15;
pub const WEIGHT_ARTIFACT_PENALTY: f64 = 0.10;

// ---------------------------------------------------------------------------
// Drift weights and verdict thresholds
// ---------------------------------------------------------------------------

pub const DRIFT_WEIGHT_SEMANTIC: f64 = 0.40;
pub const DRIFT_WEIGHT_PIXEL: f64 = 0.30;
pub const DRIFT_WEIGHT_VISION: f64 = 0.30;

/// Default per-project drift threshold.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.30;

/// With a signal missing, pixel drift above this forces `fail` instead of
/// `inconclusive`.
pub const INCONCLUSIVE_PIXEL_CEILING: f64 = 0.70;

// ---------------------------------------------------------------------------
// Rubric
// ---------------------------------------------------------------------------

/// Judge rubric for a single variant image. All score fields are in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub prompt_adherence: f64,
    pub subject_fidelity: f64,
    pub composition_quality: f64,
    pub style_coherence: f64,
    pub technical_artifact_penalty: f64,
    pub confidence: f64,
    pub failure_tags: Vec<String>,
    pub strength_tags: Vec<String>,
    pub rationale: String,
}

/// Neutral rubric applied when the judge is unavailable or keeps returning
/// malformed output. The variant stays rankable but carries low confidence.
pub fn neutral_fallback_rubric() -> Rubric {
    Rubric {
        prompt_adherence: 0.5,
        subject_fidelity: 0.5,
        composition_quality: 0.5,
        style_coherence: 0.5,
        technical_artifact_penalty: 0.5,
        confidence: 0.3,
        failure_tags: Vec::new(),
        strength_tags: Vec::new(),
        rationale: String::new(),
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Clamp into the unit interval.
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Round to four decimal places, the precision of every reported score.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Composite rank key for a variant.
///
/// Not clamped: the reachable range is [-0.10, 0.90].
pub fn composite_score(rubric: &Rubric) -> f64 {
    let score = WEIGHT_PROMPT_ADHERENCE * rubric.prompt_adherence
        + WEIGHT_SUBJECT_FIDELITY * rubric.subject_fidelity
        + WEIGHT_COMPOSITION_QUALITY * rubric.composition_quality
        + WEIGHT_STYLE_COHERENCE * rubric.style_coherence
        - WEIGHT_ARTIFACT_PENALTY * rubric.technical_artifact_penalty;
    round4(score)
}

/// Aggregate the drift score from whichever signals are present.
///
/// Missing semantic/vision terms are omitted and the remaining weights are
/// NOT renormalized; the verdict rules compensate for the lost evidence.
pub fn drift_score(pixel_diff_score: f64, semantic_similarity: Option<f64>, vision_structural_score: Option<f64>) -> f64 {
    let mut drift = DRIFT_WEIGHT_PIXEL * pixel_diff_score;
    if let Some(semantic) = semantic_similarity {
        drift += DRIFT_WEIGHT_SEMANTIC * (1.0 - semantic);
    }
    if let Some(vision) = vision_structural_score {
        drift += DRIFT_WEIGHT_VISION * vision;
    }
    clamp01(drift)
}

/// Derive the comparison verdict.
///
/// With both model signals present the drift threshold decides. With either
/// missing, the pixel signal alone refuses to fail the user unless it is
/// overwhelming.
pub fn derive_verdict(
    drift: f64,
    threshold: f64,
    pixel_diff_score: f64,
    semantic_present: bool,
    vision_present: bool,
) -> Verdict {
    if !semantic_present || !vision_present {
        if pixel_diff_score <= INCONCLUSIVE_PIXEL_CEILING {
            return Verdict::Inconclusive;
        }
        return Verdict::Fail;
    }

    if drift <= threshold {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}
