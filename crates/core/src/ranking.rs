//! Leaderboard ordering for evaluated variants.
//!
//! The rank order is a five-way tie-break: composite score, confidence,
//! artifact penalty (lower wins), hard-rule violations (fewer wins), and
//! finally the variant id ascending so the ordering is fully deterministic.

use std::cmp::Ordering;

/// Failure-tag substrings that count as hard-rule violations.
pub const HARD_RULE_MARKERS: &[&str] = &["artifact", "watermark", "limb"];

/// Number of failure tags whose lowercased text contains a hard-rule marker.
pub fn hard_rule_violations(failure_tags: &[String]) -> usize {
    failure_tags
        .iter()
        .map(|tag| tag.to_lowercase())
        .filter(|tag| HARD_RULE_MARKERS.iter().any(|marker| tag.contains(marker)))
        .count()
}

/// Sort key extracted from a variant for leaderboard ordering.
#[derive(Debug, Clone)]
pub struct RankKey {
    pub composite_score: f64,
    pub confidence: f64,
    pub technical_artifact_penalty: f64,
    pub hard_rule_violations: usize,
    pub variant_id: String,
}

/// Ordering that places the best variant first when used with `sort_by`.
pub fn rank_order(a: &RankKey, b: &RankKey) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.technical_artifact_penalty.total_cmp(&b.technical_artifact_penalty))
        .then_with(|| a.hard_rule_violations.cmp(&b.hard_rule_violations))
        .then_with(|| a.variant_id.cmp(&b.variant_id))
}
