//! Deterministic template planner.
//!
//! The fallback path when the upstream planner times out, returns malformed
//! JSON, or produces fewer variants than requested. Same inputs always yield
//! the same variants with the same mutation tags.

use serde::{Deserialize, Serialize};

use crate::types::Constraints;

/// Fixed mutation hints cycled over by the fallback planner.
pub const MUTATION_HINTS: &[(&str, &str)] = &[
    (
        "composition",
        "wide cinematic framing with strong foreground-background depth",
    ),
    (
        "lighting",
        "dramatic rim lighting with a soft key light and controlled shadows",
    ),
    ("lens", "35mm lens perspective with shallow depth of field"),
    (
        "style-detail",
        "editorial color grading with high texture fidelity on key subject surfaces",
    ),
    (
        "negative-constraint",
        "avoid visual clutter and accidental background text",
    ),
];

/// One planned prompt variant, as produced by the planner adapter or the
/// template fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedVariant {
    pub variant_prompt: String,
    #[serde(default)]
    pub mutation_tags: Vec<String>,
}

/// Generate `n_variants` deterministic variants by appending mutation hints
/// and any `must_include` / `must_avoid` phrases to the base prompt.
pub fn fallback_variants(base_prompt: &str, constraints: &Constraints, n_variants: usize) -> Vec<PlannedVariant> {
    let must_include: Vec<&str> = constraints
        .must_include
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect();
    let must_avoid: Vec<&str> = constraints
        .must_avoid
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect();

    (0..n_variants)
        .map(|index| {
            let (tag, hint) = MUTATION_HINTS[index % MUTATION_HINTS.len()];
            let mut lines = vec![base_prompt.trim().to_string(), hint.to_string()];
            if !must_include.is_empty() {
                lines.push(format!("Must include: {}.", must_include.join(", ")));
            }
            if !must_avoid.is_empty() {
                lines.push(format!("Must avoid: {}.", must_avoid.join(", ")));
            }

            PlannedVariant {
                variant_prompt: lines
                    .into_iter()
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
                mutation_tags: vec![tag.to_string()],
            }
        })
        .collect()
}
