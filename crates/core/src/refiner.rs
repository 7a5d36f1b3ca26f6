//! Deterministic suggestion synthesis fallback.
//!
//! When the upstream refiner is unavailable or returns malformed output, the
//! run still ends with three usable next-prompt suggestions derived from the
//! leaderboard.

use serde::{Deserialize, Serialize};

use crate::types::ObjectivePreset;

/// A single next-prompt suggestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default)]
    pub rationale: String,
}

/// The three suggestions every run finishes with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub conservative: Suggestion,
    pub balanced: Suggestion,
    pub aggressive: Suggestion,
}

impl SuggestionSet {
    /// True when every suggestion carries a non-empty prompt.
    pub fn is_complete(&self) -> bool {
        !self.conservative.prompt_text.trim().is_empty()
            && !self.balanced.prompt_text.trim().is_empty()
            && !self.aggressive.prompt_text.trim().is_empty()
    }
}

/// The word the aggressive rewrite anchors on: the longest alphanumeric token
/// of the prompt, earliest on ties. Falls back to `"subject"` for degenerate
/// prompts.
pub fn principal_noun(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .max_by_key(|word| word.chars().count())
        .unwrap_or("subject")
        .to_string()
}

/// Build the deterministic suggestion set.
///
/// `top_prompt` is the leaderboard winner's prompt when one exists;
/// `top_strength` / `bottom_failure` season the rationales.
pub fn fallback_suggestions(
    base_prompt: &str,
    objective: ObjectivePreset,
    top_prompt: Option<&str>,
    top_strength: Option<&str>,
    bottom_failure: Option<&str>,
) -> SuggestionSet {
    let anchor = top_prompt.unwrap_or(base_prompt).trim();
    let noun = principal_noun(base_prompt);

    let conservative_rationale = match top_strength {
        Some(strength) => format!(
            "Keep the best-performing structure from the top variant and preserve strength: {strength}."
        ),
        None => "Keep the best-performing structure from the top variant.".to_string(),
    };
    let balanced_rationale = match bottom_failure {
        Some(failure) => format!("Blend top strengths with a targeted fix for failure tag: {failure}."),
        None => "Blend top strengths with targeted fixes.".to_string(),
    };

    SuggestionSet {
        conservative: Suggestion {
            prompt_text: anchor.to_string(),
            rationale: conservative_rationale,
        },
        balanced: Suggestion {
            prompt_text: format!("{anchor}. Clarify primary subject and lighting."),
            rationale: balanced_rationale,
        },
        aggressive: Suggestion {
            prompt_text: format!(
                "Reimagine the {noun} with a radically different camera angle, lighting direction, \
                 and style treatment while keeping the core subject recognizable."
            ),
            rationale: format!(
                "Explore a higher-variance rewrite tuned for objective '{}' while keeping core intent.",
                objective.as_str()
            ),
        },
    }
}
