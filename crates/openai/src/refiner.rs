//! Suggestion synthesis adapter: a compact run digest → three next-prompt
//! suggestions.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use promptsmith_core::refiner::{Suggestion, SuggestionSet};
use promptsmith_core::types::ObjectivePreset;

use crate::error::AdapterError;
use crate::responses::{extract_json_object, ResponsesClient};

/// Compact per-variant summary included in the refiner input.
#[derive(Debug, Clone, Serialize)]
pub struct VariantDigest {
    pub variant_id: String,
    pub variant_prompt: String,
    pub composite_score: f64,
    pub strength_tags: Vec<String>,
    pub failure_tags: Vec<String>,
}

/// What the refiner sees of a finished run: the base prompt, the top of the
/// leaderboard, and the tail.
#[derive(Debug, Clone, Serialize)]
pub struct RunDigest {
    pub base_prompt: String,
    pub objective: ObjectivePreset,
    pub top: Vec<VariantDigest>,
    pub bottom: Vec<VariantDigest>,
}

/// The synthesize-suggestions operation. One retry on malformed JSON.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn synthesize(&self, digest: &RunDigest) -> Result<SuggestionSet, AdapterError>;
}

pub struct OpenAiRefiner {
    client: ResponsesClient,
    model: String,
}

impl OpenAiRefiner {
    pub fn new(client: ResponsesClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Refiner for OpenAiRefiner {
    async fn synthesize(&self, digest: &RunDigest) -> Result<SuggestionSet, AdapterError> {
        let system_text = "You rewrite image prompts using run outcomes. Return strict JSON only: \
            {\"conservative\":{\"prompt_text\":\"...\",\"rationale\":\"...\"},\
            \"balanced\":{\"prompt_text\":\"...\",\"rationale\":\"...\"},\
            \"aggressive\":{\"prompt_text\":\"...\",\"rationale\":\"...\"}}";
        let top = serde_json::to_string(&digest.top).unwrap_or_else(|_| "[]".into());
        let bottom = serde_json::to_string(&digest.bottom).unwrap_or_else(|_| "[]".into());
        let user_text = format!(
            "Base prompt: {}\nObjective preset: {}\nTop variants summary: {top}\nBottom variants summary: {bottom}\n\
             Each suggestion must mention concrete strengths/failures from the summaries.",
            digest.base_prompt,
            digest.objective.as_str(),
        );
        let input = json!([
            {"role": "system", "content": [{"type": "input_text", "text": system_text}]},
            {"role": "user", "content": [{"type": "input_text", "text": user_text}]},
        ]);

        let mut last_malformed = None;
        for _attempt in 0..2 {
            let raw = self.client.text(&self.model, input.clone()).await?;
            match parse_suggestions(&raw) {
                Ok(set) => return Ok(set),
                Err(err @ AdapterError::MalformedOutput(_)) => last_malformed = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_malformed
            .unwrap_or_else(|| AdapterError::MalformedOutput("Refiner returned invalid JSON".into())))
    }
}

/// Validate refiner output: all three suggestions must carry non-empty
/// prompt text.
pub fn parse_suggestions(raw: &str) -> Result<SuggestionSet, AdapterError> {
    let payload = extract_json_object(raw)?;
    let set = SuggestionSet {
        conservative: suggestion(&payload, "conservative"),
        balanced: suggestion(&payload, "balanced"),
        aggressive: suggestion(&payload, "aggressive"),
    };
    if !set.is_complete() {
        return Err(AdapterError::MalformedOutput(
            "Refiner output is missing suggestion prompt text".into(),
        ));
    }
    Ok(set)
}

fn suggestion(payload: &Value, kind: &str) -> Suggestion {
    let Some(item) = payload.get(kind).filter(|v| v.is_object()) else {
        return Suggestion::default();
    };
    Suggestion {
        prompt_text: item
            .get("prompt_text")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        rationale: item
            .get("rationale")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
    }
}
