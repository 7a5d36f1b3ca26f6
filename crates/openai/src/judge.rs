//! Vision judge adapter: scores a variant image against the prompt intent
//! with a strict rubric.

use async_trait::async_trait;
use serde_json::{json, Value};

use promptsmith_core::scoring::Rubric;
use promptsmith_core::types::{Constraints, ObjectivePreset};

use crate::error::AdapterError;
use crate::responses::{clamped_score, extract_json_object, image_data_url, string_list, ResponsesClient};

/// Maximum tags kept per tag list.
const MAX_TAGS: usize = 8;

/// Everything the judge needs to score one variant image.
pub struct JudgeRequest<'a> {
    pub base_prompt: &'a str,
    pub variant_prompt: &'a str,
    pub objective: ObjectivePreset,
    pub constraints: &'a Constraints,
    pub image: &'a [u8],
}

/// The vision-score operation. One retry on malformed JSON is performed
/// inside the adapter; any other failure is final.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn score(&self, request: JudgeRequest<'_>) -> Result<Rubric, AdapterError>;
}

pub struct OpenAiJudge {
    client: ResponsesClient,
    model: String,
}

impl OpenAiJudge {
    pub fn new(client: ResponsesClient, model: String) -> Self {
        Self { client, model }
    }

    fn input(&self, request: &JudgeRequest<'_>) -> Value {
        let system_text = "You are a strict image quality evaluator. Return strict JSON only with keys: \
            prompt_adherence, subject_fidelity, composition_quality, style_coherence, \
            technical_artifact_penalty, confidence, failure_tags, strength_tags, rationale. \
            All score fields must be float 0..1. failure_tags and strength_tags must be arrays of short strings.";
        let user_text = format!(
            "Base prompt: {}\nVariant prompt: {}\nObjective preset: {}\nMust include: {:?}\nMust avoid: {:?}\n\
             Evaluate the image against this prompt intent.",
            request.base_prompt,
            request.variant_prompt,
            request.objective.as_str(),
            request.constraints.must_include,
            request.constraints.must_avoid,
        );

        json!([
            {"role": "system", "content": [{"type": "input_text", "text": system_text}]},
            {
                "role": "user",
                "content": [
                    {"type": "input_text", "text": user_text},
                    {"type": "input_image", "image_url": image_data_url(request.image)},
                ],
            },
        ])
    }
}

#[async_trait]
impl Judge for OpenAiJudge {
    async fn score(&self, request: JudgeRequest<'_>) -> Result<Rubric, AdapterError> {
        let input = self.input(&request);
        let mut last_malformed = None;
        for _attempt in 0..2 {
            let raw = self.client.text(&self.model, input.clone()).await?;
            match parse_rubric(&raw) {
                Ok(rubric) => return Ok(rubric),
                Err(err @ AdapterError::MalformedOutput(_)) => last_malformed = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_malformed.unwrap_or_else(|| AdapterError::MalformedOutput("Judge returned invalid JSON".into())))
    }
}

/// Validate judge output into a [`Rubric`]. Missing score fields take the
/// pessimistic defaults; scores are clamped into [0, 1].
pub fn parse_rubric(raw: &str) -> Result<Rubric, AdapterError> {
    let payload = extract_json_object(raw)?;
    Ok(Rubric {
        prompt_adherence: clamped_score(payload.get("prompt_adherence"), 0.0),
        subject_fidelity: clamped_score(payload.get("subject_fidelity"), 0.0),
        composition_quality: clamped_score(payload.get("composition_quality"), 0.0),
        style_coherence: clamped_score(payload.get("style_coherence"), 0.0),
        technical_artifact_penalty: clamped_score(payload.get("technical_artifact_penalty"), 1.0),
        confidence: clamped_score(payload.get("confidence"), 0.0),
        failure_tags: string_list(payload.get("failure_tags"), MAX_TAGS),
        strength_tags: string_list(payload.get("strength_tags"), MAX_TAGS),
        rationale: payload
            .get("rationale")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("No rationale returned.")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_rubric() {
        let raw = r#"{
            "prompt_adherence": 0.9, "subject_fidelity": 0.8, "composition_quality": 0.7,
            "style_coherence": 0.6, "technical_artifact_penalty": 0.1, "confidence": 0.85,
            "failure_tags": ["soft focus"], "strength_tags": ["color"], "rationale": "looks right"
        }"#;
        let rubric = parse_rubric(raw).unwrap();
        assert_eq!(rubric.prompt_adherence, 0.9);
        assert_eq!(rubric.technical_artifact_penalty, 0.1);
        assert_eq!(rubric.failure_tags, vec!["soft focus"]);
        assert_eq!(rubric.rationale, "looks right");
    }

    #[test]
    fn missing_fields_take_pessimistic_defaults() {
        let rubric = parse_rubric("{}").unwrap();
        assert_eq!(rubric.prompt_adherence, 0.0);
        assert_eq!(rubric.technical_artifact_penalty, 1.0);
        assert_eq!(rubric.confidence, 0.0);
        assert_eq!(rubric.rationale, "No rationale returned.");
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let rubric = parse_rubric(r#"{"prompt_adherence": 3.0, "confidence": -1.0}"#).unwrap();
        assert_eq!(rubric.prompt_adherence, 1.0);
        assert_eq!(rubric.confidence, 0.0);
    }

    #[test]
    fn tag_lists_are_capped_at_eight() {
        let tags: Vec<String> = (0..12).map(|i| format!("\"tag{i}\"")).collect();
        let raw = format!("{{\"failure_tags\": [{}]}}", tags.join(","));
        let rubric = parse_rubric(&raw).unwrap();
        assert_eq!(rubric.failure_tags.len(), 8);
    }

    #[test]
    fn non_json_output_is_malformed() {
        assert!(matches!(
            parse_rubric("the image looks great!"),
            Err(AdapterError::MalformedOutput(_))
        ));
    }
}
