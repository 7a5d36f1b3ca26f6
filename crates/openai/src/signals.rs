//! Compare signal adapters: semantic identity similarity and structural
//! drift assessment between a baseline and a candidate image.

use async_trait::async_trait;
use serde_json::{json, Value};

use promptsmith_core::types::{LightingShift, StyleDrift};

use crate::error::AdapterError;
use crate::responses::{extract_json_object, image_data_url, ResponsesClient};

/// Structured output of the structural drift signal.
#[derive(Debug, Clone)]
pub struct StructuralAssessment {
    pub facial_structure_changed: bool,
    pub lighting_shift: LightingShift,
    pub style_drift: StyleDrift,
    pub vision_structural_score: f64,
    pub notes: String,
}

/// Semantic identity similarity in [0, 1], higher = more similar.
#[async_trait]
pub trait SemanticScorer: Send + Sync {
    async fn similarity(&self, baseline: &[u8], candidate: &[u8]) -> Result<f64, AdapterError>;
}

/// Structural drift assessment.
#[async_trait]
pub trait StructuralScorer: Send + Sync {
    async fn assess(&self, baseline: &[u8], candidate: &[u8]) -> Result<StructuralAssessment, AdapterError>;
}

fn two_image_input(system_text: &str, baseline: &[u8], candidate: &[u8]) -> Value {
    json!([
        {"role": "system", "content": [{"type": "input_text", "text": system_text}]},
        {
            "role": "user",
            "content": [
                {"type": "input_text", "text": "Image A is baseline. Image B is candidate."},
                {"type": "input_image", "image_url": image_data_url(baseline)},
                {"type": "input_image", "image_url": image_data_url(candidate)},
            ],
        },
    ])
}

// ---------------------------------------------------------------------------
// Semantic similarity
// ---------------------------------------------------------------------------

pub struct OpenAiSemanticScorer {
    client: ResponsesClient,
    model: String,
}

impl OpenAiSemanticScorer {
    pub fn new(client: ResponsesClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl SemanticScorer for OpenAiSemanticScorer {
    async fn similarity(&self, baseline: &[u8], candidate: &[u8]) -> Result<f64, AdapterError> {
        let system_text = "You score semantic identity consistency between two images. \
            Return strict JSON only: {\"semantic_similarity\": <float 0..1>}.";
        let input = two_image_input(system_text, baseline, candidate);

        let mut last_malformed = None;
        for _attempt in 0..2 {
            let raw = self.client.text(&self.model, input.clone()).await?;
            match parse_similarity(&raw) {
                Ok(score) => return Ok(score),
                Err(err @ AdapterError::MalformedOutput(_)) => last_malformed = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_malformed
            .unwrap_or_else(|| AdapterError::MalformedOutput("Semantic model returned invalid JSON".into())))
    }
}

/// Extract and clamp the single similarity float.
pub fn parse_similarity(raw: &str) -> Result<f64, AdapterError> {
    let payload = extract_json_object(raw)?;
    payload
        .get("semantic_similarity")
        .and_then(Value::as_f64)
        .map(|score| score.clamp(0.0, 1.0))
        .ok_or_else(|| AdapterError::MalformedOutput("Semantic output is missing 'semantic_similarity'".into()))
}

// ---------------------------------------------------------------------------
// Structural assessment
// ---------------------------------------------------------------------------

pub struct OpenAiStructuralScorer {
    client: ResponsesClient,
    model: String,
}

impl OpenAiStructuralScorer {
    pub fn new(client: ResponsesClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl StructuralScorer for OpenAiStructuralScorer {
    async fn assess(&self, baseline: &[u8], candidate: &[u8]) -> Result<StructuralAssessment, AdapterError> {
        let system_text = "Compare baseline image A and candidate image B for structural drift. \
            Return strict JSON only with keys: facial_structure_changed (bool), \
            lighting_shift (one of none/low/moderate/high), style_drift (one of low/moderate/high), \
            vision_structural_score (float 0..1), notes (short string).";
        let input = two_image_input(system_text, baseline, candidate);

        let mut last_malformed = None;
        for _attempt in 0..2 {
            let raw = self.client.text(&self.model, input.clone()).await?;
            match parse_assessment(&raw) {
                Ok(assessment) => return Ok(assessment),
                Err(err @ AdapterError::MalformedOutput(_)) => last_malformed = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_malformed
            .unwrap_or_else(|| AdapterError::MalformedOutput("Vision evaluator returned invalid JSON".into())))
    }
}

/// Validate the structural assessment. The score and boolean are required;
/// the enums parse leniently to `moderate`.
pub fn parse_assessment(raw: &str) -> Result<StructuralAssessment, AdapterError> {
    let payload = extract_json_object(raw)?;

    let score = payload
        .get("vision_structural_score")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            AdapterError::MalformedOutput("Vision output is missing 'vision_structural_score'".into())
        })?
        .clamp(0.0, 1.0);
    let facial_structure_changed = payload
        .get("facial_structure_changed")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            AdapterError::MalformedOutput("Vision output is missing 'facial_structure_changed'".into())
        })?;

    Ok(StructuralAssessment {
        facial_structure_changed,
        lighting_shift: LightingShift::parse_lenient(
            payload.get("lighting_shift").and_then(Value::as_str).unwrap_or(""),
        ),
        style_drift: StyleDrift::parse_lenient(payload.get("style_drift").and_then(Value::as_str).unwrap_or("")),
        vision_structural_score: score,
        notes: payload
            .get("notes")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Model-evaluated structural comparison.")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_parses_and_clamps() {
        assert_eq!(parse_similarity(r#"{"semantic_similarity": 0.87}"#).unwrap(), 0.87);
        assert_eq!(parse_similarity(r#"{"semantic_similarity": 1.4}"#).unwrap(), 1.0);
        assert!(matches!(
            parse_similarity(r#"{"similarity": 0.5}"#),
            Err(AdapterError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_similarity(r#"{"semantic_similarity": "high"}"#),
            Err(AdapterError::MalformedOutput(_))
        ));
    }

    #[test]
    fn assessment_parses_full_payload() {
        let raw = r#"{
            "facial_structure_changed": true,
            "lighting_shift": "high",
            "style_drift": "low",
            "vision_structural_score": 0.66,
            "notes": "lighting flipped"
        }"#;
        let assessment = parse_assessment(raw).unwrap();
        assert!(assessment.facial_structure_changed);
        assert_eq!(assessment.lighting_shift, LightingShift::High);
        assert_eq!(assessment.style_drift, StyleDrift::Low);
        assert_eq!(assessment.vision_structural_score, 0.66);
        assert_eq!(assessment.notes, "lighting flipped");
    }

    #[test]
    fn assessment_requires_score_and_bool() {
        assert!(matches!(
            parse_assessment(r#"{"facial_structure_changed": false}"#),
            Err(AdapterError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_assessment(r#"{"vision_structural_score": 0.5}"#),
            Err(AdapterError::MalformedOutput(_))
        ));
    }

    #[test]
    fn unknown_enum_tokens_default_to_moderate() {
        let raw = r#"{
            "facial_structure_changed": false,
            "lighting_shift": "dramatic",
            "style_drift": "massive",
            "vision_structural_score": 0.2
        }"#;
        let assessment = parse_assessment(raw).unwrap();
        assert_eq!(assessment.lighting_shift, LightingShift::Moderate);
        assert_eq!(assessment.style_drift, StyleDrift::Moderate);
        assert_eq!(assessment.notes, "Model-evaluated structural comparison.");
    }
}
