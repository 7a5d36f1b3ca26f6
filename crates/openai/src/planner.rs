//! Variant planning adapter: base prompt + constraints → N prompt variants
//! with mutation tags.

use async_trait::async_trait;
use serde_json::{json, Value};

use promptsmith_core::planner::PlannedVariant;
use promptsmith_core::types::{Constraints, ObjectivePreset};

use crate::error::AdapterError;
use crate::responses::{extract_json_object, string_list, ResponsesClient};

/// Maximum mutation tags kept per variant.
const MAX_MUTATION_TAGS: usize = 6;

/// The variant-plan operation. The adapter retries malformed JSON once; the
/// orchestrator handles short or failed plans with the template fallback.
#[async_trait]
pub trait VariantPlanner: Send + Sync {
    async fn plan(
        &self,
        base_prompt: &str,
        objective: ObjectivePreset,
        constraints: &Constraints,
        n_variants: usize,
    ) -> Result<Vec<PlannedVariant>, AdapterError>;
}

pub struct OpenAiPlanner {
    client: ResponsesClient,
    model: String,
}

impl OpenAiPlanner {
    pub fn new(client: ResponsesClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl VariantPlanner for OpenAiPlanner {
    async fn plan(
        &self,
        base_prompt: &str,
        objective: ObjectivePreset,
        constraints: &Constraints,
        n_variants: usize,
    ) -> Result<Vec<PlannedVariant>, AdapterError> {
        let system_text = "You are an expert image prompt-variation planner. Return strict JSON only in this shape: \
            {\"variants\":[{\"variant_prompt\":\"...\",\"mutation_tags\":[\"...\"]}]} Do not include markdown fences.";
        let user_text = format!(
            "Base prompt: {base_prompt}\nObjective preset: {}\nMust include: {:?}\nMust avoid: {:?}\n\
             Generate exactly {n_variants} semantically distinct prompt variants. \
             Mutation tags should include details like composition, lighting, lens, style, and negatives.",
            objective.as_str(),
            constraints.must_include,
            constraints.must_avoid,
        );
        let input = json!([
            {"role": "system", "content": [{"type": "input_text", "text": system_text}]},
            {"role": "user", "content": [{"type": "input_text", "text": user_text}]},
        ]);

        let mut last_malformed = None;
        for _attempt in 0..2 {
            let raw = self.client.text(&self.model, input.clone()).await?;
            match parse_plan(&raw, n_variants) {
                Ok(variants) => return Ok(variants),
                Err(err @ AdapterError::MalformedOutput(_)) => last_malformed = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_malformed
            .unwrap_or_else(|| AdapterError::MalformedOutput("Planner returned invalid JSON".into())))
    }
}

/// Validate planner output. Entries without a prompt are dropped; the list is
/// truncated to `n_variants`; an empty result is malformed.
pub fn parse_plan(raw: &str, n_variants: usize) -> Result<Vec<PlannedVariant>, AdapterError> {
    let payload = extract_json_object(raw)?;
    let items = payload
        .get("variants")
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::MalformedOutput("Planner output is missing 'variants'".into()))?;

    let variants: Vec<PlannedVariant> = items
        .iter()
        .filter_map(|item| {
            let prompt = item.get("variant_prompt")?.as_str()?.trim();
            if prompt.is_empty() {
                return None;
            }
            Some(PlannedVariant {
                variant_prompt: prompt.to_string(),
                mutation_tags: string_list(item.get("mutation_tags"), MAX_MUTATION_TAGS),
            })
        })
        .take(n_variants)
        .collect();

    if variants.is_empty() {
        return Err(AdapterError::MalformedOutput("Planner produced no usable variants".into()));
    }
    Ok(variants)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_truncates_to_n() {
        let raw = r#"{"variants": [
            {"variant_prompt": "a", "mutation_tags": ["lighting"]},
            {"variant_prompt": "b", "mutation_tags": []},
            {"variant_prompt": "c"},
            {"variant_prompt": "d"}
        ]}"#;
        let plan = parse_plan(raw, 3).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].variant_prompt, "a");
        assert_eq!(plan[0].mutation_tags, vec!["lighting"]);
        assert!(plan[2].mutation_tags.is_empty());
    }

    #[test]
    fn drops_blank_prompts() {
        let raw = r#"{"variants": [{"variant_prompt": "  "}, {"variant_prompt": "ok"}]}"#;
        let plan = parse_plan(raw, 3).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].variant_prompt, "ok");
    }

    #[test]
    fn empty_or_missing_lists_are_malformed() {
        assert!(matches!(
            parse_plan(r#"{"variants": []}"#, 2),
            Err(AdapterError::MalformedOutput(_))
        ));
        assert!(matches!(parse_plan(r#"{}"#, 2), Err(AdapterError::MalformedOutput(_))));
        assert!(matches!(
            parse_plan(r#"{"variants": "nope"}"#, 2),
            Err(AdapterError::MalformedOutput(_))
        ));
    }
}
