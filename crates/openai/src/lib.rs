//! Adapter layer for the external model providers.
//!
//! Every adapter is a trait so the orchestrators depend only on the seam:
//! [`generator::Generator`], [`judge::Judge`], [`planner::VariantPlanner`],
//! [`refiner::Refiner`], and the compare signal scorers in [`signals`].
//! OpenAI-backed implementations live next to each trait; when no API key is
//! configured the bundle swaps in a deterministic offline generator and
//! unavailable stubs so the deterministic fallbacks engage downstream.

use std::sync::Arc;
use std::time::Duration;

pub mod error;
pub mod generator;
pub mod judge;
pub mod offline;
pub mod planner;
pub mod refiner;
pub mod responses;
pub mod signals;

use error::AdapterError;
use generator::{Generator, OpenAiGenerator};
use judge::{Judge, OpenAiJudge};
use offline::OfflineGenerator;
use planner::{OpenAiPlanner, VariantPlanner};
use refiner::{OpenAiRefiner, Refiner};
use responses::ResponsesClient;
use signals::{OpenAiSemanticScorer, OpenAiStructuralScorer, SemanticScorer, StructuralScorer};

/// Connection settings for the adapter bundle.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub image_model: String,
    pub vision_model: String,
    pub text_model: String,
    pub timeout: Duration,
}

/// The full adapter seam handed to the orchestrators.
#[derive(Clone)]
pub struct Adapters {
    pub generator: Arc<dyn Generator>,
    pub judge: Arc<dyn Judge>,
    pub planner: Arc<dyn VariantPlanner>,
    pub refiner: Arc<dyn Refiner>,
    pub semantic: Arc<dyn SemanticScorer>,
    pub structural: Arc<dyn StructuralScorer>,
    /// True when no API key is configured and deterministic fallbacks carry
    /// the whole pipeline. Runs executed offline are always degraded.
    pub offline: bool,
}

impl Adapters {
    /// Build the bundle from configuration. Without an API key every model
    /// call is replaced by its deterministic fallback path.
    pub fn from_config(config: OpenAiConfig) -> Result<Self, AdapterError> {
        let Some(api_key) = config.api_key.filter(|key| !key.trim().is_empty()) else {
            let unavailable = Arc::new(Unconfigured);
            return Ok(Self {
                generator: Arc::new(OfflineGenerator::default()),
                judge: unavailable.clone(),
                planner: unavailable.clone(),
                refiner: unavailable.clone(),
                semantic: unavailable.clone(),
                structural: unavailable,
                offline: true,
            });
        };

        let client = ResponsesClient::new(api_key.clone(), config.timeout)?;
        Ok(Self {
            generator: Arc::new(OpenAiGenerator::new(api_key, config.timeout, config.image_model)?),
            judge: Arc::new(OpenAiJudge::new(client.clone(), config.vision_model.clone())),
            planner: Arc::new(OpenAiPlanner::new(client.clone(), config.text_model.clone())),
            refiner: Arc::new(OpenAiRefiner::new(client.clone(), config.text_model)),
            semantic: Arc::new(OpenAiSemanticScorer::new(client.clone(), config.vision_model.clone())),
            structural: Arc::new(OpenAiStructuralScorer::new(client, config.vision_model)),
            offline: false,
        })
    }
}

/// Stub used for every non-generator adapter when no API key is configured.
/// Each call fails immediately so the caller's deterministic fallback runs.
struct Unconfigured;

const NO_KEY: &str = "OPENAI_API_KEY is not configured";

#[async_trait::async_trait]
impl Judge for Unconfigured {
    async fn score(&self, _request: judge::JudgeRequest<'_>) -> Result<promptsmith_core::scoring::Rubric, AdapterError> {
        Err(AdapterError::Unavailable(NO_KEY.into()))
    }
}

#[async_trait::async_trait]
impl VariantPlanner for Unconfigured {
    async fn plan(
        &self,
        _base_prompt: &str,
        _objective: promptsmith_core::types::ObjectivePreset,
        _constraints: &promptsmith_core::types::Constraints,
        _n_variants: usize,
    ) -> Result<Vec<promptsmith_core::planner::PlannedVariant>, AdapterError> {
        Err(AdapterError::Unavailable(NO_KEY.into()))
    }
}

#[async_trait::async_trait]
impl Refiner for Unconfigured {
    async fn synthesize(
        &self,
        _digest: &refiner::RunDigest,
    ) -> Result<promptsmith_core::refiner::SuggestionSet, AdapterError> {
        Err(AdapterError::Unavailable(NO_KEY.into()))
    }
}

#[async_trait::async_trait]
impl SemanticScorer for Unconfigured {
    async fn similarity(&self, _baseline: &[u8], _candidate: &[u8]) -> Result<f64, AdapterError> {
        Err(AdapterError::Unavailable(NO_KEY.into()))
    }
}

#[async_trait::async_trait]
impl StructuralScorer for Unconfigured {
    async fn assess(&self, _baseline: &[u8], _candidate: &[u8]) -> Result<signals::StructuralAssessment, AdapterError> {
        Err(AdapterError::Unavailable(NO_KEY.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_selects_offline_bundle() {
        let adapters = Adapters::from_config(OpenAiConfig {
            api_key: None,
            image_model: "gpt-image-1".into(),
            vision_model: "gpt-4.1-mini".into(),
            text_model: "gpt-4.1-mini".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert!(adapters.offline);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let adapters = Adapters::from_config(OpenAiConfig {
            api_key: Some("   ".into()),
            image_model: "gpt-image-1".into(),
            vision_model: "gpt-4.1-mini".into(),
            text_model: "gpt-4.1-mini".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert!(adapters.offline);
    }

    #[tokio::test]
    async fn unconfigured_stubs_fail_fast() {
        let err = Unconfigured
            .similarity(b"a", b"b")
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable(_)));
        assert!(!err.is_transient());
    }
}
