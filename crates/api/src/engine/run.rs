//! Process-volatile eval run state.
//!
//! Runs live only in memory: a restart loses every leaderboard while commits
//! and images written along the way stay visible through the repository. The
//! registry is an explicit component owned by the orchestrator — no ambient
//! singletons — and every read hands out a deep snapshot so HTTP handlers
//! never observe a torn run.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use promptsmith_core::error::{CoreError, CoreResult};
use promptsmith_core::ids;
use promptsmith_core::planner::PlannedVariant;
use promptsmith_core::refiner::SuggestionSet;
use promptsmith_core::scoring::Rubric;
use promptsmith_core::types::{Constraints, ObjectivePreset, Quality, RunStage, RunStatus, VariantStatus};

// ---------------------------------------------------------------------------
// Run model
// ---------------------------------------------------------------------------

/// Progress counters. Each only ever increases, and every counter is bounded
/// by `total_variants`.
#[derive(Debug, Clone, Serialize)]
pub struct EvalProgress {
    pub total_variants: u32,
    pub generated_variants: u32,
    pub evaluated_variants: u32,
    pub failed_variants: u32,
}

/// One prompt variant moving through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct EvalVariant {
    pub variant_id: String,
    pub variant_prompt: String,
    pub mutation_tags: Vec<String>,
    pub parent_commit_id: Option<String>,
    pub status: VariantStatus,
    pub generation_latency_ms: Option<u64>,
    pub judge_latency_ms: Option<u64>,
    pub commit_id: Option<String>,
    pub image_url: Option<String>,
    pub rationale: String,
    pub confidence: f64,
    pub prompt_adherence: f64,
    pub subject_fidelity: f64,
    pub composition_quality: f64,
    pub style_coherence: f64,
    pub technical_artifact_penalty: f64,
    pub strength_tags: Vec<String>,
    pub failure_tags: Vec<String>,
    pub composite_score: f64,
    pub rank: Option<u32>,
    pub error: Option<String>,
}

impl EvalVariant {
    /// Fresh variant straight out of planning.
    pub fn planned(variant_id: String, planned: PlannedVariant) -> Self {
        Self {
            variant_id,
            variant_prompt: planned.variant_prompt.trim().to_string(),
            mutation_tags: planned.mutation_tags,
            parent_commit_id: None,
            status: VariantStatus::Planned,
            generation_latency_ms: None,
            judge_latency_ms: None,
            commit_id: None,
            image_url: None,
            rationale: String::new(),
            confidence: 0.0,
            prompt_adherence: 0.0,
            subject_fidelity: 0.0,
            composition_quality: 0.0,
            style_coherence: 0.0,
            technical_artifact_penalty: 1.0,
            strength_tags: Vec::new(),
            failure_tags: Vec::new(),
            composite_score: 0.0,
            rank: None,
            error: None,
        }
    }

    /// Copy rubric fields onto the variant.
    pub fn apply_rubric(&mut self, rubric: &Rubric, composite: f64) {
        self.prompt_adherence = rubric.prompt_adherence;
        self.subject_fidelity = rubric.subject_fidelity;
        self.composition_quality = rubric.composition_quality;
        self.style_coherence = rubric.style_coherence;
        self.technical_artifact_penalty = rubric.technical_artifact_penalty;
        self.confidence = rubric.confidence;
        self.failure_tags = rubric.failure_tags.clone();
        self.strength_tags = rubric.strength_tags.clone();
        self.rationale = rubric.rationale.clone();
        self.composite_score = composite;
    }
}

/// One eval run, the unit the client polls.
#[derive(Debug, Clone, Serialize)]
pub struct EvalRun {
    pub run_id: String,
    pub project_id: String,
    pub base_prompt: String,
    pub objective_preset: ObjectivePreset,
    pub image_model: String,
    pub n_variants: u32,
    pub quality: Quality,
    pub parent_commit_id: Option<String>,
    /// The commit all variants edit from. Set once at the start of the
    /// generating stage and never reassigned.
    pub anchor_commit_id: Option<String>,
    pub constraints: Constraints,
    pub status: RunStatus,
    pub stage: RunStage,
    /// Latches to true on the first non-fatal fallback; never clears.
    pub degraded: bool,
    pub error: Option<String>,
    pub progress: EvalProgress,
    pub variants: Vec<EvalVariant>,
    pub leaderboard: Vec<EvalVariant>,
    pub top_k: Vec<String>,
    pub suggestions: SuggestionSet,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Mutex-guarded map of all runs in this process.
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, EvalRun>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, EvalRun>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, run: EvalRun) {
        self.guard().insert(run.run_id.clone(), run);
    }

    /// Deep snapshot of a run for handlers and stage logic.
    pub fn snapshot(&self, run_id: &str) -> CoreResult<EvalRun> {
        self.guard()
            .get(run_id)
            .cloned()
            .ok_or_else(|| CoreError::EvalRunNotFound(run_id.to_string()))
    }

    /// Apply a mutation under the lock; bumps `updated_at`.
    pub fn update<F>(&self, run_id: &str, mutate: F) -> CoreResult<()>
    where
        F: FnOnce(&mut EvalRun),
    {
        let mut runs = self.guard();
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| CoreError::EvalRunNotFound(run_id.to_string()))?;
        mutate(run);
        run.updated_at = ids::utc_now_iso();
        Ok(())
    }

    /// Mutate a single variant under the lock.
    pub fn update_variant<F>(&self, run_id: &str, variant_id: &str, mutate: F) -> CoreResult<()>
    where
        F: FnOnce(&mut EvalVariant),
    {
        self.update(run_id, |run| {
            if let Some(variant) = run.variants.iter_mut().find(|v| v.variant_id == variant_id) {
                mutate(variant);
            }
        })
    }
}
