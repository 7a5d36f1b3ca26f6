//! The eval pipeline orchestrator.
//!
//! Each run executes on its own Tokio task through five stages:
//! planning -> generating -> evaluating -> refining -> terminal. The
//! generating and evaluating stages fan out per-variant subtasks bounded by a
//! width-4 semaphore and join them before advancing, which keeps progress
//! accounting and termination trivial. Per-variant failures never escape
//! their task: they transition the variant, latch `degraded`, and the stage
//! carries on. Only anchor generation and internal errors are fatal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use promptsmith_core::error::{CoreError, CoreResult};
use promptsmith_core::ids;
use promptsmith_core::planner::{self, PlannedVariant};
use promptsmith_core::ranking::{hard_rule_violations, rank_order, RankKey};
use promptsmith_core::refiner::{self, SuggestionSet};
use promptsmith_core::scoring::{composite_score, neutral_fallback_rubric};
use promptsmith_core::types::{CommitStatus, Constraints, ObjectivePreset, Quality, RunStage, RunStatus, VariantStatus};
use promptsmith_openai::error::AdapterError;
use promptsmith_openai::judge::JudgeRequest;
use promptsmith_openai::refiner::{RunDigest, VariantDigest};
use promptsmith_openai::Adapters;
use promptsmith_store::{NewCommit, Repository};

use crate::engine::run::{EvalProgress, EvalRun, EvalVariant, RunRegistry};

/// Concurrent image generations per run.
const GENERATION_CONCURRENCY: usize = 4;
/// Concurrent judge evaluations per run.
const EVALUATION_CONCURRENCY: usize = 4;
/// Leaderboard prefix reported as `top_k`.
const TOP_K: usize = 3;
/// Leaderboard tail included in the refiner digest.
const DIGEST_BOTTOM: usize = 2;
/// Filename of the single image each commit stores.
const IMAGE_FILENAME: &str = "img_01.png";

/// Inputs for creating a run, already shape-validated by the handler.
#[derive(Debug, Clone)]
pub struct CreateRunParams {
    pub project_id: String,
    pub base_prompt: String,
    pub objective_preset: ObjectivePreset,
    pub image_model: String,
    pub n_variants: usize,
    pub quality: Quality,
    pub parent_commit_id: Option<String>,
    pub constraints: Constraints,
}

/// Multi-stage run executor. Owns the process-volatile run registry.
pub struct EvalOrchestrator {
    executor: RunExecutor,
}

impl EvalOrchestrator {
    pub fn new(repository: Arc<Repository>, adapters: Adapters) -> Self {
        Self {
            executor: RunExecutor {
                repository,
                adapters,
                runs: Arc::new(RunRegistry::new()),
            },
        }
    }

    /// Validate inputs, register the queued run, and schedule asynchronous
    /// execution. Returns the queued snapshot immediately.
    pub fn create_run(&self, params: CreateRunParams) -> CoreResult<EvalRun> {
        self.executor.repository.ensure_project(&params.project_id)?;
        if let Some(parent_id) = &params.parent_commit_id {
            let parent = self
                .executor
                .repository
                .get_commit(parent_id, Some(&params.project_id))?;
            if !parent.is_comparable() {
                return Err(CoreError::CommitNotFound(format!(
                    "Commit '{parent_id}' is not a successful generation with image artifacts"
                )));
            }
        }

        let run_id = ids::new_run_id();
        let now = ids::utc_now_iso();
        let run = EvalRun {
            run_id: run_id.clone(),
            project_id: params.project_id,
            base_prompt: params.base_prompt,
            objective_preset: params.objective_preset,
            image_model: params.image_model,
            n_variants: params.n_variants as u32,
            quality: params.quality,
            parent_commit_id: params.parent_commit_id,
            anchor_commit_id: None,
            constraints: params.constraints,
            status: RunStatus::Queued,
            stage: RunStage::Queued,
            degraded: false,
            error: None,
            progress: EvalProgress {
                total_variants: params.n_variants as u32,
                generated_variants: 0,
                evaluated_variants: 0,
                failed_variants: 0,
            },
            variants: Vec::new(),
            leaderboard: Vec::new(),
            top_k: Vec::new(),
            suggestions: SuggestionSet::default(),
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        };
        self.executor.runs.insert(run);

        let executor = self.executor.clone();
        let spawned_id = run_id.clone();
        tokio::spawn(async move {
            executor.execute(spawned_id).await;
        });

        self.executor.runs.snapshot(&run_id)
    }

    /// Snapshot read of the current run state.
    pub fn get_run(&self, run_id: &str) -> CoreResult<EvalRun> {
        self.executor.runs.snapshot(run_id)
    }
}

/// Borrowed identifiers threaded through one variant's generation outcome.
struct VariantContext<'a> {
    run_id: &'a str,
    project_id: &'a str,
    anchor_id: &'a str,
    variant_id: &'a str,
    prompt: &'a str,
    model: &'a str,
}

/// Everything a run task needs; cheap to clone into per-variant subtasks.
#[derive(Clone)]
struct RunExecutor {
    repository: Arc<Repository>,
    adapters: Adapters,
    runs: Arc<RunRegistry>,
}

impl RunExecutor {
    async fn execute(&self, run_id: String) {
        if let Err(err) = self.run_stages(&run_id).await {
            let code = err.code();
            tracing::error!(run_id = %run_id, code, error = %err, "Eval run failed");
            let _ = self.runs.update(&run_id, |run| {
                run.status = RunStatus::Failed;
                run.stage = RunStage::Failed;
                run.error = Some(format!("{code}: {err}"));
                run.completed_at = Some(ids::utc_now_iso());
            });
        }
    }

    fn set_stage(&self, run_id: &str, stage: RunStage) -> CoreResult<()> {
        self.runs.update(run_id, |run| {
            run.stage = stage;
            run.status = RunStatus::Running;
        })
    }

    fn mark_degraded(&self, run_id: &str) {
        let _ = self.runs.update(run_id, |run| run.degraded = true);
    }

    async fn run_stages(&self, run_id: &str) -> CoreResult<()> {
        // Offline operation carries the whole pipeline on fallbacks.
        if self.adapters.offline {
            tracing::warn!(run_id, "Executing without an API key; run is degraded from the start");
            self.mark_degraded(run_id);
        }

        // -- planning --
        self.set_stage(run_id, RunStage::Planning)?;
        let run = self.runs.snapshot(run_id)?;
        let planned = self.plan_variants(&run).await;
        self.runs.update(run_id, |run| {
            run.variants = planned
                .into_iter()
                .enumerate()
                .map(|(index, plan)| EvalVariant::planned(ids::variant_id(index), plan))
                .collect();
        })?;

        // -- generating --
        self.set_stage(run_id, RunStage::Generating)?;
        let run = self.runs.snapshot(run_id)?;
        let (anchor_commit_id, anchor_bytes) = self.resolve_anchor(&run).await?;
        self.runs.update(run_id, |run| {
            run.anchor_commit_id = Some(anchor_commit_id.clone());
        })?;
        let images = self
            .generate_variants(run_id, &run, &anchor_commit_id, anchor_bytes)
            .await;

        // -- evaluating --
        self.set_stage(run_id, RunStage::Evaluating)?;
        let run = self.runs.snapshot(run_id)?;
        self.evaluate_variants(run_id, &run, &images).await;

        // -- ranking --
        let run = self.runs.snapshot(run_id)?;
        let (leaderboard, top_k) = rank_variants(&run.variants);
        self.runs.update(run_id, |run| {
            for ranked in &leaderboard {
                if let Some(variant) = run.variants.iter_mut().find(|v| v.variant_id == ranked.variant_id) {
                    variant.rank = ranked.rank;
                }
            }
            run.leaderboard = leaderboard.clone();
            run.top_k = top_k;
        })?;

        // -- refining --
        self.set_stage(run_id, RunStage::Refining)?;
        let run = self.runs.snapshot(run_id)?;
        let suggestions = self.synthesize_suggestions(run_id, &run).await;
        self.runs.update(run_id, |run| run.suggestions = suggestions)?;

        // -- terminal --
        let degraded = self.runs.snapshot(run_id)?.degraded;
        let (terminal_status, terminal_stage) = if degraded {
            (RunStatus::CompletedDegraded, RunStage::CompletedDegraded)
        } else {
            (RunStatus::Completed, RunStage::Completed)
        };
        self.runs.update(run_id, |run| {
            run.status = terminal_status;
            run.stage = terminal_stage;
            run.completed_at = Some(ids::utc_now_iso());
        })?;
        tracing::info!(run_id, status = ?terminal_status, "Eval run finished");
        Ok(())
    }

    // -- planning -----------------------------------------------------------

    /// Plan N variants, falling back to the deterministic template mutator on
    /// failure or a short plan.
    async fn plan_variants(&self, run: &EvalRun) -> Vec<PlannedVariant> {
        let n = run.n_variants as usize;
        match self
            .adapters
            .planner
            .plan(&run.base_prompt, run.objective_preset, &run.constraints, n)
            .await
        {
            Ok(mut planned) if planned.len() >= n => {
                planned.truncate(n);
                planned
            }
            Ok(planned) => {
                tracing::warn!(
                    run_id = %run.run_id,
                    requested = n,
                    received = planned.len(),
                    "Planner returned a short plan; using template fallback",
                );
                self.mark_degraded(&run.run_id);
                planner::fallback_variants(&run.base_prompt, &run.constraints, n)
            }
            Err(err) => {
                tracing::warn!(run_id = %run.run_id, error = %err, "Planner unavailable; using template fallback");
                self.mark_degraded(&run.run_id);
                planner::fallback_variants(&run.base_prompt, &run.constraints, n)
            }
        }
    }

    // -- generating ---------------------------------------------------------

    /// Resolve the edit anchor: the supplied parent commit's first image, or
    /// a freshly generated root commit. Failure here is fatal to the run.
    async fn resolve_anchor(&self, run: &EvalRun) -> CoreResult<(String, Arc<Vec<u8>>)> {
        if let Some(parent_id) = &run.parent_commit_id {
            let parent = self.repository.get_commit(parent_id, Some(&run.project_id))?;
            let image_ref = parent.first_image().ok_or_else(|| {
                CoreError::CommitNotFound(format!("Commit '{parent_id}' is missing image artifacts"))
            })?;
            let bytes = self.repository.blobs().read_url(image_ref)?;
            return Ok((parent_id.clone(), Arc::new(bytes)));
        }

        let bytes = retry_transient(|| {
            self.adapters
                .generator
                .text_to_image(&run.base_prompt, &run.image_model, run.quality)
        })
        .await
        .map_err(CoreError::from)?;

        let commit_id = self.repository.reserve_commit_id()?;
        let image_url = self
            .repository
            .blobs()
            .put_commit_image(&commit_id, IMAGE_FILENAME, &bytes)?;
        self.repository.create_commit(NewCommit {
            commit_id: commit_id.clone(),
            project_id: run.project_id.clone(),
            prompt: run.base_prompt.clone(),
            model: run.image_model.clone(),
            seed: None,
            parent_commit_id: None,
            image_paths: vec![image_url],
            status: CommitStatus::Success,
            error: None,
        })?;
        tracing::info!(run_id = %run.run_id, commit_id, "Anchor commit created");
        Ok((commit_id, Arc::new(bytes)))
    }

    /// Fan out per-variant image edits under the generation semaphore.
    /// Returns the bytes of each successfully generated image.
    async fn generate_variants(
        &self,
        run_id: &str,
        run: &EvalRun,
        anchor_commit_id: &str,
        anchor_bytes: Arc<Vec<u8>>,
    ) -> HashMap<String, Arc<Vec<u8>>> {
        let semaphore = Arc::new(Semaphore::new(GENERATION_CONCURRENCY));
        let mut tasks: JoinSet<Option<(String, Arc<Vec<u8>>)>> = JoinSet::new();

        for variant in &run.variants {
            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let anchor_bytes = Arc::clone(&anchor_bytes);
            let run_id = run_id.to_string();
            let project_id = run.project_id.clone();
            let anchor_id = anchor_commit_id.to_string();
            let variant_id = variant.variant_id.clone();
            let prompt = variant.variant_prompt.clone();
            let model = run.image_model.clone();
            let quality = run.quality;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                let started = Instant::now();
                let outcome = retry_transient(|| {
                    executor
                        .adapters
                        .generator
                        .image_edit(&anchor_bytes, &prompt, &model, quality)
                })
                .await;
                let latency_ms = started.elapsed().as_millis() as u64;

                let ctx = VariantContext {
                    run_id: &run_id,
                    project_id: &project_id,
                    anchor_id: &anchor_id,
                    variant_id: &variant_id,
                    prompt: &prompt,
                    model: &model,
                };
                match outcome {
                    Ok(bytes) => executor.persist_generated_variant(&ctx, bytes, latency_ms),
                    Err(err) => {
                        executor.record_generation_failure(&ctx, err.into(), latency_ms);
                        None
                    }
                }
            });
        }

        let mut images = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some((variant_id, bytes))) = joined {
                images.insert(variant_id, bytes);
            }
        }
        images
    }

    /// Persist a successful generation. Storage failures downgrade the
    /// variant to `generation_failed` instead of aborting the run.
    fn persist_generated_variant(
        &self,
        ctx: &VariantContext<'_>,
        bytes: Vec<u8>,
        latency_ms: u64,
    ) -> Option<(String, Arc<Vec<u8>>)> {
        let persisted: CoreResult<(String, String)> = (|| {
            let commit_id = self.repository.reserve_commit_id()?;
            let image_url = self
                .repository
                .blobs()
                .put_commit_image(&commit_id, IMAGE_FILENAME, &bytes)?;
            self.repository.create_commit(NewCommit {
                commit_id: commit_id.clone(),
                project_id: ctx.project_id.to_string(),
                prompt: ctx.prompt.to_string(),
                model: ctx.model.to_string(),
                seed: None,
                parent_commit_id: Some(ctx.anchor_id.to_string()),
                image_paths: vec![image_url.clone()],
                status: CommitStatus::Success,
                error: None,
            })?;
            Ok((commit_id, image_url))
        })();

        match persisted {
            Ok((commit_id, image_url)) => {
                let _ = self.runs.update_variant(ctx.run_id, ctx.variant_id, |variant| {
                    variant.status = VariantStatus::Generated;
                    variant.commit_id = Some(commit_id);
                    variant.parent_commit_id = Some(ctx.anchor_id.to_string());
                    variant.image_url = Some(image_url);
                    variant.generation_latency_ms = Some(latency_ms);
                });
                let _ = self.runs.update(ctx.run_id, |run| run.progress.generated_variants += 1);
                Some((ctx.variant_id.to_string(), Arc::new(bytes)))
            }
            Err(err) => {
                tracing::error!(
                    run_id = ctx.run_id,
                    variant_id = ctx.variant_id,
                    error = %err,
                    "Failed to persist generated variant",
                );
                self.record_generation_failure(ctx, err, latency_ms);
                None
            }
        }
    }

    /// Record a failed generation: failed commit (best effort), variant
    /// transition, degraded latch, counters.
    fn record_generation_failure(&self, ctx: &VariantContext<'_>, err: CoreError, latency_ms: u64) {
        tracing::warn!(
            run_id = ctx.run_id,
            variant_id = ctx.variant_id,
            code = err.code(),
            error = %err,
            "Variant generation failed",
        );
        self.mark_degraded(ctx.run_id);

        let failed_commit = self.repository.reserve_commit_id().and_then(|commit_id| {
            self.repository.create_commit(NewCommit {
                commit_id,
                project_id: ctx.project_id.to_string(),
                prompt: ctx.prompt.to_string(),
                model: ctx.model.to_string(),
                seed: None,
                parent_commit_id: Some(ctx.anchor_id.to_string()),
                image_paths: Vec::new(),
                status: CommitStatus::Failed,
                error: Some(format!("{}: {err}", err.code())),
            })
        });
        let commit_id = match failed_commit {
            Ok(commit) => Some(commit.commit_id),
            Err(store_err) => {
                tracing::warn!(
                    run_id = ctx.run_id,
                    variant_id = ctx.variant_id,
                    error = %store_err,
                    "Failed to persist failure commit",
                );
                None
            }
        };

        let _ = self.runs.update_variant(ctx.run_id, ctx.variant_id, |variant| {
            variant.status = VariantStatus::GenerationFailed;
            variant.commit_id = commit_id;
            variant.parent_commit_id = Some(ctx.anchor_id.to_string());
            variant.generation_latency_ms = Some(latency_ms);
            variant.error = Some(err.to_string());
        });
        let _ = self.runs.update(ctx.run_id, |run| run.progress.failed_variants += 1);
    }

    // -- evaluating ---------------------------------------------------------

    /// Fan out judge calls under the evaluation semaphore. Every variant
    /// advances `evaluated_variants` exactly once, skipped ones included, so
    /// progress stays bounded by `total_variants`.
    async fn evaluate_variants(&self, run_id: &str, run: &EvalRun, images: &HashMap<String, Arc<Vec<u8>>>) {
        let semaphore = Arc::new(Semaphore::new(EVALUATION_CONCURRENCY));
        let mut tasks: JoinSet<()> = JoinSet::new();

        for variant in &run.variants {
            let Some(image) = images.get(&variant.variant_id) else {
                let _ = self.runs.update_variant(run_id, &variant.variant_id, |variant| {
                    variant.status = VariantStatus::EvaluationSkipped;
                    variant.failure_tags = vec!["generation_failed".to_string()];
                    variant.rationale = "Evaluation skipped because image generation failed.".to_string();
                });
                let _ = self.runs.update(run_id, |run| run.progress.evaluated_variants += 1);
                continue;
            };

            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let image = Arc::clone(image);
            let run_id = run_id.to_string();
            let variant_id = variant.variant_id.clone();
            let variant_prompt = variant.variant_prompt.clone();
            let base_prompt = run.base_prompt.clone();
            let objective = run.objective_preset;
            let constraints = run.constraints.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let started = Instant::now();
                let scored = executor
                    .adapters
                    .judge
                    .score(JudgeRequest {
                        base_prompt: &base_prompt,
                        variant_prompt: &variant_prompt,
                        objective,
                        constraints: &constraints,
                        image: &image,
                    })
                    .await;
                let latency_ms = started.elapsed().as_millis() as u64;

                match scored {
                    Ok(rubric) => {
                        let composite = composite_score(&rubric);
                        let _ = executor.runs.update_variant(&run_id, &variant_id, |variant| {
                            variant.status = VariantStatus::Evaluated;
                            variant.judge_latency_ms = Some(latency_ms);
                            variant.apply_rubric(&rubric, composite);
                        });
                        let _ = executor
                            .runs
                            .update(&run_id, |run| run.progress.evaluated_variants += 1);
                    }
                    Err(err) => {
                        tracing::warn!(
                            run_id = %run_id,
                            variant_id = %variant_id,
                            error = %err,
                            "Judge unavailable; applying neutral fallback rubric",
                        );
                        executor.mark_degraded(&run_id);
                        let mut rubric = neutral_fallback_rubric();
                        rubric.rationale = format!("Evaluation failed, assigned neutral fallback rubric. ({err})");
                        let composite = composite_score(&rubric);
                        let _ = executor.runs.update_variant(&run_id, &variant_id, |variant| {
                            variant.status = VariantStatus::EvaluatedDegraded;
                            variant.judge_latency_ms = Some(latency_ms);
                            variant.apply_rubric(&rubric, composite);
                            variant.error = Some(err.to_string());
                        });
                        let _ = executor.runs.update(&run_id, |run| {
                            run.progress.evaluated_variants += 1;
                            run.progress.failed_variants += 1;
                        });
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}
    }

    // -- refining -----------------------------------------------------------

    /// Synthesize the three suggestions, deterministically when the refiner
    /// cannot.
    async fn synthesize_suggestions(&self, run_id: &str, run: &EvalRun) -> SuggestionSet {
        if !run.leaderboard.is_empty() {
            let digest = build_digest(run);
            match self.adapters.refiner.synthesize(&digest).await {
                Ok(set) => return set,
                Err(err) => {
                    tracing::warn!(run_id, error = %err, "Refiner unavailable; using deterministic fallback");
                }
            }
        }
        self.mark_degraded(run_id);

        let top = run.leaderboard.first();
        refiner::fallback_suggestions(
            &run.base_prompt,
            run.objective_preset,
            top.map(|v| v.variant_prompt.as_str()),
            top.and_then(|v| v.strength_tags.first().map(String::as_str)),
            run.leaderboard
                .last()
                .and_then(|v| v.failure_tags.first().map(String::as_str)),
        )
    }
}

// ---------------------------------------------------------------------------
// Pure stage helpers
// ---------------------------------------------------------------------------

/// Sort evaluated variants into the leaderboard, assign ranks, and pick
/// `top_k`. Unranked variants are untouched.
fn rank_variants(variants: &[EvalVariant]) -> (Vec<EvalVariant>, Vec<String>) {
    let mut leaderboard: Vec<EvalVariant> = variants
        .iter()
        .filter(|variant| variant.status.is_rankable())
        .cloned()
        .collect();

    leaderboard.sort_by(|a, b| rank_order(&rank_key(a), &rank_key(b)));
    for (index, variant) in leaderboard.iter_mut().enumerate() {
        variant.rank = Some(index as u32 + 1);
    }

    let top_k = leaderboard
        .iter()
        .take(TOP_K)
        .map(|variant| variant.variant_id.clone())
        .collect();
    (leaderboard, top_k)
}

fn rank_key(variant: &EvalVariant) -> RankKey {
    RankKey {
        composite_score: variant.composite_score,
        confidence: variant.confidence,
        technical_artifact_penalty: variant.technical_artifact_penalty,
        hard_rule_violations: hard_rule_violations(&variant.failure_tags),
        variant_id: variant.variant_id.clone(),
    }
}

/// Compact leaderboard summary for the refiner: top 3 with strengths, bottom
/// 2 with failures.
fn build_digest(run: &EvalRun) -> RunDigest {
    let top: Vec<VariantDigest> = run.leaderboard.iter().take(TOP_K).map(to_digest).collect();
    let bottom: Vec<VariantDigest> = if run.leaderboard.len() > DIGEST_BOTTOM {
        run.leaderboard
            .iter()
            .skip(run.leaderboard.len() - DIGEST_BOTTOM)
            .map(to_digest)
            .collect()
    } else {
        run.leaderboard.iter().map(to_digest).collect()
    };

    RunDigest {
        base_prompt: run.base_prompt.clone(),
        objective: run.objective_preset,
        top,
        bottom,
    }
}

fn to_digest(variant: &EvalVariant) -> VariantDigest {
    VariantDigest {
        variant_id: variant.variant_id.clone(),
        variant_prompt: variant.variant_prompt.clone(),
        composite_score: variant.composite_score,
        strength_tags: variant.strength_tags.clone(),
        failure_tags: variant.failure_tags.clone(),
    }
}

/// Run an adapter call with one automatic retry on transient failure.
async fn retry_transient<F, Fut>(mut call: F) -> Result<Vec<u8>, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<u8>, AdapterError>>,
{
    match call().await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.is_transient() => {
            tracing::warn!(error = %err, "Transient upstream failure; retrying once");
            call().await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith_core::planner::PlannedVariant;

    fn evaluated(id: &str, composite: f64, confidence: f64) -> EvalVariant {
        let mut variant = EvalVariant::planned(
            id.to_string(),
            PlannedVariant {
                variant_prompt: format!("prompt {id}"),
                mutation_tags: Vec::new(),
            },
        );
        variant.status = VariantStatus::Evaluated;
        variant.composite_score = composite;
        variant.confidence = confidence;
        variant.technical_artifact_penalty = 0.1;
        variant
    }

    #[test]
    fn ranking_filters_and_orders() {
        let mut skipped = evaluated("v03", 0.9, 0.9);
        skipped.status = VariantStatus::EvaluationSkipped;
        let variants = vec![evaluated("v01", 0.5, 0.5), evaluated("v02", 0.7, 0.5), skipped];

        let (leaderboard, top_k) = rank_variants(&variants);
        assert_eq!(leaderboard.len(), 2);
        assert_eq!(leaderboard[0].variant_id, "v02");
        assert_eq!(leaderboard[0].rank, Some(1));
        assert_eq!(leaderboard[1].rank, Some(2));
        assert_eq!(top_k, vec!["v02", "v01"]);
    }

    #[test]
    fn ranking_tie_breaks_on_variant_id() {
        let variants = vec![evaluated("v02", 0.5, 0.5), evaluated("v01", 0.5, 0.5)];
        let (leaderboard, _) = rank_variants(&variants);
        assert_eq!(leaderboard[0].variant_id, "v01");
    }

    #[test]
    fn top_k_caps_at_three() {
        let variants: Vec<EvalVariant> = (1..=5)
            .map(|i| evaluated(&format!("v0{i}"), 1.0 - i as f64 * 0.1, 0.5))
            .collect();
        let (leaderboard, top_k) = rank_variants(&variants);
        assert_eq!(leaderboard.len(), 5);
        assert_eq!(top_k.len(), 3);
        assert_eq!(top_k, vec!["v01", "v02", "v03"]);
    }

    #[test]
    fn empty_leaderboard_yields_empty_top_k() {
        let mut failed = evaluated("v01", 0.9, 0.9);
        failed.status = VariantStatus::GenerationFailed;
        let (leaderboard, top_k) = rank_variants(&[failed]);
        assert!(leaderboard.is_empty());
        assert!(top_k.is_empty());
    }

    #[test]
    fn digest_takes_top_three_and_bottom_two() {
        let mut run_variants: Vec<EvalVariant> = (1..=5)
            .map(|i| evaluated(&format!("v0{i}"), 1.0 - i as f64 * 0.1, 0.5))
            .collect();
        let (leaderboard, _) = rank_variants(&run_variants);
        run_variants.clone_from(&leaderboard);

        let now = ids::utc_now_iso();
        let run = EvalRun {
            run_id: "r".into(),
            project_id: "p".into(),
            base_prompt: "base".into(),
            objective_preset: ObjectivePreset::Adherence,
            image_model: "m".into(),
            n_variants: 5,
            quality: Quality::Medium,
            parent_commit_id: None,
            anchor_commit_id: None,
            constraints: Constraints::default(),
            status: RunStatus::Running,
            stage: RunStage::Refining,
            degraded: false,
            error: None,
            progress: EvalProgress {
                total_variants: 5,
                generated_variants: 5,
                evaluated_variants: 5,
                failed_variants: 0,
            },
            variants: run_variants,
            leaderboard,
            top_k: Vec::new(),
            suggestions: SuggestionSet::default(),
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        };

        let digest = build_digest(&run);
        assert_eq!(digest.top.len(), 3);
        assert_eq!(digest.bottom.len(), 2);
        assert_eq!(digest.top[0].variant_id, "v01");
        assert_eq!(digest.bottom[1].variant_id, "v05");
    }
}
