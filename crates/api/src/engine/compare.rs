//! The compare scoring pipeline.
//!
//! One request fans out three drift signals concurrently: the pixel metric
//! engine (CPU-bound, run on the blocking pool), the semantic similarity
//! signal, and the structural assessment. Pixel failure is fatal; either
//! model signal may drop out, degrading the report and weakening the verdict
//! to `inconclusive`/`fail` per the partial-evidence rules.

use std::sync::Arc;

use promptsmith_core::error::{CoreError, CoreResult};
use promptsmith_core::ids;
use promptsmith_core::pixel::{self, PixelComparison};
use promptsmith_core::scoring::{derive_verdict, drift_score, round4};
use promptsmith_core::types::{LightingShift, StyleDrift};
use promptsmith_openai::signals::StructuralAssessment;
use promptsmith_openai::Adapters;
use promptsmith_store::records::{CompareArtifacts, CompareExplanation, ComparisonReportRecord, CommitRecord};
use promptsmith_store::Repository;

/// Heatmap artifact filename.
const HEATMAP_FILENAME: &str = "diff_heatmap.png";
/// Overlay artifact filename.
const OVERLAY_FILENAME: &str = "overlay.png";

/// Single-request fan-out over the three drift signals.
pub struct CompareOrchestrator {
    repository: Arc<Repository>,
    adapters: Adapters,
}

impl CompareOrchestrator {
    pub fn new(repository: Arc<Repository>, adapters: Adapters) -> Self {
        Self { repository, adapters }
    }

    /// Compare a candidate against a baseline (explicit, or the project's
    /// active one) and persist the report. Artifacts are written before the
    /// report record commits.
    pub async fn compare(
        &self,
        project_id: &str,
        candidate_commit_id: &str,
        baseline_override: Option<String>,
    ) -> CoreResult<ComparisonReportRecord> {
        let project = self.repository.get_project(project_id)?;
        let baseline_commit_id = baseline_override
            .or_else(|| project.active_baseline_commit_id.clone())
            .ok_or_else(|| CoreError::BaselineNotSet("Set a baseline before comparing commits.".into()))?;

        let baseline = self.load_comparable(&baseline_commit_id, project_id)?;
        let candidate = self.load_comparable(candidate_commit_id, project_id)?;

        let baseline_bytes = Arc::new(self.read_first_image(&baseline)?);
        let candidate_bytes = Arc::new(self.read_first_image(&candidate)?);

        let report_id = self.repository.reserve_report_id()?;
        let threshold = self.repository.threshold_for(&project);

        // All three signals launch concurrently; each is isolated.
        let pixel_task = {
            let baseline = Arc::clone(&baseline_bytes);
            let candidate = Arc::clone(&candidate_bytes);
            tokio::task::spawn_blocking(move || pixel::compare_images(&baseline, &candidate))
        };
        let semantic_future = self.adapters.semantic.similarity(&baseline_bytes, &candidate_bytes);
        let structural_future = self.adapters.structural.assess(&baseline_bytes, &candidate_bytes);

        let (pixel_joined, semantic_result, structural_result) =
            tokio::join!(pixel_task, semantic_future, structural_future);

        let pixel: PixelComparison = pixel_joined
            .map_err(|e| CoreError::ComparePipeline(format!("Pixel comparison task failed: {e}")))??;

        let semantic: Option<f64> = match semantic_result {
            Ok(score) => Some(round4(score)),
            Err(err) => {
                tracing::warn!(report_id = %report_id, error = %err, "Semantic signal unavailable");
                None
            }
        };
        let structural: Option<StructuralAssessment> = match structural_result {
            Ok(assessment) => Some(assessment),
            Err(err) => {
                tracing::warn!(report_id = %report_id, error = %err, "Structural signal unavailable");
                None
            }
        };

        let degraded = semantic.is_none() || structural.is_none();
        let vision_score = structural.as_ref().map(|a| round4(a.vision_structural_score));
        let drift = round4(drift_score(pixel.pixel_diff_score, semantic, vision_score));
        let verdict = derive_verdict(
            drift,
            threshold,
            pixel.pixel_diff_score,
            semantic.is_some(),
            vision_score.is_some(),
        );

        let explanation = build_explanation(structural.as_ref(), semantic.is_some());

        // Artifacts land on disk before the report record commits.
        let heatmap = self
            .repository
            .blobs()
            .put_report_artifact(&report_id, HEATMAP_FILENAME, &pixel.heatmap_png)?;
        let overlay = self
            .repository
            .blobs()
            .put_report_artifact(&report_id, OVERLAY_FILENAME, &pixel.overlay_png)?;

        let report = ComparisonReportRecord {
            report_id: report_id.clone(),
            project_id: project_id.to_string(),
            baseline_commit_id,
            candidate_commit_id: candidate_commit_id.to_string(),
            pixel_diff_score: pixel.pixel_diff_score,
            semantic_similarity: semantic,
            vision_structural_score: vision_score,
            drift_score: drift,
            threshold: round4(threshold),
            verdict,
            degraded,
            explanation,
            artifacts: CompareArtifacts {
                diff_heatmap: heatmap,
                overlay,
            },
            created_at: ids::utc_now_iso(),
        };

        tracing::info!(
            report_id = %report_id,
            project_id,
            verdict = ?verdict,
            drift,
            degraded,
            "Comparison completed",
        );
        self.repository.create_comparison_report(report)
    }

    fn load_comparable(&self, commit_id: &str, project_id: &str) -> CoreResult<CommitRecord> {
        let commit = self.repository.get_commit(commit_id, Some(project_id))?;
        if !commit.is_comparable() {
            return Err(CoreError::CommitNotFound(format!(
                "Commit '{commit_id}' is not a successful generation with image artifacts"
            )));
        }
        Ok(commit)
    }

    fn read_first_image(&self, commit: &CommitRecord) -> CoreResult<Vec<u8>> {
        let image_ref = commit.first_image().ok_or_else(|| {
            CoreError::CommitNotFound(format!("Commit '{}' does not have any image artifacts", commit.commit_id))
        })?;
        self.repository
            .blobs()
            .read_url(image_ref)
            .map_err(|err| CoreError::ComparePipeline(err.to_string()))
    }
}

/// Fold the structural assessment (or its absence) into the report
/// explanation. Degraded reports say which signals went missing.
fn build_explanation(structural: Option<&StructuralAssessment>, semantic_present: bool) -> CompareExplanation {
    let mut explanation = match structural {
        Some(assessment) => CompareExplanation {
            facial_structure_changed: assessment.facial_structure_changed,
            lighting_shift: assessment.lighting_shift,
            style_drift: assessment.style_drift,
            notes: assessment.notes.clone(),
        },
        None => CompareExplanation {
            facial_structure_changed: false,
            lighting_shift: LightingShift::Moderate,
            style_drift: StyleDrift::Moderate,
            notes: "Vision signal unavailable.".to_string(),
        },
    };

    if structural.is_none() || !semantic_present {
        let mut missing = Vec::new();
        if !semantic_present {
            missing.push("semantic");
        }
        if structural.is_none() {
            missing.push("vision");
        }
        explanation.notes = format!("Degraded compare: missing {} signal(s).", missing.join(", "));
    }
    explanation
}
