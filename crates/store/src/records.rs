//! Persisted record types for the three JSON tables.

use serde::{Deserialize, Serialize};

use promptsmith_core::scoring::DEFAULT_DRIFT_THRESHOLD;
use promptsmith_core::types::{CommitStatus, LightingShift, StyleDrift, Verdict};

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// A project row. At most one active baseline, which must reference a
/// successful commit of the same project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    pub name: String,
    pub active_baseline_commit_id: Option<String>,
    /// Per-project drift threshold; falls back to the process default.
    #[serde(default)]
    pub compare_threshold: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// An immutable generation commit. `parent_commit_id` edges form a forest
/// within the owning project; a parent is always older than its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_id: String,
    pub project_id: String,
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub parent_commit_id: Option<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
    pub status: CommitStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: String,
}

impl CommitRecord {
    /// First non-empty image reference, if any.
    pub fn first_image(&self) -> Option<&str> {
        self.image_paths
            .iter()
            .map(|path| path.trim())
            .find(|path| !path.is_empty())
    }

    /// Successful commit with at least one image artifact.
    pub fn is_comparable(&self) -> bool {
        self.status == CommitStatus::Success && self.first_image().is_some()
    }
}

// ---------------------------------------------------------------------------
// Comparison reports
// ---------------------------------------------------------------------------

/// Structured explanation attached to every report. When the structural
/// signal is missing these hold neutral defaults and the notes say so.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareExplanation {
    pub facial_structure_changed: bool,
    pub lighting_shift: LightingShift,
    pub style_drift: StyleDrift,
    pub notes: String,
}

/// Public paths of the two pixel-engine artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareArtifacts {
    pub diff_heatmap: String,
    pub overlay: String,
}

/// One drift comparison between a baseline and a candidate commit.
///
/// `semantic_similarity` / `vision_structural_score` are `null` when the
/// corresponding signal failed; `degraded` is set in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReportRecord {
    pub report_id: String,
    pub project_id: String,
    pub baseline_commit_id: String,
    pub candidate_commit_id: String,
    pub pixel_diff_score: f64,
    pub semantic_similarity: Option<f64>,
    pub vision_structural_score: Option<f64>,
    pub drift_score: f64,
    pub threshold: f64,
    pub verdict: Verdict,
    pub degraded: bool,
    pub explanation: CompareExplanation,
    pub artifacts: CompareArtifacts,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process configuration persisted alongside the tables: the default drift
/// threshold and the serialized ID counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub threshold: f64,
    pub next_commit_number: u64,
    pub next_report_number: u64,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DRIFT_THRESHOLD,
            next_commit_number: 1,
            next_report_number: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_image_skips_blank_entries() {
        let commit = CommitRecord {
            commit_id: "c0001".into(),
            project_id: "p".into(),
            prompt: "prompt".into(),
            model: "m".into(),
            seed: None,
            parent_commit_id: None,
            image_paths: vec!["  ".into(), "/images/c0001/img_01.png".into()],
            status: CommitStatus::Success,
            error: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert_eq!(commit.first_image(), Some("/images/c0001/img_01.png"));
        assert!(commit.is_comparable());
    }

    #[test]
    fn failed_commits_are_not_comparable() {
        let commit = CommitRecord {
            commit_id: "c0002".into(),
            project_id: "p".into(),
            prompt: "prompt".into(),
            model: "m".into(),
            seed: None,
            parent_commit_id: None,
            image_paths: Vec::new(),
            status: CommitStatus::Failed,
            error: Some("OPENAI_UPSTREAM_ERROR: boom".into()),
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert!(commit.first_image().is_none());
        assert!(!commit.is_comparable());
    }

    #[test]
    fn config_defaults_start_counters_at_one() {
        let config = ConfigRecord::default();
        assert_eq!(config.next_commit_number, 1);
        assert_eq!(config.next_report_number, 1);
        assert_eq!(config.threshold, DEFAULT_DRIFT_THRESHOLD);
    }
}
