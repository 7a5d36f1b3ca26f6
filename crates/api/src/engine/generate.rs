//! Single-shot generation service behind `POST /generate`.
//!
//! Produces one commit per request. When a parent commit exists (explicit or
//! the newest in history), the upstream prompt is augmented with lineage
//! context while the stored commit keeps the user's raw prompt. Failed
//! generations are persisted as failed commits before the error propagates.

use std::sync::Arc;

use promptsmith_core::error::{CoreError, CoreResult};
use promptsmith_core::types::{CommitStatus, Quality};
use promptsmith_openai::Adapters;
use promptsmith_store::records::CommitRecord;
use promptsmith_store::{NewCommit, Repository};

/// Filename of the single image each commit stores.
const IMAGE_FILENAME: &str = "img_01.png";

/// Inputs for a single generation, already shape-validated by the handler.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub project_id: String,
    pub prompt: String,
    pub model: String,
    pub seed: Option<String>,
    pub parent_commit_id: Option<String>,
}

pub struct GenerationService {
    repository: Arc<Repository>,
    adapters: Adapters,
}

impl GenerationService {
    pub fn new(repository: Arc<Repository>, adapters: Adapters) -> Self {
        Self { repository, adapters }
    }

    /// Generate one image and persist it as a commit.
    pub async fn generate(&self, params: GenerateParams) -> CoreResult<CommitRecord> {
        self.repository.ensure_project(&params.project_id)?;
        let parent = self.resolve_parent(&params)?;
        let parent_commit_id = parent.as_ref().map(|commit| commit.commit_id.clone());
        let commit_id = self.repository.reserve_commit_id()?;

        let effective_prompt = with_parent_context(&params.prompt, parent.as_ref());
        let generated = self
            .adapters
            .generator
            .text_to_image(&effective_prompt, &params.model, Quality::Medium)
            .await
            .map_err(CoreError::from);

        let bytes = match generated {
            Ok(bytes) => bytes,
            Err(err) => {
                self.persist_failed(&params, &commit_id, parent_commit_id, &err);
                return Err(err);
            }
        };

        let stored = self
            .repository
            .blobs()
            .put_commit_image(&commit_id, IMAGE_FILENAME, &bytes)
            .and_then(|image_url| {
                self.repository.create_commit(NewCommit {
                    commit_id: commit_id.clone(),
                    project_id: params.project_id.clone(),
                    prompt: params.prompt.clone(),
                    model: params.model.clone(),
                    seed: params.seed.clone(),
                    parent_commit_id: parent_commit_id.clone(),
                    image_paths: vec![image_url],
                    status: CommitStatus::Success,
                    error: None,
                })
            });

        match stored {
            Ok(commit) => {
                tracing::info!(
                    project_id = %params.project_id,
                    commit_id = %commit.commit_id,
                    parent = ?commit.parent_commit_id,
                    "Generation commit created",
                );
                Ok(commit)
            }
            Err(err) => {
                self.persist_failed(&params, &commit_id, parent_commit_id, &err);
                Err(err)
            }
        }
    }

    /// Explicit parent when given (must exist in the project); otherwise the
    /// newest commit in history, if any.
    fn resolve_parent(&self, params: &GenerateParams) -> CoreResult<Option<CommitRecord>> {
        if let Some(parent_id) = &params.parent_commit_id {
            return self
                .repository
                .get_commit(parent_id, Some(&params.project_id))
                .map(Some);
        }
        let (mut history, _) = self.repository.list_history(&params.project_id, 1, None)?;
        Ok(history.pop())
    }

    /// Best-effort failed commit so the lineage records the attempt.
    fn persist_failed(
        &self,
        params: &GenerateParams,
        commit_id: &str,
        parent_commit_id: Option<String>,
        err: &CoreError,
    ) {
        let result = self.repository.create_commit(NewCommit {
            commit_id: commit_id.to_string(),
            project_id: params.project_id.clone(),
            prompt: params.prompt.clone(),
            model: params.model.clone(),
            seed: params.seed.clone(),
            parent_commit_id,
            image_paths: Vec::new(),
            status: CommitStatus::Failed,
            error: Some(format!("{}: {err}", err.code())),
        });
        if let Err(store_err) = result {
            tracing::warn!(commit_id, error = %store_err, "Failed to persist failure commit");
        }
    }
}

/// Fold the parent commit into the upstream prompt so iterations keep
/// subject identity and scene continuity.
fn with_parent_context(prompt: &str, parent: Option<&CommitRecord>) -> String {
    let Some(parent) = parent else {
        return prompt.to_string();
    };
    [
        "Generate the next iteration in this prompt lineage.",
        &format!("Previous commit id: {}", parent.commit_id),
        &format!("Previous commit prompt: {}", parent.prompt.trim()),
        &format!("New prompt update: {prompt}"),
        "Keep subject identity and core scene continuity from the previous commit unless the new prompt explicitly changes them.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> CommitRecord {
        CommitRecord {
            commit_id: "c0007".into(),
            project_id: "p".into(),
            prompt: "  a red fox  ".into(),
            model: "m".into(),
            seed: None,
            parent_commit_id: None,
            image_paths: vec!["/images/c0007/img_01.png".into()],
            status: CommitStatus::Success,
            error: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn no_parent_passes_prompt_through() {
        assert_eq!(with_parent_context("a blue fox", None), "a blue fox");
    }

    #[test]
    fn parent_context_carries_lineage() {
        let text = with_parent_context("a blue fox", Some(&parent()));
        assert!(text.contains("Previous commit id: c0007"));
        assert!(text.contains("Previous commit prompt: a red fox"));
        assert!(text.contains("New prompt update: a blue fox"));
    }
}
