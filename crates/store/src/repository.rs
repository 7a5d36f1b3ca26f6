//! The repository: projects, commits, and comparison reports over the three
//! JSON tables, plus the blob store for image bytes.
//!
//! Each operation is atomic with respect to readers: tables are rewritten via
//! rename and every read-modify-write cycle holds the repository lock. The
//! commit lineage is kept as an arena of records keyed by id with
//! `parent_commit_id` edges, which keeps subtree deletion linear.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use promptsmith_core::error::{CoreError, CoreResult};
use promptsmith_core::ids::{self, COMMIT_PREFIX, REPORT_PREFIX};
use promptsmith_core::scoring;
use promptsmith_core::types::CommitStatus;

use crate::blob::BlobStore;
use crate::file_store::FileStore;
use crate::records::{CommitRecord, ComparisonReportRecord, ConfigRecord, ProjectRecord};

/// Storage roots and defaults the repository is constructed from.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub data_dir: PathBuf,
    pub image_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub storage_prefix: String,
    pub compare_threshold: f64,
}

/// Parameters for creating a commit. The id must come from
/// [`Repository::reserve_commit_id`] so ordering stays monotonic.
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub commit_id: String,
    pub project_id: String,
    pub prompt: String,
    pub model: String,
    pub seed: Option<String>,
    pub parent_commit_id: Option<String>,
    pub image_paths: Vec<String>,
    pub status: CommitStatus,
    pub error: Option<String>,
}

/// Result of a subtree deletion. Re-deleting a missing commit yields empty
/// id lists.
#[derive(Debug, Clone)]
pub struct SubtreeDeletion {
    pub deleted_commit_ids: Vec<String>,
    pub deleted_report_ids: Vec<String>,
    pub deleted_image_objects: usize,
    pub active_baseline_commit_id: Option<String>,
}

/// Result of a full project deletion.
#[derive(Debug, Clone)]
pub struct ProjectDeletion {
    pub project_id: String,
    pub deleted_commit_ids: Vec<String>,
    pub deleted_report_ids: Vec<String>,
    pub deleted_image_objects: usize,
}

/// Wrapper over a generic items collection, the on-disk table shape.
#[derive(serde::Serialize, serde::Deserialize)]
struct Table<T> {
    items: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

pub struct Repository {
    blobs: BlobStore,
    default_threshold: f64,
    projects_path: PathBuf,
    commits_path: PathBuf,
    comparisons_path: PathBuf,
    config_path: PathBuf,
    lock: Mutex<()>,
}

impl Repository {
    /// Open (and bootstrap if necessary) the repository at the configured
    /// storage roots.
    pub fn new(config: RepositoryConfig) -> CoreResult<Self> {
        let repository = Self {
            blobs: BlobStore::new(
                config.image_dir.clone(),
                config.artifact_dir.clone(),
                &config.storage_prefix,
            ),
            default_threshold: config.compare_threshold,
            projects_path: config.data_dir.join("projects.json"),
            commits_path: config.data_dir.join("commits.json"),
            comparisons_path: config.data_dir.join("comparisons.json"),
            config_path: config.data_dir.join("config.json"),
            lock: Mutex::new(()),
        };
        repository.bootstrap()?;
        Ok(repository)
    }

    fn bootstrap(&self) -> CoreResult<()> {
        if !self.projects_path.exists() {
            FileStore::write_json(&self.projects_path, &Table::<ProjectRecord>::default())?;
        }
        if !self.commits_path.exists() {
            FileStore::write_json(&self.commits_path, &Table::<CommitRecord>::default())?;
        }
        if !self.comparisons_path.exists() {
            FileStore::write_json(&self.comparisons_path, &Table::<ComparisonReportRecord>::default())?;
        }
        if !self.config_path.exists() {
            let config = ConfigRecord {
                threshold: self.default_threshold,
                ..ConfigRecord::default()
            };
            FileStore::write_json(&self.config_path, &config)?;
        }
        Ok(())
    }

    /// Access to the blob store this repository owns.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// True when the backing tables are reachable.
    pub fn health_check(&self) -> bool {
        self.projects_path.exists() && self.commits_path.exists()
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- table access -------------------------------------------------------

    fn load_projects(&self) -> CoreResult<Vec<ProjectRecord>> {
        Ok(FileStore::read_json::<Table<ProjectRecord>>(&self.projects_path)?
            .unwrap_or_default()
            .items)
    }

    fn save_projects(&self, items: Vec<ProjectRecord>) -> CoreResult<()> {
        FileStore::write_json(&self.projects_path, &Table { items })
    }

    fn load_commits(&self) -> CoreResult<Vec<CommitRecord>> {
        Ok(FileStore::read_json::<Table<CommitRecord>>(&self.commits_path)?
            .unwrap_or_default()
            .items)
    }

    fn save_commits(&self, items: Vec<CommitRecord>) -> CoreResult<()> {
        FileStore::write_json(&self.commits_path, &Table { items })
    }

    fn load_comparisons(&self) -> CoreResult<Vec<ComparisonReportRecord>> {
        Ok(
            FileStore::read_json::<Table<ComparisonReportRecord>>(&self.comparisons_path)?
                .unwrap_or_default()
                .items,
        )
    }

    fn save_comparisons(&self, items: Vec<ComparisonReportRecord>) -> CoreResult<()> {
        FileStore::write_json(&self.comparisons_path, &Table { items })
    }

    fn load_config(&self) -> CoreResult<ConfigRecord> {
        Ok(FileStore::read_json::<ConfigRecord>(&self.config_path)?.unwrap_or(ConfigRecord {
            threshold: self.default_threshold,
            ..ConfigRecord::default()
        }))
    }

    fn save_config(&self, config: &ConfigRecord) -> CoreResult<()> {
        FileStore::write_json(&self.config_path, config)
    }

    // -- id factory ---------------------------------------------------------

    /// Reserve the next commit id. Strictly monotonic across the process.
    pub fn reserve_commit_id(&self) -> CoreResult<String> {
        let _guard = self.guard();
        let mut config = self.load_config()?;
        let id = ids::format_id(COMMIT_PREFIX, config.next_commit_number);
        config.next_commit_number += 1;
        self.save_config(&config)?;
        Ok(id)
    }

    /// Reserve the next report id.
    pub fn reserve_report_id(&self) -> CoreResult<String> {
        let _guard = self.guard();
        let mut config = self.load_config()?;
        let id = ids::format_id(REPORT_PREFIX, config.next_report_number);
        config.next_report_number += 1;
        self.save_config(&config)?;
        Ok(id)
    }

    // -- projects -----------------------------------------------------------

    /// Create the project if missing, or refresh its name. Returns the record
    /// and whether it was created.
    pub fn upsert_project(&self, project_id: &str, name: Option<&str>) -> CoreResult<(ProjectRecord, bool)> {
        let _guard = self.guard();
        let mut projects = self.load_projects()?;

        if let Some(existing) = projects.iter_mut().find(|p| p.project_id == project_id) {
            if let Some(name) = name {
                if !name.is_empty() && name != existing.name {
                    existing.name = name.to_string();
                    existing.updated_at = ids::utc_now_iso();
                    let updated = existing.clone();
                    self.save_projects(projects)?;
                    return Ok((updated, false));
                }
            }
            return Ok((existing.clone(), false));
        }

        let now = ids::utc_now_iso();
        let project = ProjectRecord {
            project_id: project_id.to_string(),
            name: name.filter(|n| !n.is_empty()).unwrap_or(project_id).to_string(),
            active_baseline_commit_id: None,
            compare_threshold: None,
            created_at: now.clone(),
            updated_at: now,
        };
        projects.push(project.clone());
        self.save_projects(projects)?;
        tracing::info!(project_id, "Project created");
        Ok((project, true))
    }

    /// Upsert without caring whether the project already existed.
    pub fn ensure_project(&self, project_id: &str) -> CoreResult<ProjectRecord> {
        let (project, _) = self.upsert_project(project_id, None)?;
        Ok(project)
    }

    pub fn get_project(&self, project_id: &str) -> CoreResult<ProjectRecord> {
        self.load_projects()?
            .into_iter()
            .find(|p| p.project_id == project_id)
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))
    }

    /// All projects, most recently updated first.
    pub fn list_projects(&self) -> CoreResult<Vec<ProjectRecord>> {
        let mut projects = self.load_projects()?;
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    /// Effective drift threshold for a project.
    pub fn threshold_for(&self, project: &ProjectRecord) -> f64 {
        project
            .compare_threshold
            .unwrap_or_else(|| self.load_config().map(|c| c.threshold).unwrap_or(scoring::DEFAULT_DRIFT_THRESHOLD))
    }

    // -- commits ------------------------------------------------------------

    /// Append a commit. The parent, when given, must already exist in the
    /// same project — commits are created in monotonic order, which keeps the
    /// lineage forest acyclic.
    pub fn create_commit(&self, new: NewCommit) -> CoreResult<CommitRecord> {
        let _guard = self.guard();
        let mut commits = self.load_commits()?;

        if let Some(parent_id) = &new.parent_commit_id {
            let parent_in_project = commits
                .iter()
                .any(|c| &c.commit_id == parent_id && c.project_id == new.project_id);
            if !parent_in_project {
                return Err(CoreError::CommitNotFound(format!(
                    "Parent commit '{parent_id}' was not found in project '{}'",
                    new.project_id
                )));
            }
        }

        let commit = CommitRecord {
            commit_id: new.commit_id,
            project_id: new.project_id,
            prompt: new.prompt,
            model: new.model,
            seed: new.seed,
            parent_commit_id: new.parent_commit_id,
            image_paths: new.image_paths,
            status: new.status,
            error: new.error,
            created_at: ids::utc_now_iso(),
        };
        commits.push(commit.clone());
        self.save_commits(commits)?;
        Ok(commit)
    }

    /// Load a commit, optionally scoped to a project. A commit that exists in
    /// a different project reads as not found.
    pub fn get_commit(&self, commit_id: &str, project_id: Option<&str>) -> CoreResult<CommitRecord> {
        let commit = self
            .load_commits()?
            .into_iter()
            .find(|c| c.commit_id == commit_id)
            .ok_or_else(|| CoreError::CommitNotFound(format!("Commit '{commit_id}' was not found")))?;

        if let Some(project_id) = project_id {
            if commit.project_id != project_id {
                return Err(CoreError::CommitNotFound(format!(
                    "Commit '{commit_id}' was not found in project '{project_id}'"
                )));
            }
        }
        Ok(commit)
    }

    /// Set the project's active baseline. The commit must be a successful
    /// generation with at least one image.
    pub fn set_baseline(&self, project_id: &str, commit_id: &str) -> CoreResult<ProjectRecord> {
        let _guard = self.guard();
        let mut projects = self.load_projects()?;
        let project = projects
            .iter_mut()
            .find(|p| p.project_id == project_id)
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))?;

        let commit = self.get_commit(commit_id, Some(project_id))?;
        if !commit.is_comparable() {
            return Err(CoreError::CommitNotFound(format!(
                "Commit '{commit_id}' is not a successful generation with image artifacts"
            )));
        }

        project.active_baseline_commit_id = Some(commit_id.to_string());
        project.updated_at = ids::utc_now_iso();
        let updated = project.clone();
        self.save_projects(projects)?;
        tracing::info!(project_id, commit_id, "Baseline updated");
        Ok(updated)
    }

    /// Newest-first commit history, cursor-paginated. The cursor is the last
    /// commit id of the previous page; `None` is returned once exhausted.
    pub fn list_history(
        &self,
        project_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> CoreResult<(Vec<CommitRecord>, Option<String>)> {
        self.get_project(project_id)?;
        let mut commits: Vec<CommitRecord> = self
            .load_commits()?
            .into_iter()
            .filter(|c| c.project_id == project_id)
            .collect();

        commits.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| {
                ids::parse_id_number(&b.commit_id, COMMIT_PREFIX)
                    .cmp(&ids::parse_id_number(&a.commit_id, COMMIT_PREFIX))
            })
        });

        let start = match cursor {
            Some(cursor) => commits
                .iter()
                .position(|c| c.commit_id == cursor)
                .map(|index| index + 1)
                .unwrap_or(0),
            None => 0,
        };

        let page: Vec<CommitRecord> = commits.iter().skip(start).take(limit).cloned().collect();
        let has_more = start + limit < commits.len();
        let next_cursor = if has_more {
            page.last().map(|c| c.commit_id.clone())
        } else {
            None
        };
        Ok((page, next_cursor))
    }

    // -- comparison reports -------------------------------------------------

    /// Persist a report. Artifacts must already be on disk; the record write
    /// is the commit point.
    pub fn create_comparison_report(&self, report: ComparisonReportRecord) -> CoreResult<ComparisonReportRecord> {
        let _guard = self.guard();
        let mut reports = self.load_comparisons()?;
        reports.push(report.clone());
        self.save_comparisons(reports)?;
        Ok(report)
    }

    // -- cascading deletion -------------------------------------------------

    /// Delete a commit and every commit transitively parented by it, all
    /// reports referencing any deleted commit, and their blobs. Clears the
    /// baseline when it falls inside the subtree. Idempotent: a missing root
    /// yields empty result sets.
    pub fn delete_commit_subtree(&self, project_id: &str, commit_id: &str) -> CoreResult<SubtreeDeletion> {
        let _guard = self.guard();
        let mut projects = self.load_projects()?;
        let project = projects
            .iter_mut()
            .find(|p| p.project_id == project_id)
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))?;

        let commits = self.load_commits()?;
        let root_exists = commits
            .iter()
            .any(|c| c.commit_id == commit_id && c.project_id == project_id);
        if !root_exists {
            return Ok(SubtreeDeletion {
                deleted_commit_ids: Vec::new(),
                deleted_report_ids: Vec::new(),
                deleted_image_objects: 0,
                active_baseline_commit_id: project.active_baseline_commit_id.clone(),
            });
        }

        // Walk the forest: repeated sweeps collect children until closure.
        // The descendant set is tiny relative to the table, so the quadratic
        // worst case is irrelevant here.
        let mut doomed: Vec<String> = vec![commit_id.to_string()];
        let mut frontier = vec![commit_id.to_string()];
        while !frontier.is_empty() {
            let next: Vec<String> = commits
                .iter()
                .filter(|c| {
                    c.project_id == project_id
                        && c.parent_commit_id
                            .as_deref()
                            .is_some_and(|parent| frontier.iter().any(|f| f.as_str() == parent))
                })
                .map(|c| c.commit_id.clone())
                .filter(|id| !doomed.contains(id))
                .collect();
            doomed.extend(next.iter().cloned());
            frontier = next;
        }

        let (removed_commits, kept_commits): (Vec<CommitRecord>, Vec<CommitRecord>) = commits
            .into_iter()
            .partition(|c| doomed.contains(&c.commit_id));

        let (removed_reports, kept_reports): (Vec<ComparisonReportRecord>, Vec<ComparisonReportRecord>) =
            self.load_comparisons()?.into_iter().partition(|r| {
                doomed.contains(&r.baseline_commit_id) || doomed.contains(&r.candidate_commit_id)
            });

        let baseline_cleared = project
            .active_baseline_commit_id
            .as_deref()
            .is_some_and(|baseline| doomed.contains(&baseline.to_string()));
        if baseline_cleared {
            project.active_baseline_commit_id = None;
            project.updated_at = ids::utc_now_iso();
        }
        let active_baseline = project.active_baseline_commit_id.clone();

        self.save_commits(kept_commits)?;
        self.save_comparisons(kept_reports)?;
        self.save_projects(projects)?;

        let mut deleted_image_objects = 0;
        for commit in &removed_commits {
            deleted_image_objects += self.blobs.delete_commit_images(&commit.commit_id);
        }
        for report in &removed_reports {
            deleted_image_objects += self.blobs.delete_report_artifacts(&report.report_id);
        }

        let deleted_commit_ids: Vec<String> = removed_commits.into_iter().map(|c| c.commit_id).collect();
        let deleted_report_ids: Vec<String> = removed_reports.into_iter().map(|r| r.report_id).collect();
        tracing::info!(
            project_id,
            commit_id,
            commits = deleted_commit_ids.len(),
            reports = deleted_report_ids.len(),
            blobs = deleted_image_objects,
            "Commit subtree deleted",
        );

        Ok(SubtreeDeletion {
            deleted_commit_ids,
            deleted_report_ids,
            deleted_image_objects,
            active_baseline_commit_id: active_baseline,
        })
    }

    /// Delete a project and everything it owns.
    pub fn delete_project(&self, project_id: &str) -> CoreResult<ProjectDeletion> {
        let _guard = self.guard();
        let mut projects = self.load_projects()?;
        let before = projects.len();
        projects.retain(|p| p.project_id != project_id);
        if projects.len() == before {
            return Err(CoreError::ProjectNotFound(project_id.to_string()));
        }

        let (removed_commits, kept_commits): (Vec<CommitRecord>, Vec<CommitRecord>) = self
            .load_commits()?
            .into_iter()
            .partition(|c| c.project_id == project_id);
        let (removed_reports, kept_reports): (Vec<ComparisonReportRecord>, Vec<ComparisonReportRecord>) = self
            .load_comparisons()?
            .into_iter()
            .partition(|r| r.project_id == project_id);

        self.save_projects(projects)?;
        self.save_commits(kept_commits)?;
        self.save_comparisons(kept_reports)?;

        let mut deleted_image_objects = 0;
        for commit in &removed_commits {
            deleted_image_objects += self.blobs.delete_commit_images(&commit.commit_id);
        }
        for report in &removed_reports {
            deleted_image_objects += self.blobs.delete_report_artifacts(&report.report_id);
        }

        tracing::info!(
            project_id,
            commits = removed_commits.len(),
            reports = removed_reports.len(),
            "Project deleted",
        );

        Ok(ProjectDeletion {
            project_id: project_id.to_string(),
            deleted_commit_ids: removed_commits.into_iter().map(|c| c.commit_id).collect(),
            deleted_report_ids: removed_reports.into_iter().map(|r| r.report_id).collect(),
            deleted_image_objects,
        })
    }
}
