//! Image blob store.
//!
//! Opaque bytes addressed by stable paths: commit images under
//! `<image_dir>/<commit_id>/` and report artifacts under
//! `<artifact_dir>/<report_id>/`. Writes are atomic; the returned values are
//! the public URL paths the HTTP layer serves statically.

use std::fs;
use std::path::{Path, PathBuf};

use promptsmith_core::error::{CoreError, CoreResult};

use crate::file_store::FileStore;

/// URL prefix for report artifacts.
const ARTIFACT_URL_PREFIX: &str = "artifacts";

/// Filesystem blob store for commit images and report artifacts.
pub struct BlobStore {
    image_root: PathBuf,
    artifact_root: PathBuf,
    image_url_prefix: String,
}

impl BlobStore {
    /// `storage_prefix` selects the public URL prefix for commit images
    /// (default layout: `/images/<commit_id>/img_01.png`).
    pub fn new(image_root: PathBuf, artifact_root: PathBuf, storage_prefix: &str) -> Self {
        let prefix = storage_prefix.trim_matches('/');
        Self {
            image_root,
            artifact_root,
            image_url_prefix: if prefix.is_empty() { "images".to_string() } else { prefix.to_string() },
        }
    }

    /// Public URL prefix for commit images, with leading slash.
    pub fn image_url_base(&self) -> String {
        format!("/{}", self.image_url_prefix)
    }

    pub fn image_root(&self) -> &Path {
        &self.image_root
    }

    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    /// Store a commit image and return its public URL path.
    pub fn put_commit_image(&self, commit_id: &str, filename: &str, payload: &[u8]) -> CoreResult<String> {
        validate_segment(commit_id)?;
        validate_segment(filename)?;
        let path = self.image_root.join(commit_id).join(filename);
        FileStore::atomic_write_bytes(&path, payload)?;
        Ok(format!("/{}/{commit_id}/{filename}", self.image_url_prefix))
    }

    /// Store a report artifact and return its public URL path.
    pub fn put_report_artifact(&self, report_id: &str, filename: &str, payload: &[u8]) -> CoreResult<String> {
        validate_segment(report_id)?;
        validate_segment(filename)?;
        let path = self.artifact_root.join(report_id).join(filename);
        FileStore::atomic_write_bytes(&path, payload)?;
        Ok(format!("/{ARTIFACT_URL_PREFIX}/{report_id}/{filename}"))
    }

    /// Resolve a public URL path back to its on-disk location.
    pub fn resolve_url(&self, url: &str) -> Option<PathBuf> {
        let trimmed = url.trim().trim_start_matches('/');
        let (root, rest) = if let Some(rest) = trimmed.strip_prefix(&format!("{}/", self.image_url_prefix)) {
            (&self.image_root, rest)
        } else if let Some(rest) = trimmed.strip_prefix(&format!("{ARTIFACT_URL_PREFIX}/")) {
            (&self.artifact_root, rest)
        } else {
            return None;
        };

        if rest.is_empty() || rest.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return None;
        }
        Some(root.join(rest))
    }

    /// Read the bytes behind a public URL path.
    pub fn read_url(&self, url: &str) -> CoreResult<Vec<u8>> {
        let path = self
            .resolve_url(url)
            .ok_or_else(|| CoreError::StorageWrite(format!("Unresolvable image reference '{url}'")))?;
        fs::read(&path).map_err(|e| {
            CoreError::StorageWrite(format!("Failed to read image artifact {}: {e}", path.display()))
        })
    }

    /// Remove every blob stored for a commit. Returns the number of files
    /// deleted; missing directories count as zero.
    pub fn delete_commit_images(&self, commit_id: &str) -> usize {
        remove_tree_counting(&self.image_root.join(commit_id))
    }

    /// Remove every artifact stored for a report.
    pub fn delete_report_artifacts(&self, report_id: &str) -> usize {
        remove_tree_counting(&self.artifact_root.join(report_id))
    }
}

fn validate_segment(segment: &str) -> CoreResult<()> {
    if segment.is_empty() || segment.contains('/') || segment.contains("..") {
        return Err(CoreError::StorageWrite(format!("Invalid blob path segment '{segment}'")));
    }
    Ok(())
}

fn remove_tree_counting(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let count = entries.filter_map(Result::ok).filter(|e| e.path().is_file()).count();
    if let Err(e) = fs::remove_dir_all(dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove blob directory");
        return 0;
    }
    count
}
