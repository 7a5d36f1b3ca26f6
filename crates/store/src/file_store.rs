//! Atomic file persistence.
//!
//! Every write lands in a temp file in the target directory and is renamed
//! into place, so readers never observe a partially written record and a
//! crash cannot corrupt a table.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use promptsmith_core::error::{CoreError, CoreResult};

/// Stateless helper over the filesystem. All methods are safe to call from
/// multiple threads; callers serialize read-modify-write cycles themselves.
pub struct FileStore;

impl FileStore {
    /// Read and deserialize a JSON file. Returns `Ok(None)` when the file
    /// does not exist yet.
    pub fn read_json<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(path).map_err(|e| {
            CoreError::StorageWrite(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&raw).map(Some).map_err(|e| {
            CoreError::StorageWrite(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Serialize to pretty JSON and write atomically.
    pub fn write_json<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
        let payload = serde_json::to_vec_pretty(value).map_err(|e| {
            CoreError::StorageWrite(format!("Failed to serialize {}: {e}", path.display()))
        })?;
        Self::atomic_write_bytes(path, &payload)
    }

    /// Write raw bytes with write-temp-then-rename semantics.
    pub fn atomic_write_bytes(path: &Path, payload: &[u8]) -> CoreResult<()> {
        let parent = path.parent().ok_or_else(|| {
            CoreError::StorageWrite(format!("Path {} has no parent directory", path.display()))
        })?;
        fs::create_dir_all(parent).map_err(|e| {
            CoreError::StorageWrite(format!("Failed to create {}: {e}", parent.display()))
        })?;

        let mut temp = NamedTempFile::new_in(parent).map_err(|e| {
            CoreError::StorageWrite(format!("Failed to create temp file in {}: {e}", parent.display()))
        })?;
        temp.write_all(payload)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| {
                CoreError::StorageWrite(format!("Failed to persist {}: {e}", path.display()))
            })?;
        temp.persist(path).map_err(|e| {
            CoreError::StorageWrite(format!("Failed to persist {}: {e}", path.display()))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        value: u32,
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let read: Option<Sample> = FileStore::read_json(&path).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        let sample = Sample {
            name: "x".into(),
            value: 7,
        };
        FileStore::write_json(&path, &sample).unwrap();
        let read: Option<Sample> = FileStore::read_json(&path).unwrap();
        assert_eq!(read, Some(sample));
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        FileStore::write_json(&path, &Sample { name: "a".into(), value: 1 }).unwrap();
        FileStore::write_json(&path, &Sample { name: "b".into(), value: 2 }).unwrap();
        let read: Option<Sample> = FileStore::read_json(&path).unwrap();
        assert_eq!(read.unwrap().name, "b");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/nested/blob.bin");
        FileStore::atomic_write_bytes(&path, b"payload").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn corrupt_json_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"{not json").unwrap();
        let result: CoreResult<Option<Sample>> = FileStore::read_json(&path);
        assert_eq!(result.unwrap_err().code(), "STORAGE_WRITE_FAILED");
    }
}
