//! Filesystem-backed persistence for Promptsmith.
//!
//! Three JSON tables (`projects.json`, `commits.json`, `comparisons.json`)
//! plus a `config.json` carrying the serialized ID counters, and a blob store
//! for commit images and report artifacts. Every record write is
//! write-temp-then-rename; blob writes are atomic the same way.

pub mod blob;
pub mod file_store;
pub mod records;
pub mod repository;

pub use blob::BlobStore;
pub use file_store::FileStore;
pub use repository::{NewCommit, ProjectDeletion, Repository, RepositoryConfig, SubtreeDeletion};
