//! I/O boundary traits for testability
//!
//! These traits abstract persistence, key generation and filesystem access,
//! allowing services to be tested with mock implementations.

use std::io::{self, Write};
use std::path::Path;

use uuid::Uuid;

use crate::domain::{GlobalKey, GroupKey, LinkRecord, RecordId};
use crate::infrastructure::error::StoreResult;

/// Persistence collaborator for link records.
pub trait LinkRepository: Send + Sync {
    /// All records whose group is `group`; empty when there are none.
    fn find_by_group(&self, group: &GroupKey) -> StoreResult<Vec<LinkRecord>>;

    /// Persist a new record and return its store id.
    ///
    /// The record must not carry an id yet.
    fn create(&self, record: LinkRecord) -> StoreResult<RecordId>;
}

/// Source of fresh global keys.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> GlobalKey;
}

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace file content atomically (temp file in the same directory, then rename).
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Random UUID v4 keys.
#[derive(Debug, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> GlobalKey {
        GlobalKey::new(Uuid::new_v4())
    }
}

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
