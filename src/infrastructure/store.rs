//! `LinkRepository` implementations: in-memory and JSON file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{GroupKey, LinkRecord, RecordId};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::{FileSystem, LinkRepository};

/// On-disk (and in-memory) shape of a link store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Next id handed out by `insert`
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

fn first_id() -> u64 {
    1
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            links: Vec::new(),
        }
    }
}

impl StoreDocument {
    /// Add a new, unpersisted record and assign it the next id.
    pub fn insert(&mut self, mut record: LinkRecord) -> StoreResult<RecordId> {
        if let Some(id) = record.id {
            return Err(StoreError::rejected(format!(
                "record {} already persisted with id {}",
                record.global_key, id
            )));
        }
        self.ensure_unique_key(&record)?;

        let id = RecordId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| StoreError::rejected(format!("no record id left after {id}")))?;
        record.id = Some(id);
        self.links.push(record);
        Ok(id)
    }

    /// Add a record as-is, keeping an existing id (used when loading fixtures).
    pub fn seed(&mut self, record: LinkRecord) -> StoreResult<RecordId> {
        match record.id {
            None => self.insert(record),
            Some(id) => {
                self.ensure_unique_key(&record)?;
                if self.links.iter().any(|r| r.id == Some(id)) {
                    return Err(StoreError::rejected(format!("duplicate record id {id}")));
                }
                let after = id
                    .0
                    .checked_add(1)
                    .ok_or_else(|| StoreError::rejected(format!("record id {id} is out of range")))?;
                self.next_id = self.next_id.max(after);
                self.links.push(record);
                Ok(id)
            }
        }
    }

    pub fn find_by_group(&self, group: &GroupKey) -> Vec<LinkRecord> {
        self.links
            .iter()
            .filter(|r| &r.group_key == group)
            .cloned()
            .collect()
    }

    fn ensure_unique_key(&self, record: &LinkRecord) -> StoreResult<()> {
        if self.links.iter().any(|r| r.global_key == record.global_key) {
            return Err(StoreError::rejected(format!(
                "global key {} already exists",
                record.global_key
            )));
        }
        Ok(())
    }

    /// Repair `next_id` so it is above every stored id.
    ///
    /// Fails when the highest stored id leaves no room for another one.
    fn normalize(&mut self) -> Result<(), String> {
        let max_id = self
            .links
            .iter()
            .filter_map(|r| r.id.map(|id| id.0))
            .max()
            .unwrap_or(0);
        let after = max_id
            .checked_add(1)
            .ok_or_else(|| format!("record id {max_id} is out of range"))?;
        self.next_id = self.next_id.max(after);
        Ok(())
    }
}

fn lock(m: &Mutex<StoreDocument>) -> MutexGuard<'_, StoreDocument> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Volatile store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<StoreDocument>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with `records`; ids present on records are kept.
    pub fn with_records(records: impl IntoIterator<Item = LinkRecord>) -> StoreResult<Self> {
        let mut doc = StoreDocument::default();
        for record in records {
            doc.seed(record)?;
        }
        Ok(Self {
            state: Mutex::new(doc),
        })
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<LinkRecord> {
        lock(&self.state).links.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LinkRepository for InMemoryRepository {
    fn find_by_group(&self, group: &GroupKey) -> StoreResult<Vec<LinkRecord>> {
        Ok(lock(&self.state).find_by_group(group))
    }

    fn create(&self, record: LinkRecord) -> StoreResult<RecordId> {
        lock(&self.state).insert(record)
    }
}

/// Store persisted as one pretty-printed JSON document.
///
/// Every `create` reads, appends and atomically rewrites the file.
/// A missing file is an empty store.
pub struct JsonFileRepository {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    write_guard: Mutex<()>,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document.
    pub fn load(&self) -> StoreResult<StoreDocument> {
        if !self.fs.exists(&self.path) {
            debug!("link store {} missing, starting empty", self.path.display());
            return Ok(StoreDocument::default());
        }
        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| StoreError::io(format!("read {}", self.path.display()), e))?;
        if content.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        let mut doc: StoreDocument =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        doc.normalize().map_err(|message| StoreError::Corrupt {
            path: self.path.clone(),
            message,
        })?;
        Ok(doc)
    }

    /// Replace the whole document.
    pub fn save(&self, doc: &StoreDocument) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(doc).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            message: format!("serialize: {e}"),
        })?;
        self.fs
            .ensure_parent(&self.path)
            .map_err(|e| StoreError::io(format!("create parent of {}", self.path.display()), e))?;
        self.fs
            .write_atomic(&self.path, &content)
            .map_err(|e| StoreError::io(format!("write {}", self.path.display()), e))
    }
}

impl LinkRepository for JsonFileRepository {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn find_by_group(&self, group: &GroupKey) -> StoreResult<Vec<LinkRecord>> {
        Ok(self.load()?.find_by_group(group))
    }

    #[instrument(level = "debug", skip(self, record), fields(key = %record.global_key))]
    fn create(&self, record: LinkRecord) -> StoreResult<RecordId> {
        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut doc = self.load()?;
        let id = doc.insert(record)?;
        self.save(&doc)?;
        debug!("created record {}", id);
        Ok(id)
    }
}
