//! Snapshot record storage.
//!
//! - [`SnapshotStore`] - interface the report assembler reads through
//! - [`MemoryStore`] - ordered in-memory map, keyed by capture time and identity hash
//! - [`FileStore`] - a JSON document on disk fronted by a [`MemoryStore`]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapdiffError};
use crate::types::SnapshotRecord;

/// Records sharing one identity hash, at either of the two requested dates.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotGroup {
    pub hash: String,
    pub records: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub captured_at: DateTime<Utc>,
    pub records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

pub trait SnapshotStore: Send + Sync {
    /// Inserts a record, or replaces image and elements of the record with
    /// the same capture time and identity hash.
    fn upsert(&self, record: SnapshotRecord) -> Result<UpsertOutcome>;

    /// Records captured at either date, grouped by identity hash.
    fn aggregate(&self, actual: DateTime<Utc>, expected: DateTime<Utc>)
        -> Result<Vec<SnapshotGroup>>;

    /// Distinct capture times, newest first, with their record counts.
    fn capture_times(&self) -> Result<Vec<CaptureSummary>>;

    fn find(&self, captured_at: DateTime<Utc>) -> Result<Vec<SnapshotRecord>>;
}

type RecordKey = (DateTime<Utc>, String);

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordKey, SnapshotRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = SnapshotRecord>) -> Result<Self> {
        let store = Self::new();
        for record in records {
            store.upsert(record)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &RecordKey) -> Result<Option<SnapshotRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(key).cloned())
    }

    /// Puts back the entry a failed write replaced or inserted.
    fn restore(&self, key: RecordKey, previous: Option<SnapshotRecord>) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match previous {
            Some(record) => records.insert(key, record),
            None => records.remove(&key),
        };
        Ok(())
    }

    fn all(&self) -> Result<Vec<SnapshotRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.values().cloned().collect())
    }
}

fn poisoned() -> SnapdiffError {
    SnapdiffError::store("snapshot store lock poisoned")
}

impl SnapshotStore for MemoryStore {
    fn upsert(&self, record: SnapshotRecord) -> Result<UpsertOutcome> {
        let key = (record.captured_at, record.identity_hash());
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match records.get_mut(&key) {
            Some(existing) => {
                existing.image_path = record.image_path;
                existing.elements_json = record.elements_json;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                records.insert(key, record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    fn aggregate(
        &self,
        actual: DateTime<Utc>,
        expected: DateTime<Utc>,
    ) -> Result<Vec<SnapshotGroup>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let mut groups: BTreeMap<String, Vec<SnapshotRecord>> = BTreeMap::new();
        for ((captured_at, hash), record) in records.iter() {
            if *captured_at == actual || *captured_at == expected {
                groups.entry(hash.clone()).or_default().push(record.clone());
            }
        }
        Ok(groups
            .into_iter()
            .map(|(hash, records)| SnapshotGroup { hash, records })
            .collect())
    }

    fn capture_times(&self) -> Result<Vec<CaptureSummary>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let mut counts: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
        for (captured_at, _) in records.keys() {
            *counts.entry(*captured_at).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .rev()
            .map(|(captured_at, records)| CaptureSummary {
                captured_at,
                records,
            })
            .collect())
    }

    fn find(&self, captured_at: DateTime<Utc>) -> Result<Vec<SnapshotRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter(|((at, _), _)| *at == captured_at)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

/// Store persisted as one JSON array of records.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the document at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let memory = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let records: Vec<SnapshotRecord> = if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    SnapdiffError::store(format!(
                        "failed to parse snapshots file {}: {e}",
                        path.display()
                    ))
                })?
            };
            MemoryStore::with_records(records)?
        } else {
            MemoryStore::new()
        };
        tracing::debug!(path = %path.display(), records = memory.len(), "opened snapshot store");
        Ok(Self {
            path,
            memory,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let records = self.memory.all()?;
        let json = serde_json::to_string_pretty(&records)?;
        write_atomically(&self.path, json.as_bytes()).map_err(|e| {
            SnapdiffError::store(format!(
                "failed to write snapshots file {}: {e}",
                self.path.display()
            ))
        })
    }
}

impl SnapshotStore for FileStore {
    fn upsert(&self, record: SnapshotRecord) -> Result<UpsertOutcome> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        let key = (record.captured_at, record.identity_hash());
        let previous = self.memory.get(&key)?;
        let outcome = self.memory.upsert(record)?;
        if let Err(err) = self.persist() {
            self.memory.restore(key, previous)?;
            return Err(err);
        }
        Ok(outcome)
    }

    fn aggregate(
        &self,
        actual: DateTime<Utc>,
        expected: DateTime<Utc>,
    ) -> Result<Vec<SnapshotGroup>> {
        self.memory.aggregate(actual, expected)
    }

    fn capture_times(&self) -> Result<Vec<CaptureSummary>> {
        self.memory.capture_times()
    }

    fn find(&self, captured_at: DateTime<Utc>) -> Result<Vec<SnapshotRecord>> {
        self.memory.find(captured_at)
    }
}

/// Writes to a sibling temp file, then renames over the target.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}
