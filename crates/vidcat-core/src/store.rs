//! The record-store seam and two local implementations.
//!
//! The production catalog lives outside this workspace; everything here only
//! needs [`RecordStore::create`] and [`RecordStore::update`]. The memory store
//! backs tests, the JSON-directory store backs the CLI.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ids::RecordId;
use crate::record::Record;

/// Persistence for catalog records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record. Fails if a record with the same id exists.
    async fn create(&self, record: &Record) -> Result<()>;

    /// Overwrite an existing record.
    async fn update(&self, record: &Record) -> Result<()>;

    /// Look up a record by id.
    async fn get(&self, id: RecordId) -> Result<Option<Record>>;
}

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

/// In-process store keyed by record id.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<RecordId, Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: &Record) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.id()) {
            return Err(Error::store(format!("record {} already exists", record.id())));
        }
        records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(&record.id()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(Error::not_found("record", record.id())),
        }
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.records.read().get(&id).cloned())
    }
}

// ---------------------------------------------------------------------------
// JsonDirRecordStore
// ---------------------------------------------------------------------------

/// Stores each record as `<dir>/<id>.json`.
///
/// Writes go to a sibling `.tmp` file first and are renamed into place, so a
/// reader never observes a half-written record.
#[derive(Debug, Clone)]
pub struct JsonDirRecordStore {
    dir: PathBuf,
}

impl JsonDirRecordStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: RecordId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn write(&self, record: &Record) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).map_err(Error::store)?;
        let path = self.path_for(record.id());
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonDirRecordStore {
    async fn create(&self, record: &Record) -> Result<()> {
        if tokio::fs::try_exists(self.path_for(record.id())).await? {
            return Err(Error::store(format!("record {} already exists", record.id())));
        }
        self.write(record).await?;
        tracing::debug!(record_id = %record.id(), dir = %self.dir.display(), "Record created");
        Ok(())
    }

    async fn update(&self, record: &Record) -> Result<()> {
        if !tokio::fs::try_exists(self.path_for(record.id())).await? {
            return Err(Error::not_found("record", record.id()));
        }
        self.write(record).await
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(Error::store),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
