use super::pattern::SearchPattern;
use super::schema::{FileRecord, InsertOutcome};
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;

/// One backing collection of file records, keyed by `id`.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &str;

    /// Insert a record. A record with the same id yields `Duplicate`;
    /// a full backend yields `StoreError::Capacity`.
    async fn insert(&self, record: &FileRecord) -> Result<InsertOutcome, StoreError>;

    /// Records whose name (or caption, when `match_caption`) matches, in scan order.
    async fn find(
        &self,
        pattern: &SearchPattern,
        match_caption: bool,
    ) -> Result<Vec<FileRecord>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<FileRecord>, StoreError>;

    /// Delete records whose name matches. Captions are never considered.
    async fn delete_matching(&self, pattern: &SearchPattern) -> Result<u64, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

fn record_matches(record: &FileRecord, pattern: &SearchPattern, match_caption: bool) -> bool {
    pattern.is_match(&record.name) || (match_caption && pattern.is_match(&record.caption))
}

/// In-process store, optionally capped at a number of records.
pub struct MemoryStore {
    label: String,
    capacity: Option<usize>,
    records: RwLock<Vec<FileRecord>>,
}

impl MemoryStore {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            capacity: None,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Refuse inserts with `StoreError::Capacity` once `capacity` records are held.
    pub fn with_capacity(label: impl Into<String>, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(label)
        }
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    fn label(&self) -> &str {
        &self.label
    }

    async fn insert(&self, record: &FileRecord) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.write();
        if records.iter().any(|r| r.id == record.id) {
            return Ok(InsertOutcome::Duplicate);
        }
        if let Some(cap) = self.capacity {
            if records.len() >= cap {
                return Err(StoreError::Capacity(format!(
                    "{} holds its limit of {cap} records",
                    self.label
                )));
            }
        }
        records.push(record.clone());
        Ok(InsertOutcome::Created)
    }

    async fn find(
        &self,
        pattern: &SearchPattern,
        match_caption: bool,
    ) -> Result<Vec<FileRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| record_matches(r, pattern, match_caption))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.records.read().iter().find(|r| r.id == id).cloned())
    }

    async fn delete_matching(&self, pattern: &SearchPattern) -> Result<u64, StoreError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| !pattern.is_match(&r.name));
        Ok((before - records.len()) as u64)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().len() as u64)
    }
}
