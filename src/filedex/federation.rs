//! Primary + overflow store orchestration.

use super::events::{EventBus, IndexEvent};
use super::file_id::derive_id;
use super::normalize::normalize;
use super::paginate::paginate;
use super::pattern::SearchPattern;
use super::schema::{
    FileRecord, InsertOutcome, MediaRef, SaveOutcome, SearchPage, SearchRequest, StoreCounts,
    StoreSlot, UNNAMED,
};
use super::store::FileStore;
use crate::error::IndexResult;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Owns the primary store and, when configured, the overflow store.
///
/// Overflow is only written to after the primary reports capacity
/// exhaustion, but is always read from.
pub struct Federation {
    primary: Arc<dyn FileStore>,
    overflow: Option<Arc<dyn FileStore>>,
    events: EventBus,
}

impl Federation {
    pub fn new(primary: Arc<dyn FileStore>, overflow: Option<Arc<dyn FileStore>>) -> Self {
        Self {
            primary,
            overflow,
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }

    pub fn has_overflow(&self) -> bool {
        self.overflow.is_some()
    }

    /// Index a media item seen in a monitored channel.
    ///
    /// Fails only when the file id cannot be decoded or a store reports a
    /// fault other than capacity exhaustion.
    pub async fn save(&self, media: &MediaRef) -> IndexResult<SaveOutcome> {
        let id = derive_id(&media.file_id)?;
        let record = FileRecord {
            id,
            name: normalize(
                media
                    .file_name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(UNNAMED),
            ),
            size: media.file_size,
            caption: normalize(media.caption.as_deref().unwrap_or_default()),
        };

        let primary_err = match self.primary.insert(&record).await {
            Ok(outcome) => return Ok(self.settle(record, outcome, StoreSlot::Primary)),
            Err(e) if e.is_capacity() => e,
            Err(e) => return Err(e.into()),
        };

        if let Some(overflow) = &self.overflow {
            info!(store = self.primary.label(), error = %primary_err, "primary store full, using overflow");
            match overflow.insert(&record).await {
                Ok(outcome) => return Ok(self.settle(record, outcome, StoreSlot::Overflow)),
                Err(e) if e.is_capacity() => {
                    error!(storage_full = true, store = overflow.label(), error = %e, "overflow store is full too");
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            error!(
                storage_full = true,
                store = self.primary.label(),
                error = %primary_err,
                "primary store is full and no overflow store is configured"
            );
        }

        self.events.publish(IndexEvent::StorageFull {
            name: record.name,
            caption: record.caption,
        });
        Ok(SaveOutcome::StorageFull)
    }

    fn settle(&self, record: FileRecord, outcome: InsertOutcome, store: StoreSlot) -> SaveOutcome {
        match outcome {
            InsertOutcome::Created => {
                info!(?store, name = %record.name, "saved");
                self.events.publish(IndexEvent::FileIndexed { record, store });
                SaveOutcome::Saved
            }
            InsertOutcome::Duplicate => {
                warn!(?store, name = %record.name, "already saved");
                SaveOutcome::AlreadySaved
            }
        }
    }

    /// Search both stores, primary results first, then paginate.
    pub async fn search(&self, request: &SearchRequest) -> IndexResult<SearchPage> {
        let pattern = SearchPattern::build(&request.query);

        let mut results = self.primary.find(&pattern, request.match_caption).await?;
        if let Some(overflow) = &self.overflow {
            results.extend(overflow.find(&pattern, request.match_caption).await?);
        }

        if let Some(lang) = request.language.as_deref() {
            let lang = lang.to_lowercase();
            results.retain(|r| r.name.to_lowercase().contains(&lang));
        }

        Ok(paginate(results, request.offset, request.page_size))
    }

    /// Delete records whose name matches `query` from every store.
    pub async fn delete_matching(&self, query: &str) -> IndexResult<u64> {
        let pattern = SearchPattern::build(query);

        let mut deleted = self.primary.delete_matching(&pattern).await?;
        if let Some(overflow) = &self.overflow {
            deleted += overflow.delete_matching(&pattern).await?;
        }

        info!(query, deleted, "deleted matching files");
        Ok(deleted)
    }

    pub async fn fetch_by_id(&self, id: &str) -> IndexResult<Option<FileRecord>> {
        if let Some(record) = self.primary.get(id).await? {
            return Ok(Some(record));
        }
        match &self.overflow {
            Some(overflow) => Ok(overflow.get(id).await?),
            None => Ok(None),
        }
    }

    pub async fn counts(&self) -> IndexResult<StoreCounts> {
        let primary = self.primary.count().await?;
        let overflow = match &self.overflow {
            Some(store) => Some(store.count().await?),
            None => None,
        };
        Ok(StoreCounts { primary, overflow })
    }
}

impl std::fmt::Debug for Federation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Federation")
            .field("primary", &self.primary.label())
            .field("overflow", &self.overflow.as_ref().map(|s| s.label()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IndexError, StoreError};
    use crate::filedex::file_id::{FileType, NativeFileId};
    use crate::filedex::store::MemoryStore;
    use async_trait::async_trait;

    fn media(media_id: i64, name: &str) -> MediaRef {
        let native = NativeFileId {
            file_type: FileType::Document,
            dc_id: 4,
            file_reference: vec![1, 2, 3],
            media_id,
            access_hash: media_id * 31,
        };
        MediaRef {
            file_id: native.encode().unwrap(),
            file_name: Some(name.to_string()),
            caption: None,
            file_size: 1024,
        }
    }

    /// Store that fails every operation with a plain backend fault.
    struct BrokenStore;

    #[async_trait]
    impl FileStore for BrokenStore {
        fn label(&self) -> &str {
            "broken"
        }
        async fn insert(&self, _: &FileRecord) -> Result<InsertOutcome, StoreError> {
            Err(StoreError::Task("connection reset".into()))
        }
        async fn find(&self, _: &SearchPattern, _: bool) -> Result<Vec<FileRecord>, StoreError> {
            Err(StoreError::Task("connection reset".into()))
        }
        async fn get(&self, _: &str) -> Result<Option<FileRecord>, StoreError> {
            Err(StoreError::Task("connection reset".into()))
        }
        async fn delete_matching(&self, _: &SearchPattern) -> Result<u64, StoreError> {
            Err(StoreError::Task("connection reset".into()))
        }
        async fn count(&self) -> Result<u64, StoreError> {
            Err(StoreError::Task("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn second_save_is_already_saved() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let fed = Federation::new(primary.clone(), None);
        let m = media(7, "Dune.2021.1080p");

        assert_eq!(fed.save(&m).await.unwrap(), SaveOutcome::Saved);
        assert_eq!(fed.save(&m).await.unwrap(), SaveOutcome::AlreadySaved);
        assert_eq!(primary.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_normalizes_and_defaults_name() {
        let fed = Federation::new(Arc::new(MemoryStore::new("primary")), None);
        let mut m = media(8, "x");
        m.file_name = None;
        m.caption = Some("@uploader Dune_2021".into());
        fed.save(&m).await.unwrap();

        let id = derive_id(&m.file_id).unwrap();
        let record = fed.fetch_by_id(&id).await.unwrap().unwrap();
        assert_eq!(record.name, UNNAMED);
        assert_eq!(record.caption, "  Dune 2021");
        assert_eq!(record.size, 1024);
    }

    #[tokio::test]
    async fn empty_name_is_stored_as_placeholder_and_stays_deletable() {
        let fed = Federation::new(Arc::new(MemoryStore::new("primary")), None);
        let mut m = media(14, "x");
        m.file_name = Some(String::new());
        fed.save(&m).await.unwrap();

        let id = derive_id(&m.file_id).unwrap();
        assert_eq!(fed.fetch_by_id(&id).await.unwrap().unwrap().name, UNNAMED);
        assert_eq!(fed.search(&SearchRequest::new("")).await.unwrap().total, 1);
        assert_eq!(fed.delete_matching("unnamed").await.unwrap(), 1);
        assert!(fed.fetch_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn full_primary_falls_back_to_overflow() {
        let primary = Arc::new(MemoryStore::with_capacity("primary", 0));
        let overflow = Arc::new(MemoryStore::new("overflow"));
        let fed = Federation::new(primary.clone(), Some(overflow.clone()));
        let mut events = fed.subscribe();
        let m = media(9, "Arrival.2016");

        assert_eq!(fed.save(&m).await.unwrap(), SaveOutcome::Saved);
        assert_eq!(fed.save(&m).await.unwrap(), SaveOutcome::AlreadySaved);
        assert_eq!(primary.count().await.unwrap(), 0);
        assert_eq!(overflow.count().await.unwrap(), 1);

        let id = derive_id(&m.file_id).unwrap();
        assert!(fed.fetch_by_id(&id).await.unwrap().is_some());

        match events.try_recv().unwrap() {
            IndexEvent::FileIndexed { record, store } => {
                assert_eq!(record.id, id);
                assert_eq!(store, StoreSlot::Overflow);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_primary_without_overflow_is_storage_full() {
        let primary = Arc::new(MemoryStore::with_capacity("primary", 0));
        let fed = Federation::new(primary.clone(), None);
        let mut events = fed.subscribe();
        let m = media(10, "Heat.1995");

        assert_eq!(fed.save(&m).await.unwrap(), SaveOutcome::StorageFull);
        assert_eq!(primary.count().await.unwrap(), 0);
        let id = derive_id(&m.file_id).unwrap();
        assert!(fed.fetch_by_id(&id).await.unwrap().is_none());
        assert!(matches!(
            events.try_recv().unwrap(),
            IndexEvent::StorageFull { name, .. } if name == "Heat 1995"
        ));
    }

    #[tokio::test]
    async fn both_stores_full_is_storage_full() {
        let fed = Federation::new(
            Arc::new(MemoryStore::with_capacity("primary", 0)),
            Some(Arc::new(MemoryStore::with_capacity("overflow", 0))),
        );
        assert_eq!(fed.save(&media(11, "x")).await.unwrap(), SaveOutcome::StorageFull);
    }

    #[tokio::test]
    async fn non_capacity_fault_is_surfaced() {
        let overflow = Arc::new(MemoryStore::new("overflow"));
        let fed = Federation::new(Arc::new(BrokenStore), Some(overflow.clone()));

        let err = fed.save(&media(12, "x")).await.unwrap_err();
        assert!(matches!(err, IndexError::Store(StoreError::Task(_))));
        assert_eq!(overflow.count().await.unwrap(), 0);
        assert!(fed.search(&SearchRequest::new("x")).await.is_err());
    }

    #[tokio::test]
    async fn bad_file_id_aborts_before_writing() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let fed = Federation::new(primary.clone(), None);
        let mut m = media(13, "x");
        m.file_id = "%%%".into();

        assert!(matches!(fed.save(&m).await, Err(IndexError::Decode(_))));
        assert_eq!(primary.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_merges_primary_then_overflow_and_filters_language() {
        let primary = Arc::new(MemoryStore::with_capacity("primary", 2));
        let overflow = Arc::new(MemoryStore::new("overflow"));
        let fed = Federation::new(primary, Some(overflow));

        for (i, name) in [
            "Dune.2021.English",
            "Dune.Part.Two.Hindi",
            "Dune.1984.english",
            "Arrival",
        ]
        .into_iter()
        .enumerate()
        {
            fed.save(&media(100 + i as i64, name)).await.unwrap();
        }

        let page = fed.search(&SearchRequest::new("dune")).await.unwrap();
        let names: Vec<_> = page.files.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Dune 2021 English", "Dune Part Two Hindi", "Dune 1984 english"]);
        assert_eq!(page.total, 3);

        let english = fed
            .search(&SearchRequest::new("dune").language("ENGLISH").page_size(1))
            .await
            .unwrap();
        assert_eq!(english.total, 2);
        assert_eq!(english.files[0].name, "Dune 2021 English");
        assert_eq!(english.next_offset, Some(1));
    }

    #[tokio::test]
    async fn delete_spans_both_stores() {
        let fed = Federation::new(
            Arc::new(MemoryStore::with_capacity("primary", 1)),
            Some(Arc::new(MemoryStore::new("overflow"))),
        );
        fed.save(&media(200, "Heat.1995")).await.unwrap();
        fed.save(&media(201, "Heat.Remastered")).await.unwrap();
        fed.save(&media(202, "Ronin")).await.unwrap();

        assert_eq!(fed.delete_matching("heat").await.unwrap(), 2);
        assert_eq!(fed.search(&SearchRequest::new("heat")).await.unwrap().total, 0);
        let counts = fed.counts().await.unwrap();
        assert_eq!(counts.primary, 0);
        assert_eq!(counts.overflow, Some(1));
    }
}
