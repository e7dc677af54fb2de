use serde::{Deserialize, Serialize};

/// Placeholder stored when a media item arrives without a file name.
pub const UNNAMED: &str = "Unnamed";

/// An indexed media file. Immutable once saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub caption: String,
}

/// A media item as observed in a monitored channel.
///
/// `file_id` is the platform's native file reference; the stored id is
/// derived from it, never copied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    pub file_id: String,
    pub file_name: Option<String>,
    pub caption: Option<String>,
    pub file_size: u64,
}

/// Result of inserting into a single store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Duplicate,
}

/// Result of [`Federation::save`](super::Federation::save).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    AlreadySaved,
    /// Primary is out of capacity and no overflow store could take the record.
    StorageFull,
}

/// Which backing store a record landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSlot {
    Primary,
    Overflow,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub files: Vec<FileRecord>,
    /// Offset of the following page; `None` when this is the last one.
    pub next_offset: Option<usize>,
    pub total: usize,
}

/// Search parameters.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub page_size: usize,
    pub offset: usize,
    pub match_caption: bool,
    pub language: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page_size: 10,
            offset: 0,
            match_caption: false,
            language: None,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn match_caption(mut self, enabled: bool) -> Self {
        self.match_caption = enabled;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Record counts for each configured store.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreCounts {
    pub primary: u64,
    pub overflow: Option<u64>,
}
