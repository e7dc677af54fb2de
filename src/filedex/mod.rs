//! Filedex: media file index
//!
//! Derives stable ids from native file references, stores normalized
//! name/caption records in a primary store with overflow fallback, and
//! serves regex search, bulk delete and lookup by id across both.

pub mod events;
pub mod federation;
pub mod file_id;
pub mod normalize;
pub mod paginate;
pub mod pattern;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use events::IndexEvent;
pub use federation::Federation;
pub use file_id::derive_id;
pub use pattern::SearchPattern;
pub use schema::{FileRecord, MediaRef, SaveOutcome, SearchPage, SearchRequest};
pub use sqlite::SqliteStore;
pub use store::{FileStore, MemoryStore};
