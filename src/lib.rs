pub mod config;
pub mod error;
pub mod filedex;
pub mod logging;

pub use config::IndexConfig;
pub use error::{FileIdError, IndexError, IndexResult, StoreError};
pub use filedex::{Federation, FileRecord, MediaRef, SaveOutcome, SearchPage, SearchRequest};
