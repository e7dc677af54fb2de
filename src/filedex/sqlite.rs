use super::pattern::{contains_ignore_case, SearchPattern};
use super::schema::{FileRecord, InsertOutcome};
use super::store::FileStore;
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const SELECT_COLUMNS: &str = "SELECT id, name, size, caption FROM files";

/// SQLite-backed file store with regex matching on name and caption.
pub struct SqliteStore {
    label: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at `db_path`.
    ///
    /// `max_pages` caps the database size; inserts beyond it fail with
    /// `StoreError::Capacity`.
    pub fn open(label: &str, db_path: &Path, max_pages: Option<u64>) -> Result<Self, StoreError> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Task(format!("cannot create {}: {e}", dir.display())))?;
        }
        let conn = Connection::open(db_path)?;
        let journal: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(
            "PRAGMA synchronous  = NORMAL;
             PRAGMA temp_store   = MEMORY;",
        )?;
        info!(store = label, path = %db_path.display(), journal, "opened file store");
        Self::init(label, conn, max_pages)
    }

    pub fn open_in_memory(label: &str, max_pages: Option<u64>) -> Result<Self, StoreError> {
        Self::init(label, Connection::open_in_memory()?, max_pages)
    }

    fn init(label: &str, conn: Connection, max_pages: Option<u64>) -> Result<Self, StoreError> {
        register_functions(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                id      TEXT PRIMARY KEY,
                name    TEXT NOT NULL,
                size    INTEGER NOT NULL,
                caption TEXT NOT NULL DEFAULT ''
            );",
        )
        .map_err(classify)?;

        if let Some(pages) = max_pages {
            let limit: i64 = conn.pragma_update_and_check(
                None,
                "max_page_count",
                i64::try_from(pages).unwrap_or(i64::MAX),
                |row| row.get(0),
            )?;
            debug!(store = label, limit, "applied page quota");
        }

        // Missing indexes only cost speed, so a full store still opens.
        match conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_files_name ON files(name);
             CREATE INDEX IF NOT EXISTS idx_files_caption ON files(caption);",
        ) {
            Ok(()) => {}
            Err(e) if is_disk_full(&e) => {
                warn!(store = label, error = %e, "store is full, search indexes not created");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            label: label.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
        Ok(FileRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            size: row.get::<_, i64>(2)? as u64,
            caption: row.get(3)?,
        })
    }
}

#[async_trait]
impl FileStore for SqliteStore {
    fn label(&self) -> &str {
        &self.label
    }

    async fn insert(&self, record: &FileRecord) -> Result<InsertOutcome, StoreError> {
        let record = record.clone();
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO files (id, name, size, caption) VALUES (?1, ?2, ?3, ?4)",
                params![record.id, record.name, record.size as i64, record.caption],
            );
            match inserted {
                Ok(_) => Ok(InsertOutcome::Created),
                Err(e) if is_primary_key_violation(&e) => Ok(InsertOutcome::Duplicate),
                Err(e) => Err(classify(e)),
            }
        })
        .await
    }

    async fn find(
        &self,
        pattern: &SearchPattern,
        match_caption: bool,
    ) -> Result<Vec<FileRecord>, StoreError> {
        let (test, arg) = column_test(pattern);
        self.run(move |conn| {
            let filter = if match_caption {
                format!("WHERE {} OR {}", test("name"), test("caption"))
            } else {
                format!("WHERE {}", test("name"))
            };
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {filter} ORDER BY rowid"))?;
            let rows = stmt.query_map(params![arg], Self::row_to_record)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        let id = id.to_string();
        self.run(move |conn| {
            let record = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id],
                    Self::row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn delete_matching(&self, pattern: &SearchPattern) -> Result<u64, StoreError> {
        let (test, arg) = column_test(pattern);
        self.run(move |conn| {
            let deleted = conn
                .execute(&format!("DELETE FROM files WHERE {}", test("name")), params![arg])
                .map_err(classify)?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.run(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
            Ok(n as u64)
        })
        .await
    }
}

type ColumnTest = fn(&str) -> String;

/// SQL predicate for one column, and the value bound to `?1`.
fn column_test(pattern: &SearchPattern) -> (ColumnTest, String) {
    match (pattern.regex_source(), pattern.literal()) {
        (Some(source), _) => (regexp_test as ColumnTest, source.to_string()),
        (None, needle) => (
            icontains_test as ColumnTest,
            needle.unwrap_or_default().to_string(),
        ),
    }
}

fn regexp_test(column: &str) -> String {
    format!("{column} REGEXP ?1")
}

fn icontains_test(column: &str) -> String {
    format!("icontains({column}, ?1)")
}

/// `X REGEXP Y` calls `regexp(Y, X)`; the compiled pattern is cached per statement.
/// `icontains(text, needle)` is the literal fallback; `needle` is already lowercase.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "icontains",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let (Ok(text), Ok(needle)) = (ctx.get_raw(0).as_str(), ctx.get_raw(1).as_str()) else {
                return Ok(false);
            };
            Ok(contains_ignore_case(text, needle))
        },
    )?;
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |pattern| -> Result<_, BoxError> {
                Ok(Regex::new(pattern.as_str()?)?)
            })?;
            Ok(match ctx.get_raw(1).as_str() {
                Ok(text) => regex.is_match(text),
                Err(_) => false,
            })
        },
    )
}

fn is_disk_full(e: &rusqlite::Error) -> bool {
    e.sqlite_error_code() == Some(ErrorCode::DiskFull)
}

fn is_primary_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn classify(e: rusqlite::Error) -> StoreError {
    if is_disk_full(&e) {
        StoreError::Capacity(e.to_string())
    } else {
        StoreError::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, caption: &str) -> FileRecord {
        FileRecord {
            id: id.into(),
            name: name.into(),
            size: 42,
            caption: caption.into(),
        }
    }

    #[tokio::test]
    async fn insert_get_and_duplicate() {
        let store = SqliteStore::open_in_memory("primary", None).unwrap();
        let r = record("abc", "Dune 2021 1080p", "@chan upload");
        assert_eq!(store.insert(&r).await.unwrap(), InsertOutcome::Created);
        assert_eq!(store.insert(&r).await.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.get("abc").await.unwrap(), Some(r));
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_uses_regex_and_scan_order() {
        let store = SqliteStore::open_in_memory("primary", None).unwrap();
        store.insert(&record("1", "The Matrix 1999 HDRip", "")).await.unwrap();
        store.insert(&record("2", "Matrix Reloaded", "")).await.unwrap();
        store.insert(&record("3", "Dune", "the matrix trailer")).await.unwrap();

        let token = SearchPattern::build("MATRIX");
        let ids: Vec<_> = store
            .find(&token, false)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["1", "2"]);

        let phrase = SearchPattern::build("the matrix");
        assert_eq!(store.find(&phrase, false).await.unwrap().len(), 1);
        assert_eq!(store.find(&phrase, true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_ignores_captions() {
        let store = SqliteStore::open_in_memory("primary", None).unwrap();
        store.insert(&record("1", "Dune Part One", "")).await.unwrap();
        store.insert(&record("2", "Arrival", "dune")).await.unwrap();

        let deleted = store.delete_matching(&SearchPattern::build("dune")).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn literal_fallback_matches_substring() {
        let store = SqliteStore::open_in_memory("primary", None).unwrap();
        store.insert(&record("1", "Learn C++( fast", "")).await.unwrap();
        let p = SearchPattern::build("c++(");
        assert_eq!(store.find(&p, false).await.unwrap().len(), 1);
        assert_eq!(store.delete_matching(&p).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn oversized_query_is_matched_literally() {
        let store = SqliteStore::open_in_memory("primary", None).unwrap();
        store.insert(&record("1", "Dune", "")).await.unwrap();
        let p = SearchPattern::build(&"a".repeat(2_000_000));
        assert!(store.find(&p, true).await.unwrap().is_empty());
        assert_eq!(store.delete_matching(&p).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn page_quota_surfaces_as_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open("primary", &dir.path().join("files.db"), Some(1)).unwrap();

        let big_name = "x".repeat(2000);
        let mut hit_capacity = false;
        for i in 0..500 {
            match store.insert(&record(&format!("id-{i}"), &big_name, "")).await {
                Ok(InsertOutcome::Created) => {}
                Ok(InsertOutcome::Duplicate) => panic!("unexpected duplicate"),
                Err(e) => {
                    assert!(e.is_capacity(), "expected capacity error, got {e}");
                    hit_capacity = true;
                    break;
                }
            }
        }
        assert!(hit_capacity);
        // Reads keep working on a full store.
        assert!(store.count().await.is_ok());
    }
}
