use crate::error::{IndexError, IndexResult};
use crate::filedex::{Federation, FileStore, SqliteStore};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Index configuration, read from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Primary store database file. `~` is expanded.
    pub primary_db: String,
    /// Overflow store, written to only once the primary is full.
    pub overflow_db: Option<String>,
    /// Page quota applied to each store (`PRAGMA max_page_count`).
    pub max_db_pages: Option<u64>,
    /// Match captions as well as names when searching.
    pub use_caption_filter: bool,
    /// Results per page.
    pub max_results: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let primary_db = data_dir()
            .join("files.db")
            .to_string_lossy()
            .into_owned();
        Self {
            primary_db,
            overflow_db: None,
            max_db_pages: None,
            use_caption_filter: false,
            max_results: 10,
        }
    }
}

impl IndexConfig {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("mediadex.toml"))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(IndexError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> IndexResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| IndexError::Config(e.to_string()))?;
        if config.max_results == 0 {
            return Err(IndexError::Config("max_results must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn primary_path(&self) -> PathBuf {
        expand(&self.primary_db)
    }

    pub fn overflow_path(&self) -> Option<PathBuf> {
        self.overflow_db
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(expand)
    }

    /// Open the configured stores.
    pub fn open(&self) -> IndexResult<Federation> {
        let primary: Arc<dyn FileStore> = Arc::new(SqliteStore::open(
            "primary",
            &self.primary_path(),
            self.max_db_pages,
        )?);
        let overflow = match self.overflow_path() {
            Some(path) => Some(Arc::new(SqliteStore::open("overflow", &path, self.max_db_pages)?)
                as Arc<dyn FileStore>),
            None => None,
        };
        Ok(Federation::new(primary, overflow))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "mediadex")
}

fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
