use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::report::types::ResultTable;
use crate::score::ScoreFormula;

pub const DATA_FILE: &str = "last_run_data.json";
pub const META_FILE: &str = "last_run_meta.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No previous run has been cached")]
    NotFound,

    #[error("Failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistence for the last computed table.
///
/// `save` overwrites the previous record wholesale. The table and its
/// timestamp are written separately, so a crash in between can leave them
/// out of step.
pub trait CacheStore {
    /// Save `table` together with the formula that scored it.
    fn save(&self, table: &ResultTable, formula: ScoreFormula) -> Result<DateTime<Utc>, CacheError>;

    /// The last saved table, or [`CacheError::NotFound`].
    fn load_last(&self) -> Result<ResultTable, CacheError>;

    /// Metadata of the last save, `None` if never.
    fn last_run(&self) -> Result<Option<RunMeta>, CacheError>;

    /// When the last save happened, `None` if never.
    fn last_run_time(&self) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.last_run()?.map(|meta| meta.last_run))
    }

    /// A previous run can be loaded: both the timestamp and the table exist.
    fn has_previous_run(&self) -> Result<Option<DateTime<Utc>>, CacheError>;
}

/// Contents of the metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub last_run: DateTime<Utc>,
    /// Records written before the formula was stored were ratio scores
    #[serde(default)]
    pub formula: ScoreFormula,
}

/// Stores the cache as two JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `Ok(None)` when the file does not exist.
    fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, CacheError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl CacheStore for FileCacheStore {
    #[instrument(skip(self, table), fields(dir = %self.dir.display(), rows = table.len()))]
    fn save(&self, table: &ResultTable, formula: ScoreFormula) -> Result<DateTime<Utc>, CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        Self::write_json(&self.data_path(), table)?;
        let last_run = Utc::now();
        Self::write_json(&self.meta_path(), &RunMeta { last_run, formula })?;
        debug!(%last_run, ?formula, "cached run");
        Ok(last_run)
    }

    fn load_last(&self) -> Result<ResultTable, CacheError> {
        Self::read_json(&self.data_path())?.ok_or(CacheError::NotFound)
    }

    fn last_run(&self) -> Result<Option<RunMeta>, CacheError> {
        Self::read_json(&self.meta_path())
    }

    fn has_previous_run(&self) -> Result<Option<DateTime<Utc>>, CacheError> {
        if !self.data_path().exists() {
            return Ok(None);
        }
        self.last_run_time()
    }
}
