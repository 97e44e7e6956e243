use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DictError, Result};

/// Engine options recognised when opening a store
///
/// Every field maps onto one LMDB environment setting. Options are checked by
/// [`StoreOptions::validate`] before the engine sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Maximum size of the memory map in bytes (default: 10MB)
    ///
    /// Writes that would grow the store past this size fail with
    /// `MDB_MAP_FULL`.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Maximum number of simultaneous read transactions (default: 126)
    ///
    /// Counts every reader across all processes sharing the store, so a
    /// reader pool needs at least one slot per worker plus open iterators.
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,

    /// Durability of commits
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Let the OS read ahead when paging in the map (default: true)
    ///
    /// Turning this off helps random-access workloads on stores larger
    /// than RAM.
    #[serde(default = "default_true")]
    pub read_ahead: bool,

    /// Map the file writable and write through the map (default: false)
    #[serde(default)]
    pub write_map: bool,

    /// Treat `path` as a directory holding `data.mdb` (default: true)
    ///
    /// When false, `path` names the data file itself and the lock file is
    /// `path` with a `-lock` suffix.
    #[serde(default = "default_true")]
    pub subdir: bool,

    /// Use the engine's lock file (default: true)
    ///
    /// Disabling locking is only safe when no process writes while others
    /// read, e.g. a store that is built once and then served read-only.
    #[serde(default = "default_true")]
    pub lock: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// `fsync()` data and meta pages on every commit (default).
    #[default]
    Full,

    /// Skip syncing the meta page on commit.
    ///
    /// The last transaction may be lost after an OS crash; the store stays
    /// consistent.
    NoMetaSync,

    /// Never `fsync()`; the OS page cache decides when to flush.
    ///
    /// **WARNING**: a power failure can lose recent transactions or corrupt
    /// the store. Only for reproducible or test workloads. Call
    /// `flush()` to force durability at chosen points.
    NoSync,
}

fn default_map_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_max_readers() -> u32 {
    126
}

fn default_true() -> bool {
    true
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            map_size: default_map_size(),
            max_readers: default_max_readers(),
            sync_mode: SyncMode::default(),
            read_ahead: default_true(),
            write_map: false,
            subdir: default_true(),
            lock: default_true(),
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map_size(mut self, map_size: usize) -> Self {
        self.map_size = map_size;
        self
    }

    pub fn with_max_readers(mut self, max_readers: u32) -> Self {
        self.max_readers = max_readers;
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_read_ahead(mut self, read_ahead: bool) -> Self {
        self.read_ahead = read_ahead;
        self
    }

    pub fn with_write_map(mut self, write_map: bool) -> Self {
        self.write_map = write_map;
        self
    }

    pub fn with_subdir(mut self, subdir: bool) -> Self {
        self.subdir = subdir;
        self
    }

    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Reject option combinations the engine would fail on later
    pub fn validate(&self) -> Result<()> {
        if self.map_size == 0 {
            return Err(DictError::Config("map_size must be greater than zero".into()));
        }
        if self.max_readers == 0 {
            return Err(DictError::Config(
                "max_readers must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Settings handed to an external worker pool
///
/// Describes how many workers to start and what each one opens at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderPoolConfig {
    /// Path to the store every worker opens read-only
    pub path: PathBuf,

    /// Number of worker processes (default: 4)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default)]
    pub options: StoreOptions,
}

fn default_worker_count() -> usize {
    4
}

impl ReaderPoolConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            worker_count: default_worker_count(),
            options: StoreOptions::default(),
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(DictError::Config(
                "worker_count must be greater than zero".into(),
            ));
        }
        self.options.validate()
    }
}
