//! Read-only handles for worker pools
//!
//! Each worker process opens the store once, at startup, and hands the
//! resulting [`ReaderContext`] to every task it runs. Tasks never open their
//! own handle.
//!
//! The pool itself (spawning processes, distributing work) belongs to the
//! caller. [`make_reader_pool`] only produces what such a pool needs: the
//! worker count and a [`ReaderInitializer`] to run as the per-worker
//! startup hook.
//!
//! # Example
//!
//! ```no_run
//! use lmdb_simple::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = make_reader_pool("data.mdb", 4, StoreOptions::default())?;
//!
//! // In each worker, once at startup:
//! let ctx = pool.initializer().init()?;
//!
//! // Per task:
//! let value = ctx.run(|db| db.get(b"key"))?;
//! # Ok(())
//! # }
//! ```

use lmdb_simple_core::{
    error::{DictError, Result},
    ReaderPoolConfig, StoreOptions,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::dict::LmdbDict;

static PROCESS_READER: OnceLock<ReaderContext> = OnceLock::new();
static PROCESS_INIT: Mutex<()> = parking_lot::const_mutex(());

/// Per-process reader state passed to worker tasks
#[derive(Debug)]
pub struct ReaderContext {
    reader: LmdbDict,
}

impl ReaderContext {
    pub fn reader(&self) -> &LmdbDict {
        &self.reader
    }

    /// Run one task against the shared reader
    pub fn run<T>(&self, task: impl FnOnce(&LmdbDict) -> T) -> T {
        task(&self.reader)
    }

    pub fn into_inner(self) -> LmdbDict {
        self.reader
    }
}

/// Open a read-only store for this process
pub fn init_reader<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<ReaderContext> {
    let reader = LmdbDict::open(path, false, options)?;
    tracing::info!(
        "Reader initialized for {} in process {}",
        reader.path().display(),
        std::process::id()
    );
    Ok(ReaderContext { reader })
}

/// Startup hook for one worker: opens the reader with fixed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderInitializer {
    path: PathBuf,
    options: StoreOptions,
}

impl ReaderInitializer {
    pub fn init(&self) -> Result<ReaderContext> {
        init_reader(&self.path, self.options.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }
}

/// Configuration for an external pool of reader workers
#[derive(Debug, Clone)]
pub struct ReaderPool {
    config: ReaderPoolConfig,
}

impl ReaderPool {
    pub fn from_config(config: ReaderPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReaderPoolConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// The hook each worker runs once at startup
    pub fn initializer(&self) -> ReaderInitializer {
        ReaderInitializer {
            path: self.config.path.clone(),
            options: self.config.options.clone(),
        }
    }

    /// Initialize this process's reader and publish it process-wide
    ///
    /// The reader is created at most once per process. Later calls with the
    /// same path return it; a different path is a state error.
    pub fn init_process(&self) -> Result<&'static ReaderContext> {
        let _guard = PROCESS_INIT.lock();
        if let Some(existing) = PROCESS_READER.get() {
            if existing.reader().path() != self.path() {
                return Err(DictError::State(format!(
                    "Process reader already initialized for {}",
                    existing.reader().path().display()
                )));
            }
            return Ok(existing);
        }

        let ctx = self.initializer().init()?;
        Ok(PROCESS_READER.get_or_init(|| ctx))
    }
}

/// Build the configuration for a pool of `worker_count` read-only workers
pub fn make_reader_pool<P: AsRef<Path>>(
    path: P,
    worker_count: usize,
    options: StoreOptions,
) -> Result<ReaderPool> {
    ReaderPool::from_config(
        ReaderPoolConfig::new(path.as_ref())
            .with_worker_count(worker_count)
            .with_options(options),
    )
}

/// The reader published by [`ReaderPool::init_process`]
///
/// # Panics
///
/// Panics if this process has not been initialized; reading the reader
/// before the startup hook ran is a programming error.
pub fn process_reader() -> &'static ReaderContext {
    match PROCESS_READER.get() {
        Some(ctx) => ctx,
        None => panic!("process reader used before ReaderPool::init_process"),
    }
}

pub fn try_process_reader() -> Option<&'static ReaderContext> {
    PROCESS_READER.get()
}
