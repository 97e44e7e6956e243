use lmdb_simple_core::{
    error::{DictError, Result},
    StoreOptions,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::{self, SharedEnv};
use crate::txn::{StoreStat, StoreTxn};

/// Handle on an LMDB environment
///
/// The write mode is fixed at construction. A read-only handle never begins
/// a write transaction, even when another handle in this process has the
/// same environment open for writing.
pub struct StoreHandle {
    path: PathBuf,
    writer: bool,
    options: StoreOptions,
    shared: Option<Arc<SharedEnv>>,
}

impl StoreHandle {
    /// Open the environment at `path`
    ///
    /// A writer creates the directory if needed; a reader requires the store
    /// to exist already. Opening a writer fails with [`DictError::Open`] while
    /// a read-only handle on the same path is still open in this process;
    /// close the readers first.
    pub fn open<P: AsRef<Path>>(path: P, writer: bool, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let shared = registry::acquire(&path, writer, &options)?;
        Ok(Self {
            path,
            writer,
            options,
            shared: Some(shared),
        })
    }

    /// Reopen a closed handle with its original path, mode, and options
    pub fn reopen(&mut self) -> Result<()> {
        if self.shared.is_none() {
            self.shared = Some(registry::acquire(&self.path, self.writer, &self.options)?);
            tracing::debug!("Reopened store handle at {}", self.path.display());
        }
        Ok(())
    }

    /// Release the environment; closing twice is a no-op
    pub fn close(&mut self) {
        if self.shared.take().is_some() {
            tracing::debug!("Closed store handle at {}", self.path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.shared.is_some()
    }

    pub fn is_writer(&self) -> bool {
        self.writer
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Begin a read or write transaction
    pub fn begin(&self, write: bool) -> Result<StoreTxn<'_>> {
        let shared = self.shared()?;
        if write {
            if !self.writer {
                return Err(DictError::read_only());
            }
            Ok(StoreTxn::write(shared.env.begin_rw_txn()?, shared.db))
        } else {
            Ok(StoreTxn::read(shared.env.begin_ro_txn()?, shared.db))
        }
    }

    /// Flush prior commits to disk
    ///
    /// No-op on a closed or read-only handle.
    pub fn sync(&self) -> Result<()> {
        match &self.shared {
            Some(shared) if self.writer => {
                shared.env.sync(true)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Statistics of the main database as of now
    pub fn stat(&self) -> Result<StoreStat> {
        let txn = self.begin(false)?;
        let stat = txn.stat()?;
        txn.commit()?;
        Ok(stat)
    }

    fn shared(&self) -> Result<&SharedEnv> {
        self.shared.as_deref().ok_or_else(DictError::closed)
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.path)
            .field("writer", &self.writer)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_writer_and_reader() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store");

        let writer = StoreHandle::open(&path, true, StoreOptions::default()).unwrap();
        assert!(writer.is_open());
        assert!(writer.is_writer());
        assert_eq!(writer.path(), path.as_path());

        let reader = StoreHandle::open(&path, false, StoreOptions::default()).unwrap();
        assert!(!reader.is_writer());
        assert!(reader.begin(false).is_ok());
    }

    #[test]
    fn test_reader_cannot_begin_write() {
        let temp = TempDir::new().unwrap();
        drop(StoreHandle::open(temp.path(), true, StoreOptions::default()).unwrap());

        let reader = StoreHandle::open(temp.path(), false, StoreOptions::default()).unwrap();
        let err = reader.begin(true).err().unwrap();
        assert!(err.is_state());
    }

    #[test]
    fn test_reader_on_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let err = StoreHandle::open(temp.path().join("nope"), false, StoreOptions::default())
            .unwrap_err();
        assert!(matches!(err, DictError::Open { .. }));
    }

    #[test]
    fn test_writer_waits_for_readers_to_close() {
        let temp = TempDir::new().unwrap();
        drop(StoreHandle::open(temp.path(), true, StoreOptions::default()).unwrap());

        let mut reader = StoreHandle::open(temp.path(), false, StoreOptions::default()).unwrap();
        let err = StoreHandle::open(temp.path(), true, StoreOptions::default()).unwrap_err();
        assert!(matches!(err, DictError::Open { .. }));

        reader.close();
        let writer = StoreHandle::open(temp.path(), true, StoreOptions::default()).unwrap();
        assert!(writer.is_writer());
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_begin() {
        let temp = TempDir::new().unwrap();
        let mut handle = StoreHandle::open(temp.path(), true, StoreOptions::default()).unwrap();

        handle.close();
        handle.close();
        assert!(!handle.is_open());
        assert!(handle.begin(false).err().unwrap().is_state());
        assert!(handle.begin(true).err().unwrap().is_state());
        // sync on a closed handle is a no-op
        handle.sync().unwrap();

        handle.reopen().unwrap();
        assert!(handle.is_open());
        assert!(handle.begin(true).is_ok());
    }

    #[test]
    fn test_sync_and_stat() {
        let temp = TempDir::new().unwrap();
        let handle = StoreHandle::open(temp.path(), true, StoreOptions::default()).unwrap();

        let mut txn = handle.begin(true).unwrap();
        txn.put(b"k", b"v").unwrap();
        txn.commit().unwrap();
        handle.sync().unwrap();

        assert_eq!(handle.stat().unwrap().entries, 1);
    }

    #[test]
    fn test_no_subdir_layout() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("single.mdb");
        let opts = StoreOptions::default().with_subdir(false);

        let handle = StoreHandle::open(&file, true, opts.clone()).unwrap();
        assert!(file.is_file());
        drop(handle);

        let reader = StoreHandle::open(&file, false, opts).unwrap();
        assert!(reader.begin(false).is_ok());
    }
}
