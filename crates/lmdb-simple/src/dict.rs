//! Dictionary-shaped façade over an LMDB store
//!
//! Keys and values are opaque bytes. Serialize structured data before
//! storing it; nothing is encoded or decoded here.
//!
//! # Example
//!
//! ```no_run
//! use lmdb_simple::prelude::*;
//!
//! # fn main() -> Result<()> {
//! {
//!     let mut db = LmdbDict::open("data.mdb", true, StoreOptions::default())?;
//!     let db = db.acquire()?;
//!     db.set(b"key", b"value")?;
//! } // handle closed here
//!
//! let db = LmdbDict::open("data.mdb", false, StoreOptions::default())?;
//! assert_eq!(db.get(b"key")?, b"value".to_vec());
//! # Ok(())
//! # }
//! ```

use lmdb_simple_core::{
    error::{DictError, Result},
    observe, StoreOptions,
};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Instant;

use crate::iter::{Items, Keys, Values};
use crate::store::StoreHandle;
use crate::txn::{StoreStat, StoreTxn};

/// Map-like view of one LMDB store
///
/// Every operation runs in its own short transaction that is finished before
/// the call returns. Iterators are the exception: they hold one read
/// transaction until they are exhausted or dropped. Use
/// [`transaction`](LmdbDict::transaction) or
/// [`with_transaction`](LmdbDict::with_transaction) to group operations.
///
/// Beginning a write transaction while the same thread already holds one on
/// this store blocks forever inside LMDB.
pub struct LmdbDict {
    handle: StoreHandle,
}

impl LmdbDict {
    /// Open a store, creating it if `writer` is set
    pub fn open<P: AsRef<Path>>(path: P, writer: bool, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            handle: StoreHandle::open(path, writer, options)?,
        })
    }

    /// Open read-write with default options
    pub fn writer<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, true, StoreOptions::default())
    }

    /// Open read-only with default options
    pub fn reader<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, false, StoreOptions::default())
    }

    pub fn from_handle(handle: StoreHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn into_handle(self) -> StoreHandle {
        self.handle
    }

    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    pub fn is_writer(&self) -> bool {
        self.handle.is_writer()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Get the value for `key`
    ///
    /// Fails with [`DictError::KeyNotFound`] if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        timed("get", || {
            self.get_opt_inner(key)?
                .ok_or_else(|| DictError::KeyNotFound(key.to_vec()))
        })
    }

    /// Get the value for `key`, or `None` if absent
    pub fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        timed("get", || self.get_opt_inner(key))
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        timed("contains", || {
            let txn = self.handle.begin(false)?;
            txn.contains_key(key)
        })
    }

    /// Insert or overwrite `key`
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        timed("set", || {
            let mut txn = self.handle.begin(true)?;
            txn.put(key, value)?;
            txn.commit()
        })
    }

    /// Remove `key`
    ///
    /// Fails with [`DictError::KeyNotFound`] and leaves the store untouched
    /// if the key is absent.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        timed("delete", || {
            let mut txn = self.handle.begin(true)?;
            if !txn.delete(key)? {
                return Err(DictError::KeyNotFound(key.to_vec()));
            }
            txn.commit()
        })
    }

    /// Remove `key` and return its value
    pub fn pop(&self, key: &[u8]) -> Result<Vec<u8>> {
        timed("pop", || {
            let mut txn = self.handle.begin(true)?;
            let value = txn
                .get(key)?
                .map(<[u8]>::to_vec)
                .ok_or_else(|| DictError::KeyNotFound(key.to_vec()))?;
            txn.delete(key)?;
            txn.commit()?;
            Ok(value)
        })
    }

    /// Upsert many pairs in one write transaction
    ///
    /// Either every pair is stored or none is.
    pub fn update<I, K, V>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        timed("update", || {
            let mut txn = self.handle.begin(true)?;
            for (key, value) in pairs {
                txn.put(key.as_ref(), value.as_ref())?;
            }
            txn.commit()
        })
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        timed("clear", || {
            let mut txn = self.handle.begin(true)?;
            txn.clear()?;
            txn.commit()
        })
    }

    /// Lazy iterator over keys in ascending byte order
    pub fn keys(&self) -> Result<Keys<'_>> {
        Ok(Keys::new(self.handle.begin(false)?))
    }

    /// Lazy iterator over values in ascending key order
    pub fn values(&self) -> Result<Values<'_>> {
        Ok(Values::new(self.handle.begin(false)?))
    }

    /// Lazy iterator over `(key, value)` pairs in ascending key order
    pub fn items(&self) -> Result<Items<'_>> {
        Ok(Items::new(self.handle.begin(false)?))
    }

    /// Exact number of entries
    pub fn len(&self) -> Result<usize> {
        timed("len", || self.handle.begin(false)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stat(&self) -> Result<StoreStat> {
        self.handle.stat()
    }

    /// Force prior writes to disk
    pub fn flush(&self) -> Result<()> {
        timed("flush", || self.handle.sync())
    }

    /// Begin a transaction the caller controls
    ///
    /// Nothing is persisted until [`StoreTxn::commit`]; dropping the
    /// transaction aborts it.
    ///
    /// ```no_run
    /// # use lmdb_simple::prelude::*;
    /// # fn main() -> Result<()> {
    /// let db = LmdbDict::writer("data.mdb")?;
    /// let mut txn = db.transaction(true)?;
    /// txn.put(b"a", b"1")?;
    /// txn.put(b"b", b"2")?;
    /// txn.commit()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction(&self, write: bool) -> Result<StoreTxn<'_>> {
        self.handle.begin(write)
    }

    /// Run `f` inside one transaction
    ///
    /// Commits when `f` returns `Ok`, aborts when it returns `Err`.
    pub fn with_transaction<T, F>(&self, write: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> Result<T>,
    {
        let mut txn = self.handle.begin(write)?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    /// Open the handle (if closed) and close it again when the guard drops
    ///
    /// ```no_run
    /// # use lmdb_simple::prelude::*;
    /// # fn main() -> Result<()> {
    /// let mut db = LmdbDict::writer("data.mdb")?;
    /// {
    ///     let db = db.acquire()?;
    ///     db.set(b"key", b"value")?;
    /// }
    /// assert!(!db.is_open());
    /// let db = db.acquire()?; // reopened
    /// # Ok(())
    /// # }
    /// ```
    pub fn acquire(&mut self) -> Result<DictGuard<'_>> {
        self.handle.reopen()?;
        Ok(DictGuard { dict: self })
    }

    pub fn reopen(&mut self) -> Result<()> {
        self.handle.reopen()
    }

    /// Close the handle; further operations fail until reopened
    pub fn close(&mut self) {
        self.handle.close();
    }

    fn get_opt_inner(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.handle.begin(false)?;
        let value = txn.get(key)?.map(<[u8]>::to_vec);
        Ok(value)
    }
}

impl fmt::Debug for LmdbDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbDict")
            .field("handle", &self.handle)
            .finish()
    }
}

fn timed<T>(op: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let result = f();
    observe::record_operation(op, start.elapsed(), result.is_ok());
    result
}

/// Scope guard returned by [`LmdbDict::acquire`]
///
/// Closes the handle on drop, including when unwinding.
pub struct DictGuard<'a> {
    dict: &'a mut LmdbDict,
}

impl Deref for DictGuard<'_> {
    type Target = LmdbDict;

    fn deref(&self) -> &LmdbDict {
        self.dict
    }
}

impl DerefMut for DictGuard<'_> {
    fn deref_mut(&mut self) -> &mut LmdbDict {
        self.dict
    }
}

impl Drop for DictGuard<'_> {
    fn drop(&mut self) {
        self.dict.close();
    }
}
