use lmdb::{Cursor, Database, RoCursor, RoTransaction, RwTransaction, Transaction, WriteFlags};
use lmdb_simple_core::error::{DictError, Result};
use serde::Serialize;
use std::mem::MaybeUninit;

/// Page and entry statistics of the main database, as of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStat {
    pub page_size: u32,
    pub depth: u32,
    pub branch_pages: usize,
    pub leaf_pages: usize,
    pub overflow_pages: usize,
    pub entries: usize,
}

enum TxnKind<'env> {
    Read(RoTransaction<'env>),
    Write(RwTransaction<'env>),
}

/// A transaction against one store handle
///
/// Read transactions see a fixed snapshot taken when they began. Nothing is
/// persisted until [`commit`](StoreTxn::commit); dropping the transaction
/// aborts it, so an early return or `?` never leaves it dangling.
pub struct StoreTxn<'env> {
    kind: TxnKind<'env>,
    db: Database,
}

impl<'env> StoreTxn<'env> {
    pub(crate) fn read(txn: RoTransaction<'env>, db: Database) -> Self {
        Self {
            kind: TxnKind::Read(txn),
            db,
        }
    }

    pub(crate) fn write(txn: RwTransaction<'env>, db: Database) -> Self {
        Self {
            kind: TxnKind::Write(txn),
            db,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self.kind, TxnKind::Write(_))
    }

    /// Get the value stored under `key`, borrowed from the map
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        match &self.kind {
            TxnKind::Read(txn) => get_in(txn, self.db, key),
            TxnKind::Write(txn) => get_in(txn, self.db, key),
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite `key`
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let db = self.db;
        self.writable()?.put(db, &key, &value, WriteFlags::empty())?;
        Ok(())
    }

    /// Remove `key`; returns false if it was not present
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let db = self.db;
        let txn = self.writable()?;
        match txn.del(db, &key, None) {
            Ok(()) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry
    pub fn clear(&mut self) -> Result<()> {
        let db = self.db;
        self.writable()?.clear_db(db)?;
        Ok(())
    }

    /// Exact number of entries visible to this transaction
    pub fn len(&self) -> Result<usize> {
        Ok(self.stat()?.entries)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stat(&self) -> Result<StoreStat> {
        match &self.kind {
            TxnKind::Read(txn) => stat_in(txn, self.db),
            TxnKind::Write(txn) => stat_in(txn, self.db),
        }
    }

    /// Iterate all entries in ascending key order
    ///
    /// Entries are borrowed from the map and stay valid while the iterator
    /// borrows the transaction.
    pub fn iter(&self) -> Result<TxnIter<'_>> {
        Ok(TxnIter {
            cursor: Some(self.cursor()?),
            started: false,
        })
    }

    pub fn commit(self) -> Result<()> {
        match self.kind {
            TxnKind::Read(txn) => txn.commit()?,
            TxnKind::Write(txn) => txn.commit()?,
        }
        Ok(())
    }

    pub fn abort(self) {
        match self.kind {
            TxnKind::Read(txn) => txn.abort(),
            TxnKind::Write(txn) => txn.abort(),
        }
    }

    pub(crate) fn cursor(&self) -> Result<RoCursor<'_>> {
        let cursor = match &self.kind {
            TxnKind::Read(txn) => txn.open_ro_cursor(self.db)?,
            TxnKind::Write(txn) => txn.open_ro_cursor(self.db)?,
        };
        Ok(cursor)
    }

    fn writable(&mut self) -> Result<&mut RwTransaction<'env>> {
        match &mut self.kind {
            TxnKind::Write(txn) => Ok(txn),
            TxnKind::Read(_) => Err(DictError::State(
                "Read-only transaction cannot modify the store".into(),
            )),
        }
    }
}

fn get_in<'txn, T: Transaction>(
    txn: &'txn T,
    db: Database,
    key: &[u8],
) -> Result<Option<&'txn [u8]>> {
    match txn.get(db, &key) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Page and entry statistics as seen by `txn`
///
/// `lmdb` only exposes environment-wide stats outside any transaction, so
/// this calls `mdb_stat` directly to keep the count in the caller's snapshot.
fn stat_in<T: Transaction>(txn: &T, db: Database) -> Result<StoreStat> {
    let mut stat = MaybeUninit::<lmdb_sys::MDB_stat>::uninit();
    // SAFETY: the transaction and its database handle are live for the
    // duration of the call, and mdb_stat fills `stat` whenever it returns 0.
    let rc = unsafe { lmdb_sys::mdb_stat(txn.txn(), db.dbi(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(lmdb::Error::from_err_code(rc).into());
    }
    let stat = unsafe { stat.assume_init() };
    Ok(StoreStat {
        page_size: stat.ms_psize,
        depth: stat.ms_depth,
        branch_pages: stat.ms_branch_pages,
        leaf_pages: stat.ms_leaf_pages,
        overflow_pages: stat.ms_overflow_pages,
        entries: stat.ms_entries,
    })
}

/// Cursor-backed iterator over the entries of one transaction
pub struct TxnIter<'txn> {
    cursor: Option<RoCursor<'txn>>,
    started: bool,
}

impl<'txn> Iterator for TxnIter<'txn> {
    type Item = Result<(&'txn [u8], &'txn [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_ref()?;
        let op = if self.started {
            lmdb_sys::MDB_NEXT
        } else {
            lmdb_sys::MDB_FIRST
        };
        self.started = true;

        let step = match cursor.get(None, None, op) {
            Ok((Some(key), value)) => Ok(Some((key, value))),
            Ok((None, _)) => Err(lmdb::Error::Invalid),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        };
        match step {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.cursor = None;
                None
            }
            Err(e) => {
                self.cursor = None;
                Some(Err(e.into()))
            }
        }
    }
}

impl std::iter::FusedIterator for TxnIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreHandle;
    use lmdb_simple_core::StoreOptions;
    use tempfile::TempDir;

    fn writer() -> (TempDir, StoreHandle) {
        let temp = TempDir::new().unwrap();
        let handle = StoreHandle::open(temp.path(), true, StoreOptions::default()).unwrap();
        (temp, handle)
    }

    #[test]
    fn test_commit_persists() {
        let (_temp, handle) = writer();

        let mut txn = handle.begin(true).unwrap();
        txn.put(b"a", b"1").unwrap();
        txn.put(b"b", b"2").unwrap();
        assert_eq!(txn.get(b"a").unwrap(), Some(&b"1"[..]));
        txn.commit().unwrap();

        let txn = handle.begin(false).unwrap();
        assert_eq!(txn.get(b"b").unwrap(), Some(&b"2"[..]));
        assert_eq!(txn.len().unwrap(), 2);
    }

    #[test]
    fn test_drop_aborts() {
        let (_temp, handle) = writer();
        {
            let mut txn = handle.begin(true).unwrap();
            txn.put(b"a", b"1").unwrap();
        }
        let txn = handle.begin(false).unwrap();
        assert_eq!(txn.get(b"a").unwrap(), None);
        assert!(txn.is_empty().unwrap());
    }

    #[test]
    fn test_read_txn_rejects_writes() {
        let (_temp, handle) = writer();
        let mut txn = handle.begin(false).unwrap();
        assert!(!txn.is_write());
        assert!(txn.put(b"a", b"1").unwrap_err().is_state());
        assert!(txn.delete(b"a").unwrap_err().is_state());
        assert!(txn.clear().unwrap_err().is_state());
    }

    #[test]
    fn test_delete_reports_presence() {
        let (_temp, handle) = writer();
        let mut txn = handle.begin(true).unwrap();
        txn.put(b"a", b"1").unwrap();
        assert!(txn.delete(b"a").unwrap());
        assert!(!txn.delete(b"a").unwrap());
        txn.commit().unwrap();
    }

    #[test]
    fn test_iter_sorted_and_fused() {
        let (_temp, handle) = writer();
        let mut txn = handle.begin(true).unwrap();
        for key in [&b"three"[..], &b"one"[..], &b"two"[..]] {
            txn.put(key, b"x").unwrap();
        }

        let mut iter = txn.iter().unwrap();
        let keys: Vec<&[u8]> = iter.by_ref().map(|r| r.unwrap().0).collect();
        assert_eq!(keys, vec![&b"one"[..], &b"three"[..], &b"two"[..]]);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_iter_empty() {
        let (_temp, handle) = writer();
        let txn = handle.begin(false).unwrap();
        assert_eq!(txn.iter().unwrap().count(), 0);
    }

    #[test]
    fn test_clear_and_stat() {
        let (_temp, handle) = writer();
        let mut txn = handle.begin(true).unwrap();
        txn.put(b"a", b"1").unwrap();
        txn.put(b"b", b"2").unwrap();
        let stat = txn.stat().unwrap();
        assert_eq!(stat.entries, 2);
        assert!(stat.page_size > 0);

        txn.clear().unwrap();
        assert_eq!(txn.len().unwrap(), 0);
        txn.commit().unwrap();
    }
}
