//! Lazy iterators over a store snapshot
//!
//! Each iterator owns one read transaction for the whole traversal, so it
//! sees the store as of its creation no matter what writers commit in the
//! meantime. Entries are copied out one at a time; the cursor is re-seeked
//! from the last key on every step since the snapshot never changes under
//! it. Iterators are forward-only and cannot be restarted. The transaction
//! is released when the iterator is exhausted, hits an error, or is dropped.

use lmdb::Cursor;
use lmdb_simple_core::error::Result;
use std::iter::FusedIterator;

use crate::txn::StoreTxn;

/// Iterator over `(key, value)` pairs in ascending key order
pub struct Items<'env> {
    txn: Option<StoreTxn<'env>>,
    last: Option<Vec<u8>>,
}

impl<'env> Items<'env> {
    pub(crate) fn new(txn: StoreTxn<'env>) -> Self {
        Self {
            txn: Some(txn),
            last: None,
        }
    }

    fn step(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let txn = match &self.txn {
            Some(txn) => txn,
            None => return Ok(None),
        };
        let cursor = txn.cursor()?;

        let found = match &self.last {
            None => cursor.get(None, None, lmdb_sys::MDB_FIRST),
            Some(last) => {
                let last = last.as_slice();
                match cursor.get(Some(last), None, lmdb_sys::MDB_SET_RANGE) {
                    // Positioned on the previous key: move past it
                    Ok((key, _)) if key.map_or(true, |k| k == last) => {
                        cursor.get(None, None, lmdb_sys::MDB_NEXT)
                    }
                    other => other,
                }
            }
        };

        match found {
            Ok((Some(key), value)) => Ok(Some((key.to_vec(), value.to_vec()))),
            Ok((None, _)) => Err(lmdb::Error::Invalid.into()),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn finish(&mut self) {
        if let Some(txn) = self.txn.take() {
            txn.abort();
        }
    }
}

impl Iterator for Items<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some((key, value))) => {
                self.last = Some(key.clone());
                Some(Ok((key, value)))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Items<'_> {}

/// Iterator over keys in ascending order
pub struct Keys<'env>(Items<'env>);

impl<'env> Keys<'env> {
    pub(crate) fn new(txn: StoreTxn<'env>) -> Self {
        Self(Items::new(txn))
    }
}

impl Iterator for Keys<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|r| r.map(|(key, _)| key))
    }
}

impl FusedIterator for Keys<'_> {}

/// Iterator over values in ascending key order
pub struct Values<'env>(Items<'env>);

impl<'env> Values<'env> {
    pub(crate) fn new(txn: StoreTxn<'env>) -> Self {
        Self(Items::new(txn))
    }
}

impl Iterator for Values<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|r| r.map(|(_, value)| value))
    }
}

impl FusedIterator for Values<'_> {}
