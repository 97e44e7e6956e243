//! Prelude
//!
//! ```
//! use lmdb_simple::prelude::*;
//! ```

pub use crate::{DictError, Result, StoreOptions, SyncMode};

pub use crate::{DictGuard, LmdbDict, StoreHandle, StoreTxn};

// Reader pools
pub use crate::{
    init_reader, make_reader_pool, process_reader, ReaderContext, ReaderInitializer, ReaderPool,
    ReaderPoolConfig,
};
