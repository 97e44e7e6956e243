//! lmdb-simple: a dictionary-shaped façade over LMDB
//!
//! - [`LmdbDict`]: get/set/delete, lazy snapshot iteration, exact length,
//!   each operation in its own short transaction
//! - [`StoreHandle`]: the environment handle underneath, with explicit
//!   open/close/reopen and read or write transactions
//! - [`reader_pool`]: one read-only handle per worker process, handed to
//!   tasks explicitly
//!
//! Keys and values are opaque bytes, iterated in ascending byte order.
//!
//! # Quick Start
//!
//! ```no_run
//! use lmdb_simple::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let db = LmdbDict::writer("./data")?;
//! db.set(b"three", b"3")?;
//! db.set(b"one", b"1")?;
//!
//! for key in db.keys()? {
//!     println!("{:?}", key?);
//! }
//! assert_eq!(db.len()?, 2);
//! # Ok(())
//! # }
//! ```

pub mod dict;
pub mod iter;
pub mod prelude;
pub mod reader_pool;
mod registry;
pub mod store;
pub mod txn;

// Re-export core types
pub use lmdb_simple_core::{
    config::{ReaderPoolConfig, StoreOptions, SyncMode},
    error::{DictError, Result},
    observe,
};

pub use dict::{DictGuard, LmdbDict};
pub use iter::{Items, Keys, Values};
pub use reader_pool::{
    init_reader, make_reader_pool, process_reader, try_process_reader, ReaderContext,
    ReaderInitializer, ReaderPool,
};
pub use registry::open_environments;
pub use store::StoreHandle;
pub use txn::{StoreStat, StoreTxn, TxnIter};
