//! lmdb-simple core: error taxonomy and typed configuration
//!
//! Shared by the LMDB-backed façade crate. Holds no engine state.
//! - [`DictError`]: open, state, missing-key, config, and engine failures
//! - [`StoreOptions`]: typed environment options, validated up front
//! - [`ReaderPoolConfig`]: what each worker of a reader pool opens
//! - [`observe`]: optional metrics (feature `observe`)

pub mod config;
pub mod error;
pub mod observe;

pub use config::{ReaderPoolConfig, StoreOptions, SyncMode};
pub use error::{DictError, Result};
