//! Per-process environment registry
//!
//! LMDB must not open the same environment twice in one process: the second
//! open re-initialises the lock table the first one is using. Every handle
//! therefore gets its environment from here, keyed by canonical path. The
//! registry holds weak references, so an environment closes as soon as the
//! last handle using it is closed or dropped.

use lmdb::{Database, Environment, EnvironmentFlags};
use lmdb_simple_core::{
    error::{DictError, Result},
    observe, StoreOptions, SyncMode,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Weak<SharedEnv>>>> = OnceLock::new();
static OPEN_ENVS: AtomicUsize = AtomicUsize::new(0);

fn registry() -> &'static Mutex<HashMap<PathBuf, Weak<SharedEnv>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// An open environment plus the main database, shared by every handle on
/// the same path in this process
pub(crate) struct SharedEnv {
    pub(crate) env: Environment,
    pub(crate) db: Database,
    writable: bool,
    options: StoreOptions,
    key: PathBuf,
}

impl SharedEnv {
    pub(crate) fn writable(&self) -> bool {
        self.writable
    }
}

impl Drop for SharedEnv {
    fn drop(&mut self) {
        let remaining = OPEN_ENVS.fetch_sub(1, Ordering::SeqCst) - 1;
        observe::set_open_environments(remaining);
        tracing::debug!("Closed LMDB environment at {}", self.key.display());
    }
}

/// Get the live environment for `path`, opening it if nobody holds it
pub(crate) fn acquire(
    path: &Path,
    writer: bool,
    options: &StoreOptions,
) -> Result<Arc<SharedEnv>> {
    options.validate()?;

    if writer {
        let dir = if options.subdir {
            Some(path)
        } else {
            path.parent().filter(|p| !p.as_os_str().is_empty())
        };
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir).map_err(|e| DictError::open(path, e))?;
        }
    }

    let key = registry_key(path, options.subdir)?;

    let mut map = registry().lock();
    map.retain(|_, env| env.strong_count() > 0);

    if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
        if writer && !existing.writable() {
            return Err(DictError::open(
                path,
                "environment is already open read-only in this process",
            ));
        }
        if existing.options != *options {
            tracing::warn!(
                "LMDB environment at {} already open; ignoring differing options",
                key.display()
            );
        }
        return Ok(existing);
    }

    let shared = Arc::new(open_env(path, writer, options, key.clone())?);
    map.insert(key, Arc::downgrade(&shared));
    Ok(shared)
}

/// Number of environments currently open in this process
pub fn open_environments() -> usize {
    OPEN_ENVS.load(Ordering::SeqCst)
}

fn registry_key(path: &Path, subdir: bool) -> Result<PathBuf> {
    let canonical = if subdir || path.exists() {
        path.canonicalize()
    } else {
        // Data file not created yet; anchor on the parent directory
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .ok_or_else(|| DictError::open(path, "path has no file name"))?;
        parent.canonicalize().map(|p| p.join(name))
    };
    canonical.map_err(|e| DictError::open(path, e))
}

fn env_flags(writer: bool, options: &StoreOptions) -> EnvironmentFlags {
    // Read transactions are not tied to a thread, so an open iterator does
    // not block further reads on the same thread.
    let mut flags = EnvironmentFlags::NO_TLS;
    if !writer {
        flags.insert(EnvironmentFlags::READ_ONLY);
    }
    if !options.subdir {
        flags.insert(EnvironmentFlags::NO_SUB_DIR);
    }
    if !options.read_ahead {
        flags.insert(EnvironmentFlags::NO_READAHEAD);
    }
    if options.write_map && writer {
        flags.insert(EnvironmentFlags::WRITE_MAP);
    }
    if !options.lock {
        flags.insert(EnvironmentFlags::NO_LOCK);
    }
    match options.sync_mode {
        SyncMode::Full => {}
        SyncMode::NoMetaSync => flags.insert(EnvironmentFlags::NO_META_SYNC),
        SyncMode::NoSync => flags.insert(EnvironmentFlags::NO_SYNC),
    }
    flags
}

fn open_env(
    path: &Path,
    writer: bool,
    options: &StoreOptions,
    key: PathBuf,
) -> Result<SharedEnv> {
    let mut builder = Environment::new();
    builder.set_map_size(options.map_size);
    builder.set_max_readers(options.max_readers);
    builder.set_flags(env_flags(writer, options));

    let env = builder.open(path).map_err(|e| DictError::open(path, e))?;
    let db = env.open_db(None).map_err(|e| DictError::open(path, e))?;

    observe::record_env_open(writer);
    let open = OPEN_ENVS.fetch_add(1, Ordering::SeqCst) + 1;
    observe::set_open_environments(open);
    tracing::debug!(
        "Opened LMDB environment at {} ({})",
        key.display(),
        if writer { "read-write" } else { "read-only" }
    );

    Ok(SharedEnv {
        env,
        db,
        writable: writer,
        options: options.clone(),
        key,
    })
}
