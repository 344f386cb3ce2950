//! Process-wide advisory locking: one lock per working directory (reused
//! across operations for the same {executor, URN}) and one lock per module
//! source+version (serializing concurrent schema inference).

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fd_lock::RwLock as FileRwLock;

/// Holds an exclusive advisory lock on a sentinel file for as long as it
/// lives. Dropping it releases the lock — an RAII guard for scoped
/// ownership, the same shape as `parking_lot::RwLockWriteGuard` et al.
pub struct LockGuard {
    _file_lock: FileRwLock<File>,
    _path: PathBuf,
}

fn sentinel_path(dir: &Path) -> PathBuf {
    dir.join(".modbridge.lock")
}

/// Try to acquire the working-directory lock for `dir`, creating `dir` and
/// the sentinel file if needed. Returns `Ok(None)` if another process
/// currently holds it (the caller should then allocate a fresh directory
/// instead of reusing this one).
pub fn try_acquire_dir_lock(dir: &Path) -> Result<Option<LockGuard>> {
    fs::create_dir_all(dir).with_context(|| format!("creating working dir {}", dir.display()))?;
    let sentinel = sentinel_path(dir);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&sentinel)
        .with_context(|| format!("opening lock sentinel {}", sentinel.display()))?;
    let mut file_lock = FileRwLock::new(file);
    match file_lock.try_write() {
        Ok(guard) => {
            // `try_write` borrows `file_lock`; drop the guard immediately and
            // keep `file_lock` itself alive as the thing that owns the lock
            // for the lifetime of `LockGuard` (matches the platform's
            // lock-on-fd semantics: the lock persists as long as the fd is
            // open, independent of the short-lived guard object).
            drop(guard);
            Ok(Some(LockGuard {
                _file_lock: file_lock,
                _path: sentinel,
            }))
        }
        Err(_) => Ok(None),
    }
}

/// Acquire the process-wide schema-inference lock for a module (source,
/// version) pair, blocking until it is available. Scoped under the
/// system temp directory so it is shared by every provider process on the
/// host: an OS-level file lock shared across all provider processes
/// targeting the same module source+version.
pub fn acquire_schema_inference_lock(lock_key: &str) -> Result<LockGuard> {
    let mut dir = std::env::temp_dir();
    dir.push("modbridge-schema-locks");
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating schema lock dir {}", dir.display()))?;

    let digest = stable_digest(lock_key);
    let sentinel = dir.join(format!("{digest}.lock"));
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&sentinel)
        .with_context(|| format!("opening schema lock {}", sentinel.display()))?;
    let mut file_lock = FileRwLock::new(file);
    let guard = file_lock
        .write()
        .context("blocking on schema-inference file lock")?;
    drop(guard);
    Ok(LockGuard {
        _file_lock: file_lock,
        _path: sentinel,
    })
}

/// A short, filesystem-safe digest of a lock key. Not cryptographic; only
/// needs to avoid collisions between distinct (source, version) pairs well
/// enough to keep the sentinel file name short.
fn stable_digest(key: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
