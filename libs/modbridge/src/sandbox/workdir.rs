//! Derives and manages the on-disk working directory for one {executor,
//! module-URN} pair. Sandbox working directories are created per
//! operation, populated, used, and removed when the owning module instance
//! is destroyed — but reused across the lifetime of a single module
//! instance whenever the directory's lock is still acquirable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::Urn;

/// Root directory under which all Sandbox working directories live,
/// overridable for tests via `MODBRIDGE_WORKDIR_ROOT`.
fn root_dir() -> PathBuf {
    if let Ok(custom) = std::env::var("MODBRIDGE_WORKDIR_ROOT") {
        return PathBuf::from(custom);
    }
    let mut dir = std::env::temp_dir();
    dir.push("modbridge-sandboxes");
    dir
}

/// A deterministic, filesystem-safe path for the given executor binary and
/// module URN. Two calls with the same inputs always agree, which is what
/// lets an in-flight working directory be found and reused.
pub fn derive_path(executor: &Path, urn: &Urn) -> PathBuf {
    let key = format!("{}::{urn}", executor.display());
    let digest = digest_hex(&key);
    root_dir().join(digest)
}

fn digest_hex(key: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Remove a working directory and everything in it. Called when the owning
/// module instance is deleted, or when a freshly allocated replacement
/// directory supersedes a stale, unlockable one.
pub fn remove(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("removing working directory {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_derive_the_same_path() {
        let a = derive_path(Path::new("/usr/bin/tofu"), &"urn:pulumi:stack::proj::m".to_string());
        let b = derive_path(Path::new("/usr/bin/tofu"), &"urn:pulumi:stack::proj::m".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn different_urns_derive_different_paths() {
        let a = derive_path(Path::new("/usr/bin/tofu"), &"urn:a".to_string());
        let b = derive_path(Path::new("/usr/bin/tofu"), &"urn:b".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn different_executors_derive_different_paths_for_the_same_urn() {
        let a = derive_path(Path::new("/usr/bin/tofu"), &"urn:a".to_string());
        let b = derive_path(Path::new("/usr/bin/terraform"), &"urn:a".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn remove_is_a_noop_on_a_missing_directory() {
        let mut dir = std::env::temp_dir();
        dir.push("modbridge-workdir-test-missing-zzz");
        assert!(remove(&dir).is_ok());
    }
}
