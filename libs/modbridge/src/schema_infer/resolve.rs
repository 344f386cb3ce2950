//! Phase 1 of schema inference: run `init` against a minimal configuration
//! that only references the module (no inputs, no outputs) and locate the
//! resolved on-disk module directory the runtime reports.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value as Json;

use crate::sandbox::Sandbox;

/// Standard manifest file name the runtime writes describing where each
/// referenced module source was resolved to on disk.
const MANIFEST_FILE_NAME: &str = ".terraform/modules/modules.json";

/// Run `init` in `sandbox`'s working directory against a bare module-only
/// config and return the resolved module directory.
pub async fn resolve_module_dir(sandbox: &Sandbox, tf_name: &str) -> Result<PathBuf> {
    sandbox.emit_config(&Default::default(), &[]).context("emitting minimal resolve config")?;
    sandbox.init().await.context("running init for resolution")?;

    let manifest_path = sandbox.working_dir().join(MANIFEST_FILE_NAME);
    let raw = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("reading resolution manifest {}", manifest_path.display()))?;
    let manifest: Json = serde_json::from_str(&raw).context("parsing resolution manifest")?;

    find_resolved_dir(&manifest, tf_name, sandbox.working_dir())
}

fn find_resolved_dir(manifest: &Json, tf_name: &str, working_dir: &Path) -> Result<PathBuf> {
    let modules = manifest
        .get("Modules")
        .and_then(Json::as_array)
        .ok_or_else(|| anyhow!("resolution manifest missing Modules array"))?;

    let entry = modules
        .iter()
        .find(|m| m.get("Key").and_then(Json::as_str) == Some(tf_name))
        .ok_or_else(|| anyhow!("resolution manifest has no entry for module '{tf_name}'"))?;

    let dir = entry
        .get("Dir")
        .and_then(Json::as_str)
        .ok_or_else(|| anyhow!("resolution manifest entry for '{tf_name}' missing Dir"))?;

    Ok(working_dir.join(dir))
}
