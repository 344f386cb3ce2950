//! Bundled built-in schema overrides, keyed by exact module source and a
//! semver range over its version. When one matches the module being
//! parameterized, it is merged over the inferred schema.

use serde::Deserialize;

use crate::model::{InferredModuleSchema, ModuleReference};

#[derive(Debug, Deserialize)]
struct OverrideEntry {
    source: String,
    version_range: String,
    schema: InferredModuleSchema,
}

/// The compiled-in override table. Empty by default; real deployments
/// embed a curated JSON document at build time via `include_str!` the way
/// this function's body is structured to accept.
fn bundled_overrides() -> Vec<OverrideEntry> {
    match std::option_env!("MODBRIDGE_SCHEMA_OVERRIDES_JSON") {
        Some(raw) => serde_json::from_str(raw).unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Find and apply the override matching `module`, if any.
pub fn apply_overrides(module: &ModuleReference, base: InferredModuleSchema) -> InferredModuleSchema {
    let Some(version) = module.version() else {
        return base;
    };
    let Ok(version) = semver::Version::parse(version) else {
        return base;
    };

    for entry in bundled_overrides() {
        if entry.source != module.source() {
            continue;
        }
        let Ok(req) = semver::VersionReq::parse(&entry.version_range) else {
            continue;
        };
        if req.matches(&version) {
            return base.merge_override(&entry.schema);
        }
    }
    base
}

/// A caller-supplied override (from `--config`/the structured Parameterize
/// form's `config.schema_override`) always wins over a bundled one, since
/// it was explicitly chosen for this parameterization.
pub fn apply_explicit_override(
    base: InferredModuleSchema,
    explicit: Option<&InferredModuleSchema>,
) -> InferredModuleSchema {
    match explicit {
        Some(schema) => base.merge_override(schema),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_is_applied_when_present() {
        let base = InferredModuleSchema::default();
        let explicit = InferredModuleSchema::default();
        let merged = apply_explicit_override(base.clone(), Some(&explicit));
        assert_eq!(merged.inputs.len(), base.inputs.len());
    }

    #[test]
    fn absent_override_table_leaves_schema_untouched() {
        let module = ModuleReference::new("hashicorp/consul/aws", Some("0.0.5".into()));
        let base = InferredModuleSchema::default();
        let merged = apply_overrides(&module, base.clone());
        assert_eq!(merged.inputs.len(), base.inputs.len());
    }
}
