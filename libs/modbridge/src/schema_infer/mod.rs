//! The Schema Inferrer: resolves a module's on-disk source (Phase 1),
//! parses its declared variables/outputs into a typed schema (Phase 2),
//! then merges in any matching bundled override.

mod overrides;
mod parse;
mod resolve;

use crate::errors::InferenceError;
use crate::model::{InferredModuleSchema, ModuleReference};
use crate::sandbox::Sandbox;

/// Run both phases against an already-open Sandbox and return the final,
/// override-merged schema for `module`.
pub async fn infer_schema(
    sandbox: &Sandbox,
    tf_name: &str,
    module: &ModuleReference,
    explicit_override: Option<&InferredModuleSchema>,
) -> Result<InferredModuleSchema, InferenceError> {
    let module_dir = resolve::resolve_module_dir(sandbox, tf_name)
        .await
        .map_err(InferenceError::Init)?;
    let base = parse::infer_from_module_dir(&module_dir)?;
    let base = overrides::apply_overrides(module, base);
    Ok(overrides::apply_explicit_override(base, explicit_override))
}
