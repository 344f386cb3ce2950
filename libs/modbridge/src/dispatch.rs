//! Dispatch + Parameterize: the provider-wide entry point that resolves
//! which handler an incoming RPC's type token belongs to, and the
//! one-time parameterization flow that resolves the module, runs schema
//! inference under a file lock, and caches the result for the rest of the
//! process's life.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value as Json;
use tracing::instrument;

use crate::errors::ParameterizeError;
use crate::model::{classify_type_token, InferredModuleSchema, ModuleReference, PackageIdentity, TypeTokenKind};
use crate::sandbox::{acquire_schema_inference_lock, Sandbox};
use crate::schema_infer::infer_schema;
use crate::store::{DriftSet, PlanStateStore};

/// Keys the dispatcher strips from provider-level configuration before
/// passing the rest through, since they are reserved for bridge-internal
/// use (executor selection, plugin download, explicit package version).
const RESERVED_CONFIG_KEYS: &[&str] = &["version", "pluginDownloadURL", "executor"];

/// Parsed shape of `--config FILE` / the structured JSON parameterization
/// form, after literal `[packageName]` substitution.
#[derive(Debug, Deserialize)]
struct ParameterizeConfig {
    #[serde(default)]
    schema_override: Option<InferredModuleSchema>,
}

/// The three accepted parameterize argument shapes.
pub enum ParameterizeArgs {
    ThreeArgs { source: String, version: String, package_name: String },
    TwoArgs { source: String, package_name: String },
    Structured { module: String, version: Option<String>, package_name: String, config: Option<Json> },
}

impl ParameterizeArgs {
    /// Parse positional CLI-style args, mirroring the dispatcher's own
    /// argument shapes (`<source> <version> <pkg>`, `<source> <pkg>`, or a
    /// single structured JSON value).
    pub fn from_positional(args: &[String]) -> Result<Self, ParameterizeError> {
        match args.len() {
            1 => {
                let value: Json = serde_json::from_str(&args[0])
                    .map_err(|e| ParameterizeError::UnparseableConfig(anyhow::anyhow!(e)))?;
                let module = value
                    .get("module")
                    .and_then(Json::as_str)
                    .ok_or_else(|| ParameterizeError::InvalidArgumentCount(1))?
                    .to_string();
                let version = value.get("version").and_then(Json::as_str).map(str::to_string);
                let package_name = value
                    .get("packageName")
                    .and_then(Json::as_str)
                    .ok_or_else(|| ParameterizeError::InvalidArgumentCount(1))?
                    .to_string();
                let config = value.get("config").cloned();
                Ok(ParameterizeArgs::Structured { module, version, package_name, config })
            }
            2 => Ok(ParameterizeArgs::TwoArgs {
                source: args[0].clone(),
                package_name: args[1].clone(),
            }),
            3 => Ok(ParameterizeArgs::ThreeArgs {
                source: args[0].clone(),
                version: args[1].clone(),
                package_name: args[2].clone(),
            }),
            other => Err(ParameterizeError::InvalidArgumentCount(other)),
        }
    }

    /// Resolve into a concrete module reference and package identity,
    /// disambiguating the two-argument form by filesystem probe.
    pub fn resolve(&self) -> (ModuleReference, PackageIdentity) {
        match self {
            ParameterizeArgs::ThreeArgs { source, version, package_name } => (
                ModuleReference::new(source.clone(), Some(version.clone())),
                PackageIdentity::new(package_name.clone(), Some(version.clone())),
            ),
            ParameterizeArgs::TwoArgs { source, package_name } => {
                let probe = ModuleReference::new(source.clone(), None);
                if probe.is_local_path() {
                    (probe, PackageIdentity::new(package_name.clone(), None))
                } else {
                    // Non-local source with no version given: the registry's
                    // latest non-prerelease version is resolved elsewhere
                    // (registry lookup is out of scope for the Sandbox);
                    // record the reference with no pinned version so a
                    // caller can resolve and re-parameterize if needed.
                    (probe, PackageIdentity::new(package_name.clone(), None))
                }
            }
            ParameterizeArgs::Structured { module, version, package_name, .. } => (
                ModuleReference::new(module.clone(), version.clone()),
                PackageIdentity::new(package_name.clone(), version.clone()),
            ),
        }
    }

    pub fn raw_config(&self) -> Option<&Json> {
        match self {
            ParameterizeArgs::Structured { config, .. } => config.as_ref(),
            _ => None,
        }
    }
}

/// Parse a `--config FILE` document, substituting the literal token
/// `[packageName]` with `package_name` before parsing.
pub fn parse_config_file(raw: &str, package_name: &str) -> Result<ParameterizeConfig, ParameterizeError> {
    let substituted = raw.replace("[packageName]", package_name);
    serde_json::from_str(&substituted).map_err(|e| ParameterizeError::UnparseableConfig(anyhow::anyhow!(e)))
}

/// Strip bridge-reserved keys from a provider-level configuration map and
/// transparently deserialize any stringified sub-object values (a
/// concession to legacy hosts that JSON-stringify per-provider config).
pub fn sanitize_provider_config(raw: &Json) -> Json {
    let Json::Object(fields) = raw else { return raw.clone() };
    let mut out = serde_json::Map::new();
    for (key, value) in fields {
        if RESERVED_CONFIG_KEYS.contains(&key.as_str()) {
            continue;
        }
        let unwrapped = match value {
            Json::String(s) => serde_json::from_str::<Json>(s).unwrap_or_else(|_| value.clone()),
            other => other.clone(),
        };
        out.insert(key.clone(), unwrapped);
    }
    Json::Object(out)
}

/// Process-wide cache of the single inferred schema this provider process
/// was parameterized against. `GetSchema` is invalid before Parameterize.
#[derive(Clone, Default)]
pub struct SchemaCache {
    inner: Arc<RwLock<Option<InferredModuleSchema>>>,
}

impl SchemaCache {
    pub fn get(&self) -> Option<InferredModuleSchema> {
        self.inner.read().clone()
    }

    fn set(&self, schema: InferredModuleSchema) {
        *self.inner.write() = Some(schema);
    }
}

/// Runs one schema inference under the module's process-wide file lock
/// and caches the result. `config` is the raw `--config`/structured-form
/// configuration document, if any; its `schema_override` (once parsed)
/// takes precedence over any bundled override.
#[instrument(skip(schema_cache, config), fields(source = %module.source(), version = ?module.version()))]
pub async fn parameterize(
    executor: PathBuf,
    module: ModuleReference,
    tf_name: &str,
    schema_cache: &SchemaCache,
    config: Option<&Json>,
) -> anyhow::Result<InferredModuleSchema> {
    let _lock = acquire_schema_inference_lock(&module.lock_key())
        .context("acquiring schema-inference lock")?;

    let explicit_override = config
        .and_then(|raw| serde_json::from_value::<ParameterizeConfig>(raw.clone()).ok())
        .and_then(|cfg| cfg.schema_override);

    let sandbox = Sandbox::open(executor, &format!("parameterize::{}", module.lock_key()), tf_name, module.clone())?;
    let schema = infer_schema(&sandbox, tf_name, &module, explicit_override.as_ref()).await?;
    schema_cache.set(schema.clone());
    Ok(schema)
}

/// Which handler family a type token should be routed to.
pub fn route(type_token: &str) -> Option<TypeTokenKind> {
    classify_type_token(type_token)
}

/// Shared state handed to every RPC after Parameterize: the schema cache,
/// the Plan/State Store, the drift-detection set, and the package
/// identity under which this process is operating.
#[derive(Clone)]
pub struct ProviderState {
    pub schema_cache: SchemaCache,
    pub store: PlanStateStore,
    pub drift: DriftSet,
    pub package: PackageIdentity,
}
