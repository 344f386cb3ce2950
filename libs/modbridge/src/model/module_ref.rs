use std::path::Path;

/// An opaque module source (registry shorthand, local path, or VCS URL,
/// possibly with sub-path and ref) plus an optional version. Immutable once
/// parameterized.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModuleReference {
    source: String,
    version: Option<String>,
}

impl ModuleReference {
    pub fn new(source: impl Into<String>, version: Option<String>) -> Self {
        Self {
            source: source.into(),
            version,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// True when the source looks like a local filesystem module rather
    /// than a registry shorthand or VCS URL — the disambiguation the
    /// two-argument parameterization shape relies on.
    pub fn is_local_path(&self) -> bool {
        Path::new(&self.source).is_dir()
    }

    /// Stable key used to scope the schema-inference file lock and the
    /// Sandbox's reusable working directory: the external runtime's
    /// resolution result is entirely determined by (source, version).
    pub fn lock_key(&self) -> String {
        format!("{}@{}", self.source, self.version.as_deref().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_stable_for_equal_refs() {
        let a = ModuleReference::new("hashicorp/consul/aws", Some("0.0.5".into()));
        let b = ModuleReference::new("hashicorp/consul/aws", Some("0.0.5".into()));
        assert_eq!(a.lock_key(), b.lock_key());
    }

    #[test]
    fn lock_key_differs_by_version() {
        let a = ModuleReference::new("hashicorp/consul/aws", Some("0.0.5".into()));
        let b = ModuleReference::new("hashicorp/consul/aws", Some("0.0.6".into()));
        assert_ne!(a.lock_key(), b.lock_key());
    }

    #[test]
    fn local_path_detection_rejects_registry_shorthand() {
        let reg = ModuleReference::new("hashicorp/consul/aws", None);
        assert!(!reg.is_local_path());
    }

    #[test]
    fn local_path_detection_accepts_existing_dir() {
        let here = ModuleReference::new(env!("CARGO_MANIFEST_DIR"), None);
        assert!(here.is_local_path());
    }
}
