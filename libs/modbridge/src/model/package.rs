/// Placeholder version used when parameterization does not supply one.
pub const DEFAULT_PACKAGE_VERSION: &str = "0.0.1";

/// A bridge-package name and version derived from the parameterization
/// request. Participates in the type tokens the host uses to address the
/// module component (`<pkg>:index:<Component>`) and its synthetic children
/// (`<pkg>:tf:<underlying-type>`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version: version.unwrap_or_else(|| DEFAULT_PACKAGE_VERSION.to_string()),
        }
    }

    /// Type token for the module component, e.g. `terraform-aws-module:index:Module`.
    pub fn module_type_token(&self) -> String {
        format!("{}:index:Module", self.name)
    }

    /// Type token for a synthetic child resource of underlying type `tf_type`.
    pub fn child_type_token(&self, tf_type: &str) -> String {
        format!("{}:tf:{}", self.name, tf_type)
    }
}

/// The module-segment of a type token, used by Dispatch to route an RPC to
/// the Module Handler or the Child Handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTokenKind {
    Module,
    Child,
}

/// Parse `<pkg>:<segment>:<rest>` and classify the segment.
pub fn classify_type_token(token: &str) -> Option<TypeTokenKind> {
    let mut parts = token.splitn(3, ':');
    let _pkg = parts.next()?;
    let segment = parts.next()?;
    let _rest = parts.next()?;
    match segment {
        "index" => Some(TypeTokenKind::Module),
        "tf" => Some(TypeTokenKind::Child),
        _ => None,
    }
}
