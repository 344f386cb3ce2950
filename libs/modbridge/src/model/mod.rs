//! Core data model shared by every other component: stable identifiers,
//! the runtime's Plan/State snapshots, and the tagged property-value tree
//! the Property Bridge recurses over.

mod address;
mod change;
mod module_ref;
mod package;
mod plan_state;
mod schema;
mod value;

pub use address::ResourceAddress;
pub use change::ChangeKind;
pub use module_ref::ModuleReference;
pub use package::{classify_type_token, PackageIdentity, TypeTokenKind, DEFAULT_PACKAGE_VERSION};
pub use plan_state::{ModuleState, OutputChange, Plan, ResourcePlan, ResourceState, State};
pub use schema::{InferredModuleSchema, PropertySpec, PropertyType};
pub use value::PropertyValue;

/// Stable resource-name key used by the host engine; opaque outside this crate.
pub type Urn = String;
