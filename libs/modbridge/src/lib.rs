//! The module bridge: lets a host resource-provider engine treat an
//! external Terraform-module-shaped runtime's resources as first-class
//! components, via a Runtime Sandbox, a Schema Inferrer, a Property
//! Bridge, a Plan/State Store, and the Module/Child RPC handlers that sit
//! on top of them.

pub mod dispatch;
pub mod errors;
pub mod handlers;
pub mod model;
pub mod propbridge;
pub mod sandbox;
pub mod schema_infer;
pub mod store;
pub mod telemetry;

pub use model::Urn;
