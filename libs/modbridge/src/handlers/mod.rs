//! The two RPC-facing resource handlers: the module component (Module
//! Handler) and its synthetic per-address children (Child Handler), plus
//! the shared view-step derivation they both feed into.

mod child_handler;
mod module_handler;
mod view_step;

pub use child_handler::{ChildDiffResult, ChildHandler, ChildInputs};
pub use module_handler::{DiffResult, ModuleHandler, ModuleInputs, ModuleOutputs};
pub use view_step::{derive_view_steps, view_step_op, ViewStep, ViewStepKind};
