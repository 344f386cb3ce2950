use std::collections::BTreeMap;

use super::{ChangeKind, PropertyValue, ResourceAddress};

/// One resource's slice of a Plan: its underlying type, the change the
/// runtime computed, and the (possibly-unknown-laden) planned attributes.
#[derive(Debug, Clone)]
pub struct ResourcePlan {
    pub underlying_type: String,
    pub change: ChangeKind,
    pub planned_attributes: PropertyValue,
}

/// A non-`NoOp` change to one of the module's top-level outputs.
#[derive(Debug, Clone)]
pub struct OutputChange {
    pub name: String,
    pub change: ChangeKind,
}

/// An immutable plan snapshot produced by the external runtime for one
/// module instance.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub resources: BTreeMap<ResourceAddress, ResourcePlan>,
    pub output_changes: Vec<OutputChange>,
    pub prior_state: Option<State>,
}

impl Plan {
    pub fn find(&self, addr: &ResourceAddress) -> Option<&ResourcePlan> {
        self.resources.get(addr)
    }

    /// True iff any resource plan is non-`NoOp` or any output change is
    /// non-`NoOp`.
    pub fn has_changes(&self) -> bool {
        self.resources
            .values()
            .any(|r| r.change != ChangeKind::NoOp)
            || self
                .output_changes
                .iter()
                .any(|o| o.change != ChangeKind::NoOp)
    }
}

/// One resource's slice of a State: its underlying type and applied
/// attributes.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub underlying_type: String,
    pub attributes: PropertyValue,
}

/// An immutable state snapshot produced by the external runtime after an
/// apply/refresh/destroy for one module instance.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub resources: BTreeMap<ResourceAddress, ResourceState>,
    pub outputs: BTreeMap<String, PropertyValue>,
}

impl State {
    pub fn find(&self, addr: &ResourceAddress) -> Option<&ResourceState> {
        self.resources.get(addr)
    }

    pub fn contains(&self, addr: &ResourceAddress) -> bool {
        self.resources.contains_key(addr)
    }

    /// The runtime reported a destroy failure so catastrophic that the
    /// resulting state cannot be trusted to reflect reality (modeled here
    /// as an explicitly empty state after a destroy that errored — see
    /// `Option<State>` at call sites for the full partial/consistent
    /// distinction).
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// The persisted payload the host stores on behalf of one module instance
/// `state` is always handled as secret outside the Sandbox.
#[derive(Debug, Clone)]
pub struct ModuleState {
    pub state: Vec<u8>,
    pub lock: Vec<u8>,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> ResourceAddress {
        ResourceAddress::new(s)
    }

    #[test]
    fn plan_with_only_noop_changes_has_no_changes() {
        let mut plan = Plan::default();
        plan.resources.insert(
            addr("module.m.aws_s3_bucket.this"),
            ResourcePlan {
                underlying_type: "aws_s3_bucket".into(),
                change: ChangeKind::NoOp,
                planned_attributes: PropertyValue::Null,
            },
        );
        assert!(!plan.has_changes());
    }

    #[test]
    fn plan_with_a_resource_change_has_changes() {
        let mut plan = Plan::default();
        plan.resources.insert(
            addr("module.m.aws_s3_bucket.this"),
            ResourcePlan {
                underlying_type: "aws_s3_bucket".into(),
                change: ChangeKind::Update,
                planned_attributes: PropertyValue::Null,
            },
        );
        assert!(plan.has_changes());
    }

    #[test]
    fn plan_with_only_output_change_has_changes() {
        let mut plan = Plan::default();
        plan.output_changes.push(OutputChange {
            name: "endpoint".into(),
            change: ChangeKind::Update,
        });
        assert!(plan.has_changes());
    }

    #[test]
    fn state_find_and_contains_agree() {
        let mut state = State::default();
        let a = addr("module.m.aws_s3_bucket.this");
        state.resources.insert(
            a.clone(),
            ResourceState {
                underlying_type: "aws_s3_bucket".into(),
                attributes: PropertyValue::Null,
            },
        );
        assert!(state.contains(&a));
        assert!(state.find(&addr("module.m.aws_s3_bucket.other")).is_none());
    }
}
