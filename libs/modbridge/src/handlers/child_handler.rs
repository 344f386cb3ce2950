//! The Child Handler: one synthetic host resource per `ResourceAddress`,
//! entirely backed by plan/state entries the Module Handler already
//! published to the Store. Carries two special input properties,
//! `__address` and `__module`, and no public outputs by design.

use tracing::instrument;

use crate::errors::InvariantViolation;
use crate::model::{ChangeKind, PropertyValue, ResourceAddress, Urn};
use crate::store::PlanStateStore;

/// A child resource's two special input properties.
pub struct ChildInputs {
    pub address: ResourceAddress,
    pub module: Urn,
}

/// Host diff response shape for a child resource.
pub struct ChildDiffResult {
    pub has_changes: bool,
    pub delete_before_replace: bool,
}

pub struct ChildHandler {
    store: PlanStateStore,
}

impl ChildHandler {
    pub fn new(store: PlanStateStore) -> Self {
        Self { store }
    }

    /// Check is a pass-through.
    pub fn check(&self, _inputs: &ChildInputs) -> anyhow::Result<()> {
        Ok(())
    }

    #[instrument(skip(self, inputs), fields(address = %inputs.address))]
    pub fn diff(&self, inputs: &ChildInputs) -> Result<ChildDiffResult, InvariantViolation> {
        let Some(plan_entry) = self.store.find_plan(&inputs.module, &inputs.address) else {
            return Ok(ChildDiffResult { has_changes: false, delete_before_replace: false });
        };

        if !plan_entry.change.is_valid_for_child_diff() {
            return Err(InvariantViolation::UnexpectedChildChangeKind(plan_entry.change));
        }

        Ok(ChildDiffResult {
            has_changes: plan_entry.change != ChangeKind::NoOp,
            delete_before_replace: plan_entry.change == ChangeKind::ReplaceDestroyBeforeCreate,
        })
    }

    /// In preview, returns empty outputs and no id. Otherwise looks up the
    /// published state and returns the address itself as the id.
    pub fn create(&self, inputs: &ChildInputs, preview: bool) -> Option<ResourceAddress> {
        if preview {
            return None;
        }
        self.store
            .find_state(&inputs.module, &inputs.address)
            .map(|_| inputs.address.clone())
    }

    /// In preview, returns the plan's planned values; otherwise the
    /// applied attribute values.
    pub fn update(&self, inputs: &ChildInputs, preview: bool) -> Option<PropertyValue> {
        if preview {
            self.store
                .find_plan(&inputs.module, &inputs.address)
                .map(|p| p.planned_attributes)
        } else {
            self.store
                .find_state(&inputs.module, &inputs.address)
                .map(|s| s.attributes)
        }
    }

    /// Purely advisory: the actual deletion already happened at the module
    /// level. Returns whether the Store believes the resource is gone.
    pub fn delete(&self, inputs: &ChildInputs) -> bool {
        self.store.is_resource_deleted(&inputs.module, &inputs.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourcePlan;

    fn inputs() -> ChildInputs {
        ChildInputs {
            address: ResourceAddress::new("module.m.aws_s3_bucket.this"),
            module: "urn:a".to_string(),
        }
    }

    #[test]
    fn diff_with_no_plan_entry_reports_no_changes() {
        let store = PlanStateStore::new();
        let handler = ChildHandler::new(store);
        let result = handler.diff(&inputs()).unwrap();
        assert!(!result.has_changes);
    }

    #[test]
    fn diff_rejects_module_only_change_kinds() {
        let store = PlanStateStore::new();
        let mut plan = crate::model::Plan::default();
        plan.resources.insert(
            inputs().address,
            ResourcePlan {
                underlying_type: "aws_s3_bucket".into(),
                change: ChangeKind::Create,
                planned_attributes: PropertyValue::Null,
            },
        );
        store.set_plan(&"urn:a".to_string(), plan);
        let handler = ChildHandler::new(store);
        assert!(handler.diff(&inputs()).is_err());
    }

    #[test]
    fn diff_flags_delete_before_replace_correctly() {
        let store = PlanStateStore::new();
        let mut plan = crate::model::Plan::default();
        plan.resources.insert(
            inputs().address,
            ResourcePlan {
                underlying_type: "aws_s3_bucket".into(),
                change: ChangeKind::ReplaceDestroyBeforeCreate,
                planned_attributes: PropertyValue::Null,
            },
        );
        store.set_plan(&"urn:a".to_string(), plan);
        let handler = ChildHandler::new(store);
        let result = handler.diff(&inputs()).unwrap();
        assert!(result.has_changes);
        assert!(result.delete_before_replace);
    }

    #[test]
    fn create_in_preview_returns_none() {
        let store = PlanStateStore::new();
        let handler = ChildHandler::new(store);
        assert!(handler.create(&inputs(), true).is_none());
    }
}
