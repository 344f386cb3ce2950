//! Derives the sequence of host-UI view-steps from a Plan (and, once
//! available, the applied State) for one module instance.

use crate::model::{ChangeKind, Plan, PropertyValue, ResourceAddress, State};

/// The kind of step shown in the host's preview/update UI for one
/// resource address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStepKind {
    Same,
    Update,
    DeleteReplaced,
    CreateReplacement,
    Create,
    Refresh,
    Delete,
}

/// Maps a plan's `ChangeKind` to the view-step kind shown to the host.
/// `Forget` has no view-step meaning at the module level and is rejected.
pub fn view_step_op(change: ChangeKind) -> ViewStepKind {
    match change {
        ChangeKind::NoOp => ViewStepKind::Same,
        ChangeKind::Update => ViewStepKind::Update,
        ChangeKind::Replace => ViewStepKind::DeleteReplaced,
        ChangeKind::ReplaceDestroyBeforeCreate => ViewStepKind::CreateReplacement,
        ChangeKind::Create => ViewStepKind::Create,
        ChangeKind::Read => ViewStepKind::Refresh,
        ChangeKind::Delete => ViewStepKind::Delete,
        ChangeKind::Forget => panic!("Forget has no view-step representation"),
    }
}

/// One step in the host-facing change summary for a single resource
/// address.
#[derive(Debug, Clone)]
pub struct ViewStep {
    pub type_token: String,
    pub name: ResourceAddress,
    pub kind: ViewStepKind,
    pub old: Option<PropertyValue>,
    pub new: Option<PropertyValue>,
}

/// Derive one view-step per address present in `plan`, preferring
/// `applied` (when given) over the plan's own planned values for `new`.
pub fn derive_view_steps(
    package_name: &str,
    plan: &Plan,
    prior_state: Option<&State>,
    applied: Option<&State>,
) -> Vec<ViewStep> {
    plan.resources
        .iter()
        .map(|(addr, resource_plan)| {
            let old = prior_state
                .or(plan.prior_state.as_ref())
                .and_then(|s| s.find(addr))
                .map(|r| r.attributes.clone());
            let new = applied
                .and_then(|s| s.find(addr))
                .map(|r| r.attributes.clone())
                .or_else(|| Some(resource_plan.planned_attributes.clone()));
            ViewStep {
                type_token: format!("{package_name}:tf:{}", resource_plan.underlying_type),
                name: addr.clone(),
                kind: view_step_op(resource_plan.change),
                old,
                new,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourcePlan;

    fn plan_with(addr: &str, underlying_type: &str, change: ChangeKind) -> Plan {
        let mut plan = Plan::default();
        plan.resources.insert(
            ResourceAddress::new(addr),
            ResourcePlan {
                underlying_type: underlying_type.to_string(),
                change,
                planned_attributes: PropertyValue::String("planned".into()),
            },
        );
        plan
    }

    #[test]
    fn change_kind_maps_to_expected_view_step_kind() {
        assert_eq!(view_step_op(ChangeKind::NoOp), ViewStepKind::Same);
        assert_eq!(view_step_op(ChangeKind::Update), ViewStepKind::Update);
        assert_eq!(view_step_op(ChangeKind::Replace), ViewStepKind::DeleteReplaced);
        assert_eq!(
            view_step_op(ChangeKind::ReplaceDestroyBeforeCreate),
            ViewStepKind::CreateReplacement
        );
        assert_eq!(view_step_op(ChangeKind::Create), ViewStepKind::Create);
        assert_eq!(view_step_op(ChangeKind::Read), ViewStepKind::Refresh);
        assert_eq!(view_step_op(ChangeKind::Delete), ViewStepKind::Delete);
    }

    #[test]
    #[should_panic]
    fn forget_has_no_view_step() {
        view_step_op(ChangeKind::Forget);
    }

    #[test]
    fn derives_one_step_per_plan_address_with_correct_type_token() {
        let plan = plan_with("module.m.aws_s3_bucket.this", "aws_s3_bucket", ChangeKind::Create);
        let steps = derive_view_steps("terraform-aws-module", &plan, None, None);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].type_token, "terraform-aws-module:tf:aws_s3_bucket");
        assert_eq!(steps[0].kind, ViewStepKind::Create);
    }

    #[test]
    fn prefers_applied_state_over_planned_values_for_new() {
        let plan = plan_with("module.m.aws_s3_bucket.this", "aws_s3_bucket", ChangeKind::Update);
        let addr = ResourceAddress::new("module.m.aws_s3_bucket.this");
        let mut applied = State::default();
        applied.resources.insert(
            addr,
            crate::model::ResourceState {
                underlying_type: "aws_s3_bucket".into(),
                attributes: PropertyValue::String("applied".into()),
            },
        );
        let steps = derive_view_steps("pkg", &plan, None, Some(&applied));
        assert_eq!(steps[0].new, Some(PropertyValue::String("applied".into())));
    }
}
