//! The Module Handler: the host-facing lifecycle for the module
//! component (Check/Diff/Create/Update/Delete/Read), driving the Sandbox,
//! Property Bridge, and Plan/State Store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::errors::{ApplyError, DestroyError, PlanError};
use crate::model::{ModuleReference, ModuleState, PropertyValue, State, Urn};
use crate::sandbox::Sandbox;
use crate::store::{ModuleOperation, PlanStateStore};

use super::view_step::{derive_view_steps, ViewStep};

/// Inputs the host sends for one module instance's Create/Update/Diff.
pub struct ModuleInputs {
    pub urn: Urn,
    pub tf_name: String,
    pub module: ModuleReference,
    pub inputs: BTreeMap<String, PropertyValue>,
    pub output_names: Vec<String>,
    pub prior_state: Option<ModuleState>,
}

/// Outputs returned to the host from Create/Update/Read; always includes
/// the module's declared outputs plus the special `state`/`lock`/`version`
/// triad.
pub struct ModuleOutputs {
    pub values: BTreeMap<String, PropertyValue>,
    pub view_steps: Vec<ViewStep>,
    pub refresh_before_update: bool,
}

/// Outcome of a module Diff.
pub struct DiffResult {
    pub has_changes: bool,
}

pub struct ModuleHandler {
    store: PlanStateStore,
    package_name: String,
    executor: PathBuf,
}

impl ModuleHandler {
    pub fn new(store: PlanStateStore, package_name: String, executor: PathBuf) -> Self {
        Self { store, package_name, executor }
    }

    fn open_sandbox(&self, request: &ModuleInputs) -> anyhow::Result<Sandbox> {
        Sandbox::open(
            self.executor.clone(),
            &request.urn,
            &request.tf_name,
            request.module.clone(),
        )
    }

    /// Check is a pass-through: never rejects.
    pub fn check(&self, _request: &ModuleInputs) -> anyhow::Result<()> {
        Ok(())
    }

    #[instrument(skip(self, request), fields(urn = %request.urn))]
    pub async fn diff(
        &self,
        request: &ModuleInputs,
        old_inputs: &BTreeMap<String, PropertyValue>,
        drift_recorded: bool,
    ) -> Result<DiffResult, PlanError> {
        if drift_recorded {
            return Ok(DiffResult { has_changes: true });
        }
        if old_inputs != &request.inputs {
            return Ok(DiffResult { has_changes: true });
        }

        let sandbox = self.open_sandbox(request).map_err(PlanError::RuntimeFailure)?;
        if let Some(prior) = &request.prior_state {
            sandbox
                .push_state(&prior.state, &prior.lock)
                .await
                .map_err(PlanError::RuntimeFailure)?;
        }
        sandbox
            .emit_config(&request.inputs, &request.output_names)
            .map_err(PlanError::RuntimeFailure)?;
        sandbox.init().await.map_err(PlanError::RuntimeFailure)?;
        let plan = sandbox.plan_no_refresh().await?;
        Ok(DiffResult { has_changes: plan.has_changes() })
    }

    /// Shared Create/Update path. `preview` mirrors the host's dry-run
    /// flag.
    #[instrument(skip(self, request), fields(urn = %request.urn, preview))]
    pub async fn create_or_update(
        &self,
        request: &ModuleInputs,
        preview: bool,
    ) -> anyhow::Result<ModuleOutputs> {
        let sandbox = self.open_sandbox(request)?;
        if let Some(prior) = &request.prior_state {
            sandbox.push_state(&prior.state, &prior.lock).await?;
        }
        sandbox.emit_config(&request.inputs, &request.output_names)?;
        sandbox.init().await?;

        let plan = sandbox.plan_no_refresh().await?;

        if preview {
            self.store.set_plan(&request.urn, plan.clone());
            let view_steps = derive_view_steps(&self.package_name, &plan, None, None);
            let mut values: BTreeMap<String, PropertyValue> = plan
                .output_changes
                .iter()
                .map(|o| (o.name.clone(), PropertyValue::Unknown))
                .collect();
            if let Some(prior) = &request.prior_state {
                values.insert(
                    "__state".to_string(),
                    PropertyValue::secret(PropertyValue::String(encode_bytes(&prior.state))),
                );
                values.insert("__lock".to_string(), PropertyValue::String(encode_bytes(&prior.lock)));
                values.insert("__version".to_string(), PropertyValue::String(prior.version.clone()));
            }
            return Ok(ModuleOutputs { values, view_steps, refresh_before_update: true });
        }

        self.store.set_plan(&request.urn, plan.clone());
        let apply_result = sandbox.apply(false).await;

        let (applied_state, partial_failure) = match apply_result {
            Ok(state) => (state, None),
            Err(ApplyError::Partial { source, partial_state }) => {
                warn!(urn = %request.urn, error = %source, "apply completed partially");
                (partial_state, Some(source))
            }
            Err(ApplyError::Full(source)) => return Err(source),
        };

        self.store.set_state(&request.urn, applied_state.clone());
        let view_steps = derive_view_steps(&self.package_name, &plan, None, Some(&applied_state));

        let (raw_state, raw_lock) = sandbox.pull_state().await?;
        let mut values = applied_state.outputs.clone();
        values.insert(
            "__state".to_string(),
            PropertyValue::secret(PropertyValue::String(encode_bytes(&raw_state))),
        );
        values.insert("__lock".to_string(), PropertyValue::String(encode_bytes(&raw_lock)));
        values.insert(
            "__version".to_string(),
            PropertyValue::String(request.module.version().unwrap_or_default().to_string()),
        );

        if let Some(err) = partial_failure {
            info!(urn = %request.urn, "reporting resource-init-failure carrying partial outputs: {err}");
        }

        Ok(ModuleOutputs { values, view_steps, refresh_before_update: true })
    }

    #[instrument(skip(self, request), fields(urn = %request.urn))]
    pub async fn delete(&self, request: &ModuleInputs) -> anyhow::Result<Vec<ViewStep>> {
        self.store.set_operation(&request.urn, ModuleOperation::Delete);
        let sandbox = self.open_sandbox(request)?;
        if let Some(prior) = &request.prior_state {
            sandbox.push_state(&prior.state, &prior.lock).await?;
        }
        let state_before_destroy = sandbox.show().await.ok();

        match sandbox.destroy().await {
            Ok(()) => {
                let state_after = State::default();
                self.store.set_state(&request.urn, state_after.clone());
                Ok(diff_view_steps(&self.package_name, state_before_destroy.as_ref(), &state_after))
            }
            Err(DestroyError::ConsistentAfterState(err)) => Err(err),
            Err(DestroyError::InconsistentAfterState(err)) => {
                warn!(urn = %request.urn, "destroy left an inconsistent after-state; demoting to a no-op: {err}");
                self.store.set_state(&request.urn, State::default());
                Ok(Vec::new())
            }
        }
    }

    #[instrument(skip(self, request), fields(urn = %request.urn))]
    pub async fn read(&self, request: &ModuleInputs) -> anyhow::Result<(ModuleOutputs, bool)> {
        let sandbox = self.open_sandbox(request)?;
        if let Some(prior) = &request.prior_state {
            sandbox.push_state(&prior.state, &prior.lock).await?;
        }
        sandbox.emit_config(&request.inputs, &request.output_names)?;
        sandbox.init().await?;

        let state_before_refresh = sandbox.show().await.ok();

        let refresh_plan = sandbox.plan_refresh_only().await?;
        let drift_detected = refresh_plan.has_changes();

        let refreshed = sandbox.refresh().await?;
        self.store.set_state(&request.urn, refreshed.clone());

        let view_steps = diff_view_steps(&self.package_name, state_before_refresh.as_ref(), &refreshed);
        let (raw_state, raw_lock) = sandbox.pull_state().await?;
        let mut values = refreshed.outputs.clone();
        values.insert(
            "__state".to_string(),
            PropertyValue::secret(PropertyValue::String(encode_bytes(&raw_state))),
        );
        values.insert("__lock".to_string(), PropertyValue::String(encode_bytes(&raw_lock)));
        values.insert(
            "__version".to_string(),
            PropertyValue::String(request.prior_state.as_ref().map(|p| p.version.clone()).unwrap_or_default()),
        );

        Ok((
            ModuleOutputs { values, view_steps, refresh_before_update: true },
            drift_detected,
        ))
    }
}

fn encode_bytes(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn diff_view_steps(package_name: &str, before: Option<&State>, after: &State) -> Vec<ViewStep> {
    use super::view_step::ViewStepKind;
    let mut steps = Vec::new();
    if let Some(before) = before {
        for (addr, resource) in &before.resources {
            let still_present = after.contains(addr);
            steps.push(ViewStep {
                type_token: format!("{package_name}:tf:{}", resource.underlying_type),
                name: addr.clone(),
                kind: if still_present { ViewStepKind::Same } else { ViewStepKind::Delete },
                old: Some(resource.attributes.clone()),
                new: after.find(addr).map(|r| r.attributes.clone()),
            });
        }
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_bytes_round_trips_length() {
        let encoded = encode_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(encoded, "deadbeef");
    }

    #[test]
    fn diff_view_steps_marks_absent_resource_as_deleted() {
        let mut before = State::default();
        before.resources.insert(
            crate::model::ResourceAddress::new("module.m.aws_s3_bucket.this"),
            crate::model::ResourceState {
                underlying_type: "aws_s3_bucket".into(),
                attributes: PropertyValue::Null,
            },
        );
        let after = State::default();
        let steps = diff_view_steps("pkg", Some(&before), &after);
        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0].kind, super::super::view_step::ViewStepKind::Delete));
    }
}
