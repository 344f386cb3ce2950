//! The Runtime Sandbox: owns one working directory per {executor,
//! module-URN} pair and drives the external module runtime through it.

mod config_emit;
mod executor;
mod lock;
mod parse;
mod workdir;

pub use config_emit::CONFIG_FILE_NAME;
pub use lock::LockGuard;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use tracing::instrument;

use crate::errors::{ApplyError, DestroyError, PlanError};
use crate::model::{ModuleReference, Plan, PropertyValue, State, Urn};
use crate::propbridge::encode_inputs;

/// One module instantiation's sandboxed interaction with the external
/// runtime. Constructed per operation; the working directory it wraps may
/// be freshly allocated or reused from a prior operation on the same URN.
pub struct Sandbox {
    executor: PathBuf,
    working_dir: PathBuf,
    tf_name: String,
    module: ModuleReference,
    _dir_lock: Option<LockGuard>,
}

impl Sandbox {
    /// Resolve (and lock, or reallocate) the working directory for `urn`
    /// under `executor`, mirroring the working-directory reuse policy: a
    /// pre-existing directory is reused only if its lock is still
    /// acquirable, otherwise a fresh one is allocated.
    pub fn open(executor: PathBuf, urn: &Urn, tf_name: &str, module: ModuleReference) -> anyhow::Result<Self> {
        let mut working_dir = workdir::derive_path(&executor, urn);
        let mut dir_lock = lock::try_acquire_dir_lock(&working_dir)?;
        if dir_lock.is_none() {
            // Stale/contended directory: allocate a sibling and try once more.
            working_dir.set_extension("retry");
            dir_lock = lock::try_acquire_dir_lock(&working_dir)?;
        }
        Ok(Self {
            executor,
            working_dir,
            tf_name: tf_name.to_string(),
            module,
            _dir_lock: dir_lock,
        })
    }

    pub fn working_dir(&self) -> &std::path::Path {
        &self.working_dir
    }

    #[instrument(skip(self, inputs), fields(tf_name = %self.tf_name))]
    pub fn emit_config(
        &self,
        inputs: &BTreeMap<String, PropertyValue>,
        output_names: &[String],
    ) -> anyhow::Result<()> {
        let encoded = encode_inputs(inputs);
        config_emit::emit_config(
            &self.working_dir,
            &self.tf_name,
            self.module.source(),
            self.module.version(),
            &encoded,
            output_names,
        )
    }

    #[instrument(skip(self))]
    pub async fn init(&self) -> anyhow::Result<()> {
        let outcome = executor::run_subcommand(&self.executor, "init", &[], &self.working_dir).await?;
        if outcome.exit_success {
            Ok(())
        } else {
            Err(anyhow::anyhow!("init failed: {}", outcome.stderr.trim()))
        }
    }

    #[instrument(skip(self))]
    pub async fn plan_no_refresh(&self) -> Result<Plan, PlanError> {
        self.run_plan(&["-refresh=false"]).await
    }

    #[instrument(skip(self))]
    pub async fn plan_refresh_only(&self) -> Result<Plan, PlanError> {
        self.run_plan(&["-refresh-only"]).await
    }

    async fn run_plan(&self, extra_args: &[&str]) -> Result<Plan, PlanError> {
        let outcome = executor::run_subcommand(&self.executor, "plan", extra_args, &self.working_dir)
            .await
            .map_err(PlanError::RuntimeFailure)?;
        if !outcome.exit_success {
            return Err(PlanError::RuntimeFailure(anyhow::anyhow!(outcome.stderr)));
        }
        parse::parse_plan(&outcome.result_messages)
            .context("decoding plan result")
            .map_err(PlanError::RuntimeFailure)
    }

    #[instrument(skip(self))]
    pub async fn apply(&self, no_refresh: bool) -> Result<State, ApplyError> {
        let args: &[&str] = if no_refresh { &["-refresh=false"] } else { &[] };
        let outcome = executor::run_subcommand(&self.executor, "apply", args, &self.working_dir)
            .await
            .map_err(ApplyError::Full)?;

        executor::require_result(&outcome, "apply").map_err(ApplyError::Full)?;
        let state = parse::parse_state(&outcome.result_messages).map_err(ApplyError::Full)?;
        if outcome.exit_success {
            Ok(state)
        } else {
            Err(ApplyError::Partial {
                source: anyhow::anyhow!(outcome.stderr),
                partial_state: state,
            })
        }
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<State, PlanError> {
        let outcome = executor::run_subcommand(&self.executor, "refresh", &[], &self.working_dir)
            .await
            .map_err(PlanError::RuntimeFailure)?;
        if !outcome.exit_success {
            return Err(PlanError::RuntimeFailure(anyhow::anyhow!(outcome.stderr)));
        }
        parse::parse_state(&outcome.result_messages)
            .context("decoding refresh result")
            .map_err(PlanError::RuntimeFailure)
    }

    #[instrument(skip(self))]
    pub async fn destroy(&self) -> Result<(), DestroyError> {
        let outcome = executor::run_subcommand(&self.executor, "destroy", &[], &self.working_dir)
            .await
            .map_err(DestroyError::ConsistentAfterState)?;
        if outcome.exit_success {
            return Ok(());
        }
        match parse::parse_state(&outcome.result_messages) {
            Ok(state) if !state.is_empty() => Err(DestroyError::InconsistentAfterState(
                anyhow::anyhow!(outcome.stderr),
            )),
            _ => Err(DestroyError::ConsistentAfterState(anyhow::anyhow!(outcome.stderr))),
        }
    }

    #[instrument(skip(self))]
    pub async fn show(&self) -> Result<State, PlanError> {
        let outcome = executor::run_subcommand(&self.executor, "show", &[], &self.working_dir)
            .await
            .map_err(PlanError::RuntimeFailure)?;
        if !outcome.exit_success {
            return Err(PlanError::RuntimeFailure(anyhow::anyhow!(outcome.stderr)));
        }
        parse::parse_state(&outcome.result_messages)
            .context("decoding show result")
            .map_err(PlanError::RuntimeFailure)
    }

    pub async fn push_state(&self, raw_state: &[u8], raw_lock: &[u8]) -> anyhow::Result<()> {
        executor::write_file(&self.working_dir.join("terraform.tfstate"), raw_state).await?;
        executor::write_file(&self.working_dir.join(".terraform.lock.hcl"), raw_lock).await?;
        Ok(())
    }

    pub async fn pull_state(&self) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
        let state = executor::read_file(&self.working_dir.join("terraform.tfstate")).await?;
        let lock = executor::read_file(&self.working_dir.join(".terraform.lock.hcl"))
            .await
            .unwrap_or_default();
        Ok((state, lock))
    }
}

pub use lock::acquire_schema_inference_lock;
pub use workdir::remove as remove_working_dir;
