//! The closed error taxonomy for this provider: one `thiserror` enum per RPC
//! surface, `anyhow::Error` as the carried source for anything coming out of
//! the Sandbox's child-process boundary.

use thiserror::Error;

use crate::model::ResourceAddress;

#[derive(Debug, Error)]
pub enum ParameterizeError {
    #[error("expected 1-3 positional arguments or a structured JSON value, got {0}")]
    InvalidArgumentCount(usize),
    #[error("module source '{0}' could not be resolved against the registry")]
    UnresolvableSource(String),
    #[error("--config file could not be parsed as JSON: {0}")]
    UnparseableConfig(#[source] anyhow::Error),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("module init failed while resolving sources")]
    Init(#[source] anyhow::Error),
    #[error("failed to parse declarations in resolved module directory: {0}")]
    Parse(String),
    #[error("duplicate {construct} declaration '{name}' across module files")]
    DuplicateDeclaration { construct: &'static str, name: String },
}

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("property '{0}' has an unexpected shape for this context")]
    UnexpectedShape(String),
    #[error("missing required special property '{0}'")]
    MissingSpecialProperty(&'static str),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("runtime plan failed")]
    RuntimeFailure(#[source] anyhow::Error),
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

#[derive(Debug, Error)]
pub enum ApplyError {
    /// Apply returned no state at all: propagate as-is, abort the operation.
    #[error("apply failed with no resulting state")]
    Full(#[source] anyhow::Error),
    /// Apply returned a partial state alongside the error: surfaced as a
    /// resource-init-failure carrying the partial outputs, not aborted.
    #[error("apply failed partway through; partial state was persisted")]
    Partial {
        #[source]
        source: anyhow::Error,
        partial_state: crate::model::State,
    },
}

#[derive(Debug, Error)]
pub enum DestroyError {
    /// The after-state is internally consistent: surface the error, host
    /// retains the module for a retry.
    #[error("destroy failed")]
    ConsistentAfterState(#[source] anyhow::Error),
    /// The after-state is inconsistent (destroy failed catastrophically):
    /// demoted to success by the caller so the next operation can retry.
    #[error("destroy failed leaving an inconsistent after-state; demoted to a no-op")]
    InconsistentAfterState(#[source] anyhow::Error),
}

/// A bug: a contract assumption that can never legally be violated at
/// runtime. Fails loudly rather than being propagated as a normal error.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("plan entry for address {0} was queried before being published for this URN")]
    PlanQueriedBeforePublish(ResourceAddress),
    #[error("Plan/State Store set_{kind} called twice for URN {urn}")]
    DoublePublish { kind: &'static str, urn: String },
    #[error("child Diff observed invariant-violating change kind {0:?}")]
    UnexpectedChildChangeKind(crate::model::ChangeKind),
    #[error("plan entry and state entry for the same address disagree on underlying type: {plan_type} vs {state_type}")]
    TypeMismatch { plan_type: String, state_type: String },
}

/// Heuristic rewrite of an underlying runtime error into a bridge-specific
/// hint when it looks like a credential/provider-misconfiguration failure
/// Matches on a small set of substrings real module runtimes use.
pub fn rewrite_credential_hint(message: &str) -> Option<String> {
    const MARKERS: &[&str] = &[
        "no valid credential sources",
        "could not find default credentials",
        "NoCredentialProviders",
        "provider produced inconsistent",
        "Error: authorization",
    ];
    MARKERS.iter().find(|m| message.contains(**m)).map(|_| {
        format!(
            "module runtime reported a provider/credential error; verify the \
             provider configuration passed through Configure: {message}"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_hint_matches_known_marker() {
        let msg = "Error: no valid credential sources for S3 Backend found";
        let hint = rewrite_credential_hint(msg).expect("should match");
        assert!(hint.contains("provider/credential error"));
    }

    #[test]
    fn credential_hint_is_none_for_unrelated_errors() {
        assert!(rewrite_credential_hint("Error: syntax error in module").is_none());
    }

    #[test]
    fn apply_error_partial_variant_carries_state() {
        let err = ApplyError::Partial {
            source: anyhow::anyhow!("boom"),
            partial_state: crate::model::State::default(),
        };
        match err {
            ApplyError::Partial { partial_state, .. } => assert!(partial_state.outputs.is_empty()),
            _ => panic!("expected Partial variant"),
        }
    }
}
