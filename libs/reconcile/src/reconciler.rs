//! One-shot create-or-update reconciliation.
//!
//! The reconciler walks a fixed sequence of phases:
//!
//! ```text
//! Validating -> Rendering -> Decoding -> LookingUp -> Creating | Updating -> Done
//! ```
//!
//! Any error moves the run to `Failed` and ends it. The fork is decided by
//! name: if the namespace already holds a workload with the desired name
//! it is replaced wholesale, otherwise it is created.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::ReconcileContext;
use crate::error::ReconcileError;
use crate::lookup::{find_workload, resolve_namespace, WorkloadApi};
use crate::manifest::{decode_manifest, DesiredWorkload};
use crate::template::TemplateRenderer;

/// Phases of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconcilePhase {
    Validating,
    Rendering,
    Decoding,
    LookingUp,
    Creating,
    Updating,
    Done,
    Failed,
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Rendering => "rendering",
            Self::Decoding => "decoding",
            Self::LookingUp => "looking_up",
            Self::Creating => "creating",
            Self::Updating => "updating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which branch of the fork was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    Created,
    Updated,
}

impl Applied {
    pub(crate) fn verb(&self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::Updated => "update",
        }
    }

    pub(crate) fn phase(&self) -> ReconcilePhase {
        match self {
            Self::Created => ReconcilePhase::Creating,
            Self::Updated => ReconcilePhase::Updating,
        }
    }
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Updated => f.write_str("updated"),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub action: Applied,
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.name)
    }
}

/// Validate, render and decode without touching the cluster.
pub fn plan(ctx: ReconcileContext) -> Result<DesiredWorkload, ReconcileError> {
    enter(ReconcilePhase::Validating);
    let ctx = ctx.validated()?;

    enter(ReconcilePhase::Rendering);
    let rendered = TemplateRenderer::new().render_file(&ctx.config.template, &ctx)?;

    enter(ReconcilePhase::Decoding);
    let desired = decode_manifest(&rendered)?;
    debug!(
        name = desired.name(),
        namespace = desired.namespace(),
        replicas = desired.replicas(),
        images = ?desired.images(),
        "Manifest decoded"
    );

    Ok(desired)
}

/// Drives a single reconciliation against a cluster.
pub struct Reconciler<A> {
    api: A,
}

impl<A: WorkloadApi> Reconciler<A> {
    /// Create a new reconciler.
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// See [`plan`].
    pub fn plan(&self, ctx: ReconcileContext) -> Result<DesiredWorkload, ReconcileError> {
        plan(ctx)
    }

    /// Run the full flow: plan, look up, then create or update.
    pub fn reconcile(&self, ctx: ReconcileContext) -> Result<Outcome, ReconcileError> {
        self.converge(ctx).inspect_err(|err| {
            warn!(
                phase = %ReconcilePhase::Failed,
                failed_in = %err.phase(),
                kind = err.kind(),
                error = %err,
                "Reconciliation failed"
            );
        })
    }

    fn converge(&self, ctx: ReconcileContext) -> Result<Outcome, ReconcileError> {
        let desired = plan(ctx)?;
        let namespace = resolve_namespace(desired.namespace()).to_string();
        let desired = desired.in_namespace(&namespace);

        enter(ReconcilePhase::LookingUp);
        let existing = find_workload(&self.api, &namespace, desired.name())?;

        let action = match existing {
            Some(_) => Applied::Updated,
            None => Applied::Created,
        };
        enter(action.phase());

        let result = match action {
            Applied::Created => self.api.create(&namespace, &desired),
            Applied::Updated => self.api.update(&namespace, &desired),
        };
        result.map_err(|source| ReconcileError::Apply {
            action,
            name: desired.name().to_string(),
            namespace: namespace.clone(),
            source,
        })?;

        enter(ReconcilePhase::Done);
        let outcome = Outcome {
            action,
            name: desired.name().to_string(),
            namespace,
        };
        info!(
            action = %outcome.action,
            name = %outcome.name,
            namespace = %outcome.namespace,
            "Workload reconciled"
        );
        Ok(outcome)
    }
}

fn enter(phase: ReconcilePhase) {
    debug!(%phase, "Entering phase");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_display() {
        let outcome = Outcome {
            action: Applied::Created,
            name: "app-1".to_string(),
            namespace: "default".to_string(),
        };
        assert_eq!(outcome.to_string(), "created app-1");
    }

    #[test]
    fn outcome_serializes_action_in_snake_case() {
        let outcome = Outcome {
            action: Applied::Updated,
            name: "app-1".to_string(),
            namespace: "web".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["action"], "updated");
        assert_eq!(json["namespace"], "web");
    }

    #[test]
    fn branch_phases() {
        assert_eq!(Applied::Created.phase(), ReconcilePhase::Creating);
        assert_eq!(Applied::Updated.phase(), ReconcilePhase::Updating);
        assert_eq!(ReconcilePhase::LookingUp.to_string(), "looking_up");
    }
}
