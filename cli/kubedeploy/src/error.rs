//! Error display for the step.

use colored::Colorize;
use kubedeploy_reconcile::{ReconcileError, TemplateError};

use crate::client::ClientError;

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    let label = match err.downcast_ref::<ReconcileError>() {
        Some(e) => format!("Error [{}]:", e.kind()),
        None => "Error:".to_string(),
    };
    eprintln!("{} {}", label.red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint(err: &anyhow::Error) -> Option<String> {
    if let Some(e) = err.downcast_ref::<ReconcileError>() {
        return match e {
            ReconcileError::MissingConfiguration { field } => Some(format!(
                "Set {} in the step's environment or secrets.",
                field.env_var()
            )),
            ReconcileError::Io { .. } => {
                Some("Template paths are resolved from the workspace directory.".to_string())
            }
            ReconcileError::Template(TemplateError::UnknownPlaceholder(_)) => Some(
                "Available variables: repo.*, build.*, job.started, namespace.".to_string(),
            ),
            ReconcileError::Schema(_) => Some(
                "The manifest must be a single apps/v1 Deployment with metadata.name and spec."
                    .to_string(),
            ),
            ReconcileError::Lookup { .. } => Some(
                "Check KUBE_SERVER and that the token may list deployments in the namespace."
                    .to_string(),
            ),
            ReconcileError::Apply { .. } => Some(
                "The token needs create and update permission on deployments.".to_string(),
            ),
            _ => None,
        };
    }

    match err.downcast_ref::<ClientError>() {
        Some(ClientError::CaEncoding(_) | ClientError::TokenEncoding(_)) => {
            Some("KUBE_CA and KUBE_TOKEN must be base64-encoded.".to_string())
        }
        Some(_) => Some("Check KUBE_SERVER and KUBE_CA.".to_string()),
        None => None,
    }
}
