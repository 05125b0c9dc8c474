//! Error types for reconciliation.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigField;
use crate::reconciler::{Applied, ReconcilePhase};

/// Errors that end a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A required setting is absent.
    #[error("missing configuration: {field} is not defined (set {})", .field.env_var())]
    MissingConfiguration { field: ConfigField },

    /// The template file could not be read.
    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The rendered text is not well-formed YAML.
    #[error("malformed manifest: {0}")]
    Format(String),

    /// The manifest does not describe a usable workload.
    #[error("invalid manifest: {0}")]
    Schema(String),

    /// Listing workloads in the target namespace failed.
    #[error("failed to list workloads in namespace {namespace}: {source}")]
    Lookup {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    /// The create or update call failed.
    #[error("failed to {} workload {name} in namespace {namespace}: {source}", .action.verb())]
    Apply {
        action: Applied,
        name: String,
        namespace: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ReconcileError {
    pub fn missing(field: ConfigField) -> Self {
        Self::MissingConfiguration { field }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Taxonomy name of this error, as reported to the pipeline.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingConfiguration { .. } => "MissingConfiguration",
            Self::Io { .. } => "IOError",
            Self::Template(_) => "TemplateError",
            Self::Format(_) => "FormatError",
            Self::Schema(_) => "SchemaError",
            Self::Lookup { .. } => "LookupError",
            Self::Apply { .. } => "ApplyError",
        }
    }

    /// The phase the run was in when it failed.
    pub fn phase(&self) -> ReconcilePhase {
        match self {
            Self::MissingConfiguration { .. } => ReconcilePhase::Validating,
            Self::Io { .. } | Self::Template(_) => ReconcilePhase::Rendering,
            Self::Format(_) | Self::Schema(_) => ReconcilePhase::Decoding,
            Self::Lookup { .. } => ReconcilePhase::LookingUp,
            Self::Apply { action, .. } => action.phase(),
        }
    }
}

/// Errors raised while rendering a manifest template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template references a variable outside the pipeline namespace.
    #[error("unknown placeholder: {0}")]
    UnknownPlaceholder(String),

    /// The template is not syntactically valid.
    #[error("template syntax error: {0}")]
    Syntax(#[source] minijinja::Error),

    /// Evaluation failed (filter error, bad operand, ...).
    #[error("template render error: {0}")]
    Render(#[source] minijinja::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configuration_names_field_and_env_var() {
        let err = ReconcileError::missing(ConfigField::Token);
        assert_eq!(
            err.to_string(),
            "missing configuration: token is not defined (set KUBE_TOKEN)"
        );
        assert_eq!(err.kind(), "MissingConfiguration");
        assert_eq!(err.phase(), ReconcilePhase::Validating);
    }

    #[test]
    fn apply_error_reports_branch_phase() {
        let err = ReconcileError::Apply {
            action: Applied::Updated,
            name: "app-1".to_string(),
            namespace: "default".to_string(),
            source: anyhow::anyhow!("conflict"),
        };
        assert_eq!(err.kind(), "ApplyError");
        assert_eq!(err.phase(), ReconcilePhase::Updating);
        assert_eq!(
            err.to_string(),
            "failed to update workload app-1 in namespace default: conflict"
        );
    }

    #[test]
    fn template_errors_share_one_kind() {
        let err: ReconcileError = TemplateError::UnknownPlaceholder("repo.unknown".into()).into();
        assert_eq!(err.kind(), "TemplateError");
        assert_eq!(err.to_string(), "unknown placeholder: repo.unknown");
    }
}
