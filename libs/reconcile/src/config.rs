//! Connection and template settings, and their validation.

use std::fmt;
use std::path::PathBuf;

use crate::error::ReconcileError;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Settings needed to reach the cluster and find the template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Cluster API endpoint URL.
    pub endpoint: String,

    /// Base64-encoded CA certificate bundle.
    pub ca: String,

    /// Base64-encoded bearer token.
    pub token: String,

    /// Target namespace. Empty means [`DEFAULT_NAMESPACE`].
    pub namespace: String,

    /// Path to the manifest template file.
    pub template: PathBuf,
}

/// A required configuration field, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Endpoint,
    Token,
    CertificateAuthority,
    Template,
}

impl ConfigField {
    /// Environment variable the pipeline sets this field from.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Endpoint => "KUBE_SERVER",
            Self::Token => "KUBE_TOKEN",
            Self::CertificateAuthority => "KUBE_CA",
            Self::Template => "KUBE_TEMPLATE",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Endpoint => "endpoint",
            Self::Token => "token",
            Self::CertificateAuthority => "CA certificate",
            Self::Template => "template path",
        };
        f.write_str(name)
    }
}

impl ReconcileConfig {
    /// Check required fields and fill in the default namespace.
    ///
    /// Fields are checked in a fixed order (endpoint, token, CA, template
    /// path) and the first absent one is reported. Whitespace-only values
    /// count as absent. Performs no I/O.
    pub fn validate(mut self) -> Result<Self, ReconcileError> {
        if is_blank(&self.endpoint) {
            return Err(ReconcileError::missing(ConfigField::Endpoint));
        }
        if is_blank(&self.token) {
            return Err(ReconcileError::missing(ConfigField::Token));
        }
        if is_blank(&self.ca) {
            return Err(ReconcileError::missing(ConfigField::CertificateAuthority));
        }
        if self.template.as_os_str().is_empty() {
            return Err(ReconcileError::missing(ConfigField::Template));
        }

        if is_blank(&self.namespace) {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }

        Ok(self)
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
