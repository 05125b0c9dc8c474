//! Single-shot workload reconciliation for CI pipelines.
//!
//! One invocation takes pipeline metadata and a manifest template and
//! converges exactly one Deployment in the target cluster:
//!
//! - **Validate**: required connection settings are present.
//! - **Render**: pipeline metadata is substituted into the template.
//! - **Decode**: the rendered YAML becomes a typed `apps/v1` Deployment.
//! - **Look up**: the target namespace is listed for a workload with the same name.
//! - **Apply**: the workload is created, or replaced wholesale if it exists.
//!
//! # Invariants
//!
//! - Exactly one workload identity (name, namespace) per invocation
//! - Rendering is deterministic given the same template and context
//! - The first error ends the run; nothing is retried

pub mod config;
pub mod context;
pub mod error;
pub mod lookup;
pub mod manifest;
pub mod reconciler;
pub mod template;

pub use config::{ConfigField, ReconcileConfig, DEFAULT_NAMESPACE};
pub use context::{BuildInfo, JobInfo, ReconcileContext, RepositoryInfo};
pub use error::{ReconcileError, TemplateError};
pub use lookup::{find_workload, WorkloadApi};
pub use manifest::{decode_manifest, DesiredWorkload};
pub use reconciler::{plan, Applied, Outcome, ReconcilePhase, Reconciler};
pub use template::TemplateRenderer;
