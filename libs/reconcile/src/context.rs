//! Pipeline metadata and the aggregate passed to rendering.

use serde::{Deserialize, Serialize};

use crate::config::ReconcileConfig;
use crate::error::ReconcileError;

/// Repository that triggered the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub owner: String,
    pub name: String,
}

/// The CI event that triggered the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub tag: String,
    pub event: String,
    pub number: u64,
    pub commit: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub branch: String,
    pub author: String,
    pub status: String,
    pub link: String,
    /// Unix timestamp (seconds).
    pub started: i64,
    /// Unix timestamp (seconds).
    pub created: i64,
}

/// The current job step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Unix timestamp (seconds).
    pub started: i64,
}

/// Everything one invocation knows about its pipeline and target.
///
/// Assembled once by the caller and never mutated afterwards; validation
/// produces a new value rather than editing this one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileContext {
    pub repo: RepositoryInfo,
    pub build: BuildInfo,
    pub job: JobInfo,
    pub config: ReconcileConfig,
}

/// Dotted names a template may reference.
pub const PLACEHOLDERS: &[&str] = &[
    "repo",
    "repo.owner",
    "repo.name",
    "build",
    "build.tag",
    "build.event",
    "build.number",
    "build.commit",
    "build.ref",
    "build.branch",
    "build.author",
    "build.status",
    "build.link",
    "build.started",
    "build.created",
    "job",
    "job.started",
    "namespace",
];

/// The variable namespace seen by templates.
///
/// Credentials and the template path are not exposed.
#[derive(Debug, Serialize)]
pub(crate) struct TemplateValues<'a> {
    repo: &'a RepositoryInfo,
    build: &'a BuildInfo,
    job: &'a JobInfo,
    namespace: &'a str,
}

impl ReconcileContext {
    pub fn new(
        repo: RepositoryInfo,
        build: BuildInfo,
        job: JobInfo,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            repo,
            build,
            job,
            config,
        }
    }

    /// Validate the config, returning a context with defaults filled in.
    pub fn validated(self) -> Result<Self, ReconcileError> {
        let config = self.config.validate()?;
        Ok(Self { config, ..self })
    }

    pub(crate) fn template_values(&self) -> TemplateValues<'_> {
        TemplateValues {
            repo: &self.repo,
            build: &self.build,
            job: &self.job,
            namespace: &self.config.namespace,
        }
    }
}
