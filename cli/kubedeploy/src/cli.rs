//! Command-line and environment parsing.
//!
//! Every option can be given as a flag or through the environment the
//! pipeline provides (`KUBE_*` for the cluster, `DRONE_*` for metadata).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser};
use kubedeploy_reconcile::{
    BuildInfo, JobInfo, ReconcileConfig, ReconcileContext, Reconciler, RepositoryInfo,
};
use tracing::info;

use crate::client::KubeWorkloads;
use crate::output::{print_outcome, print_plan, OutputFormat};

/// Render a Deployment manifest from pipeline metadata and create or update it.
#[derive(Debug, Parser)]
#[command(name = "kubedeploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    cluster: ClusterArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Render and decode the manifest, print it, and stop.
    #[arg(long, env = "PLUGIN_DRY_RUN")]
    dry_run: bool,

    /// Output format.
    #[arg(long, env = "PLUGIN_FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PLUGIN_LOG_JSON")]
    pub log_json: bool,
}

/// Cluster connection and template location.
///
/// Required values are optional here so that absence is reported by
/// config validation, in its fixed order.
#[derive(Debug, Args)]
struct ClusterArgs {
    /// Cluster API endpoint URL.
    #[arg(long, env = "KUBE_SERVER")]
    server: Option<String>,

    /// Base64-encoded bearer token.
    #[arg(long, env = "KUBE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Base64-encoded CA certificate bundle.
    #[arg(long, env = "KUBE_CA", hide_env_values = true)]
    ca: Option<String>,

    /// Target namespace (default: "default").
    #[arg(long, env = "KUBE_NAMESPACE")]
    namespace: Option<String>,

    /// Path to the manifest template.
    #[arg(long, env = "KUBE_TEMPLATE")]
    template: Option<PathBuf>,
}

/// Metadata about the triggering repository, build and job.
#[derive(Debug, Args)]
struct PipelineArgs {
    #[arg(long, env = "DRONE_REPO_OWNER", default_value = "")]
    repo_owner: String,

    #[arg(long, env = "DRONE_REPO_NAME", default_value = "")]
    repo_name: String,

    #[arg(long, env = "DRONE_TAG", default_value = "")]
    build_tag: String,

    #[arg(long, env = "DRONE_BUILD_EVENT", default_value = "")]
    build_event: String,

    #[arg(long, env = "DRONE_BUILD_NUMBER", default_value_t = 0)]
    build_number: u64,

    #[arg(long, env = "DRONE_COMMIT_SHA", default_value = "")]
    build_commit: String,

    #[arg(long, env = "DRONE_COMMIT_REF", default_value = "")]
    build_ref: String,

    #[arg(long, env = "DRONE_COMMIT_BRANCH", default_value = "")]
    build_branch: String,

    #[arg(long, env = "DRONE_COMMIT_AUTHOR", default_value = "")]
    build_author: String,

    #[arg(long, env = "DRONE_BUILD_STATUS", default_value = "")]
    build_status: String,

    #[arg(long, env = "DRONE_BUILD_LINK", default_value = "")]
    build_link: String,

    /// Build start (unix seconds).
    #[arg(long, env = "DRONE_BUILD_STARTED", default_value_t = 0)]
    build_started: i64,

    /// Build creation (unix seconds).
    #[arg(long, env = "DRONE_BUILD_CREATED", default_value_t = 0)]
    build_created: i64,

    /// Job start (unix seconds).
    #[arg(long, env = "DRONE_JOB_STARTED", default_value_t = 0)]
    job_started: i64,
}

impl Cli {
    /// Run one reconciliation.
    pub fn run(self) -> Result<()> {
        let format = self.format;
        let dry_run = self.dry_run;
        let ctx = self.into_context();

        if dry_run {
            let desired = kubedeploy_reconcile::plan(ctx)?;
            print_plan(&desired, format)?;
            return Ok(());
        }

        // Validate before any file or network access.
        let ctx = ctx.validated()?;
        info!(
            endpoint = %ctx.config.endpoint,
            namespace = %ctx.config.namespace,
            template = %ctx.config.template.display(),
            "Configuration loaded"
        );

        let api = KubeWorkloads::connect(&ctx.config)?;
        let outcome = Reconciler::new(api).reconcile(ctx)?;
        print_outcome(&outcome, format)?;

        Ok(())
    }

    fn into_context(self) -> ReconcileContext {
        let Self {
            cluster, pipeline, ..
        } = self;

        let config = ReconcileConfig {
            endpoint: cluster.server.unwrap_or_default(),
            ca: cluster.ca.unwrap_or_default(),
            token: cluster.token.unwrap_or_default(),
            namespace: cluster.namespace.unwrap_or_default(),
            template: cluster.template.unwrap_or_default(),
        };

        ReconcileContext::new(
            RepositoryInfo {
                owner: pipeline.repo_owner,
                name: pipeline.repo_name,
            },
            BuildInfo {
                tag: pipeline.build_tag,
                event: pipeline.build_event,
                number: pipeline.build_number,
                commit: pipeline.build_commit,
                reference: pipeline.build_ref,
                branch: pipeline.build_branch,
                author: pipeline.build_author,
                status: pipeline.build_status,
                link: pipeline.build_link,
                started: pipeline.build_started,
                created: pipeline.build_created,
            },
            JobInfo {
                started: pipeline.job_started,
            },
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_context() {
        let cli = Cli::try_parse_from([
            "kubedeploy",
            "--server",
            "https://kube:6443",
            "--token",
            "dG9rZW4=",
            "--ca",
            "Y2E=",
            "--template",
            "k8s/deployment.yaml",
            "--repo-owner",
            "acme",
            "--repo-name",
            "hello",
            "--build-number",
            "42",
            "--build-ref",
            "refs/heads/main",
            "--job-started",
            "1700000000",
        ])
        .unwrap();

        let ctx = cli.into_context();
        assert_eq!(ctx.config.endpoint, "https://kube:6443");
        assert_eq!(ctx.config.template, PathBuf::from("k8s/deployment.yaml"));
        assert_eq!(ctx.config.namespace, "");
        assert_eq!(ctx.repo.name, "hello");
        assert_eq!(ctx.build.number, 42);
        assert_eq!(ctx.build.reference, "refs/heads/main");
        assert_eq!(ctx.job.started, 1_700_000_000);
    }

    #[test]
    fn missing_server_surfaces_from_validation() {
        let cli = Cli::try_parse_from(["kubedeploy", "--token", "dG9rZW4="]).unwrap();
        let err = cli.into_context().validated().unwrap_err();
        assert_eq!(err.kind(), "MissingConfiguration");
    }
}
