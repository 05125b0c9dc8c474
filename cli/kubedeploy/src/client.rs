//! Kubernetes-backed workload API.
//!
//! The session is built from an in-memory kubeconfig holding a single
//! cluster, user and context, all named [`SESSION`]. Calls are driven to
//! completion on a private current-thread runtime, so callers see a plain
//! blocking API.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use kubedeploy_reconcile::{DesiredWorkload, ReconcileConfig, WorkloadApi};
use serde_json::json;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Name of the cluster, user and context in the generated kubeconfig.
pub const SESSION: &str = "drone";

/// Errors constructing the cluster session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("KUBE_CA is not valid base64: {0}")]
    CaEncoding(#[source] base64::DecodeError),

    #[error("KUBE_TOKEN is not valid base64: {0}")]
    TokenEncoding(#[source] base64::DecodeError),

    #[error("KUBE_TOKEN does not decode to UTF-8 text")]
    TokenText(#[source] std::string::FromUtf8Error),

    #[error("invalid cluster session: {0}")]
    Session(String),

    #[error("failed to start client runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// [`WorkloadApi`] over a live cluster.
pub struct KubeWorkloads {
    runtime: Runtime,
    client: Client,
}

impl KubeWorkloads {
    /// Build a session from validated connection settings.
    pub fn connect(config: &ReconcileConfig) -> Result<Self, ClientError> {
        let kubeconfig = session_kubeconfig(config)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientError::Runtime)?;

        let client = runtime.block_on(async {
            let options = KubeConfigOptions {
                context: Some(SESSION.to_string()),
                ..Default::default()
            };
            let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| ClientError::Session(e.to_string()))?;
            Client::try_from(config).map_err(|e| ClientError::Session(e.to_string()))
        })?;

        info!(endpoint = %config.endpoint, "Cluster session ready");
        Ok(Self { runtime, client })
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl WorkloadApi for KubeWorkloads {
    fn list(&self, namespace: &str) -> Result<Vec<Deployment>> {
        let api = self.deployments(namespace);
        let list = self.runtime.block_on(api.list(&ListParams::default()))?;
        debug!(namespace, count = list.items.len(), "Listed deployments");
        Ok(list.items)
    }

    fn create(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment> {
        let api = self.deployments(namespace);
        let body = workload.to_deployment();
        let created = self
            .runtime
            .block_on(api.create(&PostParams::default(), &body))?;
        Ok(created)
    }

    fn update(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment> {
        let api = self.deployments(namespace);
        let body = workload.to_deployment();
        let replaced = self
            .runtime
            .block_on(api.replace(workload.name(), &PostParams::default(), &body))?;
        Ok(replaced)
    }
}

/// Build the single-context kubeconfig for `config`.
///
/// The CA bundle must be valid base64 and is handed to the client as-is;
/// the token is decoded to its plain-text form.
pub fn session_kubeconfig(config: &ReconcileConfig) -> Result<Kubeconfig, ClientError> {
    let ca = config.ca.trim();
    STANDARD.decode(ca).map_err(ClientError::CaEncoding)?;

    let token = STANDARD
        .decode(config.token.trim())
        .map_err(ClientError::TokenEncoding)?;
    let token = String::from_utf8(token).map_err(ClientError::TokenText)?;

    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": SESSION,
            "cluster": {
                "server": config.endpoint.trim(),
                "certificate-authority-data": ca,
            },
        }],
        "users": [{
            "name": SESSION,
            "user": { "token": token.trim() },
        }],
        "contexts": [{
            "name": SESSION,
            "context": { "cluster": SESSION, "user": SESSION },
        }],
        "current-context": SESSION,
    });

    serde_json::from_value(document).map_err(|e| ClientError::Session(e.to_string()))
}
