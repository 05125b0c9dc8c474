//! Test doubles for reconciliation.
//!
//! [`InMemoryCluster`] behaves like a tiny API server for Deployments:
//! it stores workloads per namespace, rejects creating a name that already
//! exists and updating one that does not, and bumps `resourceVersion` on
//! every write. Every call is recorded so tests can assert what the
//! reconciler did (and did not) attempt.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubedeploy_reconcile::{DesiredWorkload, WorkloadApi};
use tracing::debug;

/// A call made against the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { namespace: String },
    Create { namespace: String, name: String },
    Update { namespace: String, name: String },
}

#[derive(Debug, Default)]
struct Failures {
    list: Option<String>,
    create: Option<String>,
    update: Option<String>,
}

/// In-memory stand-in for the cluster API.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    /// (namespace, name) -> stored workload.
    workloads: Mutex<BTreeMap<(String, String), Deployment>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Failures>,
    version: AtomicU64,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a minimal workload called `name` in `namespace`.
    pub fn with_workload(self, namespace: &str, name: &str) -> Self {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.store(namespace, name, deployment);
        self
    }

    /// Make every list call fail with `message`.
    pub fn fail_list(self, message: &str) -> Self {
        self.lock_failures().list = Some(message.to_string());
        self
    }

    /// Make every create call fail with `message`.
    pub fn fail_create(self, message: &str) -> Self {
        self.lock_failures().create = Some(message.to_string());
        self
    }

    /// Make every update call fail with `message`.
    pub fn fail_update(self, message: &str) -> Self {
        self.lock_failures().update = Some(message.to_string());
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of create or update calls made so far.
    pub fn writes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !matches!(c, Call::List { .. }))
            .count()
    }

    /// The stored workload, if any.
    pub fn get(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.lock_workloads()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn record(&self, call: Call) {
        debug!(?call, "[MOCK] Cluster call");
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn store(&self, namespace: &str, name: &str, mut deployment: Deployment) -> Deployment {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        deployment.metadata.resource_version = Some(version.to_string());
        self.lock_workloads()
            .insert((namespace.to_string(), name.to_string()), deployment.clone());
        deployment
    }

    fn lock_workloads(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Deployment>> {
        self.workloads.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, Failures> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WorkloadApi for InMemoryCluster {
    fn list(&self, namespace: &str) -> Result<Vec<Deployment>> {
        self.record(Call::List {
            namespace: namespace.to_string(),
        });
        if let Some(message) = &self.lock_failures().list {
            bail!("{message}");
        }

        Ok(self
            .lock_workloads()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, d)| d.clone())
            .collect())
    }

    fn create(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment> {
        let name = workload.name();
        self.record(Call::Create {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if let Some(message) = &self.lock_failures().create {
            bail!("{message}");
        }
        if self.get(namespace, name).is_some() {
            bail!("deployments.apps \"{name}\" already exists");
        }

        Ok(self.store(namespace, name, workload.to_deployment()))
    }

    fn update(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment> {
        let name = workload.name();
        self.record(Call::Update {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if let Some(message) = &self.lock_failures().update {
            bail!("{message}");
        }
        if self.get(namespace, name).is_none() {
            bail!("deployments.apps \"{name}\" not found");
        }

        Ok(self.store(namespace, name, workload.to_deployment()))
    }
}
