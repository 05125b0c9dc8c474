//! Cluster access and workload lookup.

use anyhow::Result;
use k8s_openapi::api::apps::v1::Deployment;
use tracing::debug;

use crate::config::DEFAULT_NAMESPACE;
use crate::error::ReconcileError;
use crate::manifest::DesiredWorkload;

/// Cluster API operations the reconciler needs.
///
/// Calls block until the cluster answers. How the transport gets there
/// is up to the implementation.
pub trait WorkloadApi {
    /// List every workload in `namespace`.
    fn list(&self, namespace: &str) -> Result<Vec<Deployment>>;

    /// Create a workload that does not exist yet.
    fn create(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment>;

    /// Replace an existing workload's body with `workload`.
    fn update(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment>;
}

impl<T: WorkloadApi + ?Sized> WorkloadApi for &T {
    fn list(&self, namespace: &str) -> Result<Vec<Deployment>> {
        (**self).list(namespace)
    }

    fn create(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment> {
        (**self).create(namespace, workload)
    }

    fn update(&self, namespace: &str, workload: &DesiredWorkload) -> Result<Deployment> {
        (**self).update(namespace, workload)
    }
}

/// Resolve an empty namespace to [`DEFAULT_NAMESPACE`].
pub fn resolve_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

/// Find the workload called `name` in `namespace`.
///
/// Returns `Ok(None)` when the namespace has no such workload. A failed
/// list call is a [`ReconcileError::Lookup`].
pub fn find_workload<A: WorkloadApi + ?Sized>(
    api: &A,
    namespace: &str,
    name: &str,
) -> Result<Option<Deployment>, ReconcileError> {
    let namespace = resolve_namespace(namespace);

    let workloads = api.list(namespace).map_err(|source| ReconcileError::Lookup {
        namespace: namespace.to_string(),
        source,
    })?;
    debug!(namespace, count = workloads.len(), "Listed workloads");

    Ok(workloads
        .into_iter()
        .find(|w| w.metadata.name.as_deref() == Some(name)))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;

    /// Serves a fixed listing and remembers which namespace was asked for.
    struct Listing {
        items: Result<Vec<Deployment>, String>,
        asked: RefCell<Vec<String>>,
    }

    impl Listing {
        fn of(names: &[&str]) -> Self {
            let items = names
                .iter()
                .map(|name| Deployment {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .collect();
            Self {
                items: Ok(items),
                asked: RefCell::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                items: Err(message.to_string()),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl WorkloadApi for Listing {
        fn list(&self, namespace: &str) -> Result<Vec<Deployment>> {
            self.asked.borrow_mut().push(namespace.to_string());
            self.items.clone().map_err(anyhow::Error::msg)
        }

        fn create(&self, _: &str, _: &DesiredWorkload) -> Result<Deployment> {
            unreachable!("lookup never creates")
        }

        fn update(&self, _: &str, _: &DesiredWorkload) -> Result<Deployment> {
            unreachable!("lookup never updates")
        }
    }

    #[test]
    fn finds_by_exact_name() {
        let api = Listing::of(&["app-10", "app-1", "app"]);
        let found = find_workload(&api, "web", "app-1").unwrap().unwrap();
        assert_eq!(found.metadata.name.as_deref(), Some("app-1"));
        assert_eq!(*api.asked.borrow(), vec!["web".to_string()]);
    }

    #[test]
    fn not_found_is_none() {
        let api = Listing::of(&["other"]);
        assert!(find_workload(&api, "web", "app-1").unwrap().is_none());
    }

    #[test]
    fn empty_namespace_queries_default() {
        let api = Listing::of(&[]);
        find_workload(&api, "", "app-1").unwrap();
        assert_eq!(*api.asked.borrow(), vec![DEFAULT_NAMESPACE.to_string()]);
    }

    #[test]
    fn list_failure_is_lookup_error() {
        let api = Listing::failing("connection refused");
        let err = find_workload(&api, "web", "app-1").unwrap_err();
        assert_eq!(err.kind(), "LookupError");
        assert_eq!(
            err.to_string(),
            "failed to list workloads in namespace web: connection refused"
        );
    }

    #[test]
    fn resolve_namespace_keeps_explicit() {
        assert_eq!(resolve_namespace("prod"), "prod");
        assert_eq!(resolve_namespace(""), DEFAULT_NAMESPACE);
    }
}
