//! Decoding rendered manifests into a typed workload.
//!
//! Decoding happens in two stages. The YAML text is first parsed into a
//! generic tree (the same shape JSON would give), then that tree is
//! checked against the `apps/v1` Deployment schema and decoded.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::error::ReconcileError;

/// Schema version accepted for manifests.
pub const API_VERSION: &str = "apps/v1";

/// Resource kind accepted for manifests.
pub const KIND: &str = "Deployment";

/// Desired state decoded from a rendered manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredWorkload {
    name: String,
    namespace: String,
    metadata: ObjectMeta,
    spec: DeploymentSpec,
}

impl DesiredWorkload {
    /// Workload name. Never empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace from the manifest; empty when the manifest omits it.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    pub fn spec(&self) -> &DeploymentSpec {
        &self.spec
    }

    /// Replica count, or the API default of 1 when unset.
    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }

    /// Container images in declaration order.
    pub fn images(&self) -> Vec<&str> {
        self.spec
            .template
            .spec
            .iter()
            .flat_map(|pod| pod.containers.iter())
            .filter_map(|c| c.image.as_deref())
            .collect()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.metadata.labels.clone().unwrap_or_default()
    }

    /// A copy of this workload bound to `namespace`, in the body as well
    /// as the identity.
    pub fn in_namespace(&self, namespace: &str) -> Self {
        let mut bound = self.clone();
        bound.namespace = namespace.to_string();
        bound.metadata.namespace = Some(namespace.to_string());
        bound
    }

    /// The full request body for create or replace.
    pub fn to_deployment(&self) -> Deployment {
        Deployment {
            metadata: self.metadata.clone(),
            spec: Some(self.spec.clone()),
            ..Default::default()
        }
    }
}

/// Decode rendered manifest text.
///
/// Malformed YAML (including multi-document input) is a format error.
/// A document that is not an `apps/v1` Deployment with a non-empty
/// `metadata.name` and a `spec` mapping is a schema error.
pub fn decode_manifest(text: &str) -> Result<DesiredWorkload, ReconcileError> {
    let tree = to_tree(text)?;
    check_shape(&tree)?;

    let deployment: Deployment =
        serde_json::from_value(tree).map_err(|e| ReconcileError::schema(e.to_string()))?;

    let Deployment { metadata, spec, .. } = deployment;
    let Some(spec) = spec else {
        return Err(ReconcileError::schema("missing spec"));
    };
    let name = metadata.name.clone().unwrap_or_default();
    if name.is_empty() {
        return Err(ReconcileError::schema("missing metadata.name"));
    }
    let namespace = metadata.namespace.clone().unwrap_or_default();

    Ok(DesiredWorkload {
        name,
        namespace,
        metadata,
        spec,
    })
}

fn to_tree(text: &str) -> Result<Value, ReconcileError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ReconcileError::format(e.to_string()))?;
    serde_json::to_value(&yaml).map_err(|e| ReconcileError::format(e.to_string()))
}

fn check_shape(tree: &Value) -> Result<(), ReconcileError> {
    let Some(doc) = tree.as_object() else {
        return Err(ReconcileError::schema("manifest must be a mapping"));
    };

    match doc.get("apiVersion").and_then(Value::as_str) {
        Some(API_VERSION) => {}
        Some(other) => {
            return Err(ReconcileError::schema(format!(
                "unsupported apiVersion {other:?}, expected {API_VERSION:?}"
            )))
        }
        None => return Err(ReconcileError::schema("missing apiVersion")),
    }

    match doc.get("kind").and_then(Value::as_str) {
        Some(KIND) => {}
        Some(other) => {
            return Err(ReconcileError::schema(format!(
                "unsupported kind {other:?}, expected {KIND:?}"
            )))
        }
        None => return Err(ReconcileError::schema("missing kind")),
    }

    let Some(metadata) = doc.get("metadata").and_then(Value::as_object) else {
        return Err(ReconcileError::schema("missing metadata"));
    };
    match metadata.get("name") {
        Some(Value::String(name)) if !name.is_empty() => {}
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(ReconcileError::schema("missing metadata.name"))
        }
        Some(_) => return Err(ReconcileError::schema("metadata.name must be a string")),
    }
    match metadata.get("namespace") {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(_) => return Err(ReconcileError::schema("metadata.namespace must be a string")),
    }

    match doc.get("spec") {
        Some(Value::Object(_)) => Ok(()),
        None | Some(Value::Null) => Err(ReconcileError::schema("missing spec")),
        Some(_) => Err(ReconcileError::schema("spec must be a mapping")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: app-1
  namespace: web
  labels:
    app: app-1
    tier: frontend
spec:
  replicas: 3
  selector:
    matchLabels:
      app: app-1
  template:
    metadata:
      labels:
        app: app-1
    spec:
      containers:
        - name: app
          image: registry.local/app:42
          ports:
            - containerPort: 8080
        - name: sidecar
          image: registry.local/proxy:1.0
"#;

    fn schema_message(text: &str) -> String {
        match decode_manifest(text) {
            Err(ReconcileError::Schema(msg)) => msg,
            other => panic!("expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn decodes_identity_and_spec() {
        let workload = decode_manifest(MANIFEST).unwrap();

        assert_eq!(workload.name(), "app-1");
        assert_eq!(workload.namespace(), "web");
        assert_eq!(workload.replicas(), 3);
        assert_eq!(
            workload.images(),
            vec!["registry.local/app:42", "registry.local/proxy:1.0"]
        );
        assert_eq!(workload.labels().get("tier").map(String::as_str), Some("frontend"));

        let selector = workload.spec().selector.match_labels.as_ref().unwrap();
        assert_eq!(selector.get("app").map(String::as_str), Some("app-1"));
    }

    #[test]
    fn body_round_trips_through_to_deployment() {
        let workload = decode_manifest(MANIFEST).unwrap();
        let deployment = workload.to_deployment();

        assert_eq!(deployment.metadata.name.as_deref(), Some("app-1"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("web"));
        assert_eq!(deployment.spec.as_ref().and_then(|s| s.replicas), Some(3));
        assert!(deployment.status.is_none());
    }

    #[test]
    fn absent_namespace_is_empty() {
        let text = MANIFEST.replace("  namespace: web\n", "");
        let workload = decode_manifest(&text).unwrap();
        assert_eq!(workload.namespace(), "");
        assert!(workload.metadata().namespace.is_none());
    }

    #[test]
    fn in_namespace_binds_body() {
        let text = MANIFEST.replace("  namespace: web\n", "");
        let workload = decode_manifest(&text).unwrap().in_namespace("default");
        assert_eq!(workload.namespace(), "default");
        assert_eq!(
            workload.to_deployment().metadata.namespace.as_deref(),
            Some("default")
        );
    }

    #[test]
    fn replicas_default_to_one() {
        let text = MANIFEST.replace("  replicas: 3\n", "");
        assert_eq!(decode_manifest(&text).unwrap().replicas(), 1);
    }

    #[test]
    fn missing_name_is_schema_error() {
        let text = MANIFEST.replace("  name: app-1\n", "");
        assert_eq!(schema_message(&text), "missing metadata.name");
    }

    #[test]
    fn empty_name_is_schema_error() {
        let text = MANIFEST.replace("name: app-1", "name: \"\"");
        assert_eq!(schema_message(&text), "missing metadata.name");
    }

    #[test]
    fn non_string_name_is_schema_error() {
        let text = MANIFEST.replace("name: app-1", "name: [a, b]");
        assert_eq!(schema_message(&text), "metadata.name must be a string");
    }

    #[test]
    fn missing_spec_is_schema_error() {
        let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: app-1\n";
        assert_eq!(schema_message(text), "missing spec");
    }

    #[test]
    fn scalar_spec_is_schema_error() {
        let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: app-1\nspec: 3\n";
        assert_eq!(schema_message(text), "spec must be a mapping");
    }

    #[test]
    fn missing_metadata_is_schema_error() {
        let text = "apiVersion: apps/v1\nkind: Deployment\nspec: {}\n";
        assert_eq!(schema_message(text), "missing metadata");
    }

    #[test]
    fn wrong_kind_is_schema_error() {
        let text = MANIFEST.replace("kind: Deployment", "kind: StatefulSet");
        assert!(schema_message(&text).contains("StatefulSet"));
    }

    #[test]
    fn wrong_api_version_is_schema_error() {
        let text = MANIFEST.replace("apiVersion: apps/v1", "apiVersion: extensions/v1beta1");
        assert!(schema_message(&text).contains("extensions/v1beta1"));
    }

    #[test]
    fn bad_field_type_is_schema_error() {
        let text = MANIFEST.replace("replicas: 3", "replicas: lots");
        assert_eq!(decode_manifest(&text).unwrap_err().kind(), "SchemaError");
    }

    #[test]
    fn scalar_document_is_schema_error() {
        assert_eq!(schema_message("just a string"), "manifest must be a mapping");
    }

    #[test]
    fn malformed_yaml_is_format_error() {
        let err = decode_manifest("metadata:\n  name: [unclosed\n").unwrap_err();
        assert_eq!(err.kind(), "FormatError");
    }

    #[test]
    fn multiple_documents_are_format_error() {
        let text = format!("{MANIFEST}\n---\n{MANIFEST}");
        assert_eq!(decode_manifest(&text).unwrap_err().kind(), "FormatError");
    }

    #[test]
    fn non_string_keys_are_format_error() {
        let text = format!("{MANIFEST}\n? [complex, key]\n: value\n");
        assert_eq!(decode_manifest(&text).unwrap_err().kind(), "FormatError");
    }
}
