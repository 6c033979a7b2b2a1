//! Fetching the live document behind an object reference
//!
//! [`KubeResolver`] reads from a cluster through kube's dynamic API.
//! [`InMemoryResolver`] serves documents from a map and is what the tests
//! and dry runs use.

use crate::eventually::FetchError;
use crate::registry::ObjectRef;
use async_trait::async_trait;
use kube::api::{Api, DynamicObject};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Kinds that live outside any namespace
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "Node",
    "PersistentVolume",
    "StorageClass",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "PriorityClass",
    "IngressClass",
];

/// Capability for reading the current state of an object
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// Fetch the live document for `object`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NotFound` if the object does not exist and
    /// `FetchError::Resolve` for any other failure.
    async fn resolve(&self, object: &ObjectRef) -> Result<Value, FetchError>;
}

/// Resolver backed by a Kubernetes API server
#[derive(Clone)]
pub struct KubeResolver {
    client: Client,
}

impl KubeResolver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster config
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Resolve` if no client configuration is available.
    pub async fn try_default() -> Result<Self, FetchError> {
        let client = Client::try_default()
            .await
            .map_err(|e| FetchError::Resolve(format!("failed to create client: {e}")))?;
        Ok(Self::new(client))
    }

    fn api_for(&self, object: &ObjectRef) -> Api<DynamicObject> {
        let (group, version) = object.group_version();
        let gvk = GroupVersionKind::gvk(group, version, &object.kind);
        let ar = ApiResource::from_gvk(&gvk);

        if CLUSTER_SCOPED_KINDS.contains(&object.kind.as_str()) {
            return Api::all_with(self.client.clone(), &ar);
        }
        match &object.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::default_namespaced_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ResourceResolver for KubeResolver {
    async fn resolve(&self, object: &ObjectRef) -> Result<Value, FetchError> {
        let api = self.api_for(object);
        let live = api.get(&object.name).await.map_err(|e| match e {
            kube::Error::Api(ae) if ae.code == 404 => FetchError::NotFound(object.to_string()),
            _ => FetchError::Resolve(format!("{object}: {e}")),
        })?;

        debug!(object = %object, "Fetched live object");

        serde_json::to_value(live)
            .map_err(|e| FetchError::Resolve(format!("failed to serialize {object}: {e}")))
    }
}

/// Resolver serving documents held in memory
///
/// Documents can be replaced while an assertion is polling, which makes it
/// possible to script state transitions.
#[derive(Debug, Default)]
pub struct InMemoryResolver {
    objects: RwLock<HashMap<ObjectRef, Value>>,
}

impl InMemoryResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the document for `object`
    pub fn set(&self, object: ObjectRef, document: Value) {
        let mut objects = self
            .objects
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.insert(object, document);
    }

    /// Remove the document for `object`
    pub fn remove(&self, object: &ObjectRef) -> Option<Value> {
        let mut objects = self
            .objects
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.remove(object)
    }
}

#[async_trait]
impl ResourceResolver for InMemoryResolver {
    async fn resolve(&self, object: &ObjectRef) -> Result<Value, FetchError> {
        let objects = self
            .objects
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        objects
            .get(object)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(object.to_string()))
    }
}
