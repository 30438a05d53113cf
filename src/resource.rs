//! Namespaced custom-resource access.
//!
//! The probes and the session only need `get`, `create` and `delete` on namespaced custom
//! objects, plus (for diagnostics) the events recorded against an object. [`ResourceClient`] is
//! that contract; bring an implementation backed by your cluster client, or use
//! [`InMemoryClient`] to script a control plane in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

/// API group shared by the serving resources.
pub const SERVING_GROUP: &str = "serving.kserve.io";

/// Identifies a custom resource type the way the API server addresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKind {
    pub group: &'static str,
    pub version: &'static str,
    pub plural: &'static str,
    pub kind: &'static str,
}

impl ResourceKind {
    pub const LLM_INFERENCE_SERVICE: ResourceKind = ResourceKind {
        group: SERVING_GROUP,
        version: "v1alpha1",
        plural: "llminferenceservices",
        kind: "LLMInferenceService",
    };

    pub const LLM_INFERENCE_SERVICE_CONFIG: ResourceKind = ResourceKind {
        group: SERVING_GROUP,
        version: "v1alpha1",
        plural: "llminferenceserviceconfigs",
        kind: "LLMInferenceServiceConfig",
    };

    pub const INFERENCE_SERVICE: ResourceKind = ResourceKind {
        group: SERVING_GROUP,
        version: "v1beta1",
        plural: "inferenceservices",
        kind: "InferenceService",
    };

    /// `group/version`, as written in a manifest's `apiVersion`.
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// Skeleton manifest for an object of this kind.
    pub fn manifest(&self, key: &ObjectKey, spec: Value) -> Value {
        serde_json::json!({
            "apiVersion": self.api_version(),
            "kind": self.kind,
            "metadata": { "name": key.name, "namespace": key.namespace },
            "spec": spec,
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.plural, self.group, self.version)
    }
}

/// Name and namespace of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub name: String,
    pub namespace: String,
}

impl ObjectKey {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into() }
    }

    /// Read `metadata.name` / `metadata.namespace` from a manifest.
    ///
    /// A missing namespace falls back to `"default"`; a missing name yields `None`.
    pub fn of(resource: &Value) -> Option<Self> {
        let metadata = resource.get("metadata")?;
        let name = metadata.get("name")?.as_str()?;
        let namespace = metadata.get("namespace").and_then(Value::as_str).unwrap_or("default");
        Some(Self::new(name, namespace))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Errors returned by a [`ResourceClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },
    #[error("{kind} {key} already exists")]
    Conflict { kind: &'static str, key: ObjectKey },
    /// The request was rejected as malformed (missing metadata, admission failure, ...).
    #[error("invalid {kind}: {message}")]
    Invalid { kind: &'static str, message: String },
    /// Anything between us and the API server failed.
    #[error("api request failed: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A Kubernetes event recorded against an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub type_: String,
    pub reason: String,
    pub message: String,
    /// RFC 3339 timestamp of the last occurrence, falling back to the first.
    pub timestamp: Option<String>,
}

/// CRUD on namespaced custom objects.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Value, ApiError>;

    async fn create(&self, kind: &ResourceKind, resource: Value) -> Result<Value, ApiError>;

    async fn delete(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<(), ApiError>;

    /// Events involving the named object, in no particular order.
    async fn events(&self, _key: &ObjectKey) -> Result<Vec<Event>, ApiError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl<C: ResourceClient + ?Sized> ResourceClient for Arc<C> {
    async fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Value, ApiError> {
        (**self).get(kind, key).await
    }

    async fn create(&self, kind: &ResourceKind, resource: Value) -> Result<Value, ApiError> {
        (**self).create(kind, resource).await
    }

    async fn delete(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<(), ApiError> {
        (**self).delete(kind, key).await
    }

    async fn events(&self, key: &ObjectKey) -> Result<Vec<Event>, ApiError> {
        (**self).events(key).await
    }
}

type StoreKey = (&'static str, ObjectKey);

#[derive(Debug, Default)]
struct Store {
    objects: BTreeMap<StoreKey, Value>,
    // Status values handed out one per `get`; the last one sticks.
    scripted: HashMap<StoreKey, VecDeque<Value>>,
    events: HashMap<ObjectKey, Vec<Event>>,
    fail_next: VecDeque<ApiError>,
    gets: usize,
}

/// In-process stand-in for the API server.
///
/// Objects are kept per kind, namespace and name. Tests drive "reconciliation" by setting or
/// scripting each object's `status`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClient {
    store: Arc<Mutex<Store>>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace an existing object's `status`.
    pub fn set_status(
        &self,
        kind: &ResourceKind,
        key: &ObjectKey,
        status: Value,
    ) -> Result<(), ApiError> {
        let mut store = self.lock();
        let object = store
            .objects
            .get_mut(&(kind.plural, key.clone()))
            .ok_or_else(|| ApiError::NotFound { kind: kind.kind, key: key.clone() })?;
        object["status"] = status;
        Ok(())
    }

    /// Hand out `statuses` one per subsequent `get`, keeping the last one afterwards.
    pub fn script_statuses<I>(&self, kind: &ResourceKind, key: &ObjectKey, statuses: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.lock().scripted.insert((kind.plural, key.clone()), statuses.into_iter().collect());
    }

    pub fn push_event(&self, key: &ObjectKey, event: Event) {
        self.lock().events.entry(key.clone()).or_default().push(event);
    }

    /// Make the next call (of any kind) fail with `error`.
    pub fn fail_next(&self, error: ApiError) {
        self.lock().fail_next.push_back(error);
    }

    pub fn contains(&self, kind: &ResourceKind, key: &ObjectKey) -> bool {
        self.lock().objects.contains_key(&(kind.plural, key.clone()))
    }

    /// Number of objects currently stored, across kinds.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `get` calls served so far.
    pub fn gets(&self) -> usize {
        self.lock().gets
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ResourceClient for InMemoryClient {
    async fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Value, ApiError> {
        let mut store = self.lock();
        store.gets += 1;
        if let Some(err) = store.fail_next.pop_front() {
            return Err(err);
        }
        let store_key = (kind.plural, key.clone());
        let next_status = match store.scripted.get_mut(&store_key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let object = store
            .objects
            .get_mut(&store_key)
            .ok_or_else(|| ApiError::NotFound { kind: kind.kind, key: key.clone() })?;
        if let Some(status) = next_status {
            object["status"] = status;
        }
        Ok(object.clone())
    }

    async fn create(&self, kind: &ResourceKind, resource: Value) -> Result<Value, ApiError> {
        let mut store = self.lock();
        if let Some(err) = store.fail_next.pop_front() {
            return Err(err);
        }
        let key = ObjectKey::of(&resource).ok_or_else(|| ApiError::Invalid {
            kind: kind.kind,
            message: "metadata.name is required".to_string(),
        })?;
        let store_key = (kind.plural, key.clone());
        if store.objects.contains_key(&store_key) {
            return Err(ApiError::Conflict { kind: kind.kind, key });
        }
        store.objects.insert(store_key, resource.clone());
        Ok(resource)
    }

    async fn delete(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<(), ApiError> {
        let mut store = self.lock();
        if let Some(err) = store.fail_next.pop_front() {
            return Err(err);
        }
        let store_key = (kind.plural, key.clone());
        store.scripted.remove(&store_key);
        store
            .objects
            .remove(&store_key)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound { kind: kind.kind, key: key.clone() })
    }

    async fn events(&self, key: &ObjectKey) -> Result<Vec<Event>, ApiError> {
        Ok(self.lock().events.get(key).cloned().unwrap_or_default())
    }
}
