//! Scoped ownership of the resources a test creates.
//!
//! A [`ResourceSession`] keeps an explicit list of what it created. [`ResourceSession::release`]
//! deletes that list newest-first; [`ResourceSession::scoped`] runs a body and releases
//! afterwards whether the body returned `Ok`, returned `Err`, or panicked.
//!
//! ```rust
//! use convergence::resource::{InMemoryClient, ObjectKey, ResourceKind};
//! use convergence::ResourceSession;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let client = Arc::new(InMemoryClient::new());
//! let kind = ResourceKind::LLM_INFERENCE_SERVICE;
//! let key = ObjectKey::new("demo", "default");
//!
//! let outcome = ResourceSession::scoped(client.clone(), |session| async move {
//!     session.create(&kind, kind.manifest(&key, json!({}))).await?;
//!     Ok::<_, convergence::resource::ApiError>(())
//! })
//! .await;
//! assert!(outcome.is_ok());
//! assert!(client.is_empty());
//! # });
//! ```

use crate::resource::{ApiError, ObjectKey, ResourceClient, ResourceKind};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

/// Registration list of created resources plus the client that created them.
///
/// Clones share the same list.
#[derive(Clone)]
pub struct ResourceSession {
    client: Arc<dyn ResourceClient>,
    owned: Arc<Mutex<Vec<(ResourceKind, ObjectKey)>>>,
}

impl std::fmt::Debug for ResourceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSession")
            .field("client", &"<client>")
            .field("owned", &self.owned())
            .finish()
    }
}

/// What happened to each registered resource during release.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub deleted: Vec<(ResourceKind, ObjectKey)>,
    pub failed: Vec<(ResourceKind, ObjectKey, ApiError)>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl ResourceSession {
    pub fn new<C>(client: Arc<C>) -> Self
    where
        C: ResourceClient + 'static,
    {
        Self { client, owned: Arc::default() }
    }

    pub fn client(&self) -> &dyn ResourceClient {
        self.client.as_ref()
    }

    /// Resources still awaiting release, oldest first.
    pub fn owned(&self) -> Vec<(ResourceKind, ObjectKey)> {
        self.lock().clone()
    }

    /// Create `resource` and register it for release.
    pub async fn create(&self, kind: &ResourceKind, resource: Value) -> Result<Value, ApiError> {
        let created = self.client.create(kind, resource).await?;
        if let Some(key) = ObjectKey::of(&created) {
            tracing::debug!(%kind, %key, "registered for release");
            self.lock().push((*kind, key));
        }
        Ok(created)
    }

    /// Create `resource` unless it already exists.
    ///
    /// Only a resource this call actually created is registered; one that was already present
    /// (found by `get`, or lost a create race with `Conflict`) belongs to someone else. Returns
    /// `true` when this call created it.
    pub async fn ensure(&self, kind: &ResourceKind, resource: Value) -> Result<bool, ApiError> {
        let key = ObjectKey::of(&resource).ok_or_else(|| ApiError::Invalid {
            kind: kind.kind,
            message: "metadata.name is required".to_string(),
        })?;
        match self.client.get(kind, &key).await {
            Ok(_) => return Ok(false),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match self.create(kind, resource).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stop tracking a resource, e.g. after the test deleted it itself.
    pub fn forget(&self, kind: &ResourceKind, key: &ObjectKey) {
        self.lock().retain(|(k, o)| !(k == kind && o == key));
    }

    /// Delete every registered resource, newest first.
    ///
    /// Failures are logged and reported but do not stop the remaining deletions. A resource that
    /// is already gone counts as deleted.
    pub async fn release(&self) -> ReleaseReport {
        let owned: Vec<_> = std::mem::take(&mut *self.lock());
        let mut report = ReleaseReport::default();
        for (kind, key) in owned.into_iter().rev() {
            match self.client.delete(&kind, &key).await {
                Ok(()) => report.deleted.push((kind, key)),
                Err(e) if e.is_not_found() => report.deleted.push((kind, key)),
                Err(e) => {
                    tracing::warn!(%kind, %key, error = %e, "failed to clean up resource");
                    report.failed.push((kind, key, e));
                }
            }
        }
        report
    }

    /// Run `body` with a fresh session and release it on every exit path.
    ///
    /// A panic inside `body` is caught, the session released, and the panic resumed.
    pub async fn scoped<C, F, Fut, T>(client: Arc<C>, body: F) -> T
    where
        C: ResourceClient + 'static,
        F: FnOnce(ResourceSession) -> Fut,
        Fut: Future<Output = T>,
    {
        let session = ResourceSession::new(client);
        let outcome = AssertUnwindSafe(body(session.clone())).catch_unwind().await;
        let report = session.release().await;
        if !report.is_clean() {
            tracing::warn!(failed = report.failed.len(), "session released with failures");
        }
        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ResourceKind, ObjectKey)>> {
        self.owned.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ResourceSession {
    fn drop(&mut self) {
        // Only the last handle reports; earlier clones dropping is normal.
        if Arc::strong_count(&self.owned) == 1 {
            let leaked = self.lock().len();
            if leaked > 0 {
                tracing::warn!(leaked, "resource session dropped without release");
            }
        }
    }
}
