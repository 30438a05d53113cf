//! Readiness probes built on the waiter.
//!
//! - [`wait_for_model_response`]: resolve a serving resource's URL and wait until it answers a
//!   completion request.
//! - [`wait_for_transition_status`]: wait until a model reports a given transition status, and
//!   optionally a given failure message.
//! - [`deploy_and_probe`]: create a resource, wait for it to answer, collect diagnostics on
//!   failure and delete it again.

use crate::diagnostics::collect_diagnostics;
use crate::naming::DEFAULT_MODEL_NAME;
use crate::resource::{ApiError, ObjectKey, ResourceClient, ResourceKind};
use crate::session::ResourceSession;
use crate::status::{resolve_url, ModelStatus};
use crate::{presets, Check, WaitError, WaitPolicy};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Path of the OpenAI-compatible completions endpoint, relative to the service URL.
pub const COMPLETIONS_PATH: &str = "/v1/completions";

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// The request never produced a response (connect, TLS, timeout, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends a JSON request to a model endpoint.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError>;
}

/// What a 200 response must additionally look like to count as "the model responds".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseCheck {
    /// Any 200 response.
    #[default]
    StatusOnly,
    /// The body must be JSON with a non-empty `choices` array.
    Choices,
}

impl ResponseCheck {
    fn verify(self, reply: &HttpReply) -> Result<(), String> {
        match self {
            ResponseCheck::StatusOnly => Ok(()),
            ResponseCheck::Choices => {
                let body: Value = serde_json::from_str(&reply.body)
                    .map_err(|e| format!("Service returned non-JSON body ({e}): {}", reply.body))?;
                match body.get("choices").and_then(Value::as_array) {
                    Some(choices) if !choices.is_empty() => Ok(()),
                    _ => Err(format!("Service returned no choices: {}", reply.body)),
                }
            }
        }
    }
}

/// Knobs for [`wait_for_model_response`].
#[derive(Debug, Clone)]
pub struct ModelResponseOptions {
    /// Sent as `model` in the completion request.
    pub model_name: String,
    pub prompt: String,
    pub response_check: ResponseCheck,
    pub policy: WaitPolicy,
}

impl Default for ModelResponseOptions {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            prompt: "test".to_string(),
            response_check: ResponseCheck::default(),
            policy: presets::model_response(),
        }
    }
}

impl ModelResponseOptions {
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn response_check(mut self, check: ResponseCheck) -> Self {
        self.response_check = check;
        self
    }

    pub fn policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// A transition status that was never reached, with what was observed last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMismatch {
    pub name: String,
    pub expected_status: String,
    pub expected_message: Option<String>,
    pub actual_status: Option<String>,
    pub actual_message: String,
}

impl fmt::Display for StatusMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actual_status = self.actual_status.as_deref().unwrap_or("<none>");
        match &self.expected_message {
            Some(expected_message) => write!(
                f,
                "Expected {} to have model transition status '{}' and last failure info '{}' \
                 after timeout, but got model transition status '{}' and last failure info '{}'",
                self.name,
                self.expected_status,
                expected_message,
                actual_status,
                self.actual_message
            ),
            None => write!(
                f,
                "Expected {} to have model transition status '{}' after timeout, but got '{}'",
                self.name, self.expected_status, actual_status
            ),
        }
    }
}

impl std::error::Error for StatusMismatch {}

/// Errors returned by the probes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The deadline passed; `reason` is the last pending reason, verbatim.
    #[error("{reason}")]
    NotReady { reason: String, attempts: usize },
    #[error("{0}")]
    StatusMismatch(StatusMismatch),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ProbeError {
    fn from_wait(err: WaitError<Infallible>) -> Self {
        match err {
            WaitError::NotReady { reason, attempts, .. } => ProbeError::NotReady { reason, attempts },
            WaitError::Failed(never) => match never {},
        }
    }
}

/// Wait until the service behind `key` answers a completion request; returns its URL.
///
/// Every attempt re-reads the resource, so a URL that appears or changes mid-wait is picked up.
/// Nothing here is fatal: a missing resource, an unresolvable URL, a refused connection and a
/// non-200 answer are all treated as "not converged yet".
pub async fn wait_for_model_response<C, T>(
    client: &C,
    transport: &T,
    kind: &ResourceKind,
    key: &ObjectKey,
    options: &ModelResponseOptions,
) -> Result<String, ProbeError>
where
    C: ResourceClient + ?Sized,
    T: CompletionTransport + ?Sized,
{
    let payload = json!({ "model": options.model_name, "prompt": options.prompt, "max_tokens": 1 });
    let last_url: Mutex<Option<String>> = Mutex::new(None);
    let (payload, last_url) = (&payload, &last_url);

    let result = options
        .policy
        .execute(move || async move {
            let resource = match client.get(kind, key).await {
                Ok(resource) => resource,
                Err(e) => return Check::pending(format!("Failed to get service URL: {e}")),
            };
            let url = match resolve_url(&key.name, &resource) {
                Ok(url) => url,
                Err(e) => return Check::pending(format!("Failed to get service URL: {e}")),
            };
            if let Ok(mut last) = last_url.lock() {
                *last = Some(url.clone());
            }

            let endpoint = format!("{}{}", url.trim_end_matches('/'), COMPLETIONS_PATH);
            let reply = match transport.post_json(&endpoint, payload).await {
                Ok(reply) => reply,
                Err(e) => return Check::pending(format!("Failed to call model: {e}")),
            };
            if reply.status != 200 {
                return Check::pending(format!("Service returned {}: {}", reply.status, reply.body));
            }
            match options.response_check.verify(&reply) {
                Ok(()) => Check::<_, Infallible>::Ready(url),
                Err(reason) => Check::Pending(reason),
            }
        })
        .await;

    result.map_err(|err| {
        let last = last_url.lock().ok().and_then(|last| last.clone());
        tracing::error!(%key, url = ?last, error = %err, "model never responded");
        ProbeError::from_wait(err)
    })
}

/// Wait until `status.modelStatus.transitionStatus` equals `expected_status` and, when given,
/// `status.modelStatus.lastFailureInfo.message` contains `expected_failure_message`.
///
/// Statuses are opaque labels compared for equality. API errors end the wait immediately.
/// Returns the matching model status.
pub async fn wait_for_transition_status<C>(
    client: &C,
    kind: &ResourceKind,
    key: &ObjectKey,
    expected_status: &str,
    expected_failure_message: Option<&str>,
    policy: &WaitPolicy,
) -> Result<ModelStatus, ProbeError>
where
    C: ResourceClient + ?Sized,
{
    let observed: Mutex<ModelStatus> = Mutex::new(ModelStatus::default());
    let observed_ref = &observed;

    let result = policy
        .execute(move || async move {
            let resource = match client.get(kind, key).await {
                Ok(resource) => resource,
                Err(e) => return Check::Failed(e),
            };
            let status = ModelStatus::of(&resource);
            if let Ok(mut last) = observed_ref.lock() {
                *last = status.clone();
            }

            let status_matches = status.transition_status() == Some(expected_status);
            let message_matches = match expected_failure_message {
                Some(expected) => status.failure_message().contains(expected),
                None => true,
            };
            if status_matches && message_matches {
                Check::Ready(status)
            } else {
                Check::pending(format!(
                    "transition status '{}' (last failure '{}'), waiting for '{}'",
                    status.transition_status().unwrap_or("<none>"),
                    status.failure_message(),
                    expected_status
                ))
            }
        })
        .await;

    match result {
        Ok(status) => Ok(status),
        Err(WaitError::Failed(e)) => Err(ProbeError::Api(e)),
        Err(WaitError::NotReady { .. }) => {
            let last = observed.lock().map(|s| s.clone()).unwrap_or_default();
            Err(ProbeError::StatusMismatch(StatusMismatch {
                name: key.name.clone(),
                expected_status: expected_status.to_string(),
                expected_message: expected_failure_message.map(str::to_string),
                actual_message: last.failure_message().to_string(),
                actual_status: last.transition_status.clone(),
            }))
        }
    }
}

/// Why [`deploy_and_probe`] failed.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to create {key}: {source}")]
    Create { key: String, source: ApiError },
    #[error("{source}")]
    Probe {
        source: ProbeError,
        /// Output of [`collect_diagnostics`] taken right after the probe gave up.
        diagnostics: String,
    },
}

/// Create `manifest`, wait for it to answer completions, and delete it again.
///
/// On probe failure diagnostics are collected before the resource is deleted. Deletion happens
/// on every path; a failed deletion is logged, not returned.
pub async fn deploy_and_probe<C, T>(
    client: Arc<C>,
    transport: &T,
    kind: &ResourceKind,
    manifest: Value,
    options: &ModelResponseOptions,
) -> Result<String, DeployError>
where
    C: ResourceClient + 'static,
    T: CompletionTransport + ?Sized,
{
    let key = ObjectKey::of(&manifest).ok_or_else(|| DeployError::Create {
        key: "<unnamed>".to_string(),
        source: ApiError::Invalid { kind: kind.kind, message: "metadata.name is required".into() },
    })?;

    ResourceSession::scoped(client, |session| async move {
        session
            .create(kind, manifest)
            .await
            .map_err(|source| DeployError::Create { key: key.to_string(), source })?;

        match wait_for_model_response(session.client(), transport, kind, &key, options).await {
            Ok(url) => Ok(url),
            Err(source) => {
                let diagnostics = collect_diagnostics(session.client(), kind, &key).await;
                Err(DeployError::Probe { source, diagnostics })
            }
        }
    })
    .await
}
