//! Typed views over the parts of a resource's `status` the probes read.
//!
//! Only the fields used for readiness decisions are modelled; everything else in the status is
//! ignored on deserialization.

use serde::Deserialize;
use serde_json::Value;

/// Addressing fields of a serving resource's status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddressStatus {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub addresses: Option<Vec<Address>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub url: Option<String>,
}

/// `status.modelStatus` of an `InferenceService`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    #[serde(default)]
    pub transition_status: Option<String>,
    #[serde(default)]
    pub last_failure_info: Option<FailureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FailureInfo {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ModelStatus {
    /// Read `status.modelStatus` from a whole resource. Missing or malformed parts read as empty.
    pub fn of(resource: &Value) -> Self {
        resource
            .get("status")
            .and_then(|status| status.get("modelStatus"))
            .and_then(|model| ModelStatus::deserialize(model).ok())
            .unwrap_or_default()
    }

    pub fn transition_status(&self) -> Option<&str> {
        self.transition_status.as_deref()
    }

    /// Last failure message, or `""` when none was reported.
    pub fn failure_message(&self) -> &str {
        self.last_failure_info.as_ref().and_then(|info| info.message.as_deref()).unwrap_or("")
    }
}

/// Why no URL could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("No status found in {0}")]
    NoStatus(String),
    #[error("No URL found in {0} status")]
    NoUrl(String),
    #[error("Malformed status in {name}: {message}")]
    Malformed { name: String, message: String },
}

/// Resolve the externally reachable URL of `name` from its resource.
///
/// A non-empty `status.url` wins. Otherwise the `url` of the first entry of `status.addresses` is
/// used; later entries are never considered.
pub fn resolve_url(name: &str, resource: &Value) -> Result<String, UrlError> {
    let status = match resource.get("status") {
        Some(status) if !status.is_null() => status,
        _ => return Err(UrlError::NoStatus(name.to_string())),
    };
    let status = AddressStatus::deserialize(status)
        .map_err(|e| UrlError::Malformed { name: name.to_string(), message: e.to_string() })?;

    if let Some(url) = status.url.filter(|url| !url.is_empty()) {
        return Ok(url);
    }
    status
        .addresses
        .and_then(|addresses| addresses.into_iter().next())
        .and_then(|first| first.url)
        .ok_or_else(|| UrlError::NoUrl(name.to_string()))
}
