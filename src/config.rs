//! Suite-level settings: where test resources live and how long waits may take.
//!
//! Values come from defaults, optionally overlaid by a JSON document, then by environment
//! variables:
//!
//! | variable | field |
//! |---|---|
//! | `KSERVE_TEST_NAMESPACE` | `namespace` |
//! | `KUBECONFIG` | `kubeconfig` |
//! | `CONVERGENCE_WAIT_TIMEOUT_SECS` | `wait.timeout_secs` |
//! | `CONVERGENCE_WAIT_INTERVAL_SECS` | `wait.interval_secs` |

use crate::wait::{BuildError, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
use crate::WaitPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_NAMESPACE: &str = "kserve-ci-e2e-test";

pub const ENV_NAMESPACE: &str = "KSERVE_TEST_NAMESPACE";
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";
pub const ENV_WAIT_TIMEOUT: &str = "CONVERGENCE_WAIT_TIMEOUT_SECS";
pub const ENV_WAIT_INTERVAL: &str = "CONVERGENCE_WAIT_INTERVAL_SECS";

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a number of seconds (got {value:?})")]
    InvalidNumber { var: &'static str, value: String },
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid wait settings: {0}")]
    Wait(#[from] BuildError),
}

/// Default wait timing, in float seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_secs: f64,
    pub interval_secs: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
            interval_secs: DEFAULT_INTERVAL.as_secs_f64(),
        }
    }
}

impl WaitConfig {
    pub fn policy(&self) -> Result<WaitPolicy, BuildError> {
        WaitPolicy::from_secs_f64(self.timeout_secs, self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Namespace test resources are created in.
    pub namespace: String,
    /// Kubeconfig to hand to the cluster client; `None` means the client's own default.
    pub kubeconfig: Option<PathBuf>,
    pub wait: WaitConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self { namespace: DEFAULT_NAMESPACE.to_string(), kubeconfig: None, wait: WaitConfig::default() }
    }
}

impl SuiteConfig {
    /// Defaults overlaid by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.wait.policy()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (usually the environment). Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(namespace) = get(ENV_NAMESPACE) {
            self.namespace = namespace;
        }
        if let Some(path) = get(ENV_KUBECONFIG) {
            self.kubeconfig = Some(PathBuf::from(path));
        }
        if let Some(value) = get(ENV_WAIT_TIMEOUT) {
            self.wait.timeout_secs = parse_secs(ENV_WAIT_TIMEOUT, &value)?;
        }
        if let Some(value) = get(ENV_WAIT_INTERVAL) {
            self.wait.interval_secs = parse_secs(ENV_WAIT_INTERVAL, &value)?;
        }
        self.wait.policy()?;
        tracing::debug!(namespace = %self.namespace, wait = ?self.wait, "suite configuration loaded");
        Ok(self)
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber { var, value: value.to_string() })
}
