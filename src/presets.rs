//! Wait policies tuned for common control-plane waits.
//!
//! ## Available Presets
//!
//! - [`quick`]: in-process conditions and fast API round-trips (5s deadline, 100ms interval)
//! - [`model_response`]: a model server coming up behind its route (10 minutes, 10s interval)
//! - [`model_status`]: a model reaching a transition status (11 minutes, 10s interval)
//!
//! ```rust
//! use convergence::presets;
//! use std::time::Duration;
//!
//! let policy = presets::model_status();
//! assert_eq!(policy.timeout(), Duration::from_secs(660));
//! ```

use crate::WaitPolicy;
use std::time::Duration;

const QUICK_TIMEOUT_MILLIS: u64 = 5_000;
const QUICK_INTERVAL_MILLIS: u64 = 100;

const MODEL_RESPONSE_TIMEOUT_SECS: u64 = 600;
const MODEL_RESPONSE_INTERVAL_SECS: u64 = 10;

// Default progressDeadlineSeconds (600) plus a minute of slack.
const MODEL_STATUS_TIMEOUT_SECS: u64 = 660;
const MODEL_STATUS_INTERVAL_SECS: u64 = 10;

/// Same as `WaitPolicy::default()`.
pub fn quick() -> WaitPolicy {
    fixed(Duration::from_millis(QUICK_TIMEOUT_MILLIS), Duration::from_millis(QUICK_INTERVAL_MILLIS))
}

/// Waiting for a freshly created service to answer a completion request.
///
/// Image pulls and model downloads dominate, so attempts are spaced out.
pub fn model_response() -> WaitPolicy {
    fixed(
        Duration::from_secs(MODEL_RESPONSE_TIMEOUT_SECS),
        Duration::from_secs(MODEL_RESPONSE_INTERVAL_SECS),
    )
}

/// Waiting for a model's transition status, e.g. `UpToDate` or `BlockedByFailedLoad`.
pub fn model_status() -> WaitPolicy {
    fixed(
        Duration::from_secs(MODEL_STATUS_TIMEOUT_SECS),
        Duration::from_secs(MODEL_STATUS_INTERVAL_SECS),
    )
}

fn fixed(timeout: Duration, interval: Duration) -> WaitPolicy {
    // The interval constants above are non-zero, which is the only thing `build` checks.
    WaitPolicy::builder().timeout(timeout).interval(interval).build().unwrap_or_default()
}
