#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # convergence
//!
//! Poll-until-ready primitives for tests that drive an asynchronously reconciled control plane.
//!
//! ## Features
//!
//! - **Eventual-condition waiter**: fixed-interval polling with a hard deadline; a timeout
//!   surfaces the last observed reason, not a generic "timed out"
//! - **Three-way checks**: predicates say `Ready`, `Pending` or `Failed`, so only "not yet" is
//!   ever retried
//! - **Status probes**: service URL resolution, model response and transition-status waits
//! - **Resource sessions**: everything a test creates is deleted on every exit path
//! - **Deterministic time** via injectable clocks and sleepers
//!
//! ## Quick Start
//!
//! ```rust
//! use convergence::{Check, WaitPolicy};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let policy = WaitPolicy::new(Duration::from_secs(1), Duration::from_millis(10)).unwrap();
//!
//!     let result = policy
//!         .execute(|| async {
//!             // Look at the system under test here
//!             Check::<_, std::io::Error>::Ready("converged")
//!         })
//!         .await;
//!     assert_eq!(result.unwrap(), "converged");
//! }
//! ```

pub mod check;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod naming;
pub mod presets;
pub mod prelude;
pub mod probe;
pub mod resource;
pub mod session;
pub mod sleeper;
pub mod status;
pub mod wait;

// Re-exports
pub use check::Check;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::SuiteConfig;
pub use error::WaitError;
pub use probe::{
    deploy_and_probe, wait_for_model_response, wait_for_transition_status, ModelResponseOptions,
    ProbeError, ResponseCheck,
};
pub use resource::{ApiError, InMemoryClient, ObjectKey, ResourceClient, ResourceKind};
pub use session::ResourceSession;
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use status::resolve_url;
pub use wait::{wait_for, wait_for_blocking, WaitPolicy, WaitPolicyBuilder};
