//! Convenient re-exports for common convergence types.
pub use crate::{
    check::Check,
    error::WaitError,
    probe::{
        wait_for_model_response, wait_for_transition_status, CompletionTransport, HttpReply,
        ModelResponseOptions, ProbeError, ResponseCheck, TransportError,
    },
    resource::{ApiError, ObjectKey, ResourceClient, ResourceKind},
    session::ResourceSession,
    status::{resolve_url, ModelStatus, UrlError},
    wait::{wait_for, wait_for_blocking, BuildError, WaitPolicy},
};
