//! The three-way result a polled predicate reports back to the waiter.
//!
//! A predicate either has its answer (`Ready`), has not converged yet (`Pending`, retried until
//! the deadline) or has hit something retrying cannot fix (`Failed`, surfaced at once). Keeping
//! "not yet" out of the error channel means retryability is decided by the predicate's author and
//! never by inspecting an error's type.

use std::fmt;

/// Outcome of one predicate attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check<T, E> {
    /// Condition met; the wait returns this value.
    Ready(T),
    /// Condition not met yet. The reason is what a caller sees if the deadline passes.
    Pending(String),
    /// Condition can never be met by retrying.
    Failed(E),
}

impl<T, E> Check<T, E> {
    /// Shorthand for `Check::Pending(reason.into())`.
    pub fn pending(reason: impl Into<String>) -> Self {
        Check::Pending(reason.into())
    }

    /// Turn any error into a pending reason prefixed with `context`.
    ///
    /// Used where the failure is expected to heal while the control plane converges, e.g. a
    /// resource that has not been created yet.
    pub fn pending_on_err<R: fmt::Display>(result: Result<T, R>, context: &str) -> Self {
        match result {
            Ok(value) => Check::Ready(value),
            Err(e) => Check::Pending(format!("{context}: {e}")),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Check::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Check::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Check::Failed(_))
    }

    /// The pending reason, if this is `Pending`.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Check::Pending(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Check<U, E> {
        match self {
            Check::Ready(v) => Check::Ready(f(v)),
            Check::Pending(r) => Check::Pending(r),
            Check::Failed(e) => Check::Failed(e),
        }
    }

    pub fn map_err<G, F: FnOnce(E) -> G>(self, f: F) -> Check<T, G> {
        match self {
            Check::Ready(v) => Check::Ready(v),
            Check::Pending(r) => Check::Pending(r),
            Check::Failed(e) => Check::Failed(f(e)),
        }
    }

    /// Chain a further check onto a ready value.
    pub fn and_then<U, F: FnOnce(T) -> Check<U, E>>(self, f: F) -> Check<U, E> {
        match self {
            Check::Ready(v) => f(v),
            Check::Pending(r) => Check::Pending(r),
            Check::Failed(e) => Check::Failed(e),
        }
    }
}

impl<E> Check<(), E> {
    /// `Ready(())` when `condition` holds, otherwise `Pending` with the lazily built reason.
    pub fn ensure<F, S>(condition: bool, reason: F) -> Self
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        if condition {
            Check::Ready(())
        } else {
            Check::Pending(reason().into())
        }
    }
}

/// Errors are fatal by default: `Err(e)` becomes `Failed(e)`.
impl<T, E> From<Result<T, E>> for Check<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Check::Ready(v),
            Err(e) => Check::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_conversion_treats_errors_as_fatal() {
        let ok: Check<u8, &str> = Ok(1).into();
        let err: Check<u8, &str> = Err("boom").into();
        assert_eq!(ok, Check::Ready(1));
        assert_eq!(err, Check::Failed("boom"));
    }

    #[test]
    fn pending_on_err_prefixes_context() {
        let check: Check<u8, ()> =
            Check::pending_on_err(Err::<u8, _>("connection refused"), "Failed to call model");
        assert_eq!(check.reason(), Some("Failed to call model: connection refused"));
    }

    #[test]
    fn ensure_builds_reason_only_when_pending() {
        let ready: Check<(), ()> = Check::ensure(true, || -> String { unreachable!() });
        assert!(ready.is_ready());

        let pending: Check<(), ()> = Check::ensure(false, || "Service returned 503");
        assert_eq!(pending.reason(), Some("Service returned 503"));
    }

    #[test]
    fn and_then_short_circuits() {
        let pending: Check<u8, ()> = Check::pending("not ready");
        let chained = pending.and_then(|v| Check::Ready(v + 1));
        assert_eq!(chained.reason(), Some("not ready"));

        let ready: Check<u8, ()> = Check::Ready(1);
        assert_eq!(ready.and_then(|v| Check::<u8, ()>::Ready(v + 1)), Check::Ready(2));
    }
}
