//! Error type returned by a wait
use std::fmt;
use std::time::Duration;

/// Why a wait did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError<E> {
    /// The deadline passed while the predicate was still pending.
    ///
    /// `reason` is the pending reason from the final attempt and is also the whole `Display`
    /// output, so a failing caller reports the last observed mismatch rather than "timed out".
    NotReady { reason: String, attempts: usize, elapsed: Duration },
    /// The predicate reported a fatal failure; it was not retried.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for WaitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady { reason, .. } => f.write_str(reason),
            Self::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for WaitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(e) => Some(e),
            Self::NotReady { .. } => None,
        }
    }
}

impl<E> WaitError<E> {
    /// Check if the deadline ran out
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
    /// Check if the predicate failed fatally
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
    /// Last pending reason, if the deadline ran out.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::NotReady { reason, .. } => Some(reason),
            Self::Failed(_) => None,
        }
    }
    /// Number of predicate invocations made before giving up, if the deadline ran out.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            Self::NotReady { attempts, .. } => Some(*attempts),
            Self::Failed(_) => None,
        }
    }
    /// Time spent waiting, as measured by the policy's clock.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::NotReady { elapsed, .. } => Some(*elapsed),
            Self::Failed(_) => None,
        }
    }
    /// Get the fatal error if this is a `Failed` variant
    pub fn into_failed(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::NotReady { .. } => None,
        }
    }
    /// Map the fatal error type, keeping timeouts untouched.
    pub fn map_failed<G, F: FnOnce(E) -> G>(self, f: F) -> WaitError<G> {
        match self {
            Self::Failed(e) => WaitError::Failed(f(e)),
            Self::NotReady { reason, attempts, elapsed } => {
                WaitError::NotReady { reason, attempts, elapsed }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn not_ready_display_is_reason_verbatim() {
        let err: WaitError<io::Error> = WaitError::NotReady {
            reason: "Service returned 503: upstream connect error".into(),
            attempts: 7,
            elapsed: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "Service returned 503: upstream connect error");
        assert!(err.source().is_none());
    }

    #[test]
    fn failed_display_and_source_are_inner() {
        let err = WaitError::Failed(io::Error::new(io::ErrorKind::Other, "forbidden"));
        assert_eq!(err.to_string(), "forbidden");
        assert!(err.source().is_some());
        assert!(err.is_failed());
        assert!(err.attempts().is_none());
    }

    #[test]
    fn accessors_return_expected_data() {
        let err: WaitError<()> = WaitError::NotReady {
            reason: "still pending".into(),
            attempts: 3,
            elapsed: Duration::from_millis(200),
        };
        assert!(err.is_not_ready());
        assert_eq!(err.reason(), Some("still pending"));
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.elapsed(), Some(Duration::from_millis(200)));
        assert!(err.clone().into_failed().is_none());

        let mapped: WaitError<String> = WaitError::<u8>::Failed(4).map_failed(|n| n.to_string());
        assert_eq!(mapped.into_failed().as_deref(), Some("4"));
    }
}
