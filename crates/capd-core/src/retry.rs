//! Bounded retry and readiness polling.
//!
//! Both combinators use a fixed interval: no backoff growth and no sleep after
//! the final attempt. The whole process blocks while they wait.

use std::time::Duration;

use crate::error::{CapdError, ExternalError};

/// Attempt budget and fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep between consecutive attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on the time spent sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts().saturating_sub(1)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Invoke `op` until it succeeds, it fails with a non-retryable error, or the
/// attempt budget runs out. The last error is returned on exhaustion.
pub fn retry<T, E, F, P>(policy: &RetryPolicy, mut is_retryable: P, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: FnMut(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_retryable(&e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    "retryable failure, retrying in {:?}: {e}",
                    policy.interval
                );
                std::thread::sleep(policy.interval);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Poll until `poll` reports ready.
///
/// A poll failure classified as transient counts as "not ready yet"; any other
/// failure aborts the wait.
///
/// # Errors
///
/// - [`CapdError::ResourceNotReady`] after `max_attempts` unsuccessful polls.
/// - [`CapdError::External`] for a non-transient poll failure.
pub fn wait_until_ready<F>(what: &str, policy: &RetryPolicy, mut poll: F) -> Result<(), CapdError>
where
    F: FnMut() -> Result<bool, ExternalError>,
{
    let attempts = policy.attempts();
    for attempt in 1..=attempts {
        match poll() {
            Ok(true) => {
                tracing::info!(what, attempt, "ready");
                return Ok(());
            }
            Ok(false) => tracing::debug!(what, attempt, max_attempts = attempts, "not ready yet"),
            Err(e) if e.is_transient() => {
                tracing::debug!(what, attempt, "poll reported transient failure: {e}")
            }
            Err(e) => return Err(CapdError::External(e)),
        }
        if attempt < attempts {
            std::thread::sleep(policy.interval);
        }
    }
    Err(CapdError::ResourceNotReady {
        what: what.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FailureKind;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    fn external(kind: FailureKind) -> ExternalError {
        ExternalError {
            kind,
            command: "az containerapp env show".to_string(),
            status: Some(1),
            stderr: "ERROR".to_string(),
        }
    }

    #[test]
    fn budget_excludes_trailing_sleep() {
        let p = RetryPolicy::new(30, Duration::from_secs(10));
        assert_eq!(p.budget(), Duration::from_secs(290));
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(5)).budget(), Duration::ZERO);
    }

    #[test]
    fn wait_succeeds_on_first_true() {
        let mut polls = 0;
        wait_until_ready("env", &instant(5), || {
            polls += 1;
            Ok(polls == 3)
        })
        .unwrap();
        assert_eq!(polls, 3);
    }

    #[test]
    fn wait_exhausts_after_max_attempts() {
        let mut polls = 0;
        let err = wait_until_ready("env", &instant(4), || {
            polls += 1;
            Ok(false)
        })
        .unwrap_err();
        assert_eq!(polls, 4);
        match err {
            CapdError::ResourceNotReady { what, attempts } => {
                assert_eq!(what, "env");
                assert_eq!(attempts, 4);
            }
            other => panic!("expected not-ready, got {other:?}"),
        }
    }

    #[test]
    fn wait_treats_transient_failure_as_not_ready() {
        let mut polls = 0;
        wait_until_ready("app", &instant(3), || {
            polls += 1;
            if polls == 1 {
                Err(external(FailureKind::TransientNotReady))
            } else {
                Ok(true)
            }
        })
        .unwrap();
        assert_eq!(polls, 2);
    }

    #[test]
    fn wait_aborts_on_fatal_failure() {
        let mut polls = 0;
        let err = wait_until_ready("app", &instant(5), || {
            polls += 1;
            Err(external(FailureKind::Fatal))
        })
        .unwrap_err();
        assert_eq!(polls, 1);
        assert!(matches!(err, CapdError::External(_)));
    }

    #[test]
    fn zero_attempts_still_polls_once() {
        let mut polls = 0;
        let _ = wait_until_ready("x", &instant(0), || {
            polls += 1;
            Ok(false)
        });
        assert_eq!(polls, 1);
    }

    #[test]
    fn retry_stops_on_success() {
        let mut calls = 0;
        let got: Result<u32, ExternalError> = retry(&instant(5), ExternalError::is_transient, || {
            calls += 1;
            if calls < 3 {
                Err(external(FailureKind::TransientNotReady))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(got.unwrap(), 3);
    }

    #[test]
    fn retry_returns_non_retryable_immediately() {
        let mut calls = 0;
        let got: Result<(), ExternalError> = retry(&instant(5), ExternalError::is_transient, || {
            calls += 1;
            Err(external(FailureKind::Fatal))
        });
        assert_eq!(calls, 1);
        assert_eq!(got.unwrap_err().kind, FailureKind::Fatal);
    }

    #[test]
    fn retry_returns_last_error_on_exhaustion() {
        let mut calls = 0;
        let got: Result<(), ExternalError> = retry(&instant(3), ExternalError::is_transient, || {
            calls += 1;
            Err(external(FailureKind::TransientNotReady))
        });
        assert_eq!(calls, 3);
        assert!(got.unwrap_err().is_transient());
    }
}
