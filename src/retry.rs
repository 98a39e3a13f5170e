//! Retry decisions: pure classification plus jittered exponential backoff.

use std::time::Duration;

use crate::config::BackoffConfig;
use crate::error::ClientError;

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Re-send after sleeping for the given delay.
    Retry(Duration),
    /// Stop and surface this error to the caller.
    GiveUp(ClientError),
}

/// Decides whether a failed attempt is retried and how long to wait.
///
/// Retryable: timeouts, connection failures, 429 and 5xx provider errors.
/// Everything else gives up unchanged on first occurrence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: BackoffConfig,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffConfig) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Decide the fate of attempt `attempt` (0-based) that ended in `failure`.
    pub fn decide(&self, attempt: u32, failure: ClientError) -> RetryDecision {
        if !is_retryable(&failure) {
            return RetryDecision::GiveUp(failure);
        }
        if attempt >= self.max_retries {
            return RetryDecision::GiveUp(ClientError::RetriesExhausted {
                attempts: attempt + 1,
                source: Box::new(failure),
            });
        }
        RetryDecision::Retry(self.delay_for(attempt, retry_after_hint(&failure)))
    }

    /// Backoff delay for the given attempt: `base * 2^attempt` plus uniform
    /// jitter in `[0, base)`, never exceeding the configured ceiling. A
    /// provider-supplied `Retry-After` overrides the computed delay, still
    /// capped.
    fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.backoff.max);
        }
        let base = self.backoff.base.as_secs_f64();
        let exponential = base * 2_f64.powi(attempt.min(16) as i32);
        let jitter = rand::random::<f64>() * base;
        let delay = (exponential + jitter).min(self.backoff.max.as_secs_f64());
        Duration::from_secs_f64(delay)
    }
}

fn is_retryable(failure: &ClientError) -> bool {
    match failure {
        ClientError::Timeout | ClientError::Connection(_) | ClientError::RateLimited { .. } => true,
        ClientError::Provider { status, .. } => *status >= 500,
        _ => false,
    }
}

fn retry_after_hint(failure: &ClientError) -> Option<Duration> {
    match failure {
        ClientError::RateLimited { retry_after, .. } => *retry_after,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            BackoffConfig {
                base: Duration::from_millis(100),
                max: Duration::from_secs(2),
            },
        )
    }

    #[test]
    fn retries_timeouts_until_the_budget_is_spent() {
        let policy = policy(3);
        for attempt in 0..3 {
            assert!(matches!(
                policy.decide(attempt, ClientError::Timeout),
                RetryDecision::Retry(_)
            ));
        }
        match policy.decide(3, ClientError::Timeout) {
            RetryDecision::GiveUp(ClientError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, ClientError::Timeout));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn zero_retries_gives_up_immediately() {
        let policy = policy(0);
        assert!(matches!(
            policy.decide(0, ClientError::Timeout),
            RetryDecision::GiveUp(ClientError::RetriesExhausted { attempts: 1, .. })
        ));
    }

    #[test]
    fn auth_failures_never_retry() {
        let policy = policy(5);
        match policy.decide(0, ClientError::Auth { status: 401 }) {
            RetryDecision::GiveUp(ClientError::Auth { status: 401 }) => {}
            other => panic!("expected unchanged auth error, got {other:?}"),
        }
    }

    #[test]
    fn client_side_4xx_never_retries() {
        let policy = policy(5);
        let failure = ClientError::Provider {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(matches!(
            policy.decide(0, failure),
            RetryDecision::GiveUp(ClientError::Provider { status: 400, .. })
        ));
    }

    #[test]
    fn malformed_responses_never_retry() {
        let policy = policy(5);
        let failure = ClientError::MalformedResponse {
            status: 200,
            snippet: "{}".to_string(),
        };
        assert!(matches!(
            policy.decide(0, failure),
            RetryDecision::GiveUp(ClientError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn server_errors_and_rate_limits_retry() {
        let policy = policy(2);
        let server = ClientError::Provider {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(matches!(policy.decide(0, server), RetryDecision::Retry(_)));
        let limited = ClientError::RateLimited {
            message: String::new(),
            retry_after: None,
        };
        assert!(matches!(policy.decide(0, limited), RetryDecision::Retry(_)));
    }

    #[test]
    fn delays_grow_in_expectation_and_stay_under_the_ceiling() {
        let backoff = BackoffConfig {
            base: Duration::from_millis(100),
            max: Duration::from_secs(2),
        };
        let policy = RetryPolicy::new(10, backoff.clone());
        let mut previous_floor = Duration::ZERO;
        for attempt in 0..8 {
            let delay = policy.delay_for(attempt, None);
            let floor = Duration::from_secs_f64(
                (backoff.base.as_secs_f64() * 2_f64.powi(attempt as i32))
                    .min(backoff.max.as_secs_f64()),
            );
            assert!(delay >= floor, "attempt {attempt}: {delay:?} < {floor:?}");
            assert!(delay <= backoff.max, "attempt {attempt}: {delay:?} over cap");
            assert!(floor >= previous_floor);
            previous_floor = floor;
        }
    }

    #[test]
    fn retry_after_hint_overrides_backoff_and_is_capped() {
        let policy = policy(3);
        let limited = ClientError::RateLimited {
            message: String::new(),
            retry_after: Some(Duration::from_millis(700)),
        };
        match policy.decide(0, limited) {
            RetryDecision::Retry(delay) => assert_eq!(delay, Duration::from_millis(700)),
            other => panic!("expected retry, got {other:?}"),
        }

        let excessive = ClientError::RateLimited {
            message: String::new(),
            retry_after: Some(Duration::from_secs(600)),
        };
        match policy.decide(0, excessive) {
            RetryDecision::Retry(delay) => assert_eq!(delay, Duration::from_secs(2)),
            other => panic!("expected retry, got {other:?}"),
        }
    }
}
