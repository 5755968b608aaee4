//! Failure classification and backoff schedule for embedding provider calls.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Upper bound for any single wait, including provider-supplied hints.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponent cap so `delay * 2^retry` cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// A single failed attempt against the embedding provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderFailure {
    /// HTTP 429, with the provider's retry hint if it sent one.
    RateLimited { retry_after: Option<Duration> },
    /// HTTP 5xx.
    Server { status: u16, body: String },
    /// HTTP 4xx other than 429.
    Client { status: u16, body: String },
    /// Connection refused/reset, DNS failure and similar.
    Network(String),
    Timeout,
    /// 2xx response that did not contain `data[0].embedding`.
    MalformedResponse(String),
    /// The request could not be built, e.g. an unparsable endpoint URL.
    InvalidRequest(String),
}

impl ProviderFailure {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: String) -> Self {
        match status {
            429 => ProviderFailure::RateLimited { retry_after },
            500..=599 => ProviderFailure::Server { status, body },
            _ => ProviderFailure::Client { status, body },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderFailure::RateLimited { .. }
                | ProviderFailure::Server { .. }
                | ProviderFailure::Network(_)
                | ProviderFailure::Timeout
        )
    }

    /// Convert the last observed failure into the caller-facing error.
    pub fn into_error(self, attempts: u32) -> ApiError {
        let message = self.to_string();
        match self {
            ProviderFailure::RateLimited { .. } => {
                ApiError::RateLimitExceeded { attempts, message }
            }
            ProviderFailure::Server { .. }
            | ProviderFailure::Network(_)
            | ProviderFailure::Timeout => ApiError::TransientProvider { attempts, message },
            ProviderFailure::Client { status, .. } => ApiError::PermanentProvider {
                status: Some(status),
                message,
            },
            ProviderFailure::MalformedResponse(_) | ProviderFailure::InvalidRequest(_) => {
                ApiError::PermanentProvider {
                    status: None,
                    message,
                }
            }
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::RateLimited {
                retry_after: Some(delay),
            } => write!(f, "HTTP 429 rate limited (retry after {}ms)", delay.as_millis()),
            ProviderFailure::RateLimited { retry_after: None } => {
                write!(f, "HTTP 429 rate limited")
            }
            ProviderFailure::Server { status, body } => {
                write!(f, "HTTP {} server error: {}", status, truncate(body))
            }
            ProviderFailure::Client { status, body } => {
                write!(f, "HTTP {} client error: {}", status, truncate(body))
            }
            ProviderFailure::Network(detail) => write!(f, "network error: {}", detail),
            ProviderFailure::Timeout => write!(f, "request timed out"),
            ProviderFailure::MalformedResponse(detail) => {
                write!(f, "malformed embedding response: {}", detail)
            }
            ProviderFailure::InvalidRequest(detail) => write!(f, "invalid request: {}", detail),
        }
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Parse the provider's retry hint.
///
/// Azure sends `retry-after-ms`; plain `Retry-After` may be delta-seconds
/// or an HTTP-date. The millisecond header wins when both are present.
pub fn parse_retry_after(
    retry_after_ms: Option<&str>,
    retry_after: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    if let Some(ms) = retry_after_ms.and_then(|v| v.trim().parse::<u64>().ok()) {
        return Some(Duration::from_millis(ms));
    }

    let value = retry_after?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Per-call retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Base wait before retrying a 5xx or network failure.
    pub base_delay: Duration,
    /// Base wait before retrying a 429 without a retry hint.
    pub rate_limit_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, rate_limit_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            rate_limit_delay,
        }
    }

    /// How long to wait before the next attempt, or `None` to give up.
    ///
    /// `retries_done` is the number of retries already spent on this call.
    pub fn next_delay(&self, retries_done: u32, failure: &ProviderFailure) -> Option<Duration> {
        if !failure.is_retryable() || retries_done >= self.max_retries {
            return None;
        }

        let delay = match failure {
            ProviderFailure::RateLimited {
                retry_after: Some(hint),
            } => *hint,
            ProviderFailure::RateLimited { retry_after: None } => {
                exponential(self.rate_limit_delay, retries_done)
            }
            _ => exponential(self.base_delay, retries_done),
        };

        Some(delay.min(MAX_BACKOFF))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(2_000), Duration::from_millis(1_000))
    }
}

fn exponential(base: Duration, retries_done: u32) -> Duration {
    base.saturating_mul(2u32.pow(retries_done.min(MAX_BACKOFF_EXPONENT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(50))
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            ProviderFailure::from_status(429, None, String::new()),
            ProviderFailure::RateLimited { retry_after: None }
        );
        assert!(matches!(
            ProviderFailure::from_status(503, None, "busy".into()),
            ProviderFailure::Server { status: 503, .. }
        ));
        assert!(matches!(
            ProviderFailure::from_status(401, None, "bad key".into()),
            ProviderFailure::Client { status: 401, .. }
        ));
    }

    #[test]
    fn test_transient_backoff_doubles() {
        let failure = ProviderFailure::Server {
            status: 500,
            body: String::new(),
        };

        assert_eq!(
            policy().next_delay(0, &failure),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            policy().next_delay(1, &failure),
            Some(Duration::from_millis(200))
        );
        assert_eq!(
            policy().next_delay(2, &failure),
            Some(Duration::from_millis(400))
        );
        assert_eq!(policy().next_delay(3, &failure), None);
    }

    #[test]
    fn test_rate_limit_prefers_provider_hint() {
        let hinted = ProviderFailure::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        let unhinted = ProviderFailure::RateLimited { retry_after: None };

        assert_eq!(policy().next_delay(2, &hinted), Some(Duration::from_secs(3)));
        assert_eq!(
            policy().next_delay(2, &unhinted),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn test_provider_hint_is_capped() {
        let failure = ProviderFailure::RateLimited {
            retry_after: Some(Duration::from_secs(3_600)),
        };

        assert_eq!(policy().next_delay(0, &failure), Some(MAX_BACKOFF));
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let failure = ProviderFailure::Client {
            status: 400,
            body: "bad request".into(),
        };

        assert_eq!(policy().next_delay(0, &failure), None);
        assert_eq!(
            policy().next_delay(0, &ProviderFailure::MalformedResponse("empty".into())),
            None
        );
    }

    #[test]
    fn test_zero_retries_never_waits() {
        let policy = RetryPolicy::new(0, Duration::from_millis(100), Duration::from_millis(50));

        assert_eq!(policy.next_delay(0, &ProviderFailure::Timeout), None);
    }

    #[test]
    fn test_failures_map_to_error_kinds() {
        assert!(matches!(
            ProviderFailure::RateLimited { retry_after: None }.into_error(4),
            ApiError::RateLimitExceeded { attempts: 4, .. }
        ));
        assert!(matches!(
            ProviderFailure::Network("connection reset".into()).into_error(2),
            ApiError::TransientProvider { attempts: 2, .. }
        ));
        assert!(matches!(
            ProviderFailure::Client {
                status: 403,
                body: String::new()
            }
            .into_error(1),
            ApiError::PermanentProvider {
                status: Some(403),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_retry_after_variants() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(
            parse_retry_after(Some("1500"), Some("9"), now),
            Some(Duration::from_millis(1_500))
        );
        assert_eq!(
            parse_retry_after(None, Some("7"), now),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            parse_retry_after(None, Some("Wed, 01 May 2024 12:00:10 GMT"), now),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            parse_retry_after(None, Some("Wed, 01 May 2024 11:00:00 GMT"), now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after(None, Some("soon"), now), None);
        assert_eq!(parse_retry_after(None, None, now), None);
    }
}
