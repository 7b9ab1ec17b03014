//! Retry classification and backoff for Veo submissions.
//!
//! Failures are classified where they are caught: by HTTP status when one
//! exists, by reqwest's connection flags for transport failures, and by
//! message signature only as a fallback.

use std::time::Duration;

use super::service::ServiceErrorKind;

/// Default number of submission attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first resubmission (30 seconds), doubled on each retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Cap on a single backoff delay (10 minutes).
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(600);

/// HTTP status code for rate limiting.
const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// HTTP status code for bad gateway.
const HTTP_STATUS_BAD_GATEWAY: u16 = 502;

/// HTTP status code for service unavailable.
const HTTP_STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// Signatures of transient failures in error text that carries no status.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "502",
    "503",
    "429",
    "bad gateway",
    "service unavailable",
    "too many requests",
];

/// Classify an HTTP status code.
pub fn classify_status(status: u16) -> ServiceErrorKind {
    match status {
        HTTP_STATUS_TOO_MANY_REQUESTS | HTTP_STATUS_BAD_GATEWAY | HTTP_STATUS_SERVICE_UNAVAILABLE => {
            ServiceErrorKind::Transient
        }
        _ => ServiceErrorKind::Fatal,
    }
}

/// Classify free-form error text by known transient signatures.
pub fn classify_message(message: &str) -> ServiceErrorKind {
    let lower = message.to_lowercase();
    if TRANSIENT_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        ServiceErrorKind::Transient
    } else {
        ServiceErrorKind::Fatal
    }
}

/// Determine if a reqwest error is a transient network error that should be retried.
///
/// Connection failures and request timeouts are transient; so is any error
/// carrying one of the transient status codes.
pub fn is_transient_network_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() {
        return true;
    }

    match error.status() {
        Some(status) => classify_status(status.as_u16()) == ServiceErrorKind::Transient,
        None => false,
    }
}

/// Delay before retry number `attempt` (zero-based): `base * 2^attempt`, capped at `max`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

/// One submission try inside the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationAttempt {
    /// Zero-based attempt index.
    pub index: u32,
    /// Delay slept before the next attempt, if this one fails transiently.
    pub delay_before_retry: Duration,
}

/// Bounded exponential backoff schedule for submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitRetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for SubmitRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_RETRY_DELAY,
            max_delay: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl SubmitRetryPolicy {
    /// Total number of submissions allowed (at least one).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn attempt(&self, index: u32) -> GenerationAttempt {
        GenerationAttempt {
            index,
            delay_before_retry: calculate_backoff(index, self.initial_delay, self.max_delay),
        }
    }

    /// Attempts in order.
    pub fn attempts(&self) -> impl Iterator<Item = GenerationAttempt> + '_ {
        (0..self.max_attempts()).map(|index| self.attempt(index))
    }

    /// True if another attempt remains after `attempt`.
    pub fn has_remaining(&self, attempt: &GenerationAttempt) -> bool {
        attempt.index + 1 < self.max_attempts()
    }
}
