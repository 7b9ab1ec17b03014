//! Error types shared by the generation pipeline.

use std::time::Duration;

use crate::cloud::{ServiceError, ServiceErrorKind};
use crate::local::LocalBackendError;
use crate::postprocess::PostProcessError;

/// Errors returned by a generation call, whichever backend served it.
///
/// Every terminal failure of the cloud path maps to exactly one variant so
/// callers can decide between resubmitting, extending the timeout, or giving
/// up without parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Bad image path, format or size. Raised before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cloud credentials not configured (set GOOGLE_API_KEY)")]
    MissingCredentials,

    /// A transient failure that surfaced outside the submission retry loop.
    #[error("Transient service error: {0}")]
    TransientService(#[source] ServiceError),

    /// Submission kept failing with transient errors until the budget ran out.
    #[error("Failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// Number of submissions made.
        attempts: u32,
        /// Message of the last underlying error.
        message: String,
    },

    #[error("Service error: {0}")]
    FatalService(#[source] ServiceError),

    /// The remote job finished with an error.
    #[error("Generation failed for operation {operation}: {message}")]
    RemoteOperation { operation: String, message: String },

    /// The remote job finished without producing an artifact.
    #[error("No video in response (operation {operation} completed after {elapsed:?})")]
    EmptyResult {
        operation: String,
        elapsed: Duration,
    },

    #[error("Video generation timed out after {elapsed:?} (limit {timeout:?}) for operation {operation}")]
    Timeout {
        operation: String,
        timeout: Duration,
        elapsed: Duration,
    },

    #[error("Local backend failed: {0}")]
    LocalBackend(#[from] LocalBackendError),

    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PostProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    /// True when the job completed but returned no video.
    ///
    /// Resubmitting re-pays the full generation cost, so this is left to the
    /// caller's policy.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, GenerationError::EmptyResult { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::Timeout { .. })
    }
}

impl From<ServiceError> for GenerationError {
    fn from(error: ServiceError) -> Self {
        match error.kind {
            ServiceErrorKind::Transient => GenerationError::TransientService(error),
            ServiceErrorKind::Fatal => GenerationError::FatalService(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_maps_by_kind() {
        let transient = ServiceError::from_status(503, "Service Unavailable");
        assert!(matches!(
            GenerationError::from(transient),
            GenerationError::TransientService(_)
        ));

        let fatal = ServiceError::from_status(403, "Forbidden");
        assert!(matches!(
            GenerationError::from(fatal),
            GenerationError::FatalService(_)
        ));
    }

    #[test]
    fn test_empty_result_is_distinct() {
        let err = GenerationError::EmptyResult {
            operation: "operations/abc".to_string(),
            elapsed: Duration::from_secs(12),
        };
        assert!(err.is_empty_result());
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("No video in response"));
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = GenerationError::RetriesExhausted {
            attempts: 3,
            message: "502 Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Failed after 3 attempts: 502 Bad Gateway");
    }
}
