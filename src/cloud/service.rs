//! Contract between the operation poller and a cloud video service.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::retry::{classify_message, classify_status, is_transient_network_error};
use crate::postprocess::AspectRatio;

/// Whether a failed service call is worth retrying after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Service overload or gateway trouble (429, 502, 503, dropped connections).
    Transient,
    /// Anything else: bad credentials, rejected input, malformed responses.
    Fatal,
}

/// Transport-level failure with its kind decided where it was caught.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    /// HTTP status code, when the transport exposed one.
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    /// Build an error from an HTTP status and response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            kind: classify_status(status),
            status: Some(status),
            message: format!("API request failed with status {}: {}", status, body),
        }
    }

    /// Build an error from a message alone, classified by known signatures.
    ///
    /// Only for failures that carry no status code.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_message(&message),
            status: None,
            message,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Transient,
            status: None,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Fatal,
            status: None,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ServiceErrorKind::Transient
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if is_transient_network_error(&error) {
            ServiceErrorKind::Transient
        } else {
            ServiceErrorKind::Fatal
        };
        Self {
            kind,
            status: error.status().map(|s| s.as_u16()),
            message: format!("HTTP request failed: {}", error),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(error: std::io::Error) -> Self {
        Self::fatal(format!("IO error: {}", error))
    }
}

/// Source image sent along with the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl ImagePayload {
    /// Read an image file, deriving the MIME type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            bytes,
            mime_type: mime_for_path(path),
        })
    }
}

/// One logical generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: ImagePayload,
    pub aspect_ratio: AspectRatio,
    /// Output resolution label, e.g. "720p".
    pub resolution: String,
}

/// Opaque handle of a submitted remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
}

impl OperationHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Location of a finished video on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub uri: String,
}

/// Snapshot of a remote job, as last fetched.
///
/// Terminal once `done` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOperation {
    pub handle: OperationHandle,
    pub done: bool,
    pub error: Option<String>,
    pub result: Option<ArtifactRef>,
}

impl GenerationOperation {
    pub fn pending(handle: OperationHandle) -> Self {
        Self {
            handle,
            done: false,
            error: None,
            result: None,
        }
    }

    pub fn completed(handle: OperationHandle, result: Option<ArtifactRef>) -> Self {
        Self {
            handle,
            done: true,
            error: None,
            result,
        }
    }

    pub fn failed(handle: OperationHandle, error: impl Into<String>) -> Self {
        Self {
            handle,
            done: true,
            error: Some(error.into()),
            result: None,
        }
    }
}

/// A cloud service running long-lived video generation jobs.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Model or service name, for logs.
    fn name(&self) -> &str;

    /// Start a job.
    async fn submit(&self, request: &GenerationRequest) -> Result<OperationHandle, ServiceError>;

    /// Re-fetch the state of a job.
    async fn fetch_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<GenerationOperation, ServiceError>;

    /// Save a finished artifact to `dest`.
    async fn download(&self, artifact: &ArtifactRef, dest: &Path)
        -> Result<PathBuf, ServiceError>;
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classifies_transient_codes() {
        for status in [429, 502, 503] {
            let err = ServiceError::from_status(status, "busy");
            assert!(err.is_transient(), "status {} should be transient", status);
            assert_eq!(err.status, Some(status));
        }
    }

    #[test]
    fn test_from_status_classifies_fatal_codes() {
        for status in [400, 401, 403, 404, 500] {
            let err = ServiceError::from_status(status, "nope");
            assert!(!err.is_transient(), "status {} should be fatal", status);
        }
    }

    #[test]
    fn test_from_status_message_includes_body() {
        let err = ServiceError::from_status(403, "PERMISSION_DENIED");
        assert_eq!(
            err.to_string(),
            "API request failed with status 403: PERMISSION_DENIED"
        );
    }

    #[test]
    fn test_from_message_uses_signatures() {
        assert!(ServiceError::from_message("upstream said 503 Service Unavailable").is_transient());
        assert!(!ServiceError::from_message("invalid argument").is_transient());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.jpg")), "image/jpeg");
    }

    #[test]
    fn test_operation_constructors() {
        let handle = OperationHandle::new("operations/1");
        let pending = GenerationOperation::pending(handle.clone());
        assert!(!pending.done);

        let failed = GenerationOperation::failed(handle.clone(), "boom");
        assert!(failed.done);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let done = GenerationOperation::completed(handle, None);
        assert!(done.done);
        assert!(done.result.is_none());
    }
}
