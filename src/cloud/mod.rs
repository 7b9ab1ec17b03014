//! Cloud video generation.
//!
//! [`VeoClient`] speaks the HTTP API; [`OperationPoller`] wraps any
//! [`VideoService`] with rate limiting, submission retries and polling.

mod client;
mod poller;
mod retry;
mod service;

pub use client::{ClientError, VeoClient, DEFAULT_MODEL, GOOGLE_API_KEY_ENV, VEO_API_BASE_URL};
pub use poller::{
    GenerateOptions, OperationPoller, PollerConfig, DEFAULT_POLL_INTERVAL, DEFAULT_RESOLUTION,
    DEFAULT_TIMEOUT,
};
pub use retry::{
    calculate_backoff, classify_message, classify_status, is_transient_network_error,
    GenerationAttempt, SubmitRetryPolicy, DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY,
};
pub use service::{
    ArtifactRef, GenerationOperation, GenerationRequest, ImagePayload, OperationHandle,
    ServiceError, ServiceErrorKind, VideoService,
};
