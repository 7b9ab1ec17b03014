//! Drives one cloud generation job from submission to a file on disk.
//!
//! Submission is retried with exponential backoff on transient failures,
//! each attempt spending one rate-limiter slot. Once accepted, the job is
//! polled at a fixed interval until it finishes or the timeout passes.
//! Polling failures are never retried here: a job that finished without a
//! video is reported as [`GenerationError::EmptyResult`] and resubmission is
//! left to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::retry::SubmitRetryPolicy;
use super::service::{
    ArtifactRef, GenerationRequest, ImagePayload, OperationHandle, VideoService,
};
use crate::error::GenerationError;
use crate::postprocess::{fit_image_to_aspect_ratio, AspectClass, AspectRatio, FitMode};
use crate::rate_limiter::RateLimiter;
use crate::validation::{validate_image, CLOUD_MAX_IMAGE_MB};

/// Default polling budget (5 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default delay between status checks (10 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default output resolution.
pub const DEFAULT_RESOLUTION: &str = "720p";

/// Relative aspect deviation above which the source image is letterboxed.
const ASPECT_TOLERANCE: f64 = 0.05;

/// Label recorded with every rate-limited submission.
const RATE_LIMIT_LABEL: &str = "Veo video generation";

/// Per-call overrides for a generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Where to write the video. Defaults to the backend's naming scheme.
    pub output_path: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub poll_interval: Option<Duration>,
}

/// Settings of an [`OperationPoller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub retry: SubmitRetryPolicy,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Forces the requested aspect ratio instead of the detected one.
    pub aspect_ratio_override: Option<AspectRatio>,
    pub resolution: String,
    /// Directory for default output paths.
    pub output_dir: PathBuf,
    pub max_image_mb: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            retry: SubmitRetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            aspect_ratio_override: None,
            resolution: DEFAULT_RESOLUTION.to_string(),
            output_dir: PathBuf::from("output"),
            max_image_mb: CLOUD_MAX_IMAGE_MB,
        }
    }
}

/// Rate-limited, retrying client for long-running generation jobs.
pub struct OperationPoller {
    service: Arc<dyn VideoService>,
    rate_limiter: Arc<RateLimiter>,
    config: PollerConfig,
}

impl OperationPoller {
    pub fn new(
        service: Arc<dyn VideoService>,
        rate_limiter: Arc<RateLimiter>,
        config: PollerConfig,
    ) -> Self {
        Self {
            service,
            rate_limiter,
            config,
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Generate a video from an image file and a prompt.
    ///
    /// Validates the image, fits it to the requested aspect ratio when it is
    /// more than 5% off, then submits, polls and downloads. The default
    /// output is `{output_dir}/{stem}_animated.mp4`.
    pub async fn generate_video(
        &self,
        image_path: &Path,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<PathBuf, GenerationError> {
        let image_file = validate_image(image_path, self.config.max_image_mb)?;
        let output = match &options.output_path {
            Some(path) => path.clone(),
            None => self.config.output_dir.join(format!("{}_animated.mp4", file_stem(&image_file))),
        };

        log::info!("Starting video generation for: {}", image_file.display());
        log::debug!("Prompt: {}", prompt);

        let (aspect_ratio, prepared) = self.prepare_image(&image_file)?;
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            image: ImagePayload::from_path(&prepared)?,
            aspect_ratio,
            resolution: self.config.resolution.clone(),
        };

        self.run(
            &request,
            &output,
            options.timeout.unwrap_or(self.config.timeout),
            options.poll_interval.unwrap_or(self.config.poll_interval),
        )
        .await
    }

    /// Submit `request`, wait for the job and download its video to `output`.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        output: &Path,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<PathBuf, GenerationError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let handle = self.submit_with_retry(request).await?;
        log::info!("Operation started: {}", handle.name);
        log::info!("Waiting for video generation to complete...");

        let artifact = self.wait_for_completion(&handle, timeout, poll_interval).await?;

        log::info!("Video generated successfully, downloading...");
        let path = self.service.download(&artifact, output).await?;
        log::info!("Video saved to: {}", path.display());
        Ok(path)
    }

    /// Submit a request, retrying transient failures with backoff.
    ///
    /// Every attempt first waits for a rate-limiter slot. Fatal failures are
    /// returned at once; transient ones are retried until the policy runs out
    /// and then reported as [`GenerationError::RetriesExhausted`].
    pub async fn submit_with_retry(
        &self,
        request: &GenerationRequest,
    ) -> Result<OperationHandle, GenerationError> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts();

        for attempt in policy.attempts() {
            self.rate_limiter.record_request(RATE_LIMIT_LABEL).await;

            let error = match self.service.submit(request).await {
                Ok(handle) => {
                    log::info!(
                        "Video generation request successful on attempt {}",
                        attempt.index + 1
                    );
                    return Ok(handle);
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                log::error!("Submission failed with non-retryable error: {}", error);
                return Err(GenerationError::FatalService(error));
            }

            if !policy.has_remaining(&attempt) {
                log::error!("Failed after {} attempts", max_attempts);
                return Err(GenerationError::RetriesExhausted {
                    attempts: max_attempts,
                    message: error.message,
                });
            }

            log::warn!(
                "Transient error on attempt {}/{}: {}",
                attempt.index + 1,
                max_attempts,
                error
            );
            log::info!("Retrying in {:?}...", attempt.delay_before_retry);
            tokio::time::sleep(attempt.delay_before_retry).await;
        }

        // max_attempts() is at least one, so the loop always returns.
        Err(GenerationError::RetriesExhausted {
            attempts: max_attempts,
            message: "no submission attempted".to_string(),
        })
    }

    /// Poll an accepted job until it reaches a terminal state.
    pub async fn wait_for_completion(
        &self,
        handle: &OperationHandle,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ArtifactRef, GenerationError> {
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            if elapsed > timeout {
                log::error!("Video generation timed out after {:?}", timeout);
                return Err(GenerationError::Timeout {
                    operation: handle.name.clone(),
                    timeout,
                    elapsed,
                });
            }

            log::debug!("Waiting... ({}s elapsed)", elapsed.as_secs());
            tokio::time::sleep(poll_interval).await;

            let operation = self.service.fetch_status(handle).await?;
            if !operation.done {
                continue;
            }

            if let Some(message) = operation.error {
                log::error!("Generation failed: {}", message);
                return Err(GenerationError::RemoteOperation {
                    operation: handle.name.clone(),
                    message,
                });
            }

            return match operation.result {
                Some(artifact) => Ok(artifact),
                None => {
                    log::warn!("Operation {} completed with no video", handle.name);
                    Err(GenerationError::EmptyResult {
                        operation: handle.name.clone(),
                        elapsed: start.elapsed(),
                    })
                }
            };
        }
    }

    /// Pick the aspect ratio for `image` and letterbox it if needed.
    fn prepare_image(&self, image: &Path) -> Result<(AspectRatio, PathBuf), GenerationError> {
        let (width, height) = image::image_dimensions(image).map_err(|e| {
            GenerationError::InvalidInput(format!("Cannot read image {}: {}", image.display(), e))
        })?;

        let aspect_ratio = match self.config.aspect_ratio_override {
            Some(ratio) => {
                log::info!("Using override aspect ratio: {}", ratio);
                ratio
            }
            None => {
                let class = AspectClass::of(width, height);
                let ratio = class.target_ratio();
                log::info!(
                    "Source image: {}x{} ({:?}, aspect {:.2}) -> Target: {}",
                    width,
                    height,
                    class,
                    width as f64 / height.max(1) as f64,
                    ratio
                );
                ratio
            }
        };

        if aspect_ratio.matches(width, height, ASPECT_TOLERANCE) {
            return Ok((aspect_ratio, image.to_path_buf()));
        }

        log::info!("Preprocessing image to fit {} aspect ratio (padding mode)...", aspect_ratio);
        let fitted = fit_image_to_aspect_ratio(image, aspect_ratio, None, FitMode::Pad, [0, 0, 0])?;
        log::info!("Using preprocessed image: {}", fitted.display());
        Ok((aspect_ratio, fitted))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}
