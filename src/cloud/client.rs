//! VeoClient - handles communication with the Gemini API's Veo video models.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::service::{
    ArtifactRef, GenerationOperation, GenerationRequest, OperationHandle, ServiceError,
    VideoService,
};

/// The environment variable name for the Google API key.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Default base URL for the Gemini API.
pub const VEO_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for video generation.
pub const DEFAULT_MODEL: &str = "veo-3.1-generate-preview";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Default timeout for HTTP requests (2 minutes, uploads carry the whole image).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while building a [`VeoClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("API key not configured (set GOOGLE_API_KEY)")]
    MissingApiKey,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Request body for `predictLongRunning`.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Instance<'a> {
    prompt: &'a str,
    reference_images: Vec<ReferenceImage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceImage {
    image: InlineImage,
    reference_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineImage {
    bytes_base64_encoded: String,
    mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters<'a> {
    aspect_ratio: &'a str,
    resolution: &'a str,
}

/// Long-running operation as returned by submit and status calls.
#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<OperationResult>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    #[serde(default)]
    uri: Option<String>,
}

impl OperationResponse {
    fn into_operation(self) -> GenerationOperation {
        let handle = OperationHandle::new(self.name);
        if !self.done {
            return GenerationOperation::pending(handle);
        }

        if let Some(error) = self.error {
            let message = match error.code {
                Some(code) => format!("{} (code {})", error.message, code),
                None => error.message,
            };
            return GenerationOperation::failed(handle, message);
        }

        let artifact = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri)
            .map(|uri| ArtifactRef { uri });
        GenerationOperation::completed(handle, artifact)
    }
}

/// Client for the Veo video generation endpoints.
pub struct VeoClient {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl VeoClient {
    /// Create a new VeoClient by reading the API key from `GOOGLE_API_KEY`.
    pub fn new() -> Result<Self, ClientError> {
        let api_key = std::env::var(GOOGLE_API_KEY_ENV).map_err(|_| ClientError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a new VeoClient with an explicit API key.
    pub fn with_api_key(api_key: String) -> Result<Self, ClientError> {
        Self::build(api_key, VEO_API_BASE_URL.to_string(), DEFAULT_MODEL.to_string())
    }

    /// Create a new VeoClient with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, ClientError> {
        Self::build(api_key, base_url, DEFAULT_MODEL.to_string())
    }

    /// Create a new VeoClient with a custom model.
    pub fn with_model(api_key: String, model: String) -> Result<Self, ClientError> {
        Self::build(api_key, VEO_API_BASE_URL.to_string(), model)
    }

    /// Create a client with every setting explicit.
    pub fn build(api_key: String, base_url: String, model: String) -> Result<Self, ClientError> {
        if api_key.is_empty() {
            return Err(ClientError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http_client,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn submit_url(&self) -> String {
        format!("{}/v1beta/models/{}:predictLongRunning", self.base_url, self.model)
    }

    fn operation_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name.trim_start_matches('/'))
    }

    async fn error_from_response(response: reqwest::Response) -> ServiceError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        ServiceError::from_status(status, &body)
    }
}

#[async_trait]
impl VideoService for VeoClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<OperationHandle, ServiceError> {
        let body = PredictRequest {
            instances: vec![Instance {
                prompt: &request.prompt,
                reference_images: vec![ReferenceImage {
                    image: InlineImage {
                        bytes_base64_encoded: BASE64.encode(&request.image.bytes),
                        mime_type: request.image.mime_type,
                    },
                    reference_type: "asset",
                }],
            }],
            parameters: Parameters {
                aspect_ratio: request.aspect_ratio.as_str(),
                resolution: &request.resolution,
            },
        };

        log::info!("Requesting video generation with reference image...");
        let response = self
            .http_client
            .post(self.submit_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = Self::error_from_response(response).await;
            log::warn!("Submission rejected: {}", error);
            return Err(error);
        }

        let operation: OperationResponse = response.json().await?;
        Ok(OperationHandle::new(operation.name))
    }

    async fn fetch_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<GenerationOperation, ServiceError> {
        let response = self
            .http_client
            .get(self.operation_url(&handle.name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let operation: OperationResponse = response.json().await?;
        Ok(operation.into_operation())
    }

    /// Streams the video to disk without holding it in memory.
    async fn download(&self, artifact: &ArtifactRef, dest: &Path) -> Result<PathBuf, ServiceError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .http_client
            .get(&artifact.uri)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        // Stream into a sibling file so a broken transfer never leaves a
        // truncated video at `dest`.
        let partial = partial_path(dest);
        if let Err(e) = stream_to_file(response, &partial).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                log::debug!("Could not remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }
        tokio::fs::rename(&partial, dest).await?;

        Ok(dest.to_path_buf())
    }
}

/// `video.mp4` -> `video.mp4.part`
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<(), ServiceError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}
