//! Backend selection with cloud-to-local fallback.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::cloud::{GenerateOptions, OperationPoller};
use crate::error::GenerationError;
use crate::local::{LocalBackend, LocalParams};
use crate::validation::{validate_image, LOCAL_MAX_IMAGE_MB};

/// Which backend serves a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    Cloud,
    Local,
    /// Cloud when credentials exist, falling back to local on failure.
    #[default]
    Auto,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Cloud => "cloud",
            Backend::Local => "local",
            Backend::Auto => "auto",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cloud" | "veo" => Ok(Backend::Cloud),
            "local" | "svd" => Ok(Backend::Local),
            "auto" => Ok(Backend::Auto),
            other => Err(format!("Unknown backend: {}", other)),
        }
    }
}

/// Availability report returned by [`VideoGenerator::backend_info`].
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub selected_backend: String,
    pub cloud_available: bool,
    pub cloud_model: Option<String>,
    pub local_available: bool,
    pub local_model: String,
}

/// Entry point for generation calls.
///
/// The cloud side is `None` when no credentials are configured.
pub struct VideoGenerator {
    backend: Backend,
    cloud: Option<OperationPoller>,
    local: Arc<dyn LocalBackend>,
    local_params: LocalParams,
    output_dir: PathBuf,
}

impl VideoGenerator {
    pub fn new(
        backend: Backend,
        cloud: Option<OperationPoller>,
        local: Arc<dyn LocalBackend>,
        local_params: LocalParams,
        output_dir: PathBuf,
    ) -> Self {
        log::info!("VideoGenerator initialized with backend: {}", backend);
        Self {
            backend,
            cloud,
            local,
            local_params,
            output_dir,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn cloud(&self) -> Option<&OperationPoller> {
        self.cloud.as_ref()
    }

    /// Generate a video with the configured backend.
    pub async fn generate_video(
        &self,
        image_path: &Path,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<PathBuf, GenerationError> {
        match self.backend {
            Backend::Cloud => self.generate_cloud(image_path, prompt, options).await,
            Backend::Local => self.generate_local(image_path, options).await,
            Backend::Auto => self.generate_auto(image_path, prompt, options).await,
        }
    }

    async fn generate_cloud(
        &self,
        image_path: &Path,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<PathBuf, GenerationError> {
        let poller = self.cloud.as_ref().ok_or(GenerationError::MissingCredentials)?;
        log::info!("Generating video with {}...", poller.service_name());
        poller.generate_video(image_path, prompt, options).await
    }

    async fn generate_local(
        &self,
        image_path: &Path,
        options: &GenerateOptions,
    ) -> Result<PathBuf, GenerationError> {
        log::info!("Generating video with {} (local)...", self.local.name());

        let image = validate_image(image_path, LOCAL_MAX_IMAGE_MB)?;
        let output = match &options.output_path {
            Some(path) => path.clone(),
            None => {
                let stem = image
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "video".to_string());
                self.output_dir.join(format!("{}_svd_animated.mp4", stem))
            }
        };

        Ok(self.local.generate(&image, &output, &self.local_params).await?)
    }

    /// Cloud first when credentials exist; any cloud error falls back to
    /// local exactly once. A local failure is final.
    async fn generate_auto(
        &self,
        image_path: &Path,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<PathBuf, GenerationError> {
        if self.cloud.is_none() {
            log::info!("No cloud credentials configured, using local backend directly");
            return self.generate_local(image_path, options).await;
        }

        log::info!("Auto backend mode: trying cloud first...");
        match self.generate_cloud(image_path, prompt, options).await {
            Ok(path) => Ok(path),
            Err(e) => {
                log::warn!("Cloud generation failed: {}", e);
                log::info!("Falling back to local generation...");
                self.generate_local(image_path, options).await
            }
        }
    }

    pub fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            selected_backend: self.backend.to_string(),
            cloud_available: self.cloud.is_some(),
            cloud_model: self.cloud.as_ref().map(|c| c.service_name().to_string()),
            local_available: self.local.is_available(),
            local_model: self.local.name().to_string(),
        }
    }
}
