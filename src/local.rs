//! Local-compute video generation.
//!
//! The local backend is an external image-to-video program (e.g. a Stable
//! Video Diffusion script) run as a subprocess. It is a single blocking call:
//! no polling, no rate limiting.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Default local model identifier passed to the command.
pub const DEFAULT_LOCAL_MODEL: &str = "stabilityai/stable-video-diffusion-img2vid";

/// Default program run by [`CommandBackend`].
pub const DEFAULT_LOCAL_COMMAND: &str = "svd-generate";

/// Errors from the local backend.
#[derive(Debug, thiserror::Error)]
pub enum LocalBackendError {
    #[error("Local generator `{0}` not found on PATH")]
    CommandNotFound(String),

    #[error("Failed to start local generator: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Local generator exited with code {exit_code:?}: {stderr}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Local generator reported success but wrote no video at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Generation knobs forwarded to the local model.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalParams {
    /// Frames to generate (the base model produces 14).
    pub num_frames: u32,
    pub num_inference_steps: u32,
    pub fps: u32,
    /// Motion strength, 0-255.
    pub motion_bucket_id: u8,
    pub noise_aug_strength: f32,
    /// Frames decoded at once. Lower values need less VRAM.
    pub decode_chunk_size: u32,
}

impl Default for LocalParams {
    fn default() -> Self {
        Self {
            num_frames: 14,
            num_inference_steps: 25,
            fps: 7,
            motion_bucket_id: 127,
            noise_aug_strength: 0.02,
            decode_chunk_size: 2,
        }
    }
}

/// A backend that turns an image into a video on this machine.
#[async_trait]
pub trait LocalBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Generate a video from `image` into `output`.
    async fn generate(
        &self,
        image: &Path,
        output: &Path,
        params: &LocalParams,
    ) -> Result<PathBuf, LocalBackendError>;

    /// Whether the backend can run at all.
    fn is_available(&self) -> bool;
}

/// Runs an external generator program.
///
/// The program is invoked as
/// `COMMAND [ARGS...] --image IMG --output OUT --model M --num-frames N
/// --num-inference-steps S --fps F --motion-bucket-id B
/// --noise-aug-strength A --decode-chunk-size C`.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    command: String,
    args: Vec<String>,
    model: String,
}

impl CommandBackend {
    pub fn new(command: impl Into<String>, args: Vec<String>, model: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args,
            model: model.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_args(&self, image: &Path, output: &Path, params: &LocalParams) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--image".to_string(),
            image.to_string_lossy().into_owned(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
            "--model".to_string(),
            self.model.clone(),
            "--num-frames".to_string(),
            params.num_frames.to_string(),
            "--num-inference-steps".to_string(),
            params.num_inference_steps.to_string(),
            "--fps".to_string(),
            params.fps.to_string(),
            "--motion-bucket-id".to_string(),
            params.motion_bucket_id.to_string(),
            "--noise-aug-strength".to_string(),
            params.noise_aug_strength.to_string(),
            "--decode-chunk-size".to_string(),
            params.decode_chunk_size.to_string(),
        ]);
        args
    }
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_COMMAND, Vec::new(), DEFAULT_LOCAL_MODEL)
    }
}

#[async_trait]
impl LocalBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        image: &Path,
        output: &Path,
        params: &LocalParams,
    ) -> Result<PathBuf, LocalBackendError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        log::info!("Starting local video generation for: {}", image.display());
        log::info!(
            "Frames: {}, FPS: {}, Steps: {}",
            params.num_frames,
            params.fps,
            params.num_inference_steps
        );
        log::info!("Motion strength: {}/255", params.motion_bucket_id);

        let result = Command::new(&self.command)
            .args(self.build_args(image, output, params))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LocalBackendError::CommandNotFound(self.command.clone())
                } else {
                    LocalBackendError::Spawn(e)
                }
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            log::error!("Local generation failed: {}", stderr);
            return Err(LocalBackendError::ProcessFailed {
                exit_code: result.status.code(),
                stderr,
            });
        }

        if !output.exists() {
            return Err(LocalBackendError::MissingOutput(output.to_path_buf()));
        }

        log::info!("Video saved to: {}", output.display());
        Ok(output.to_path_buf())
    }

    fn is_available(&self) -> bool {
        resolve_command(&self.command).is_some()
    }
}

/// Locate `command` the way a shell would: as a path, or on `PATH`.
pub fn resolve_command(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(command))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = LocalParams::default();
        assert_eq!(params.num_frames, 14);
        assert_eq!(params.num_inference_steps, 25);
        assert_eq!(params.fps, 7);
        assert_eq!(params.motion_bucket_id, 127);
        assert_eq!(params.decode_chunk_size, 2);
    }

    #[test]
    fn test_build_args_appends_params_after_fixed_args() {
        let backend = CommandBackend::new("python3", vec!["svd.py".to_string()], "svd-base");
        let args = backend.build_args(
            Path::new("in.jpg"),
            Path::new("out.mp4"),
            &LocalParams::default(),
        );
        assert_eq!(args[0], "svd.py");
        assert_eq!(&args[1..3], ["--image", "in.jpg"]);
        assert_eq!(&args[3..5], ["--output", "out.mp4"]);
        assert_eq!(&args[5..7], ["--model", "svd-base"]);
        assert!(args.windows(2).any(|w| w == ["--motion-bucket-id", "127"]));
        assert!(args.windows(2).any(|w| w == ["--noise-aug-strength", "0.02"]));
    }

    #[test]
    fn test_missing_command_is_unavailable() {
        let backend = CommandBackend::new("definitely-not-a-real-generator", Vec::new(), "m");
        assert!(!backend.is_available());
    }

    #[tokio::test]
    async fn test_missing_command_reports_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = CommandBackend::new("definitely-not-a-real-generator", Vec::new(), "m");
        let err = backend
            .generate(
                Path::new("in.jpg"),
                &dir.path().join("out.mp4"),
                &LocalParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LocalBackendError::CommandNotFound(_)));
    }
}
