//! Configuration file handling for living-portrait.
//!
//! Loads configuration from `~/.config/living-portrait/config.toml` or a custom
//! path, then applies environment overrides (`GOOGLE_API_KEY`, `OUTPUT_DIR`,
//! `MODEL_NAME`, `LOG_LEVEL`, `DEFAULT_VIDEO_DURATION`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cloud::{
    PollerConfig, SubmitRetryPolicy, DEFAULT_BACKOFF_MAX, DEFAULT_MODEL, DEFAULT_RESOLUTION,
    VEO_API_BASE_URL,
};
use crate::local::{LocalParams, DEFAULT_LOCAL_COMMAND, DEFAULT_LOCAL_MODEL};
use crate::postprocess::AspectRatio;
use crate::prompt::DEFAULT_DURATION;
use crate::rate_limiter::{default_state_path, DEFAULT_MAX_REQUESTS};
use crate::validation::CLOUD_MAX_IMAGE_MB;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration file structure for living-portrait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Requested clip length in seconds.
    #[serde(default = "default_video_duration")]
    pub video_duration: u32,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Usually supplied through `GOOGLE_API_KEY` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Forces the requested aspect ratio, e.g. "9:16".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default = "default_resolution")]
    pub resolution: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_local_model")]
    pub model: String,
    #[serde(default = "default_num_frames")]
    pub num_frames: u32,
    #[serde(default = "default_num_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_motion_bucket_id")]
    pub motion_bucket_id: u8,
    #[serde(default = "default_noise_aug_strength")]
    pub noise_aug_strength: f32,
    #[serde(default = "default_decode_chunk_size")]
    pub decode_chunk_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_video_duration() -> u32 {
    DEFAULT_DURATION
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    VEO_API_BASE_URL.to_string()
}

fn default_max_retries() -> u32 {
    SubmitRetryPolicy::default().max_retries
}

fn default_retry_delay_secs() -> u64 {
    SubmitRetryPolicy::default().initial_delay.as_secs()
}

fn default_timeout_secs() -> u64 {
    crate::cloud::DEFAULT_TIMEOUT.as_secs()
}

fn default_poll_interval_secs() -> u64 {
    crate::cloud::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_resolution() -> String {
    DEFAULT_RESOLUTION.to_string()
}

fn default_max_requests() -> usize {
    DEFAULT_MAX_REQUESTS
}

fn default_window_seconds() -> u64 {
    crate::rate_limiter::DEFAULT_WINDOW.as_secs()
}

fn default_local_command() -> String {
    DEFAULT_LOCAL_COMMAND.to_string()
}

fn default_local_model() -> String {
    DEFAULT_LOCAL_MODEL.to_string()
}

fn default_num_frames() -> u32 {
    LocalParams::default().num_frames
}

fn default_num_inference_steps() -> u32 {
    LocalParams::default().num_inference_steps
}

fn default_fps() -> u32 {
    LocalParams::default().fps
}

fn default_motion_bucket_id() -> u8 {
    LocalParams::default().motion_bucket_id
}

fn default_noise_aug_strength() -> f32 {
    LocalParams::default().noise_aug_strength
}

fn default_decode_chunk_size() -> u32 {
    LocalParams::default().decode_chunk_size
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            video_duration: default_video_duration(),
            cloud: CloudConfig::default(),
            rate_limit: RateLimitConfig::default(),
            local: LocalConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            aspect_ratio: None,
            resolution: default_resolution(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
            state_file: None,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            command: default_local_command(),
            args: Vec::new(),
            model: default_local_model(),
            num_frames: default_num_frames(),
            num_inference_steps: default_num_inference_steps(),
            fps: default_fps(),
            motion_bucket_id: default_motion_bucket_id(),
            noise_aug_strength: default_noise_aug_strength(),
            decode_chunk_size: default_decode_chunk_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// Returns default config if the default file doesn't exist. An explicit
    /// path that doesn't exist is an error. Environment overrides are applied
    /// in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let path = default_path();
                if path.exists() {
                    Self::load_file(&path)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.normalize_log_level();
        Ok(config)
    }

    /// Parse a TOML file without environment overrides.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.cloud.api_key = Some(key);
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(model) = lookup("MODEL_NAME") {
            self.cloud.model = model;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(duration) = lookup("DEFAULT_VIDEO_DURATION") {
            self.video_duration = duration.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "DEFAULT_VIDEO_DURATION",
                value: duration.clone(),
            })?;
        }
        Ok(())
    }

    /// Lowercase the log level, replacing unknown levels with `info`.
    pub fn normalize_log_level(&mut self) {
        let level = self.log_level.trim().to_ascii_lowercase();
        let level = match level.as_str() {
            "warning" => "warn".to_string(),
            "critical" => "error".to_string(),
            _ => level,
        };
        if VALID_LOG_LEVELS.contains(&level.as_str()) {
            self.log_level = level;
        } else {
            log::warn!("Invalid log level: {}. Using info.", self.log_level);
            self.log_level = default_log_level();
        }
    }

    /// API key, if one is configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.cloud.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_seconds)
    }

    pub fn rate_limit_state_file(&self) -> PathBuf {
        self.rate_limit
            .state_file
            .clone()
            .unwrap_or_else(default_state_path)
    }

    pub fn poller_config(&self) -> Result<PollerConfig, ConfigError> {
        let aspect_ratio_override = match &self.cloud.aspect_ratio {
            Some(value) => Some(value.parse::<AspectRatio>().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "cloud.aspect_ratio",
                    value: value.clone(),
                }
            })?),
            None => None,
        };

        Ok(PollerConfig {
            retry: SubmitRetryPolicy {
                max_retries: self.cloud.max_retries,
                initial_delay: Duration::from_secs(self.cloud.retry_delay_secs),
                max_delay: DEFAULT_BACKOFF_MAX,
            },
            timeout: Duration::from_secs(self.cloud.timeout_secs),
            poll_interval: Duration::from_secs(self.cloud.poll_interval_secs),
            aspect_ratio_override,
            resolution: self.cloud.resolution.clone(),
            output_dir: self.output.dir.clone(),
            max_image_mb: CLOUD_MAX_IMAGE_MB,
        })
    }

    pub fn local_params(&self) -> LocalParams {
        LocalParams {
            num_frames: self.local.num_frames,
            num_inference_steps: self.local.num_inference_steps,
            fps: self.local.fps,
            motion_bucket_id: self.local.motion_bucket_id,
            noise_aug_strength: self.local.noise_aug_strength,
            decode_chunk_size: self.local.decode_chunk_size,
        }
    }

    /// Render as TOML with the API key left out.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        redacted.cloud.api_key = None;
        toml::to_string_pretty(&redacted).map_err(ConfigError::SerializeError)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        key: &'static str,
        value: String,
    },
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
            ConfigError::SerializeError(e) => write!(f, "Failed to render config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } => None,
            ConfigError::SerializeError(e) => Some(e),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("living-portrait").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/living-portrait/config.toml")
        })
}
