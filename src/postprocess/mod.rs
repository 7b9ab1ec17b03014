//! Image and video post-processing.
//!
//! Images are handled in-process with the `image` crate; videos are handed to
//! `ffmpeg`/`ffprobe` subprocesses.

mod image;
mod video;

use std::path::PathBuf;

pub use self::image::{
    apply_bw_method, convert_to_black_and_white, crop_to_aspect, enhance_brightness,
    enhance_contrast, enhance_sharpness, fit_image_to_aspect_ratio, pad_to_dimensions,
    AspectClass, AspectRatio, BwMethod, FitMode,
};
pub use self::video::{
    build_loop_filter, bw_video_filter, convert_video_to_bw, create_looping_video,
    create_simple_loop, probe_duration, DEFAULT_CROSSFADE,
};

/// Errors that can occur during post-processing.
#[derive(Debug, thiserror::Error)]
pub enum PostProcessError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("FFmpeg not found. Please install it with your package manager (e.g. `brew install ffmpeg`)")]
    FfmpegNotFound,

    #[error("{program} exited with code {exit_code:?}\n{stderr}")]
    ProcessFailed {
        program: &'static str,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Could not read video duration: {0}")]
    InvalidDuration(String),

    #[error("Unsupported aspect ratio: {0}")]
    UnsupportedAspectRatio(String),

    #[error("Image error: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PostProcessError {
    /// Map a failure to start `ffmpeg`/`ffprobe`.
    pub(crate) fn spawn(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            PostProcessError::FfmpegNotFound
        } else {
            PostProcessError::Io(e)
        }
    }
}
