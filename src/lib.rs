//! living-portrait library crate.
//!
//! Turns still photographs into short looping videos through a rate-limited
//! cloud service, with a local backend as fallback.

pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;
pub mod generator;
pub mod local;
pub mod logging;
pub mod postprocess;
pub mod prompt;
pub mod rate_limiter;
pub mod validation;

pub use error::GenerationError;
pub use generator::{Backend, BackendInfo, VideoGenerator};
pub use rate_limiter::{RateLimitStatus, RateLimiter};
