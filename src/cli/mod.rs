//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, Command, ConfigAction, GenerateArgs, RateLimitAction};
pub use commands::{
    build_generator, build_rate_limiter, generate_with_empty_result_retries,
    handle_config_action, handle_rate_limit_action, run_generate, show_backends,
    write_default_config, EMPTY_RESULT_RETRY_DELAY,
};
pub use enums::{BackendArg, BwMethodArg, IntensityArg, PhotoTypeArg};
