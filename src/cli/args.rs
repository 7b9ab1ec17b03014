//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{BackendArg, BwMethodArg, IntensityArg, PhotoTypeArg};

/// Parse and validate a crossfade length in seconds (0.0-4.0)
fn parse_crossfade(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if !(0.0..=4.0).contains(&secs) {
        return Err(format!(
            "Crossfade must be between 0.0 and 4.0 seconds, got {}",
            secs
        ));
    }
    Ok(secs)
}

/// Parse a whole number of seconds greater than zero
fn parse_seconds(s: &str) -> Result<u64, String> {
    let secs: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number of seconds", s))?;
    if secs == 0 {
        return Err("Value must be at least 1 second".to_string());
    }
    Ok(secs)
}

/// living-portrait: animate still photographs into looping portraits
#[derive(Parser, Debug)]
#[command(name = "living-portrait")]
#[command(version, about = "Animate still photographs into looping living portraits")]
#[command(after_help = "EXAMPLES:
    # Animate a photo (cloud when GOOGLE_API_KEY is set, local otherwise)
    living-portrait generate photo.jpg

    # Group photo with more movement
    living-portrait generate family.jpg --photo-type group --intensity moderate

    # Preview the prompt without spending quota
    living-portrait generate photo.jpg --dry-run

    # Force the local backend and skip post-processing
    living-portrait generate photo.jpg --backend local --no-loop --no-bw

    # Inspect the shared request budget
    living-portrait rate-limit status")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Animate a photograph into a video
    Generate(GenerateArgs),
    /// Inspect or clear the request rate limit
    RateLimit {
        #[command(subcommand)]
        action: RateLimitAction,
    },
    /// Show which generation backends are available
    Backends {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Photograph to animate (jpg, jpeg, png, webp)
    pub image: PathBuf,

    /// Generation backend
    #[arg(long, short, default_value = "auto")]
    pub backend: BackendArg,

    /// Output video path
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Kind of photograph
    #[arg(long, default_value = "portrait")]
    pub photo_type: PhotoTypeArg,

    /// How much the subject moves
    #[arg(long, short, default_value = "subtle")]
    pub intensity: IntensityArg,

    /// Clip length in seconds written into the prompt (default: from config)
    #[arg(long, short, value_parser = clap::value_parser!(u32).range(1..=60))]
    pub duration: Option<u32>,

    /// Extra movements appended to the prompt
    #[arg(long, num_args = 1..)]
    pub custom_elements: Vec<String>,

    /// Free-form scene description used instead of the built prompt
    #[arg(long, short)]
    pub prompt: Option<String>,

    /// Polling timeout in seconds (default: from config)
    #[arg(long, value_parser = parse_seconds)]
    pub timeout: Option<u64>,

    /// Seconds between status checks (default: from config)
    #[arg(long, value_parser = parse_seconds)]
    pub poll_interval: Option<u64>,

    /// Skip creating seamless looping versions
    #[arg(long)]
    pub no_loop: bool,

    /// Crossfade length for looping, in seconds
    #[arg(long, default_value = "0.5", value_parser = parse_crossfade)]
    pub loop_crossfade: f64,

    /// Skip creating a black & white version of the video
    #[arg(long)]
    pub no_bw: bool,

    /// Convert the photo to black & white before generating
    #[arg(long)]
    pub preprocess_bw: bool,

    /// Black & white conversion method
    #[arg(long, default_value = "high-contrast")]
    pub bw_method: BwMethodArg,

    /// Attempts when the service completes without a video
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=10))]
    pub empty_result_retries: u32,

    /// Show the prompt but don't generate
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RateLimitAction {
    /// Show requests in the current window
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget all recorded requests
    Reset,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
