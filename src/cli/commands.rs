//! Subcommand handlers for generate, rate-limit, backends and config actions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::args::{ConfigAction, GenerateArgs, RateLimitAction};
use crate::cloud::{GenerateOptions, OperationPoller, VeoClient};
use crate::config::{default_path as get_config_path, Config};
use crate::error::GenerationError;
use crate::generator::{Backend, VideoGenerator};
use crate::local::CommandBackend;
use crate::postprocess::{
    convert_to_black_and_white, convert_video_to_bw, create_looping_video, BwMethod,
};
use crate::prompt::{validate_prompt, PromptBuilder};
use crate::rate_limiter::RateLimiter;

/// Wait between resubmissions after the service returns no video.
pub const EMPTY_RESULT_RETRY_DELAY: Duration = Duration::from_secs(60);

const MISSING_KEY_HELP: &str = "GOOGLE_API_KEY environment variable is not set.\n\n\
    To use the cloud backend, add your API key to a .env file:\n\
        echo 'GOOGLE_API_KEY=your-api-key-here' >> .env\n\n\
    Or set it as an environment variable:\n\
        export GOOGLE_API_KEY=\"your-api-key-here\"\n\n\
    Or use the local backend: --backend local";

/// Build the shared rate limiter from config.
pub fn build_rate_limiter(config: &Config) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit_window(),
        Some(config.rate_limit_state_file()),
    ))
}

/// Construct the backends and the selector.
///
/// The cloud side is only built when an API key is configured; asking for
/// the cloud backend without one is an error.
pub fn build_generator(
    config: &Config,
    backend: Backend,
    rate_limiter: Arc<RateLimiter>,
) -> Result<VideoGenerator, String> {
    let cloud = match config.api_key() {
        Some(api_key) => {
            let client = VeoClient::build(
                api_key.to_string(),
                config.cloud.base_url.clone(),
                config.cloud.model.clone(),
            )
            .map_err(|e| format!("Failed to create Veo client: {}", e))?;
            let poller_config = config.poller_config().map_err(|e| e.to_string())?;
            Some(OperationPoller::new(
                Arc::new(client),
                rate_limiter,
                poller_config,
            ))
        }
        None if backend == Backend::Cloud => return Err(MISSING_KEY_HELP.to_string()),
        None => None,
    };

    let local = Arc::new(CommandBackend::new(
        config.local.command.clone(),
        config.local.args.clone(),
        config.local.model.clone(),
    ));

    Ok(VideoGenerator::new(
        backend,
        cloud,
        local,
        config.local_params(),
        config.output.dir.clone(),
    ))
}

/// Run a generation, resubmitting the whole job when the service completes
/// without a video.
///
/// Every other error is returned immediately.
pub async fn generate_with_empty_result_retries(
    generator: &VideoGenerator,
    image: &Path,
    prompt: &str,
    options: &GenerateOptions,
    max_attempts: u32,
    retry_delay: Duration,
) -> Result<PathBuf, GenerationError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match generator.generate_video(image, prompt, options).await {
            Err(e) if e.is_empty_result() && attempt < max_attempts => {
                log::warn!(
                    "Service returned no video (attempt {}/{}), retrying in {}s",
                    attempt,
                    max_attempts,
                    retry_delay.as_secs()
                );
                tokio::time::sleep(retry_delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Handle the generate subcommand.
pub async fn run_generate(args: GenerateArgs, config: &Config) -> Result<(), String> {
    let backend = Backend::from(args.backend);
    let bw_method = BwMethod::from(args.bw_method);
    let duration = args.duration.unwrap_or(config.video_duration);

    println!("Image: {}", args.image.display());
    println!("Backend: {}", backend);
    println!("Type: {:?}", args.photo_type);
    println!("Intensity: {:?}", args.intensity);
    println!("Duration: {}s", duration);
    println!();

    let mut working_image = args.image.clone();
    if args.preprocess_bw {
        print!("Converting image to black & white... ");
        std::io::Write::flush(&mut std::io::stdout()).ok();
        match convert_to_black_and_white(&args.image, None, bw_method) {
            Ok(path) => {
                println!("done");
                println!("  Method: {}", bw_method.as_str());
                working_image = path;
            }
            Err(e) => {
                println!("failed");
                log::warn!("B&W conversion failed: {}", e);
                eprintln!("Warning: B&W conversion failed ({}), using original image", e);
            }
        }
    }

    let builder = PromptBuilder::new(duration);
    let prompt = match &args.prompt {
        Some(description) => {
            validate_prompt(description).map_err(|e| e.to_string())?;
            builder.build_simple(description)
        }
        None => builder.build(
            args.photo_type.into(),
            args.intensity.into(),
            &args.custom_elements,
        ),
    };

    println!("Prompt:");
    println!("{}", prompt);
    println!();

    if args.dry_run {
        println!("Dry run: skipping video generation.");
        return Ok(());
    }

    let generator = build_generator(config, backend, build_rate_limiter(config))?;
    let options = GenerateOptions {
        output_path: args.output.clone(),
        timeout: args.timeout.map(Duration::from_secs),
        poll_interval: args.poll_interval.map(Duration::from_secs),
    };

    println!("Starting video generation...");
    let video = generate_with_empty_result_retries(
        &generator,
        &working_image,
        &prompt,
        &options,
        args.empty_result_retries,
        EMPTY_RESULT_RETRY_DELAY,
    )
    .await
    .map_err(|e| format!("Video generation failed: {}", e))?;
    println!("Color video saved to: {}", video.display());

    let bw_video = if args.no_bw {
        None
    } else {
        match convert_video_to_bw(&video, None, bw_method).await {
            Ok(path) => {
                println!("B&W video saved to: {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("B&W video conversion failed: {}", e);
                eprintln!("Warning: Failed to create B&W video: {}", e);
                None
            }
        }
    };

    if !args.no_loop {
        for source in std::iter::once(&video).chain(bw_video.as_ref()) {
            match create_looping_video(source, None, args.loop_crossfade, 1).await {
                Ok(path) => println!("Looping video saved to: {}", path.display()),
                Err(e) => {
                    log::warn!("Loop creation failed for {}: {}", source.display(), e);
                    eprintln!("Warning: Failed to create looping video: {}", e);
                }
            }
        }
    }

    Ok(())
}

/// Handle rate-limit subcommand actions.
pub fn handle_rate_limit_action(
    action: RateLimitAction,
    limiter: &RateLimiter,
) -> Result<(), String> {
    match action {
        RateLimitAction::Status { json } => {
            let status = limiter.get_status();
            if json {
                let rendered = serde_json::to_string_pretty(&status)
                    .map_err(|e| format!("Failed to render status: {}", e))?;
                println!("{}", rendered);
                return Ok(());
            }

            println!("Rate limit status:");
            println!(
                "  Requests: {}/{} in the last {:.0}s",
                status.current_requests, status.max_requests, status.window_seconds
            );
            println!("  Available: {}", status.requests_available);
            if status.can_make_request {
                println!("  Next request: now");
            } else {
                println!("  Next request: in {:.1}s", status.wait_time_seconds);
            }
            if let Some(path) = limiter.state_file() {
                println!("  State file: {}", path.display());
            }
        }
        RateLimitAction::Reset => {
            limiter.reset();
            println!("Rate limit history cleared.");
        }
    }
    Ok(())
}

/// Print backend availability.
pub fn show_backends(generator: &VideoGenerator, json: bool) -> Result<(), String> {
    let info = generator.backend_info();
    if json {
        let rendered = serde_json::to_string_pretty(&info)
            .map_err(|e| format!("Failed to render backend info: {}", e))?;
        println!("{}", rendered);
        return Ok(());
    }

    let mark = |available: bool| if available { "yes" } else { "no" };
    println!("Backend information:");
    println!("  Selected: {}", info.selected_backend);
    println!(
        "  Cloud: {} ({})",
        mark(info.cloud_available),
        info.cloud_model.as_deref().unwrap_or("no API key")
    );
    println!(
        "  Local: {} ({})",
        mark(info.local_available),
        info.local_model
    );
    Ok(())
}

/// Handle config subcommand actions.
///
/// `explicit_path` is the `--config` argument, if any; it replaces the default
/// location for both showing and initializing.
pub fn handle_config_action(
    action: ConfigAction,
    config: &Config,
    explicit_path: Option<&Path>,
) -> Result<(), String> {
    let config_path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            let rendered = config.to_toml().map_err(|e| e.to_string())?;
            println!("Current configuration:");
            println!();
            println!("{}", rendered.trim_end());
            println!();
            println!(
                "  API key: {}",
                if config.api_key().is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(format!(
                    "Config file already exists: {}\n\
                     Use 'living-portrait config show' to view current settings.",
                    config_path.display()
                ));
            }

            write_default_config(&config_path)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Error creating config directory: {}", e))?;
    }

    let body = Config::default().to_toml().map_err(|e| e.to_string())?;
    let content = format!(
        "# living-portrait configuration\n\
         # The API key is read from GOOGLE_API_KEY; it can also be set as\n\
         # `api_key` under [cloud].\n\n{}",
        body
    );

    std::fs::write(path, content).map_err(|e| format!("Error writing config file: {}", e))
}
