use clap::Parser;

use living_portrait::cli::{self, Args, Command};
use living_portrait::config::Config;
use living_portrait::generator::Backend;
use living_portrait::logging::init_logging;

/// Load environment variables from .env file if present.
fn load_env() {
    // Existing env vars win; a missing .env is fine
    let _ = dotenv::dotenv();
}

/// Exit on Ctrl+C; generations in flight are abandoned.
fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        eprintln!("\nGeneration interrupted by user");
        std::process::exit(1);
    })
}

fn run(args: Args, config: Config) -> Result<(), String> {
    match args.command {
        Command::Config { action } => {
            cli::handle_config_action(action, &config, args.config.as_deref())
        }
        Command::RateLimit { action } => {
            let limiter = cli::build_rate_limiter(&config);
            cli::handle_rate_limit_action(action, &limiter)
        }
        Command::Backends { json } => {
            let generator =
                cli::build_generator(&config, Backend::Auto, cli::build_rate_limiter(&config))?;
            cli::show_backends(&generator, json)
        }
        Command::Generate(generate) => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| format!("Failed to create async runtime: {}", e))?;
            rt.block_on(cli::run_generate(generate, &config))
        }
    }
}

fn main() {
    // Load .env file before anything else
    load_env();

    let args = Args::parse();

    // An explicit --config must exist; the default location may be absent
    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let level = if args.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    init_logging(level);

    if let Err(e) = setup_ctrlc_handler() {
        log::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = run(args, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
