//! Logging setup.
//!
//! Library code logs through the `log` macros; the binary installs a
//! `tracing-subscriber` formatter whose log bridge picks those records up.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber at `level`.
///
/// `RUST_LOG`, when set, takes precedence. Calling this twice is harmless.
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter)
        .try_init();

    if result.is_ok() {
        log::debug!("Logging configured at {} level", level);
    }
}

/// Directive applied to this crate, keeping dependencies at `warn`.
fn filter_directive(level: &str) -> String {
    format!("warn,living_portrait={}", level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("debug"), "warn,living_portrait=debug");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging("info");
        init_logging("debug");
    }
}
