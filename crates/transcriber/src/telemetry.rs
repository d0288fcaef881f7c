//! Subscriber setup for structured logging.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(config: &LoggingConfig) -> String {
    format!("{level},transcriber={level}", level = config.level)
}

/// Installs the global subscriber. `log` records from the persistence layer
/// are forwarded through tracing-subscriber's log bridge.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(
                level = %config.level,
                json_format = config.json,
                "Logging initialized"
            );
            true
        }
        Err(_) => false,
    }
}
