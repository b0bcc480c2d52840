//! Tracing setup for the ledger process
//!
//! Ledger targets (`simple_ledger::*`) log at the configured level. The
//! database driver and its pool are capped at `warn`, since sqlx reports
//! every statement at `info`. `RUST_LOG` replaces the whole directive set.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Targets kept quiet regardless of the configured level
const QUIET_TARGETS: [&str; 2] = ["sqlx", "sqlx::query"];

/// EnvFilter directives derived from the config
pub fn filter_directives(config: &AppConfig) -> String {
    let level = config.log_level.as_str();
    let mut directives = vec![
        "warn".to_string(),
        format!("{}={}", env!("CARGO_CRATE_NAME"), level),
    ];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}

fn file_appender(config: &AppConfig) -> RollingFileAppender {
    let dir = &config.log_dir;
    let file = &config.log_file;
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(dir, file),
        "daily" => tracing_appender::rolling::daily(dir, file),
        _ => tracing_appender::rolling::never(dir, file),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; hold it until exit.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(file_appender(config));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // Transfer spans carry from/to/amount; flatten them into each event
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer)
            .with_ansi(false);
        registry.with(json_layer).init();
    } else {
        let text_layer = fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .with_ansi(false);
        let console_layer = fmt::layer().with_target(false).compact();
        registry.with(text_layer).with(console_layer).init();
    }

    tracing::debug!(
        level = %config.log_level,
        rotation = %config.rotation,
        json = config.use_json,
        "Logging initialised"
    );
    guard
}
