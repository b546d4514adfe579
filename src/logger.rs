//! Centralized logging configuration for sba-graph binaries and tests.
//!
//! This module provides a consistent tracing setup with a default INFO level
//! across all executables. Library code only emits events through the
//! `tracing` macros; whether and how they are rendered is up to the binary
//! that calls one of the initializers below.

use tracing::Level;

/// Initialize the tracing subscriber with sba-graph's standard configuration.
///
/// Default log level: INFO (overrideable via the `RUST_LOG` environment
/// variable).
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level.
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via `RUST_LOG`)
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();
}
