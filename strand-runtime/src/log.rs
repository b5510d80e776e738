//! Logging Infrastructure
//!
//! The runtime emits `tracing` events: slot creation and removal at `trace`,
//! thread spawn, interruption and join at `debug`. This module installs a
//! `tracing-subscriber` formatter driven by [`LogConfig`].
//!
//! `RUST_LOG`, when set, overrides the configured level.
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_runtime::config::{LogConfig, LogLevel};
//!
//! strand_runtime::log::init(&LogConfig {
//!     level: LogLevel::Debug,
//!     ..LogConfig::default()
//! });
//! ```

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogLevel};

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Build the event filter for `config`, honouring `RUST_LOG` when present.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from(config.level).into())
        .from_env_lossy()
}

/// Install the global subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is kept.
pub fn init(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_thread_names(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let installed = if config.timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    installed.is_ok()
}
