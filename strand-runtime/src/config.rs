//! Runtime Configuration
//!
//! Configuration for spawned threads and logging. It can be built
//! programmatically or loaded from environment variables.
//!
//! # Environment Variables
//!
//! All environment variables use the `STRAND_` prefix:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `STRAND_THREAD_NAME_PREFIX` | Name prefix for spawned threads | `strand` |
//! | `STRAND_STACK_SIZE` | Stack size for spawned threads in bytes (min 16384) | platform default |
//! | `STRAND_LOG_LEVEL` | Log level (off/error/warn/info/debug/trace) | info |
//! | `STRAND_LOG_TIMESTAMPS` | Include timestamps in log output ("true"/"false") | true |
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_runtime::config::RuntimeConfig;
//!
//! // Load from environment with defaults
//! let config = RuntimeConfig::from_env();
//!
//! // Or reject malformed variables instead of ignoring them
//! let config = RuntimeConfig::try_from_env()?;
//!
//! // Or use the builder pattern
//! let config = RuntimeConfig::builder()
//!     .thread_name_prefix("worker")
//!     .stack_size(Some(256 * 1024))
//!     .build()?;
//! ```

use std::env;

use thiserror::Error;

/// Smallest stack size accepted for spawned threads.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Log level for runtime logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// No logging.
    Off,
    /// Error messages only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages (default).
    #[default]
    Info,
    /// Debug messages.
    Debug,
    /// Trace-level messages.
    Trace,
}

impl LogLevel {
    /// Parse a log level from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Defaults applied to threads spawned through [`crate::thread`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDefaults {
    /// Prefix for generated thread names (`<prefix>-<id>`).
    /// Default: "strand".
    pub name_prefix: String,

    /// Stack size in bytes; `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl Default for ThreadDefaults {
    fn default() -> Self {
        Self {
            name_prefix: "strand".to_string(),
            stack_size: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level.
    /// Default: Info.
    pub level: LogLevel,

    /// Include timestamps in log output.
    /// Default: true.
    pub timestamps: bool,

    /// Include source location in log output.
    /// Default: false (only in debug builds).
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            timestamps: true,
            source_location: cfg!(debug_assertions),
        }
    }
}

/// Complete runtime configuration.
///
/// Use `RuntimeConfig::default()` for sensible defaults, or
/// `RuntimeConfig::from_env()` to load from environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Spawned thread defaults.
    pub thread: ThreadDefaults,

    /// Logging configuration.
    pub log: LogConfig,
}

impl RuntimeConfig {
    /// Create a new builder for RuntimeConfig.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Variables that are unset or unparsable leave the default in place.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Thread configuration
        if let Some(val) = lookup("STRAND_THREAD_NAME_PREFIX") {
            let val = val.trim();
            if !val.is_empty() {
                config.thread.name_prefix = val.to_string();
            }
        }

        if let Some(val) = lookup("STRAND_STACK_SIZE").and_then(|v| parse_usize(&v)) {
            if val >= MIN_STACK_SIZE {
                config.thread.stack_size = Some(val);
            }
        }

        // Logging configuration
        if let Some(level) = lookup("STRAND_LOG_LEVEL").and_then(|v| LogLevel::from_str(&v)) {
            config.log.level = level;
        }

        if let Some(val) = lookup("STRAND_LOG_TIMESTAMPS").and_then(|v| parse_bool(&v)) {
            config.log.timestamps = val;
        }

        config
    }

    /// Load configuration from environment variables, rejecting bad values.
    ///
    /// Unset variables keep their defaults. A variable that is set but does
    /// not parse yields [`ConfigError::EnvParse`]; the result is then
    /// validated.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(|name| env::var(name).ok())
    }

    /// Strict variant of [`RuntimeConfig::from_lookup`].
    pub fn try_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("STRAND_THREAD_NAME_PREFIX") {
            config.thread.name_prefix = val.trim().to_string();
        }

        if let Some(val) = lookup("STRAND_STACK_SIZE") {
            config.thread.stack_size = Some(parse_env_value(
                "STRAND_STACK_SIZE",
                &val,
                parse_usize,
                "a size in bytes",
            )?);
        }

        if let Some(val) = lookup("STRAND_LOG_LEVEL") {
            config.log.level = parse_env_value(
                "STRAND_LOG_LEVEL",
                &val,
                LogLevel::from_str,
                "one of off/error/warn/info/debug/trace",
            )?;
        }

        if let Some(val) = lookup("STRAND_LOG_TIMESTAMPS") {
            config.log.timestamps =
                parse_env_value("STRAND_LOG_TIMESTAMPS", &val, parse_bool, "a boolean")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread.name_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "thread.name_prefix".into(),
                message: "must not be empty".into(),
            });
        }

        if self.thread.name_prefix.contains('\0') {
            return Err(ConfigError::InvalidValue {
                field: "thread.name_prefix".into(),
                message: "must not contain NUL bytes".into(),
            });
        }

        if let Some(size) = self.thread.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(ConfigError::InvalidValue {
                    field: "thread.stack_size".into(),
                    message: format!("must be at least {} bytes", MIN_STACK_SIZE),
                });
            }
        }

        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("invalid configuration for '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },

    /// Environment variable that is set but cannot be parsed.
    #[error("failed to parse environment variable '{var}': {message}")]
    EnvParse {
        /// Variable name.
        var: String,
        /// Error message.
        message: String,
    },
}

/// Builder for RuntimeConfig.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name prefix for spawned threads.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread.name_prefix = prefix.into();
        self
    }

    /// Set the stack size for spawned threads.
    pub fn stack_size(mut self, size: Option<usize>) -> Self {
        self.config.thread.stack_size = size;
        self
    }

    /// Set the log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log.level = level;
        self
    }

    /// Enable or disable timestamps in log output.
    pub fn log_timestamps(mut self, enabled: bool) -> Self {
        self.config.log.timestamps = enabled;
        self
    }

    /// Enable or disable source locations in log output.
    pub fn log_source_location(mut self, enabled: bool) -> Self {
        self.config.log.source_location = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// This validates the configuration and returns an error if invalid.
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation.
    pub fn build_unchecked(self) -> RuntimeConfig {
        self.config
    }
}

fn parse_usize(raw: &str) -> Option<usize> {
    raw.trim().parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env_value<T>(
    var: &str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    expected: &str,
) -> Result<T, ConfigError> {
    parse(raw).ok_or_else(|| ConfigError::EnvParse {
        var: var.to_string(),
        message: format!("expected {}, got {:?}", expected, raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.thread.name_prefix, "strand");
        assert!(config.thread.stack_size.is_none());
        assert_eq!(config.log.level, LogLevel::Info);
        assert!(config.log.timestamps);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::builder()
            .thread_name_prefix("worker")
            .stack_size(Some(64 * 1024))
            .log_level(LogLevel::Debug)
            .log_timestamps(false)
            .build()
            .unwrap();

        assert_eq!(config.thread.name_prefix, "worker");
        assert_eq!(config.thread.stack_size, Some(64 * 1024));
        assert_eq!(config.log.level, LogLevel::Debug);
        assert!(!config.log.timestamps);
    }

    #[test]
    fn test_builder_validation() {
        assert!(RuntimeConfig::builder().thread_name_prefix("  ").build().is_err());
        assert!(RuntimeConfig::builder().stack_size(Some(1024)).build().is_err());

        let unchecked = RuntimeConfig::builder().stack_size(Some(1024)).build_unchecked();
        assert_eq!(unchecked.thread.stack_size, Some(1024));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERROR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("5"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("invalid"), None);
        assert_eq!(LogLevel::Warn.as_str(), "warn");
    }

    #[test]
    fn test_from_lookup() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("STRAND_THREAD_NAME_PREFIX", "pool"),
            ("STRAND_STACK_SIZE", "131072"),
            ("STRAND_LOG_LEVEL", "trace"),
            ("STRAND_LOG_TIMESTAMPS", "off"),
        ]));

        assert_eq!(config.thread.name_prefix, "pool");
        assert_eq!(config.thread.stack_size, Some(131072));
        assert_eq!(config.log.level, LogLevel::Trace);
        assert!(!config.log.timestamps);
    }

    #[test]
    fn test_from_lookup_ignores_invalid_values() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("STRAND_THREAD_NAME_PREFIX", ""),
            ("STRAND_STACK_SIZE", "512"),
            ("STRAND_LOG_LEVEL", "loud"),
            ("STRAND_LOG_TIMESTAMPS", "maybe"),
        ]));

        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_try_from_lookup() {
        let config = RuntimeConfig::try_from_lookup(lookup_from(&[
            ("STRAND_STACK_SIZE", " 65536 "),
            ("STRAND_LOG_LEVEL", "warn"),
        ]))
        .unwrap();

        assert_eq!(config.thread.name_prefix, "strand");
        assert_eq!(config.thread.stack_size, Some(65536));
        assert_eq!(config.log.level, LogLevel::Warn);
        assert_eq!(RuntimeConfig::try_from_lookup(|_| None), Ok(RuntimeConfig::default()));
    }

    #[test]
    fn test_try_from_lookup_rejects_bad_values() {
        let err = RuntimeConfig::try_from_lookup(lookup_from(&[("STRAND_STACK_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParse { ref var, .. } if var == "STRAND_STACK_SIZE"));

        let err = RuntimeConfig::try_from_lookup(lookup_from(&[("STRAND_LOG_LEVEL", "loud")]))
            .unwrap_err();
        assert!(err.to_string().starts_with(
            "failed to parse environment variable 'STRAND_LOG_LEVEL': expected one of"
        ));

        let err = RuntimeConfig::try_from_lookup(lookup_from(&[("STRAND_LOG_TIMESTAMPS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParse { .. }));

        // Parsable but out of range is a validation failure.
        let err = RuntimeConfig::try_from_lookup(lookup_from(&[("STRAND_STACK_SIZE", "512")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "thread.stack_size"));

        let err = RuntimeConfig::try_from_lookup(lookup_from(&[("STRAND_THREAD_NAME_PREFIX", " ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "thread.stack_size".into(),
            message: "too small".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration for 'thread.stack_size': too small"
        );
    }
}
