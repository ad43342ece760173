//! Structured logging with JSON, pretty and compact formats.
//!
//! - JSON format for production environments
//! - Pretty format for development
//! - Per-module log level configuration
//! - `RUST_LOG` takes precedence over the configured level when set

use serde::Deserialize;
use std::collections::HashMap;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty or compact)
    #[serde(default)]
    pub format: LogFormat,

    /// Per-module log levels
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Whether to include file/line information
    #[serde(default)]
    pub include_location: bool,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,

    /// Emit an event when a span closes, with its timing
    #[serde(default)]
    pub span_close_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: false,
            include_target: default_include_target(),
            span_close_events: false,
        }
    }
}

impl LoggingConfig {
    /// Build the filter: `RUST_LOG` if present, otherwise the configured level
    /// plus per-module directives.
    pub fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let mut filter = EnvFilter::try_new(&self.level)?;
        let mut modules: Vec<_> = self.module_levels.iter().collect();
        modules.sort();
        for (module, level) in modules {
            filter = filter.add_directive(format!("{}={}", module, level).parse()?);
        }
        Ok(filter)
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_close_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    Json,
    /// Pretty format for development
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_include_target() -> bool {
    true
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
///
/// # Errors
///
/// Returns an error if a filter directive is invalid or a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = config.env_filter()?;

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_deserializes_lowercase() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"format": "compact", "level": "debug"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, "debug");
        assert!(config.include_target);
    }

    #[test]
    fn test_invalid_module_directive_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("schoolgate_core".to_string(), "loud".to_string());
        assert!(config.env_filter().is_err());
    }
}
