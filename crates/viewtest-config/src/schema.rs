//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use viewtest_middleware::MiddlewareStyle;
use viewtest_telemetry::LogConfig;

/// Middleware configuration section.
///
/// # Example
///
/// ```
/// use viewtest_config::MiddlewareConfig;
/// use viewtest_middleware::MiddlewareStyle;
///
/// let config: MiddlewareConfig = toml::from_str(r#"style = "wrapper""#).unwrap();
/// assert_eq!(config.style, MiddlewareStyle::Wrapper);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Calling convention the tests use: "legacy" or "wrapper".
    #[serde(default)]
    pub style: MiddlewareStyle,
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (CI log collectors).
    Json,
    /// Human-readable format.
    #[default]
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or filter directives.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Converts this section into a test-harness logging setup.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            json_format: self.format == LogFormat::Json,
            file_line_info: self.include_location,
            ..LogConfig::test()
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Request factory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    /// Headers added to every request the factory builds.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}
