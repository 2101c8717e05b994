//! Main configuration types.
//!
//! This module provides the top-level [`ViewTestConfig`] struct and its builder.

use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use viewtest_middleware::MiddlewareStyle;

use crate::{ConfigError, LogFormat, LoggingConfig, MiddlewareConfig, RequestConfig};

/// Complete viewtest configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use viewtest_config::ViewTestConfig;
/// use viewtest_middleware::MiddlewareStyle;
///
/// let config = ViewTestConfig::default();
/// assert_eq!(config.middleware.style, MiddlewareStyle::Legacy);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ViewTestConfig {
    /// Middleware configuration.
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Request factory configuration.
    #[serde(default)]
    pub request: RequestConfig,

    /// Free-form settings seeding the settings registry.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl ViewTestConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use viewtest_config::ViewTestConfig;
    /// use viewtest_middleware::MiddlewareStyle;
    ///
    /// let config = ViewTestConfig::builder()
    ///     .style(MiddlewareStyle::Wrapper)
    ///     .default_header("accept-language", "en")
    ///     .build();
    ///
    /// assert_eq!(config.middleware.style, MiddlewareStyle::Wrapper);
    /// ```
    #[must_use]
    pub fn builder() -> ViewTestConfigBuilder {
        ViewTestConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The log level does not parse as a filter
    /// - A default header name or value is not valid HTTP
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.enabled {
            viewtest_telemetry::create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        for (name, value) in &self.request.default_headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::invalid_value(
                    "request.default_headers",
                    format!("invalid header name: {name}"),
                ));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::invalid_value(
                    format!("request.default_headers.{name}"),
                    "invalid header value",
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Debug-level, human-readable logs with source locations.
    ///
    /// # Example
    ///
    /// ```
    /// use viewtest_config::ViewTestConfig;
    ///
    /// let config = ViewTestConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;
        config
    }

    /// Create a CI configuration preset.
    ///
    /// Info-level JSON logs.
    #[must_use]
    pub fn ci() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}

/// Builder for [`ViewTestConfig`].
#[derive(Debug, Default)]
pub struct ViewTestConfigBuilder {
    middleware: Option<MiddlewareConfig>,
    logging: Option<LoggingConfig>,
    request: RequestConfig,
    settings: Map<String, Value>,
}

impl ViewTestConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the middleware style.
    #[must_use]
    pub fn style(mut self, style: MiddlewareStyle) -> Self {
        self.middleware = Some(MiddlewareConfig { style });
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Add a default request header.
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.default_headers.insert(name.into(), value.into());
        self
    }

    /// Add a setting.
    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> ViewTestConfig {
        ViewTestConfig {
            middleware: self.middleware.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
            request: self.request,
            settings: self.settings,
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<ViewTestConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = ViewTestConfig::default();
        assert_eq!(config.middleware.style, MiddlewareStyle::Legacy);
        assert_eq!(config.logging.level, "warn");
        assert!(config.request.default_headers.is_empty());
        assert!(config.settings.is_empty());
    }

    #[test]
    fn test_builder_all_sections() {
        let config = ViewTestConfig::builder()
            .style(MiddlewareStyle::Wrapper)
            .logging(LoggingConfig {
                level: "trace".to_string(),
                ..Default::default()
            })
            .default_header("accept-language", "en")
            .setting("DEBUG", true)
            .build();

        assert_eq!(config.middleware.style, MiddlewareStyle::Wrapper);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.request.default_headers["accept-language"], "en");
        assert_eq!(config.settings["DEBUG"], json!(true));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(ViewTestConfig::default().validate().is_ok());
        assert!(ViewTestConfig::development().validate().is_ok());
        assert!(ViewTestConfig::ci().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_header_name() {
        let result = ViewTestConfig::builder()
            .default_header("bad header", "x")
            .build_validated();
        assert!(result.unwrap_err().to_string().contains("invalid header name"));
    }

    #[test]
    fn test_validate_invalid_header_value() {
        let result = ViewTestConfig::builder()
            .default_header("x-trace", "line\nbreak")
            .build_validated();
        assert!(result.unwrap_err().to_string().contains("x-trace"));
    }

    #[test]
    fn test_validate_invalid_level() {
        let result = ViewTestConfig::builder()
            .logging(LoggingConfig {
                level: "viewtest=notalevel".to_string(),
                ..Default::default()
            })
            .build_validated();
        assert!(result.unwrap_err().to_string().contains("logging.level"));
    }

    #[test]
    fn test_development_preset() {
        let config = ViewTestConfig::development();
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.logging.include_location);
    }

    #[test]
    fn test_ci_preset() {
        let config = ViewTestConfig::ci();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_toml_serialization() {
        let config = ViewTestConfig::builder().default_header("accept", "text/html").build();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[middleware]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            [middleware]
            style = "wrapper"

            [settings]
            LANGUAGE_CODE = "en-us"

            [settings.CACHES]
            backend = "locmem"
        "#;

        let config: ViewTestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.middleware.style, MiddlewareStyle::Wrapper);
        assert_eq!(config.settings["LANGUAGE_CODE"], json!("en-us"));
        assert_eq!(config.settings["CACHES"], json!({"backend": "locmem"}));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let toml_str = r#"
            [server]
            http_addr = "127.0.0.1:8000"
        "#;

        let result: Result<ViewTestConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }
}
