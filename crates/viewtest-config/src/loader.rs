//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;
use viewtest_middleware::MiddlewareStyle;

use crate::{ConfigError, LogFormat, ViewTestConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "VIEWTEST";

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file or string (TOML or JSON)
/// 3. Environment variables (optionally seeded from `.env`)
///
/// # Example
///
/// ```no_run
/// use viewtest_config::ConfigLoader;
///
/// # fn main() -> Result<(), viewtest_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("viewtest.toml")?
///     .with_dotenv()
///     .with_env_prefix("VIEWTEST")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ViewTestConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ViewTestConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use viewtest_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ViewTestConfig::development();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats.
    /// The file format is determined by the file extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields or an unknown middleware style
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// `format` is "toml" or "json".
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use viewtest_config::ConfigLoader;
    /// use viewtest_middleware::MiddlewareStyle;
    ///
    /// let toml = r#"
    ///     [middleware]
    ///     style = "wrapper"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.middleware.style, MiddlewareStyle::Wrapper);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`, for
    /// example `VIEWTEST__MIDDLEWARE__STYLE=wrapper`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if there is one.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<ViewTestConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix, env::vars())?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation or environment overrides.
    #[must_use]
    pub fn load_unvalidated(self) -> ViewTestConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<ViewTestConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Applies every `PREFIX__...` variable. Variables that only share the
    /// prefix, such as `PREFIX_HOME`, are not ours and are skipped.
    fn apply_env_overrides<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let scoped = format!("{prefix}__");
        let env_vars: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(&scoped))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            ["MIDDLEWARE", "STYLE"] => {
                self.config.middleware.style = match value.to_lowercase().as_str() {
                    "legacy" => MiddlewareStyle::Legacy,
                    "wrapper" => MiddlewareStyle::Wrapper,
                    _ => {
                        return Err(ConfigError::env_parse(
                            key,
                            "expected 'legacy' or 'wrapper'",
                        ))
                    }
                };
            }

            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                self.config.logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse(key, "expected boolean"))?;
            }

            // VIEWTEST__REQUEST__DEFAULT_HEADERS__ACCEPT_LANGUAGE=en
            ["REQUEST", "DEFAULT_HEADERS", name] => {
                let name = name.to_lowercase().replace('_', "-");
                self.config
                    .request
                    .default_headers
                    .insert(name, value.to_string());
            }

            // Settings keep the variable's case; values are JSON when they parse.
            ["SETTINGS", name] => {
                let parsed =
                    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
                self.config.settings.insert((*name).to_string(), parsed);
            }

            _ => {}
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, ViewTestConfig::default());
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"middleware": {"style": "wrapper"}, "settings": {"DEBUG": false}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.middleware.style, MiddlewareStyle::Wrapper);
        assert_eq!(config.settings["DEBUG"], json!(false));
    }

    #[test]
    fn test_loader_with_string_unknown_format() {
        let result = ConfigLoader::new().with_string("style: wrapper", "yaml");
        assert!(result.unwrap_err().to_string().contains("yaml"));
    }

    #[test]
    fn test_loader_rejects_unknown_style() {
        let toml = r#"
            [middleware]
            style = "asgi"
        "#;
        assert!(ConfigLoader::new().with_string(toml, "toml").is_err());
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/viewtest.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/viewtest.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.middleware.style, MiddlewareStyle::Legacy);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_apply_env_var_style() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__MIDDLEWARE__STYLE", "Wrapper", "TEST").unwrap();
        assert_eq!(loader.config.middleware.style, MiddlewareStyle::Wrapper);
    }

    #[test]
    fn test_apply_env_var_invalid_style() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__MIDDLEWARE__STYLE", "asgi", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParse { .. })));
    }

    #[test]
    fn test_apply_env_var_logging() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__LOGGING__LEVEL", "debug", "TEST").unwrap();
        loader.apply_env_var("TEST__LOGGING__FORMAT", "json", "TEST").unwrap();
        loader.apply_env_var("TEST__LOGGING__ENABLED", "no", "TEST").unwrap();
        assert_eq!(loader.config.logging.level, "debug");
        assert_eq!(loader.config.logging.format, LogFormat::Json);
        assert!(!loader.config.logging.enabled);
    }

    #[test]
    fn test_apply_env_var_invalid_boolean() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__LOGGING__INCLUDE_LOCATION", "maybe", "TEST");
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_env_var_default_header() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__REQUEST__DEFAULT_HEADERS__ACCEPT_LANGUAGE", "fr", "TEST")
            .unwrap();
        assert_eq!(loader.config.request.default_headers["accept-language"], "fr");
    }

    #[test]
    fn test_apply_env_var_settings() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SETTINGS__PAGE_SIZE", "25", "TEST").unwrap();
        loader.apply_env_var("TEST__SETTINGS__SITE_NAME", "example", "TEST").unwrap();
        assert_eq!(loader.config.settings["PAGE_SIZE"], json!(25));
        assert_eq!(loader.config.settings["SITE_NAME"], json!("example"));
    }

    #[test]
    fn test_env_overrides_skip_vars_sharing_prefix() {
        let vars = [
            ("TEST_HOME", "/tmp"),
            ("TESTS", "1"),
            ("TEST", "x"),
            ("TEST__MIDDLEWARE__STYLE", "wrapper"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));

        let mut loader = ConfigLoader::new();
        loader.apply_env_overrides("TEST", vars).unwrap();
        assert_eq!(loader.config.middleware.style, MiddlewareStyle::Wrapper);
    }

    #[test]
    fn test_load_ignores_unrelated_prefixed_var() {
        env::set_var("VTLOADERCHECK_HOME", "/tmp");
        env::set_var("VTLOADERCHECK__LOGGING__LEVEL", "warn");

        let config = ConfigLoader::new()
            .with_env_prefix("VTLOADERCHECK")
            .load()
            .unwrap();
        assert_eq!(config.logging.level, "warn");

        env::remove_var("VTLOADERCHECK_HOME");
        env::remove_var("VTLOADERCHECK__LOGGING__LEVEL");
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SERVER__HTTP_ADDR", "0.0.0.0:80", "TEST").unwrap();
        assert_eq!(loader.config, ViewTestConfig::default());
    }
}
