//! Typed configuration for viewtest.
//!
//! Test suites can keep their middleware style, logging setup, default
//! request headers and baseline settings in one file instead of repeating
//! them in every test:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields and unknown styles)
//! - Layered configuration (defaults → file → env)
//!
//! # Example
//!
//! ```no_run
//! use viewtest_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
//!
//! # fn main() -> Result<(), viewtest_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("viewtest.toml")?
//!     .with_env_prefix(DEFAULT_ENV_PREFIX)
//!     .load()?;
//!
//! println!("Tests run {} middleware", config.middleware.style);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [middleware]
//! style = "legacy"
//!
//! [logging]
//! enabled = true
//! level = "viewtest_middleware=trace,warn"
//! format = "pretty"
//!
//! [request.default_headers]
//! accept-language = "en"
//!
//! [settings]
//! LOGIN_URL = "/accounts/login/"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `VIEWTEST__MIDDLEWARE__STYLE=wrapper`
//! - `VIEWTEST__LOGGING__LEVEL=debug`
//! - `VIEWTEST__REQUEST__DEFAULT_HEADERS__ACCEPT_LANGUAGE=fr`
//! - `VIEWTEST__SETTINGS__PAGE_SIZE=25`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;

#[cfg(test)]
mod tests {
    use super::*;
    use viewtest_middleware::MiddlewareStyle;

    #[test]
    fn test_default_config() {
        let config = ViewTestConfig::default();
        assert_eq!(config.middleware.style, MiddlewareStyle::Legacy);
        assert!(config.logging.enabled);
    }
}
