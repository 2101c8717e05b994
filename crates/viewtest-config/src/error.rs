//! Errors raised while loading a test configuration.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a configuration could not be loaded.
///
/// Parse errors cover unknown keys and unknown middleware styles too, since
/// every section is `deny_unknown_fields`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named file does not exist.
    #[error("configuration file not found: {}", path.display())]
    FileNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// The TOML source did not deserialize.
    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The JSON source did not deserialize.
    #[error("failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A `PREFIX__SECTION__KEY` variable held a value of the wrong shape.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParse {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// The loaded configuration failed validation.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending key.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn file_not_found(path: &Path) -> Self {
        Self::FileNotFound {
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn env_parse(var: &str, reason: &str) -> Self {
        Self::EnvParse {
            var: var.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Dotted key path for validation failures, or the variable name for
    /// environment overrides.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            Self::EnvParse { var, .. } => Some(var),
            _ => None,
        }
    }
}
