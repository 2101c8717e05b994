//! Structured logging for viewtest.
//!
//! The pipeline emits `tracing` events (invocation start and finish, phase
//! transitions, unrecovered view errors). This module installs a
//! `tracing-subscriber` to print them, in JSON or human-readable form.
//!
//! # Example
//!
//! ```rust,ignore
//! use viewtest_telemetry::logging::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::development())?;
//!
//! tracing::debug!(request_id = %id, view = "ArticleDetail", "Invoking view");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Log level or filter directives (e.g., "info", "viewtest_middleware=trace").
    pub level: String,

    /// Whether `RUST_LOG` overrides `level` when set.
    pub respect_env: bool,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (enter, exit, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Whether to write through the test harness so output is captured per test.
    pub test_writer: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            respect_env: true,
            json_format: false,
            span_events: false,
            file_line_info: false,
            include_target: true,
            test_writer: false,
        }
    }
}

impl LogConfig {
    /// Creates a development configuration with verbose human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            span_events: true,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// Creates a configuration for test runs.
    ///
    /// Output goes through the test harness, so it only shows for failing
    /// tests (or with `--nocapture`).
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "warn".to_string(),
            test_writer: true,
            ..Self::default()
        }
    }

    /// Creates a configuration with JSON output.
    #[must_use]
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Self::default()
        }
    }

    /// Sets the level or filter directives.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        if self.respect_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        create_env_filter(&self.level)
    }

    fn writer(&self) -> BoxMakeWriter {
        if self.test_writer {
            BoxMakeWriter::new(TestWriter::new())
        } else {
            BoxMakeWriter::new(std::io::stderr)
        }
    }
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` for a bad level and
/// `TelemetryError::LoggingInit` if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = config.filter()?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(config.writer())
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(config.writer())
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Installs test logging unless a subscriber is already set.
///
/// Safe to call from every test. Returns true if this call installed the
/// subscriber.
pub fn try_init_test_logging() -> bool {
    init_logging(&LogConfig::test()).is_ok()
}

/// Creates an env filter from a string.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` if the directives do not parse.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter(format!("{filter}: {e}")))
}

/// Standard log fields for viewtest.
///
/// Use these field names for consistency across logs.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// HTTP method field name.
    pub const HTTP_METHOD: &str = "method";

    /// Request path field name.
    pub const HTTP_PATH: &str = "path";

    /// Response status code field name.
    pub const HTTP_STATUS: &str = "status";

    /// View name field name.
    pub const VIEW: &str = "view";

    /// Middleware style field name.
    pub const STYLE: &str = "style";

    /// Pipeline phase field names.
    pub const PHASE_FROM: &str = "from";

    /// Pipeline phase field names.
    pub const PHASE_TO: &str = "to";

    /// Error field name.
    pub const ERROR: &str = "error";
}

/// Logs the start of a view invocation.
#[macro_export]
macro_rules! log_invocation_start {
    ($request_id:expr, $method:expr, $path:expr, $view:expr) => {
        tracing::debug!(
            request_id = %$request_id,
            method = %$method,
            path = %$path,
            view = %$view,
            "View invocation started"
        );
    };
}

/// Logs the end of a view invocation.
#[macro_export]
macro_rules! log_invocation_complete {
    ($request_id:expr, $status:expr) => {
        tracing::debug!(
            request_id = %$request_id,
            status = $status,
            "View invocation completed"
        );
    };
}

/// Logs a failed view invocation.
#[macro_export]
macro_rules! log_invocation_error {
    ($request_id:expr, $error:expr) => {
        tracing::warn!(
            request_id = %$request_id,
            error = %$error,
            "View invocation failed"
        );
    };
}
