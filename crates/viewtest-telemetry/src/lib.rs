//! Logging for viewtest.
//!
//! The middleware pipeline reports what it does through `tracing` events:
//!
//! | Level | Event |
//! |-------|-------|
//! | `debug` | invocation start and finish, middleware classification |
//! | `trace` | every phase transition of the invocation state machine |
//! | `warn` | a view error no exception hook recovered |
//!
//! This crate installs a `tracing-subscriber` that prints those events,
//! filtered by level (or `RUST_LOG`), as JSON or human-readable lines.
//!
//! # Example
//!
//! ```
//! use viewtest_telemetry::try_init_test_logging;
//!
//! // In a test: install once, subsequent calls are no-ops.
//! let _ = try_init_test_logging();
//! tracing::warn!("visible in the output of failing tests");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, try_init_test_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_macros_expand() {
        let _ = try_init_test_logging();
        log_invocation_start!("req-1", "GET", "/articles/", "ArticleList");
        log_invocation_complete!("req-1", 200u16);
        log_invocation_error!("req-1", "ValueError: bad value");
    }
}
