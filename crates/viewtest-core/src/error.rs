//! Error types for viewtest.
//!
//! [`ViewTestError`] covers every failure the request builder, the middleware
//! loader and the view invoker can surface. Errors raised by views themselves
//! travel as [`ViewError`] (an [`anyhow::Error`]) so that exception hooks and
//! tests can downcast to the concrete type the view produced.
//!
//! # Taxonomy
//!
//! | Variant | Raised by | Recoverable |
//! |---|---|---|
//! | `InvalidMethod` | request builder | no |
//! | `MissingViewConfiguration` | view invoker | no |
//! | `UnsupportedMiddlewareStyle` | middleware loader | no |
//! | `View` | the view or a middleware | only by a legacy exception hook |

use http::StatusCode;
use thiserror::Error;

/// Error raised by a view or by middleware while handling a request.
pub type ViewError = anyhow::Error;

/// Result of running a view or a handler chain.
pub type ViewResult = Result<crate::Response, ViewError>;

/// Result type alias using [`ViewTestError`].
pub type ViewTestResult<T> = Result<T, ViewTestError>;

/// Standard error type for viewtest.
///
/// # Example
///
/// ```
/// use viewtest_core::ViewTestError;
///
/// let err = ViewTestError::invalid_method("BREW");
/// assert_eq!(err.to_string(), "invalid HTTP method: BREW");
/// ```
#[derive(Error, Debug)]
pub enum ViewTestError {
    /// The request builder was asked for a verb it does not recognise.
    #[error("invalid HTTP method: {method}")]
    InvalidMethod {
        /// The rejected method name, as given.
        method: String,
    },

    /// A view was invoked but neither a view type nor a view function was configured.
    #[error("no view configured: set a view type or a view function before invoking")]
    MissingViewConfiguration,

    /// The configured middleware mixes styles or does not match the selected style.
    #[error("unsupported middleware style: {message}")]
    UnsupportedMiddlewareStyle {
        /// Which descriptor conflicted and why.
        message: String,
    },

    /// The synthetic request could not be assembled.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A deferred template failed to compile or render.
    #[error("template error: {0}")]
    Template(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The view (or a middleware) failed and nothing recovered the error.
    ///
    /// The wrapped error is the original one; use [`anyhow::Error::downcast_ref`]
    /// to inspect it.
    #[error(transparent)]
    View(#[from] ViewError),
}

impl ViewTestError {
    /// Create a new invalid method error.
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            method: method.into(),
        }
    }

    /// Create a new unsupported middleware style error.
    pub fn unsupported_style(message: impl Into<String>) -> Self {
        Self::UnsupportedMiddlewareStyle {
            message: message.into(),
        }
    }

    /// Returns the view error if this is an unrecovered view failure.
    #[must_use]
    pub fn as_view_error(&self) -> Option<&ViewError> {
        match self {
            Self::View(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the view error is of type `E`.
    #[must_use]
    pub fn is_view_error<E>(&self) -> bool
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.as_view_error()
            .is_some_and(|e| e.downcast_ref::<E>().is_some())
    }

    /// Status code a real server would answer with for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::RequestBuild(_) | Self::InvalidHeader(_) | Self::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingViewConfiguration
            | Self::UnsupportedMiddlewareStyle { .. }
            | Self::Template(_)
            | Self::View(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<handlebars::TemplateError> for ViewTestError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for ViewTestError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("bad value")]
    struct ValueError;

    #[test]
    fn test_invalid_method_display() {
        let err = ViewTestError::invalid_method("BREW");
        assert!(err.to_string().contains("BREW"));
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_unsupported_style_display() {
        let err = ViewTestError::unsupported_style("wrapper middleware in legacy mode");
        assert!(err.to_string().contains("wrapper middleware in legacy mode"));
    }

    #[test]
    fn test_view_error_is_transparent() {
        let err = ViewTestError::from(anyhow::Error::new(ValueError));
        assert_eq!(err.to_string(), "bad value");
        assert!(err.is_view_error::<ValueError>());
        assert!(!err.is_view_error::<std::io::Error>());
    }

    #[test]
    fn test_non_view_error_has_no_view_error() {
        let err = ViewTestError::MissingViewConfiguration;
        assert!(err.as_view_error().is_none());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
