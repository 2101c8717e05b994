//! Middleware pipelines.
//!
//! A pipeline runs one view invocation through the declared middleware.
//! Two topologies exist, one per [`MiddlewareStyle`]:
//!
//! - [`LegacyPipeline`] keeps five ordered hook lists and drives them through
//!   an explicit state machine (see [`Phase`]);
//! - [`WrapperPipeline`] composes the wrappers into a single handler chain
//!   whose innermost handler runs the view.
//!
//! ## Legacy phase order
//!
//! ```text
//! Start → Request ─┬─────────────────────────────────────────────┐
//!                  ↓                                             │
//!              ViewHook ─┬──────────────┐                        │
//!                        ↓              ↓                        ↓
//!                    ViewExec → TemplateResponse (render) → Response → Done
//!                        ↓              ↑
//!                    Exception ─────────┘
//!                        ↓              ↓ render error
//!                      Failed ←─────────┘
//! ```
//!
//! A fresh pipeline is built for every invocation, so middleware instances
//! are never shared between invocations.

mod legacy;
mod wrapper;

pub use legacy::LegacyPipeline;
pub use wrapper::WrapperPipeline;

use crate::hook::HookKind;
use crate::registry::{classify, ClassifiedMiddleware, MiddlewareDescriptor, MiddlewareStyle};
use std::fmt;
use viewtest_core::{Request, ViewArgs, ViewFn, ViewResult, ViewTestResult};

/// A pipeline ready to run one invocation.
pub trait Pipeline: fmt::Debug {
    /// Returns the middleware style of this pipeline.
    fn style(&self) -> MiddlewareStyle;

    /// Names of the middleware taking part in `kind`, in execution order.
    fn hook_order(&self, kind: HookKind) -> Vec<&'static str>;

    /// Runs the request through the middleware and the view.
    ///
    /// # Errors
    ///
    /// Returns the view error when nothing recovered it.
    fn invoke(&self, request: &mut Request) -> ViewResult;
}

/// The phases of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Nothing has run yet.
    Start = 0,
    /// Request hooks.
    Request = 1,
    /// View hooks.
    ViewHook = 2,
    /// The view itself.
    ViewExec = 3,
    /// Exception hooks, after the view failed.
    Exception = 4,
    /// Template-response hooks and rendering.
    TemplateResponse = 5,
    /// Response hooks.
    Response = 6,
    /// Finished with a response.
    Done = 7,
    /// Finished with an error.
    Failed = 8,
}

impl Phase {
    /// Returns the phase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Request => "request",
            Self::ViewHook => "view_hook",
            Self::ViewExec => "view_exec",
            Self::Exception => "exception",
            Self::TemplateResponse => "template_response",
            Self::Response => "response",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if a legacy invocation may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::Request)
                | (Self::Request, Self::ViewHook | Self::Response)
                | (Self::ViewHook, Self::ViewExec | Self::TemplateResponse)
                | (Self::ViewExec, Self::TemplateResponse | Self::Exception)
                | (Self::Exception, Self::TemplateResponse | Self::Failed)
                | (Self::TemplateResponse, Self::Response | Self::Failed)
                | (Self::Response, Self::Done)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds a pipeline from classified middleware.
#[must_use]
pub fn build(classified: ClassifiedMiddleware, view: ViewFn, args: ViewArgs) -> Box<dyn Pipeline> {
    match classified {
        ClassifiedMiddleware::Legacy(entries) => Box::new(LegacyPipeline::new(entries, view, args)),
        ClassifiedMiddleware::Wrapper(descriptors) => {
            Box::new(WrapperPipeline::new(&descriptors, view, args))
        }
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// # Example
///
/// ```
/// use viewtest_core::{Request, Response, ViewFn};
/// use viewtest_middleware::{MiddlewareStyle, PipelineBuilder};
///
/// let view = ViewFn::from_fn("ok", |_req, _args| Ok(Response::ok()));
/// let pipeline = PipelineBuilder::new(MiddlewareStyle::Legacy)
///     .view(view)
///     .build()
///     .unwrap();
///
/// let mut request = Request::new(http::Method::GET, "/");
/// assert!(pipeline.invoke(&mut request).is_ok());
/// ```
#[derive(Debug)]
pub struct PipelineBuilder {
    style: MiddlewareStyle,
    descriptors: Vec<MiddlewareDescriptor>,
    view: Option<ViewFn>,
    args: ViewArgs,
}

impl PipelineBuilder {
    /// Creates a builder for the given style.
    #[must_use]
    pub fn new(style: MiddlewareStyle) -> Self {
        Self {
            style,
            descriptors: Vec::new(),
            view: None,
            args: ViewArgs::default(),
        }
    }

    /// Appends a middleware descriptor.
    #[must_use]
    pub fn middleware(mut self, descriptor: MiddlewareDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Appends several middleware descriptors.
    #[must_use]
    pub fn middlewares(mut self, descriptors: impl IntoIterator<Item = MiddlewareDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Sets the view.
    #[must_use]
    pub fn view(mut self, view: ViewFn) -> Self {
        self.view = Some(view);
        self
    }

    /// Sets the view arguments.
    #[must_use]
    pub fn args(mut self, args: ViewArgs) -> Self {
        self.args = args;
        self
    }

    /// Classifies the middleware and builds the pipeline.
    ///
    /// # Errors
    ///
    /// - [`ViewTestError::MissingViewConfiguration`](viewtest_core::ViewTestError::MissingViewConfiguration)
    ///   if no view was set
    /// - [`ViewTestError::UnsupportedMiddlewareStyle`](viewtest_core::ViewTestError::UnsupportedMiddlewareStyle)
    ///   if a descriptor does not match the style
    pub fn build(self) -> ViewTestResult<Box<dyn Pipeline>> {
        let view = self
            .view
            .ok_or(viewtest_core::ViewTestError::MissingViewConfiguration)?;
        let classified = classify(self.style, &self.descriptors)?;
        Ok(build(classified, view, self.args))
    }
}
