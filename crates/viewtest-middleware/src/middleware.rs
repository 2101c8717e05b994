//! Core middleware traits and types.
//!
//! Two calling conventions are supported, and never mixed within one
//! invocation:
//!
//! - **Legacy** middleware implements [`Middleware`] only. An instance is
//!   built with no arguments and its hooks are called by the pipeline, one
//!   phase at a time.
//! - **Wrapper** middleware additionally implements [`WrapperMiddleware`]. An
//!   instance wraps the [`Next`] handler in the chain and is invoked by
//!   calling it directly.
//!
//! Rust cannot detect whether a method is overridden, so every middleware
//! declares the hooks it implements through [`Middleware::hooks`]. Hooks not
//! listed there are never called, even if overridden.
//!
//! # Example
//!
//! ```
//! use viewtest_core::{Request, Response};
//! use viewtest_middleware::{HookKind, HookSet, Middleware};
//!
//! #[derive(Default)]
//! struct Stamp;
//!
//! impl Middleware for Stamp {
//!     fn hooks(&self) -> HookSet {
//!         HookSet::of([HookKind::Request, HookKind::Response])
//!     }
//!
//!     fn on_request(&self, request: &mut Request) -> Option<Response> {
//!         request.attributes_mut().set("stamped", true);
//!         None
//!     }
//!
//!     fn on_response(&self, _request: &mut Request, mut response: Response) -> Response {
//!         response.attributes_mut().set("stamped", true);
//!         response
//!     }
//! }
//! ```

use crate::hook::{HookKind, HookSet};
use std::fmt;
use std::sync::Arc;
use viewtest_core::{Request, Response, ViewArgs, ViewError, ViewFn, ViewResult};

/// The core middleware trait.
///
/// Every hook has a pass-through default. A hook runs only when it is listed
/// in [`hooks`](Middleware::hooks) and allowed by the descriptor.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name used in logs. Defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the hooks this middleware implements.
    fn hooks(&self) -> HookSet;

    /// Called before the view. Returning a response skips the view.
    fn on_request(&self, _request: &mut Request) -> Option<Response> {
        None
    }

    /// Called with the view about to run. Returning a response skips it.
    fn on_view(&self, _request: &mut Request, _view: &ViewFn, _args: &ViewArgs) -> Option<Response> {
        None
    }

    /// Called with a renderable response before it is rendered.
    fn on_template_response(&self, _request: &mut Request, response: Response) -> Response {
        response
    }

    /// Called with every response on the way out.
    fn on_response(&self, _request: &mut Request, response: Response) -> Response {
        response
    }

    /// Called when the view failed. Returning a response recovers.
    fn on_exception(&self, _request: &mut Request, _error: &ViewError) -> Option<Response> {
        None
    }
}

/// Returns true if `middleware` declares the given hook.
#[must_use]
pub fn supports(middleware: &dyn Middleware, kind: HookKind) -> bool {
    middleware.hooks().contains(kind)
}

/// A wrapper-style middleware.
///
/// Instances are built by wrapping the next handler in the chain and are
/// called with the request. Calling `next` is optional; not calling it
/// short-circuits everything inside this middleware.
///
/// Of the legacy hooks, only `on_view` and `on_template_response` take
/// part in wrapper style. Errors are never converted into responses, so
/// `on_exception` is not called.
///
/// # Example
///
/// ```
/// use viewtest_core::{Request, ViewResult};
/// use viewtest_middleware::{HookSet, Middleware, Next, WrapperMiddleware};
///
/// struct Timing {
///     next: Next,
/// }
///
/// impl Middleware for Timing {
///     fn hooks(&self) -> HookSet {
///         HookSet::empty()
///     }
/// }
///
/// impl WrapperMiddleware for Timing {
///     fn wrap(next: Next) -> Self {
///         Self { next }
///     }
///
///     fn call(&self, request: &mut Request) -> ViewResult {
///         let start = std::time::Instant::now();
///         let response = self.next.run(request);
///         tracing::debug!(elapsed = ?start.elapsed(), "request handled");
///         response
///     }
/// }
/// ```
pub trait WrapperMiddleware: Middleware {
    /// Builds an instance wrapping `next`.
    fn wrap(next: Next) -> Self
    where
        Self: Sized;

    /// Handles the request.
    fn call(&self, request: &mut Request) -> ViewResult;
}

/// A shared handler callable.
pub type Handler = Arc<dyn Fn(&mut Request) -> ViewResult + Send + Sync>;

/// The next handler in a wrapper chain.
///
/// Cloning is cheap; clones invoke the same handler.
#[derive(Clone)]
pub struct Next {
    handler: Handler,
}

impl Next {
    /// Creates a `Next` from a handler function.
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&mut Request) -> ViewResult + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(f),
        }
    }

    /// Creates a `Next` that calls a wrapper instance.
    pub(crate) fn new(middleware: Arc<dyn WrapperMiddleware>) -> Self {
        Self {
            handler: Arc::new(move |request| middleware.call(request)),
        }
    }

    /// Invokes the next middleware or the terminal handler.
    pub fn run(&self, request: &mut Request) -> ViewResult {
        (self.handler)(request)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// A legacy middleware built from closures.
///
/// Handy for one-off middleware in tests. Hooks are declared by the
/// builder methods used.
///
/// # Example
///
/// ```
/// use viewtest_middleware::{FnMiddleware, HookKind, Middleware};
///
/// let mw = FnMiddleware::new("stamp").request(|request| {
///     request.attributes_mut().set("seen", true);
///     None
/// });
/// assert!(mw.hooks().contains(HookKind::Request));
/// assert!(!mw.hooks().contains(HookKind::Response));
/// ```
pub struct FnMiddleware {
    name: &'static str,
    hooks: HookSet,
    request: Option<Box<dyn Fn(&mut Request) -> Option<Response> + Send + Sync>>,
    response: Option<Box<dyn Fn(&mut Request, Response) -> Response + Send + Sync>>,
    exception: Option<Box<dyn Fn(&mut Request, &ViewError) -> Option<Response> + Send + Sync>>,
}

impl FnMiddleware {
    /// Creates a middleware with no hooks.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            hooks: HookSet::empty(),
            request: None,
            response: None,
            exception: None,
        }
    }

    /// Sets the request hook.
    #[must_use]
    pub fn request<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.hooks.insert(HookKind::Request);
        self.request = Some(Box::new(f));
        self
    }

    /// Sets the response hook.
    #[must_use]
    pub fn response<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, Response) -> Response + Send + Sync + 'static,
    {
        self.hooks.insert(HookKind::Response);
        self.response = Some(Box::new(f));
        self
    }

    /// Sets the exception hook.
    #[must_use]
    pub fn exception<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, &ViewError) -> Option<Response> + Send + Sync + 'static,
    {
        self.hooks.insert(HookKind::Exception);
        self.exception = Some(Box::new(f));
        self
    }
}

impl Middleware for FnMiddleware {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn on_request(&self, request: &mut Request) -> Option<Response> {
        self.request.as_ref().and_then(|f| f(request))
    }

    fn on_response(&self, request: &mut Request, response: Response) -> Response {
        match &self.response {
            Some(f) => f(request, response),
            None => response,
        }
    }

    fn on_exception(&self, request: &mut Request, error: &ViewError) -> Option<Response> {
        self.exception.as_ref().and_then(|f| f(request, error))
    }
}

impl fmt::Debug for FnMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .finish()
    }
}
