//! View abstractions.
//!
//! Two shapes of view are supported:
//!
//! - **view types** implement [`View`] and are built per request from
//!   configuration keyword arguments ([`ViewClass::from_kwargs`]), then
//!   dispatched by HTTP method;
//! - **view functions** are plain callables
//!   `Fn(&mut Request, &ViewArgs) -> ViewResult`.
//!
//! Both are erased into a [`ViewFn`], the callable handed to middleware view
//! hooks and finally executed by the pipeline.

use crate::error::{ViewError, ViewResult};
use crate::request::Request;
use crate::response::Response;
use http::Method;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Configuration keyword arguments used to construct view types.
pub type ViewKwargs = Map<String, Value>;

/// Positional and keyword arguments passed to a view, as captured from a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewArgs {
    /// Positional arguments.
    pub args: Vec<String>,
    /// Keyword arguments, in insertion order.
    pub kwargs: IndexMap<String, String>,
}

impl ViewArgs {
    /// Creates empty arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Adds a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Returns a keyword argument.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }
}

/// A view type dispatched by HTTP method.
///
/// Every handler defaults to `405 Method Not Allowed`; `head` falls back to
/// `get` and `options` answers with the `Allow` header, mirroring how
/// class-based views usually behave.
///
/// # Example
///
/// ```
/// use viewtest_core::{Request, Response, View, ViewArgs, ViewResult};
///
/// #[derive(Default, serde::Deserialize)]
/// struct Hello;
///
/// impl View for Hello {
///     fn allowed_methods(&self) -> Vec<http::Method> {
///         vec![http::Method::GET]
///     }
///
///     fn get(&mut self, _request: &mut Request, _args: &ViewArgs) -> ViewResult {
///         Ok(Response::ok())
///     }
/// }
/// ```
pub trait View: Send + 'static {
    /// Methods this view answers. Used for `405` and `OPTIONS` responses.
    fn allowed_methods(&self) -> Vec<Method> {
        Vec::new()
    }

    /// Handles `GET`.
    fn get(&mut self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        self.method_not_allowed(request, args)
    }

    /// Handles `POST`.
    fn post(&mut self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        self.method_not_allowed(request, args)
    }

    /// Handles `PUT`.
    fn put(&mut self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        self.method_not_allowed(request, args)
    }

    /// Handles `PATCH`.
    fn patch(&mut self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        self.method_not_allowed(request, args)
    }

    /// Handles `DELETE`.
    fn delete(&mut self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        self.method_not_allowed(request, args)
    }

    /// Handles `HEAD` by running `get` and dropping the body.
    fn head(&mut self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        let mut response = self.get(request, args)?;
        response.set_body(bytes::Bytes::new());
        Ok(response)
    }

    /// Handles `OPTIONS`.
    fn options(&mut self, _request: &mut Request, _args: &ViewArgs) -> ViewResult {
        let mut response = Response::ok();
        response.set_allow(&self.allowed_methods_with_options());
        Ok(response)
    }

    /// Fallback for methods the view does not handle.
    fn method_not_allowed(&mut self, request: &mut Request, _args: &ViewArgs) -> ViewResult {
        tracing::debug!(method = %request.method(), path = %request.path(), "Method not allowed");
        Ok(Response::not_allowed(&self.allowed_methods_with_options()))
    }

    /// Routes the request to the handler for its method.
    fn dispatch(&mut self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        let method = request.method().clone();
        match method {
            Method::GET => self.get(request, args),
            Method::POST => self.post(request, args),
            Method::PUT => self.put(request, args),
            Method::PATCH => self.patch(request, args),
            Method::DELETE => self.delete(request, args),
            Method::HEAD => self.head(request, args),
            Method::OPTIONS => self.options(request, args),
            _ => self.method_not_allowed(request, args),
        }
    }

    #[doc(hidden)]
    fn allowed_methods_with_options(&self) -> Vec<Method> {
        let mut methods = self.allowed_methods();
        if !methods.contains(&Method::OPTIONS) {
            methods.push(Method::OPTIONS);
        }
        methods
    }
}

/// A view type that can be constructed from configuration kwargs.
///
/// Implemented for every [`View`] that deserializes from a JSON object, so
/// view configuration is simply a set of serde fields (use
/// `#[serde(default)]` for optional ones).
pub trait ViewClass: View + Sized {
    /// Builds the view from its configuration kwargs.
    fn from_kwargs(kwargs: &ViewKwargs) -> Result<Self, ViewError>;
}

impl<T> ViewClass for T
where
    T: View + DeserializeOwned,
{
    fn from_kwargs(kwargs: &ViewKwargs) -> Result<Self, ViewError> {
        Ok(serde_json::from_value(Value::Object(kwargs.clone()))?)
    }
}

/// The type-erased view callable.
///
/// Cloning is cheap; the underlying closure is shared.
#[derive(Clone)]
pub struct ViewFn {
    name: &'static str,
    func: Arc<dyn Fn(&mut Request, &ViewArgs) -> ViewResult + Send + Sync>,
}

impl ViewFn {
    /// Wraps a view function.
    pub fn from_fn<F>(name: &'static str, func: F) -> Self
    where
        F: Fn(&mut Request, &ViewArgs) -> ViewResult + Send + Sync + 'static,
    {
        Self {
            name,
            func: Arc::new(func),
        }
    }

    /// Builds the callable for a view type: each call constructs a fresh
    /// instance from `kwargs` and dispatches by method.
    pub fn for_class<V: ViewClass>(kwargs: ViewKwargs) -> Self {
        Self {
            name: std::any::type_name::<V>(),
            func: Arc::new(move |request, args| {
                let mut view = V::from_kwargs(&kwargs)?;
                view.dispatch(request, args)
            }),
        }
    }

    /// Returns the view name (the type or function name).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Calls the view.
    pub fn call(&self, request: &mut Request, args: &ViewArgs) -> ViewResult {
        (self.func)(request, args)
    }
}

impl fmt::Debug for ViewFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewFn").field("name", &self.name).finish()
    }
}

/// A view instance bound to the request and arguments it was created for.
///
/// Lets tests call individual methods of a view type directly, without
/// going through dispatch or middleware.
#[derive(Debug)]
pub struct BoundView<V> {
    /// The constructed view.
    pub view: V,
    /// The request the view was bound to, if any.
    pub request: Option<Request>,
    /// The arguments the view was bound to.
    pub args: ViewArgs,
}

impl<V: ViewClass> BoundView<V> {
    /// Constructs `V` from `kwargs` and binds it.
    pub fn new(kwargs: &ViewKwargs, request: Option<Request>, args: ViewArgs) -> Result<Self, ViewError> {
        Ok(Self {
            view: V::from_kwargs(kwargs)?,
            request,
            args,
        })
    }
}
