//! The view test case: one view, its middleware, and a request factory.

use serde_json::{Map, Value};
use std::fmt;
use viewtest_config::ViewTestConfig;
use viewtest_core::{
    BoundView, Request, Response, ViewArgs, ViewClass, ViewFn, ViewKwargs, ViewResult,
    ViewTestError, ViewTestResult,
};
use viewtest_middleware::{validate_style, MiddlewareDescriptor, MiddlewareStyle, PipelineBuilder};
use viewtest_telemetry::{log_invocation_complete, log_invocation_error, log_invocation_start};

use crate::factory::RequestFactory;
use crate::settings::{self, SettingsGuard};

#[derive(Clone)]
enum ViewSource {
    Class { view: ViewFn, kwargs: ViewKwargs },
    Function(ViewFn),
}

impl ViewSource {
    fn view_fn(&self) -> &ViewFn {
        match self {
            Self::Class { view, .. } | Self::Function(view) => view,
        }
    }
}

/// Runs a view through its middleware without a server.
///
/// Each [`view`](Self::view) call builds a fresh pipeline, so legacy
/// middleware instances never leak state between invocations.
///
/// # Example
///
/// ```
/// use http::Method;
/// use viewtest::ViewTestCase;
/// use viewtest_core::{Response, ViewArgs};
///
/// let case = ViewTestCase::builder()
///     .view_function("ping", |_request, _args| Ok(Response::ok()))
///     .build()
///     .unwrap();
///
/// let mut request = case.factory().get("/ping/").build().unwrap();
/// let response = case.view(&mut request, &ViewArgs::new()).unwrap();
/// assert_eq!(response.status_code(), 200);
/// ```
pub struct ViewTestCase {
    style: MiddlewareStyle,
    middleware: Vec<MiddlewareDescriptor>,
    view: Option<ViewSource>,
    factory: RequestFactory,
    // Dropped with the test case, restoring the settings it seeded.
    _settings: Option<SettingsGuard>,
}

impl ViewTestCase {
    /// Starts configuring a test case.
    #[must_use]
    pub fn builder() -> ViewTestCaseBuilder {
        ViewTestCaseBuilder::new()
    }

    /// Returns the middleware style.
    #[must_use]
    pub fn style(&self) -> MiddlewareStyle {
        self.style
    }

    /// Returns the declared middleware.
    #[must_use]
    pub fn middleware(&self) -> &[MiddlewareDescriptor] {
        &self.middleware
    }

    /// Returns the request factory.
    #[must_use]
    pub fn factory(&self) -> &RequestFactory {
        &self.factory
    }

    /// Runs `request` through the middleware and the configured view.
    ///
    /// # Errors
    ///
    /// - [`ViewTestError::MissingViewConfiguration`] if no view was configured
    /// - [`ViewTestError::UnsupportedMiddlewareStyle`] on a style mismatch
    /// - [`ViewTestError::View`] carrying the original error when the view
    ///   (or a middleware) failed and no exception hook recovered it
    pub fn view(&self, request: &mut Request, args: &ViewArgs) -> ViewTestResult<Response> {
        let view = self
            .view
            .as_ref()
            .map(ViewSource::view_fn)
            .ok_or(ViewTestError::MissingViewConfiguration)?;

        log_invocation_start!(request.id(), request.method(), request.full_path(), view.name());

        let pipeline = PipelineBuilder::new(self.style)
            .middlewares(self.middleware.iter().cloned())
            .view(view.clone())
            .args(args.clone())
            .build()?;

        match pipeline.invoke(request) {
            Ok(response) => {
                log_invocation_complete!(request.id(), response.status_code());
                Ok(response)
            }
            Err(error) => {
                log_invocation_error!(request.id(), error);
                Err(ViewTestError::View(error))
            }
        }
    }

    /// Calls the configured view directly, skipping every middleware.
    ///
    /// # Errors
    ///
    /// [`ViewTestError::MissingViewConfiguration`] if no view was configured.
    pub fn view_without_middleware(&self, request: &mut Request, args: &ViewArgs) -> ViewTestResult<ViewResult> {
        let view = self
            .view
            .as_ref()
            .map(ViewSource::view_fn)
            .ok_or(ViewTestError::MissingViewConfiguration)?;
        Ok(view.call(request, args))
    }

    /// Builds an instance of view type `V` from the configured kwargs and
    /// binds it to `request` and `args`.
    ///
    /// Kwargs are empty unless the test case was configured with
    /// [`view_class`](ViewTestCaseBuilder::view_class).
    ///
    /// # Errors
    ///
    /// [`ViewTestError::View`] when `V` cannot be built from the kwargs.
    pub fn create_view_object<V: ViewClass>(
        &self,
        request: Option<Request>,
        args: ViewArgs,
    ) -> ViewTestResult<BoundView<V>> {
        let empty = ViewKwargs::new();
        let kwargs = match &self.view {
            Some(ViewSource::Class { kwargs, .. }) => kwargs,
            _ => &empty,
        };
        Ok(BoundView::new(kwargs, request, args)?)
    }
}

impl fmt::Debug for ViewTestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTestCase")
            .field("style", &self.style)
            .field("middleware", &self.middleware.len())
            .field("view", &self.view.as_ref().map(|v| v.view_fn().name()))
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ViewTestCase`].
#[must_use]
#[derive(Default)]
pub struct ViewTestCaseBuilder {
    style: MiddlewareStyle,
    middleware: Vec<MiddlewareDescriptor>,
    view: Option<ViewSource>,
    factory: Option<RequestFactory>,
    settings: Map<String, Value>,
}

impl ViewTestCaseBuilder {
    /// Creates a builder: legacy style, no middleware, no view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the middleware style.
    pub fn style(mut self, style: MiddlewareStyle) -> Self {
        self.style = style;
        self
    }

    /// Appends a middleware.
    pub fn middleware(mut self, descriptor: MiddlewareDescriptor) -> Self {
        self.middleware.push(descriptor);
        self
    }

    /// Appends several middleware.
    pub fn middlewares(mut self, descriptors: impl IntoIterator<Item = MiddlewareDescriptor>) -> Self {
        self.middleware.extend(descriptors);
        self
    }

    /// Tests view type `V`, built from `kwargs` on every invocation.
    ///
    /// Replaces any view function set earlier.
    pub fn view_class<V: ViewClass>(mut self, kwargs: ViewKwargs) -> Self {
        self.view = Some(ViewSource::Class {
            view: ViewFn::for_class::<V>(kwargs.clone()),
            kwargs,
        });
        self
    }

    /// Tests a view function. Replaces any view type set earlier.
    pub fn view_function<F>(mut self, name: &'static str, func: F) -> Self
    where
        F: Fn(&mut Request, &ViewArgs) -> ViewResult + Send + Sync + 'static,
    {
        self.view = Some(ViewSource::Function(ViewFn::from_fn(name, func)));
        self
    }

    /// Uses a custom request factory.
    pub fn factory(mut self, factory: RequestFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Seeds a setting for the lifetime of the test case.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Applies a loaded configuration: middleware style, default request
    /// headers, and settings.
    pub fn config(mut self, config: &ViewTestConfig) -> Self {
        self.style = config.middleware.style;
        self.factory = Some(RequestFactory::from_config(&config.request));
        self.settings
            .extend(config.settings.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Builds the test case.
    ///
    /// # Errors
    ///
    /// [`ViewTestError::UnsupportedMiddlewareStyle`] when a declared
    /// middleware does not match the style.
    pub fn build(self) -> ViewTestResult<ViewTestCase> {
        validate_style(self.style, &self.middleware)?;

        let settings = (!self.settings.is_empty()).then(|| settings::override_settings(self.settings));

        tracing::debug!(
            style = %self.style,
            middleware = self.middleware.len(),
            view = self.view.as_ref().map_or("<none>", |v| v.view_fn().name()),
            "Built view test case"
        );

        Ok(ViewTestCase {
            style: self.style,
            middleware: self.middleware,
            view: self.view,
            factory: self.factory.unwrap_or_default(),
            _settings: settings,
        })
    }
}

impl fmt::Debug for ViewTestCaseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTestCaseBuilder")
            .field("style", &self.style)
            .field("middleware", &self.middleware.len())
            .field("view", &self.view.as_ref().map(|v| v.view_fn().name()))
            .finish_non_exhaustive()
    }
}
