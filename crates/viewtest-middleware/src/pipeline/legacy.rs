//! Legacy pipeline: five hook lists driven by a state machine.

use super::{Phase, Pipeline};
use crate::hook::HookKind;
use crate::middleware::Middleware;
use crate::registry::{Classified, MiddlewareStyle};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use viewtest_core::{Request, Response, ViewArgs, ViewError, ViewFn, ViewResult};

type Entry = Classified<Arc<dyn Middleware>>;

/// Invocation state. Each variant carries what the next phase needs.
enum State {
    Start,
    Request,
    ViewHook,
    ViewExec,
    Exception(ViewError),
    TemplateResponse(Response),
    Response(Response),
    Done(Response),
    Failed(ViewError),
}

impl State {
    const fn phase(&self) -> Phase {
        match self {
            Self::Start => Phase::Start,
            Self::Request => Phase::Request,
            Self::ViewHook => Phase::ViewHook,
            Self::ViewExec => Phase::ViewExec,
            Self::Exception(_) => Phase::Exception,
            Self::TemplateResponse(_) => Phase::TemplateResponse,
            Self::Response(_) => Phase::Response,
            Self::Done(_) => Phase::Done,
            Self::Failed(_) => Phase::Failed,
        }
    }
}

/// A pipeline of legacy hook middleware.
///
/// Request and view hooks run in declaration order. Template-response,
/// response and exception hooks run in reverse declaration order.
pub struct LegacyPipeline {
    request_hooks: Vec<Entry>,
    view_hooks: Vec<Entry>,
    template_response_hooks: Vec<Entry>,
    response_hooks: Vec<Entry>,
    exception_hooks: Vec<Entry>,
    view: ViewFn,
    args: ViewArgs,
}

impl LegacyPipeline {
    /// Creates a pipeline from classified instances in declaration order.
    #[must_use]
    pub fn new(entries: Vec<Entry>, view: ViewFn, args: ViewArgs) -> Self {
        let select = |kind: HookKind| -> Vec<Entry> {
            let mut hooks: Vec<Entry> = entries
                .iter()
                .filter(|entry| entry.participates(kind))
                .cloned()
                .collect();
            if kind.is_outbound() {
                hooks.reverse();
            }
            hooks
        };

        Self {
            request_hooks: select(HookKind::Request),
            view_hooks: select(HookKind::View),
            template_response_hooks: select(HookKind::TemplateResponse),
            response_hooks: select(HookKind::Response),
            exception_hooks: select(HookKind::Exception),
            view,
            args,
        }
    }

    fn hooks(&self, kind: HookKind) -> &[Entry] {
        match kind {
            HookKind::Request => &self.request_hooks,
            HookKind::View => &self.view_hooks,
            HookKind::TemplateResponse => &self.template_response_hooks,
            HookKind::Response => &self.response_hooks,
            HookKind::Exception => &self.exception_hooks,
        }
    }

    fn step(&self, state: State, request: &mut Request) -> State {
        match state {
            State::Start => State::Request,
            State::Request => self
                .request_hooks
                .iter()
                .find_map(|entry| entry.instance.on_request(request))
                .map_or(State::ViewHook, State::Response),
            State::ViewHook => self
                .view_hooks
                .iter()
                .find_map(|entry| entry.instance.on_view(request, &self.view, &self.args))
                .map_or(State::ViewExec, State::TemplateResponse),
            State::ViewExec => match self.view.call(request, &self.args) {
                Ok(response) => State::TemplateResponse(response),
                Err(error) => State::Exception(error),
            },
            State::Exception(error) => {
                let recovered = self
                    .exception_hooks
                    .iter()
                    .find_map(|entry| entry.instance.on_exception(request, &error));
                match recovered {
                    Some(response) => {
                        debug!(error = %error, "View error recovered by exception hook");
                        State::TemplateResponse(response)
                    }
                    None => State::Failed(error),
                }
            }
            State::TemplateResponse(mut response) => {
                if response.is_renderable() {
                    for entry in &self.template_response_hooks {
                        response = entry.instance.on_template_response(request, response);
                    }
                    if let Err(error) = response.render() {
                        return State::Failed(error.into());
                    }
                }
                State::Response(response)
            }
            State::Response(response) => State::Done(
                self.response_hooks
                    .iter()
                    .fold(response, |response, entry| {
                        entry.instance.on_response(request, response)
                    }),
            ),
            terminal @ (State::Done(_) | State::Failed(_)) => terminal,
        }
    }
}

impl Pipeline for LegacyPipeline {
    fn style(&self) -> MiddlewareStyle {
        MiddlewareStyle::Legacy
    }

    fn hook_order(&self, kind: HookKind) -> Vec<&'static str> {
        self.hooks(kind).iter().map(|entry| entry.name).collect()
    }

    fn invoke(&self, request: &mut Request) -> ViewResult {
        debug!(
            request_id = %request.id(),
            method = %request.method(),
            path = %request.path(),
            view = self.view.name(),
            "Invoking view through legacy pipeline"
        );

        let mut state = State::Start;
        loop {
            state = match state {
                State::Done(response) => {
                    debug!(status = response.status_code(), "View invocation finished");
                    return Ok(response);
                }
                State::Failed(error) => {
                    warn!(error = %error, view = self.view.name(), "View error not handled by any exception hook");
                    return Err(error);
                }
                current => {
                    let from = current.phase();
                    let next = self.step(current, request);
                    trace!(from = from.name(), to = next.phase().name(), "Phase transition");
                    next
                }
            };
        }
    }
}

impl fmt::Debug for LegacyPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyPipeline")
            .field("request", &self.hook_order(HookKind::Request))
            .field("view", &self.hook_order(HookKind::View))
            .field("template_response", &self.hook_order(HookKind::TemplateResponse))
            .field("response", &self.hook_order(HookKind::Response))
            .field("exception", &self.hook_order(HookKind::Exception))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::HookSet;
    use crate::registry::{classify, ClassifiedMiddleware, MiddlewareDescriptor};
    use http::{Method, StatusCode};
    use viewtest_core::Template;

    fn pipeline(descriptors: &[MiddlewareDescriptor], view: ViewFn) -> LegacyPipeline {
        match classify(MiddlewareStyle::Legacy, descriptors).unwrap() {
            ClassifiedMiddleware::Legacy(entries) => LegacyPipeline::new(entries, view, ViewArgs::new()),
            ClassifiedMiddleware::Wrapper(_) => unreachable!(),
        }
    }

    fn ok_view() -> ViewFn {
        ViewFn::from_fn("ok", |request, _args| {
            request.attributes_mut().set("view_ran", true);
            Ok(Response::ok())
        })
    }

    #[derive(Default)]
    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn hooks(&self) -> HookSet {
            HookSet::of([HookKind::Request])
        }

        fn on_request(&self, _request: &mut Request) -> Option<Response> {
            Some(Response::forbidden())
        }
    }

    #[derive(Default)]
    struct Renderer;

    impl Middleware for Renderer {
        fn hooks(&self) -> HookSet {
            HookSet::of([HookKind::TemplateResponse])
        }

        fn on_template_response(&self, _request: &mut Request, mut response: Response) -> Response {
            if let Some(template) = response.pending_template_mut() {
                template.context.insert("who".into(), "middleware".into());
            }
            response
        }
    }

    #[test]
    fn test_no_middleware_runs_view() {
        let pipeline = pipeline(&[], ok_view());
        let mut request = Request::new(Method::GET, "/");
        let response = pipeline.invoke(&mut request).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(request.attributes().flag("view_ran"));
    }

    #[test]
    fn test_request_hook_short_circuits() {
        let pipeline = pipeline(&[MiddlewareDescriptor::legacy::<ShortCircuit>()], ok_view());
        let mut request = Request::new(Method::GET, "/");
        let response = pipeline.invoke(&mut request).unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!request.attributes().flag("view_ran"));
    }

    #[test]
    fn test_template_hook_runs_before_render() {
        let view = ViewFn::from_fn("template", |_req, _args| {
            Ok(Response::template(Template::new("hello {{ who }}").with("who", "view")))
        });
        let pipeline = pipeline(&[MiddlewareDescriptor::legacy::<Renderer>()], view);
        let mut request = Request::new(Method::GET, "/");
        let response = pipeline.invoke(&mut request).unwrap();
        assert!(!response.is_renderable());
        assert_eq!(response.text_body().unwrap(), "hello middleware");
    }

    #[test]
    fn test_render_error_fails_invocation() {
        let view = ViewFn::from_fn("broken", |_req, _args| {
            Ok(Response::template(Template::new("{{#if}}")))
        });
        let pipeline = pipeline(&[MiddlewareDescriptor::legacy::<Renderer>()], view);
        let mut request = Request::new(Method::GET, "/");
        let err = pipeline.invoke(&mut request).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<viewtest_core::ViewTestError>(),
            Some(viewtest_core::ViewTestError::Template(_))
        ));
    }

    #[test]
    fn test_outbound_hooks_are_reversed() {
        let first = MiddlewareDescriptor::legacy_with("first", || {
            crate::FnMiddleware::new("first").response(|_req, resp| resp)
        });
        let second = MiddlewareDescriptor::legacy_with("second", || {
            crate::FnMiddleware::new("second")
                .request(|_req| None)
                .response(|_req, resp| resp)
        });
        let pipeline = pipeline(&[first, second], ok_view());
        assert_eq!(pipeline.hook_order(HookKind::Request), vec!["second"]);
        assert_eq!(pipeline.hook_order(HookKind::Response), vec!["second", "first"]);
    }
}
