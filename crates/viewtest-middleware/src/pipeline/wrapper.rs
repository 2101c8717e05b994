//! Wrapper pipeline: nested handlers composed around the view.

use super::{Phase, Pipeline};
use crate::hook::{HookKind, HookSet};
use crate::middleware::{Next, WrapperMiddleware};
use crate::registry::{MiddlewareDescriptor, MiddlewareStyle};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, trace};
use viewtest_core::{Request, ViewArgs, ViewFn, ViewResult};

/// Wrapper instances as seen by the terminal handler, in declaration order.
///
/// Instances are held weakly: each instance owns the chain inside it,
/// which ends in the terminal handler that owns this table.
struct HookEntry {
    name: &'static str,
    hooks: HookSet,
    instance: Weak<dyn WrapperMiddleware>,
}

type HookTable = Arc<OnceLock<Vec<HookEntry>>>;

/// A pipeline of wrapper middleware.
///
/// Descriptors are folded in reverse: the last declared wrapper wraps the
/// terminal handler, the first declared wrapper is called first. The
/// terminal handler runs the wrappers' view hooks in declaration order, the
/// view, then their template-response hooks in reverse order and renders.
///
/// Errors are never converted into responses.
pub struct WrapperPipeline {
    root: Next,
    names: Vec<(&'static str, HookSet)>,
    // Keeps the wrapper instances alive between build and invoke.
    _instances: Vec<Arc<dyn WrapperMiddleware>>,
}

impl WrapperPipeline {
    /// Composes `descriptors` around `view`.
    ///
    /// Legacy descriptors are skipped; use
    /// [`classify`](crate::classify) first to reject them.
    #[must_use]
    pub fn new(descriptors: &[MiddlewareDescriptor], view: ViewFn, args: ViewArgs) -> Self {
        let table: HookTable = Arc::new(OnceLock::new());
        let mut next = terminal(Arc::clone(&table), view, args);
        let mut built = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors.iter().rev() {
            if let Some(classified) = descriptor.wrap(next.clone()) {
                next = Next::new(Arc::clone(&classified.instance));
                built.push(classified);
            }
        }
        built.reverse();

        let entries = built
            .iter()
            .map(|c| HookEntry {
                name: c.name,
                hooks: c.hooks,
                instance: Arc::downgrade(&c.instance),
            })
            .collect();
        // The table was created above and is set exactly once here.
        let _ = table.set(entries);

        Self {
            root: next,
            names: built.iter().map(|c| (c.name, c.hooks)).collect(),
            _instances: built.into_iter().map(|c| c.instance).collect(),
        }
    }
}

fn terminal(table: HookTable, view: ViewFn, args: ViewArgs) -> Next {
    Next::handler(move |request: &mut Request| {
        let wrappers: Vec<(&HookEntry, Arc<dyn WrapperMiddleware>)> = table
            .get()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.instance.upgrade().map(|instance| (entry, instance)))
                    .collect()
            })
            .unwrap_or_default();

        trace!(from = Phase::Start.name(), to = Phase::ViewHook.name(), "Phase transition");
        let short_circuit = wrappers
            .iter()
            .filter(|(entry, _)| entry.hooks.contains(HookKind::View))
            .find_map(|(_, instance)| instance.on_view(request, &view, &args));

        let mut response = match short_circuit {
            Some(response) => response,
            None => {
                trace!(from = Phase::ViewHook.name(), to = Phase::ViewExec.name(), "Phase transition");
                view.call(request, &args)?
            }
        };

        trace!(to = Phase::TemplateResponse.name(), "Phase transition");
        if response.is_renderable() {
            for (entry, instance) in wrappers.iter().rev() {
                if entry.hooks.contains(HookKind::TemplateResponse) {
                    response = instance.on_template_response(request, response);
                }
            }
            response.render()?;
        }

        Ok(response)
    })
}

impl Pipeline for WrapperPipeline {
    fn style(&self) -> MiddlewareStyle {
        MiddlewareStyle::Wrapper
    }

    fn hook_order(&self, kind: HookKind) -> Vec<&'static str> {
        let participating = self
            .names
            .iter()
            .filter(|(_, hooks)| hooks.contains(kind))
            .map(|(name, _)| *name);
        match kind {
            HookKind::View => participating.collect(),
            HookKind::TemplateResponse => {
                let mut names: Vec<_> = participating.collect();
                names.reverse();
                names
            }
            HookKind::Request | HookKind::Response | HookKind::Exception => Vec::new(),
        }
    }

    fn invoke(&self, request: &mut Request) -> ViewResult {
        debug!(
            request_id = %request.id(),
            method = %request.method(),
            path = %request.path(),
            wrappers = self.names.len(),
            "Invoking view through wrapper chain"
        );
        let result = self.root.run(request);
        match &result {
            Ok(response) => debug!(status = response.status_code(), "View invocation finished"),
            Err(error) => debug!(error = %error, "View error propagated through wrapper chain"),
        }
        result
    }
}

impl fmt::Debug for WrapperPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperPipeline")
            .field("wrappers", &self.names)
            .finish_non_exhaustive()
    }
}
