//! Middleware descriptors and classification.
//!
//! A test declares its middleware as an ordered list of
//! [`MiddlewareDescriptor`]s. [`classify`] checks every descriptor against
//! the selected [`MiddlewareStyle`], instantiates legacy middleware, and
//! resolves the hooks each instance takes part in:
//!
//! ```text
//! active hooks = implemented hooks ∩ descriptor restriction (all if unrestricted)
//! ```
//!
//! Wrapper middleware is instantiated later, while composing the chain,
//! since each instance needs the handler it wraps.

use crate::hook::{HookKind, HookSet};
use crate::middleware::{Middleware, Next, WrapperMiddleware};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use viewtest_core::{ViewTestError, ViewTestResult};

/// Which middleware calling convention a test uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareStyle {
    /// Hook objects called phase by phase.
    #[default]
    Legacy,
    /// Handlers wrapping the next handler in the chain.
    Wrapper,
}

impl MiddlewareStyle {
    /// Returns the style name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Wrapper => "wrapper",
        }
    }
}

impl fmt::Display for MiddlewareStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type LegacyFactory = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;
type WrapperFactory = Arc<dyn Fn(Next) -> Arc<dyn WrapperMiddleware> + Send + Sync>;

#[derive(Clone)]
enum Factory {
    Legacy(LegacyFactory),
    Wrapper(WrapperFactory),
}

/// A declared middleware: a type plus an optional hook restriction.
///
/// Descriptors are cheap to clone and never modified by the pipeline.
///
/// # Example
///
/// ```
/// use viewtest_core::{Request, Response};
/// use viewtest_middleware::{HookKind, HookSet, Middleware, MiddlewareDescriptor};
///
/// #[derive(Default)]
/// struct Audit;
///
/// impl Middleware for Audit {
///     fn hooks(&self) -> HookSet {
///         HookSet::of([HookKind::Request, HookKind::Response])
///     }
/// }
///
/// let descriptor = MiddlewareDescriptor::legacy::<Audit>().only([HookKind::Request]);
/// assert_eq!(descriptor.restriction(), Some(HookSet::of([HookKind::Request])));
/// ```
#[derive(Clone)]
pub struct MiddlewareDescriptor {
    name: &'static str,
    factory: Factory,
    restriction: Option<HookSet>,
}

impl MiddlewareDescriptor {
    /// Declares a legacy middleware built with [`Default`].
    #[must_use]
    pub fn legacy<M: Middleware + Default>() -> Self {
        Self::legacy_with(std::any::type_name::<M>(), M::default)
    }

    /// Declares a legacy middleware built by `factory` once per invocation.
    pub fn legacy_with<M, F>(name: &'static str, factory: F) -> Self
    where
        M: Middleware,
        F: Fn() -> M + Send + Sync + 'static,
    {
        Self {
            name,
            factory: Factory::Legacy(Arc::new(move || Arc::new(factory()) as Arc<dyn Middleware>)),
            restriction: None,
        }
    }

    /// Declares a wrapper middleware built with [`WrapperMiddleware::wrap`].
    #[must_use]
    pub fn wrapper<W: WrapperMiddleware>() -> Self {
        Self {
            name: std::any::type_name::<W>(),
            factory: Factory::Wrapper(Arc::new(|next| {
                Arc::new(W::wrap(next)) as Arc<dyn WrapperMiddleware>
            })),
            restriction: None,
        }
    }

    /// Restricts the hooks this middleware may take part in.
    ///
    /// Kinds the middleware does not implement are ignored.
    #[must_use]
    pub fn only(mut self, kinds: impl IntoIterator<Item = HookKind>) -> Self {
        self.restriction = Some(HookSet::of(kinds));
        self
    }

    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the calling convention of the declared middleware.
    #[must_use]
    pub fn style(&self) -> MiddlewareStyle {
        match self.factory {
            Factory::Legacy(_) => MiddlewareStyle::Legacy,
            Factory::Wrapper(_) => MiddlewareStyle::Wrapper,
        }
    }

    /// Returns the hook restriction, if any.
    #[must_use]
    pub fn restriction(&self) -> Option<HookSet> {
        self.restriction
    }

    /// Resolves the active hooks for an instance implementing `implemented`.
    #[must_use]
    pub fn resolve(&self, implemented: HookSet) -> HookSet {
        match self.restriction {
            Some(allowed) => implemented.intersect(allowed),
            None => implemented,
        }
    }

    /// Builds a wrapper instance around `next`.
    ///
    /// Returns `None` for legacy descriptors.
    pub(crate) fn wrap(&self, next: Next) -> Option<Classified<Arc<dyn WrapperMiddleware>>> {
        match &self.factory {
            Factory::Wrapper(factory) => {
                let instance = factory(next);
                Some(Classified {
                    name: self.name,
                    hooks: self.resolve(instance.hooks()),
                    instance,
                })
            }
            Factory::Legacy(_) => None,
        }
    }
}

impl fmt::Debug for MiddlewareDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareDescriptor")
            .field("name", &self.name)
            .field("style", &self.style())
            .field("restriction", &self.restriction)
            .finish()
    }
}

/// A middleware instance with its resolved hooks.
#[derive(Clone)]
pub struct Classified<T> {
    /// Name of the descriptor the instance came from.
    pub name: &'static str,
    /// Hooks the instance takes part in.
    pub hooks: HookSet,
    /// The instance.
    pub instance: T,
}

impl<T> Classified<T> {
    /// Returns true if the instance takes part in `kind`.
    #[must_use]
    pub fn participates(&self, kind: HookKind) -> bool {
        self.hooks.contains(kind)
    }
}

impl<T> fmt::Debug for Classified<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classified")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// The outcome of [`classify`].
#[derive(Debug, Clone)]
pub enum ClassifiedMiddleware {
    /// Legacy instances with their hooks, in declaration order.
    Legacy(Vec<Classified<Arc<dyn Middleware>>>),
    /// Wrapper descriptors in declaration order, instantiated when the chain is composed.
    Wrapper(Vec<MiddlewareDescriptor>),
}

impl ClassifiedMiddleware {
    /// Returns the style of the classified middleware.
    #[must_use]
    pub fn style(&self) -> MiddlewareStyle {
        match self {
            Self::Legacy(_) => MiddlewareStyle::Legacy,
            Self::Wrapper(_) => MiddlewareStyle::Wrapper,
        }
    }

    /// Returns the number of middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Legacy(entries) => entries.len(),
            Self::Wrapper(descriptors) => descriptors.len(),
        }
    }

    /// Returns true if no middleware was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Checks that every descriptor matches `style`.
///
/// # Errors
///
/// Returns [`ViewTestError::UnsupportedMiddlewareStyle`] naming the first
/// descriptor of the other style.
pub fn validate_style(
    style: MiddlewareStyle,
    descriptors: &[MiddlewareDescriptor],
) -> ViewTestResult<()> {
    match descriptors.iter().position(|d| d.style() != style) {
        Some(index) => {
            let descriptor = &descriptors[index];
            Err(ViewTestError::unsupported_style(format!(
                "middleware #{index} ({}) is {} style but the test uses {style} style",
                descriptor.name(),
                descriptor.style()
            )))
        }
        None => Ok(()),
    }
}

/// Classifies `descriptors` for an invocation using `style`.
///
/// Legacy middleware is instantiated here, one instance per descriptor.
///
/// # Errors
///
/// Returns [`ViewTestError::UnsupportedMiddlewareStyle`] if any descriptor
/// does not match `style`.
pub fn classify(
    style: MiddlewareStyle,
    descriptors: &[MiddlewareDescriptor],
) -> ViewTestResult<ClassifiedMiddleware> {
    validate_style(style, descriptors)?;

    let classified = match style {
        MiddlewareStyle::Legacy => ClassifiedMiddleware::Legacy(
            descriptors
                .iter()
                .filter_map(|descriptor| match &descriptor.factory {
                    Factory::Legacy(factory) => {
                        let instance = factory();
                        Some(Classified {
                            name: descriptor.name,
                            hooks: descriptor.resolve(instance.hooks()),
                            instance,
                        })
                    }
                    Factory::Wrapper(_) => None,
                })
                .collect(),
        ),
        MiddlewareStyle::Wrapper => ClassifiedMiddleware::Wrapper(descriptors.to_vec()),
    };

    tracing::debug!(
        style = %style,
        middleware_count = classified.len(),
        "Classified middleware"
    );

    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewtest_core::{Request, ViewResult};

    #[derive(Default)]
    struct Both;

    impl Middleware for Both {
        fn hooks(&self) -> HookSet {
            HookSet::of([HookKind::Request, HookKind::Response])
        }
    }

    struct Wrap {
        next: Next,
    }

    impl Middleware for Wrap {
        fn hooks(&self) -> HookSet {
            HookSet::of([HookKind::View])
        }
    }

    impl WrapperMiddleware for Wrap {
        fn wrap(next: Next) -> Self {
            Self { next }
        }

        fn call(&self, request: &mut Request) -> ViewResult {
            self.next.run(request)
        }
    }

    #[test]
    fn test_descriptor_styles() {
        assert_eq!(
            MiddlewareDescriptor::legacy::<Both>().style(),
            MiddlewareStyle::Legacy
        );
        assert_eq!(
            MiddlewareDescriptor::wrapper::<Wrap>().style(),
            MiddlewareStyle::Wrapper
        );
    }

    #[test]
    fn test_resolve_unrestricted() {
        let descriptor = MiddlewareDescriptor::legacy::<Both>();
        assert_eq!(descriptor.resolve(Both.hooks()), Both.hooks());
    }

    #[test]
    fn test_resolve_restricted() {
        let descriptor = MiddlewareDescriptor::legacy::<Both>().only([HookKind::Request]);
        assert_eq!(
            descriptor.resolve(Both.hooks()),
            HookSet::of([HookKind::Request])
        );
    }

    #[test]
    fn test_restriction_to_unimplemented_hook_is_noop() {
        let descriptor = MiddlewareDescriptor::legacy::<Both>().only([HookKind::Exception]);
        assert!(descriptor.resolve(Both.hooks()).is_empty());
    }

    #[test]
    fn test_classify_legacy() {
        let descriptors = vec![
            MiddlewareDescriptor::legacy::<Both>(),
            MiddlewareDescriptor::legacy::<Both>().only([HookKind::Response]),
        ];
        let classified = classify(MiddlewareStyle::Legacy, &descriptors).unwrap();

        let ClassifiedMiddleware::Legacy(entries) = classified else {
            panic!("expected legacy classification");
        };
        assert_eq!(entries.len(), 2);
        assert!(entries[0].participates(HookKind::Request));
        assert!(!entries[1].participates(HookKind::Request));
        assert!(entries[1].participates(HookKind::Response));
    }

    #[test]
    fn test_classify_does_not_mutate_descriptors() {
        let descriptors = vec![MiddlewareDescriptor::legacy::<Both>().only([HookKind::Request])];
        let _ = classify(MiddlewareStyle::Legacy, &descriptors).unwrap();
        let _ = classify(MiddlewareStyle::Legacy, &descriptors).unwrap();
        assert_eq!(
            descriptors[0].restriction(),
            Some(HookSet::of([HookKind::Request]))
        );
    }

    #[test]
    fn test_classify_rejects_mixed_styles() {
        let descriptors = vec![
            MiddlewareDescriptor::legacy::<Both>(),
            MiddlewareDescriptor::wrapper::<Wrap>(),
        ];

        let err = classify(MiddlewareStyle::Legacy, &descriptors).unwrap_err();
        assert!(matches!(err, ViewTestError::UnsupportedMiddlewareStyle { .. }));
        assert!(err.to_string().contains("#1"));

        let err = classify(MiddlewareStyle::Wrapper, &descriptors).unwrap_err();
        assert!(err.to_string().contains("#0"));
    }

    #[test]
    fn test_classify_wrapper_defers_instantiation() {
        let descriptors = vec![MiddlewareDescriptor::wrapper::<Wrap>()];
        let classified = classify(MiddlewareStyle::Wrapper, &descriptors).unwrap();
        assert_eq!(classified.style(), MiddlewareStyle::Wrapper);
        assert_eq!(classified.len(), 1);
    }

    #[test]
    fn test_empty_classification() {
        let classified = classify(MiddlewareStyle::Wrapper, &[]).unwrap();
        assert!(classified.is_empty());
    }

    #[test]
    fn test_style_serde() {
        let style: MiddlewareStyle = serde_json::from_str("\"wrapper\"").unwrap();
        assert_eq!(style, MiddlewareStyle::Wrapper);
        assert!(serde_json::from_str::<MiddlewareStyle>("\"modern\"").is_err());
    }
}
