//! Hook kinds and hook sets.
//!
//! A middleware participates in a phase of the pipeline through a *hook*.
//! Which hooks a middleware takes part in is the intersection of the hooks it
//! implements (see [`Middleware::hooks`](crate::Middleware::hooks)) and the
//! restriction carried by its descriptor, if any.

use std::fmt;

/// The phases a middleware can hook into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum HookKind {
    /// Runs before the view; may short-circuit with a response.
    Request = 0,
    /// Runs with the resolved view and its arguments; may short-circuit.
    View = 1,
    /// Transforms a renderable response before it is rendered.
    TemplateResponse = 2,
    /// Transforms every response on the way out.
    Response = 3,
    /// Runs when the view fails; may recover with a response.
    Exception = 4,
}

impl HookKind {
    /// Returns the hook name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::View => "view",
            Self::TemplateResponse => "template_response",
            Self::Response => "response",
            Self::Exception => "exception",
        }
    }

    /// Returns all hook kinds in pipeline order.
    #[must_use]
    pub const fn all() -> [HookKind; 5] {
        [
            Self::Request,
            Self::View,
            Self::TemplateResponse,
            Self::Response,
            Self::Exception,
        ]
    }

    /// Returns true for hooks that run in reverse declaration order.
    ///
    /// Outbound hooks see the response on its way out, so the last declared
    /// middleware runs first.
    #[must_use]
    pub const fn is_outbound(self) -> bool {
        matches!(
            self,
            Self::TemplateResponse | Self::Response | Self::Exception
        )
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`HookKind`]s.
///
/// # Example
///
/// ```
/// use viewtest_middleware::{HookKind, HookSet};
///
/// let implemented = HookSet::of([HookKind::Request, HookKind::Response]);
/// let allowed = HookSet::of([HookKind::Request]);
///
/// let active = implemented.intersect(allowed);
/// assert!(active.contains(HookKind::Request));
/// assert!(!active.contains(HookKind::Response));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HookSet(u8);

impl HookSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The set of every hook kind.
    #[must_use]
    pub const fn all() -> Self {
        Self(0b1_1111)
    }

    /// Builds a set from hook kinds.
    pub fn of(kinds: impl IntoIterator<Item = HookKind>) -> Self {
        kinds.into_iter().collect()
    }

    /// Returns a copy of this set including `kind`.
    #[must_use]
    pub const fn with(self, kind: HookKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Adds a hook kind.
    pub fn insert(&mut self, kind: HookKind) {
        self.0 |= kind.bit();
    }

    /// Returns true if the set contains `kind`.
    #[must_use]
    pub const fn contains(self, kind: HookKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns the kinds present in both sets.
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns true if no kind is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of kinds present.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the kinds present, in pipeline order.
    pub fn iter(self) -> impl Iterator<Item = HookKind> {
        HookKind::all().into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<HookKind> for HookSet {
    fn from_iter<I: IntoIterator<Item = HookKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl From<HookKind> for HookSet {
    fn from(kind: HookKind) -> Self {
        Self::empty().with(kind)
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(HookKind::name)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_ordering() {
        assert!(HookKind::Request < HookKind::View);
        assert!(HookKind::View < HookKind::TemplateResponse);
        assert!(HookKind::TemplateResponse < HookKind::Response);
        assert!(HookKind::Response < HookKind::Exception);
    }

    #[test]
    fn test_hook_names() {
        assert_eq!(HookKind::Request.name(), "request");
        assert_eq!(HookKind::View.name(), "view");
        assert_eq!(HookKind::TemplateResponse.name(), "template_response");
        assert_eq!(HookKind::Response.name(), "response");
        assert_eq!(HookKind::Exception.name(), "exception");
    }

    #[test]
    fn test_outbound_hooks() {
        assert!(!HookKind::Request.is_outbound());
        assert!(!HookKind::View.is_outbound());
        assert!(HookKind::TemplateResponse.is_outbound());
        assert!(HookKind::Response.is_outbound());
        assert!(HookKind::Exception.is_outbound());
    }

    #[test]
    fn test_set_operations() {
        let mut set = HookSet::empty();
        assert!(set.is_empty());

        set.insert(HookKind::Response);
        set.insert(HookKind::Request);
        set.insert(HookKind::Request);
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![HookKind::Request, HookKind::Response]
        );

        let restricted = set.intersect(HookSet::from(HookKind::Request));
        assert_eq!(restricted, HookSet::of([HookKind::Request]));
    }

    #[test]
    fn test_all_contains_every_kind() {
        let all = HookSet::all();
        assert_eq!(all.len(), 5);
        assert!(HookKind::all().iter().all(|k| all.contains(*k)));
    }

    #[test]
    fn test_debug_lists_names() {
        let set = HookSet::of([HookKind::View, HookKind::Exception]);
        assert_eq!(format!("{set:?}"), r#"{"view", "exception"}"#);
    }
}
