//! Mutable attribute bag carried by requests and responses.
//!
//! Middleware and views annotate requests (and responses) with arbitrary
//! data. Two namespaces are kept apart:
//!
//! - **extensions**, keyed by type, for structured state such as a session
//!   or a message store;
//! - **markers**, keyed by name, holding JSON values, for ad-hoc stamps like
//!   `"process_request_was_here"` that tests assert on later.

use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Typed extensions plus named JSON markers.
///
/// # Example
///
/// ```
/// use viewtest_core::Attributes;
///
/// #[derive(Clone)]
/// struct RateLimitInfo {
///     remaining: u32,
/// }
///
/// let mut attrs = Attributes::new();
/// attrs.insert(RateLimitInfo { remaining: 100 });
/// attrs.set("visited", true);
///
/// assert_eq!(attrs.get::<RateLimitInfo>().unwrap().remaining, 100);
/// assert!(attrs.flag("visited"));
/// ```
#[derive(Default)]
pub struct Attributes {
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    markers: HashMap<String, Value>,
}

impl Attributes {
    /// Creates an empty attribute bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a typed extension value, returning the previous one of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Retrieves a mutable reference to a typed extension value.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Removes and returns a typed extension value.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }

    /// Sets a named marker.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.markers.insert(key.into(), value.into());
    }

    /// Returns a named marker.
    #[must_use]
    pub fn marker(&self, key: &str) -> Option<&Value> {
        self.markers.get(key)
    }

    /// Returns true if the marker exists and is JSON `true`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.markers.get(key), Some(Value::Bool(true)))
    }

    /// Removes a named marker.
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        self.markers.remove(key)
    }

    /// Iterates over marker names.
    pub fn marker_names(&self) -> impl Iterator<Item = &str> {
        self.markers.keys().map(String::as_str)
    }

    /// Returns true when neither extensions nor markers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.markers.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("extensions", &self.extensions.len())
            .field("markers", &self.markers)
            .finish()
    }
}

impl Clone for Attributes {
    fn clone(&self) -> Self {
        // Extensions are not cloned - they don't implement Clone
        Self {
            extensions: HashMap::new(),
            markers: self.markers.clone(),
        }
    }
}
