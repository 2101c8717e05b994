//! Request sessions.
//!
//! [`SessionMiddleware`] attaches an empty [`Session`] to every request and
//! stamps a `Set-Cookie` header on the response when a view modified it.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;
use viewtest_core::{Request, Response};
use viewtest_middleware::{HookKind, HookSet, Middleware};

/// Cookie name the session key is sent under.
pub const SESSION_COOKIE_NAME: &str = "sessionid";

const TEST_COOKIE_NAME: &str = "testcookie";
const TEST_COOKIE_VALUE: &str = "worked";

/// A key/value session.
#[derive(Debug, Clone)]
pub struct Session {
    key: Uuid,
    data: BTreeMap<String, Value>,
    modified: bool,
    expiry: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an empty, unmodified session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: Uuid::now_v7(),
            data: BTreeMap::new(),
            modified: false,
            expiry: None,
        }
    }

    /// Returns the session key.
    #[must_use]
    pub fn key(&self) -> Uuid {
        self.key
    }

    /// Returns a stored value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Stores a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.modified = true;
        self.data.insert(key.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Returns true if `key` is stored.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.modified = true;
        }
        self.data.clear();
    }

    /// Returns true once anything was written.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Issues a new key, keeping the data.
    pub fn cycle_key(&mut self) {
        self.key = Uuid::now_v7();
        self.modified = true;
    }

    /// Expires the session `seconds` from now; `None` resets to the default.
    pub fn set_expiry(&mut self, seconds: Option<i64>) {
        self.expiry = seconds.map(|s| Utc::now() + Duration::seconds(s));
        self.modified = true;
    }

    /// Returns when the session expires, if set.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Stores the test cookie.
    pub fn set_test_cookie(&mut self) {
        self.insert(TEST_COOKIE_NAME, TEST_COOKIE_VALUE);
    }

    /// Returns true if the test cookie is present.
    #[must_use]
    pub fn test_cookie_worked(&self) -> bool {
        self.get(TEST_COOKIE_NAME).and_then(Value::as_str) == Some(TEST_COOKIE_VALUE)
    }

    /// Removes the test cookie.
    pub fn delete_test_cookie(&mut self) {
        self.remove(TEST_COOKIE_NAME);
    }
}

/// Legacy middleware that gives each request a [`Session`].
#[derive(Debug, Default)]
pub struct SessionMiddleware;

impl Middleware for SessionMiddleware {
    fn name(&self) -> &'static str {
        "SessionMiddleware"
    }

    fn hooks(&self) -> HookSet {
        HookSet::of([HookKind::Request, HookKind::Response])
    }

    fn on_request(&self, request: &mut Request) -> Option<Response> {
        if !request.attributes().contains::<Session>() {
            request.attributes_mut().insert(Session::new());
        }
        None
    }

    fn on_response(&self, request: &mut Request, mut response: Response) -> Response {
        if let Some(session) = request.attributes().get::<Session>() {
            if session.is_modified() {
                let cookie = format!("{SESSION_COOKIE_NAME}={}; Path=/", session.key());
                if let Err(e) = response.set_header("set-cookie", &cookie) {
                    tracing::warn!(error = %e, "Failed to set session cookie");
                }
            }
        }
        response
    }
}
