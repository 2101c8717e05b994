//! Synthetic request type.
//!
//! A [`Request`] is one simulated HTTP request. It is created by the request
//! builder, mutated by middleware request hooks and by the view, and dropped
//! at the end of the test.

use crate::attributes::Attributes;
use crate::error::{ViewTestError, ViewTestResult};
use crate::identity::CallerIdentity;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;

/// Content type used for body payloads encoded as form data.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Content type used for JSON payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines from one test run sortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a request payload goes for a given method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Encoded into the query string (GET, HEAD, DELETE, OPTIONS).
    Query,
    /// Encoded into the request body (POST, PUT, PATCH).
    Body,
}

impl PayloadEncoding {
    /// Returns the payload encoding for a recognised method.
    #[must_use]
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::POST || *method == Method::PUT || *method == Method::PATCH {
            Self::Body
        } else {
            Self::Query
        }
    }
}

/// The verbs the request builder accepts.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::HEAD,
    Method::DELETE,
    Method::OPTIONS,
];

/// Parses a method name, accepting only [`SUPPORTED_METHODS`].
///
/// Matching is case-insensitive; anything else is rejected, never coerced.
///
/// # Example
///
/// ```
/// use viewtest_core::request::parse_method;
///
/// assert_eq!(parse_method("get").unwrap(), http::Method::GET);
/// assert!(parse_method("BREW").is_err());
/// ```
pub fn parse_method(name: &str) -> ViewTestResult<Method> {
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str().eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| ViewTestError::invalid_method(name))
}

/// One simulated HTTP request.
#[derive(Debug)]
pub struct Request {
    id: RequestId,
    method: Method,
    path: String,
    query: String,
    headers: HeaderMap,
    body: Bytes,
    identity: CallerIdentity,
    auth_token: Option<String>,
    attributes: Attributes,
}

impl Request {
    /// Creates a bare request. A `?query` suffix on `path` is split off.
    pub fn new(method: Method, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, q),
            None => (path, ""),
        };
        let path = if path.is_empty() { "/" } else { path };

        Self {
            id: RequestId::new(),
            method,
            path: path.to_string(),
            query: query.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            identity: CallerIdentity::Anonymous,
            auth_token: None,
            attributes: Attributes::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw path, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the percent-decoded path.
    #[must_use]
    pub fn path_info(&self) -> Cow<'_, str> {
        urlencoding::decode(&self.path).unwrap_or(Cow::Borrowed(&self.path))
    }

    /// Returns the raw query string (without the leading `?`).
    #[must_use]
    pub fn query_string(&self) -> &str {
        &self.query
    }

    /// Replaces the raw query string.
    pub fn set_query_string(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Returns the path followed by `?query` when a query is present.
    #[must_use]
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// Returns the decoded query parameters in order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        serde_urlencoded::from_str(&self.query).unwrap_or_default()
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        first_value(self.query_pairs(), name)
    }

    /// Deserializes the query string into `T`.
    pub fn query<T: DeserializeOwned>(&self) -> ViewTestResult<T> {
        serde_urlencoded::from_str(&self.query)
            .map_err(|e| ViewTestError::RequestBuild(format!("invalid query string: {e}")))
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name.as_ref()).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Sets the Content-Type header.
    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Returns the decoded form fields when the body is form-encoded.
    #[must_use]
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        if !self.is_content_type(FORM_CONTENT_TYPE) {
            return Vec::new();
        }
        serde_urlencoded::from_bytes(&self.body).unwrap_or_default()
    }

    /// Returns the first value of a form field.
    #[must_use]
    pub fn form_param(&self, name: &str) -> Option<String> {
        first_value(self.form_pairs(), name)
    }

    /// Deserializes a form-encoded body into `T`.
    pub fn form<T: DeserializeOwned>(&self) -> ViewTestResult<T> {
        serde_urlencoded::from_bytes(&self.body)
            .map_err(|e| ViewTestError::RequestBuild(format!("invalid form body: {e}")))
    }

    /// Deserializes a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ViewTestResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Returns the authenticated user, or `None` for anonymous requests.
    #[must_use]
    pub fn user(&self) -> Option<&CallerIdentity> {
        self.identity.is_authenticated().then_some(&self.identity)
    }

    /// Returns true when no principal is attached.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        !self.identity.is_authenticated()
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: CallerIdentity) {
        self.identity = identity;
    }

    /// Returns the forced authentication token, if any.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Sets a forced authentication token.
    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        self.auth_token = Some(token.into());
    }

    /// Returns the attribute bag.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the mutable attribute bag.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn is_content_type(&self, expected: &str) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.split(';').next().is_some_and(|m| m.trim() == expected))
    }
}

fn first_value(pairs: Vec<(String, String)>, name: &str) -> Option<String> {
    pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}
