//! Synthetic request construction.
//!
//! [`RequestFactory`] builds [`Request`]s without a socket or a server loop.
//! It never runs middleware; that is the pipeline's job.
//!
//! Payload placement follows the method:
//!
//! | Method | Payload goes to |
//! |--------|-----------------|
//! | GET, HEAD, DELETE, OPTIONS | query string, appended to any query in the path |
//! | POST, PUT, PATCH | body, `application/x-www-form-urlencoded` |
//!
//! [`RequestBuilder::json`] always writes a JSON body.

use bytes::Bytes;
use http::{header, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use viewtest_config::RequestConfig;
use viewtest_core::request::{
    parse_method, PayloadEncoding, FORM_CONTENT_TYPE, JSON_CONTENT_TYPE, SUPPORTED_METHODS,
};
use viewtest_core::{CallerIdentity, Request, ViewTestError, ViewTestResult};

/// Builds synthetic requests.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use viewtest::RequestFactory;
/// use viewtest_core::CallerIdentity;
///
/// let factory = RequestFactory::new().with_default_header("accept-language", "en");
///
/// let request = factory
///     .get("/search/")
///     .data(&json!({"q": "rust"}))
///     .user(CallerIdentity::user("1", "alice"))
///     .build()
///     .unwrap();
///
/// assert_eq!(request.query_param("q").as_deref(), Some("rust"));
/// assert_eq!(request.header_str("accept-language"), Some("en"));
/// assert!(!request.is_anonymous());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestFactory {
    default_headers: Vec<(String, String)>,
}

impl RequestFactory {
    /// Creates a factory with no default headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory from the `[request]` configuration section.
    #[must_use]
    pub fn from_config(config: &RequestConfig) -> Self {
        Self {
            default_headers: config
                .default_headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Adds a header that is set on every request this factory builds.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the default headers.
    #[must_use]
    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    /// Builds a request in one call.
    ///
    /// `method` is matched case-insensitively. `payload` must be a JSON
    /// object of fields (arrays become repeated fields); `identity` becomes
    /// the authenticated principal, anonymous when `None`.
    ///
    /// # Errors
    ///
    /// - [`ViewTestError::InvalidMethod`] for an unrecognised verb
    /// - [`ViewTestError::RequestBuild`] for a payload that is not a flat map
    /// - [`ViewTestError::InvalidHeader`] for a bad default header
    pub fn build(
        &self,
        method: &str,
        path: &str,
        payload: Option<&Value>,
        identity: Option<CallerIdentity>,
    ) -> ViewTestResult<Request> {
        let method = parse_method(method)?;
        let mut builder = self.request(method, path);
        if let Some(payload) = payload {
            builder = builder.data(payload);
        }
        if let Some(identity) = identity {
            builder = builder.user(identity);
        }
        builder.build()
    }

    /// Starts a request with an explicit method.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder {
        let mut builder = RequestBuilder::new(method, path);
        builder.headers.clone_from(&self.default_headers);
        builder
    }

    /// Starts a GET request.
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    /// Starts a HEAD request.
    pub fn head(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, path)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Starts an OPTIONS request.
    pub fn options(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::OPTIONS, path)
    }
}

#[derive(Debug)]
enum Payload {
    None,
    Fields(Vec<(String, String)>),
    Json(Bytes),
    Raw(Bytes),
}

/// Builder for one request.
///
/// Errors from payload serialization are kept and reported by
/// [`build`](Self::build), so calls can be chained freely.
#[must_use]
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    payload: Payload,
    identity: CallerIdentity,
    token: Option<String>,
    error: Option<ViewTestError>,
}

impl RequestBuilder {
    /// Creates a builder for `method` and `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let error = (!SUPPORTED_METHODS.contains(&method))
            .then(|| ViewTestError::invalid_method(method.as_str()));
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            payload: Payload::None,
            identity: CallerIdentity::Anonymous,
            token: None,
            error,
        }
    }

    /// Sets the payload from a serializable map of fields.
    ///
    /// Placed in the query string or the body depending on the method.
    pub fn data<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_value(value)
            .map_err(ViewTestError::from)
            .and_then(|value| payload_pairs(&value))
        {
            Ok(pairs) => self.payload = Payload::Fields(pairs),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Sets a JSON body and the `application/json` content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.payload = Payload::Json(Bytes::from(bytes)),
            Err(e) => self.fail(e.into()),
        }
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.payload = Payload::Raw(body.into());
        self
    }

    /// Sets a header, replacing any default of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Attaches `identity` as the authenticated principal.
    pub fn user(mut self, identity: CallerIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Forces token authentication, as REST views see it.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building, or
    /// [`ViewTestError::InvalidHeader`] for a header that is not valid HTTP.
    pub fn build(self) -> ViewTestResult<Request> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut request = Request::new(self.method.clone(), &self.path);
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ViewTestError::InvalidHeader(format!("{name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ViewTestError::InvalidHeader(format!("{name}: {e}")))?;
            request.headers_mut().insert(header_name, header_value);
        }

        match self.payload {
            Payload::None => {}
            Payload::Fields(pairs) => {
                let encoded = serde_urlencoded::to_string(&pairs)
                    .map_err(|e| ViewTestError::RequestBuild(e.to_string()))?;
                match PayloadEncoding::for_method(&self.method) {
                    PayloadEncoding::Query => {
                        if !encoded.is_empty() {
                            let query = if request.query_string().is_empty() {
                                encoded
                            } else {
                                format!("{}&{encoded}", request.query_string())
                            };
                            request.set_query_string(query);
                        }
                    }
                    PayloadEncoding::Body => {
                        request.set_body(encoded);
                        if request.content_type().is_none() {
                            request.set_content_type(FORM_CONTENT_TYPE);
                        }
                    }
                }
            }
            Payload::Json(bytes) => {
                request.set_body(bytes);
                if request.content_type().is_none() {
                    request.set_content_type(JSON_CONTENT_TYPE);
                }
            }
            Payload::Raw(bytes) => request.set_body(bytes),
        }

        request.set_identity(self.identity);
        if let Some(token) = self.token {
            request.set_auth_token(token);
        }

        tracing::trace!(
            request_id = %request.id(),
            method = %request.method(),
            path = %request.full_path(),
            identity = %request.identity().log_id(),
            "Built request"
        );

        Ok(request)
    }

    fn fail(&mut self, error: ViewTestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Flattens a JSON object into form fields. Arrays repeat the field, nulls are skipped.
fn payload_pairs(value: &Value) -> ViewTestResult<Vec<(String, String)>> {
    let fields = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(fields) => fields,
        other => {
            return Err(ViewTestError::RequestBuild(format!(
                "payload must be a map of fields, got {other}"
            )))
        }
    };

    let mut pairs = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar(key, item)? {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar(key, other)? {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    Ok(pairs)
}

fn scalar(key: &str, value: &Value) -> ViewTestResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(_) | Value::Object(_) => Err(ViewTestError::RequestBuild(format!(
            "field {key:?} is nested; only scalars and lists of scalars can be form-encoded"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_encodes_payload_in_query() {
        let request = RequestFactory::new()
            .build("GET", "", Some(&json!({"q": "x"})), None)
            .unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.query_string(), "q=x");
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_post_encodes_payload_in_body() {
        let request = RequestFactory::new()
            .build("post", "", Some(&json!({"q": "x"})), None)
            .unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.query_string(), "");
        assert_eq!(request.body().as_ref(), b"q=x");
        assert_eq!(request.content_type(), Some(FORM_CONTENT_TYPE));
        assert_eq!(request.form_param("q").as_deref(), Some("x"));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let err = RequestFactory::new().build("BREW", "/", None, None).unwrap_err();
        assert!(matches!(err, ViewTestError::InvalidMethod { .. }));

        let err = RequestFactory::new().request(Method::TRACE, "/").build().unwrap_err();
        assert!(matches!(err, ViewTestError::InvalidMethod { method } if method == "TRACE"));
    }

    #[test]
    fn test_query_payload_merges_with_path_query() {
        let request = RequestFactory::new()
            .delete("/items/?force=1")
            .data(&json!({"reason": "dup"}))
            .build()
            .unwrap();
        assert_eq!(request.query_string(), "force=1&reason=dup");
    }

    #[test]
    fn test_lists_repeat_fields() {
        let request = RequestFactory::new()
            .get("/")
            .data(&json!({"tag": ["a", "b"], "skip": null}))
            .build()
            .unwrap();
        assert_eq!(
            request.query_pairs(),
            vec![("tag".to_string(), "a".to_string()), ("tag".to_string(), "b".to_string())]
        );
    }

    #[test]
    fn test_nested_payload_rejected() {
        let err = RequestFactory::new()
            .post("/")
            .data(&json!({"user": {"name": "x"}}))
            .build()
            .unwrap_err();
        assert!(matches!(err, ViewTestError::RequestBuild(_)));

        let err = RequestFactory::new().get("/").data(&json!([1, 2])).build().unwrap_err();
        assert!(err.to_string().contains("map of fields"));
    }

    #[test]
    fn test_json_body() {
        let request = RequestFactory::new()
            .put("/items/1/")
            .json(&json!({"name": "Alice"}))
            .build()
            .unwrap();
        assert_eq!(request.content_type(), Some(JSON_CONTENT_TYPE));
        let value: Value = request.json().unwrap();
        assert_eq!(value["name"], "Alice");
    }

    #[test]
    fn test_identity_and_token() {
        let factory = RequestFactory::new();

        let anonymous = factory.get("/").build().unwrap();
        assert!(anonymous.is_anonymous());
        assert!(anonymous.auth_token().is_none());

        let request = factory
            .get("/")
            .user(CallerIdentity::user("7", "bob"))
            .token("abc123")
            .build()
            .unwrap();
        assert_eq!(request.identity().log_id(), "user:7");
        assert_eq!(request.auth_token(), Some("abc123"));
    }

    #[test]
    fn test_default_headers_overridable() {
        let factory = RequestFactory::new()
            .with_default_header("Accept", "text/html")
            .with_default_header("x-client", "tests");

        let request = factory.get("/").header("accept", "application/json").build().unwrap();
        assert_eq!(request.header_str("accept"), Some("application/json"));
        assert_eq!(request.header_str("x-client"), Some("tests"));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = RequestFactory::new().get("/").header("bad header", "x").build().unwrap_err();
        assert!(matches!(err, ViewTestError::InvalidHeader(_)));
    }

    #[test]
    fn test_explicit_content_type_kept() {
        let request = RequestFactory::new()
            .post("/")
            .content_type("text/plain")
            .body("raw data")
            .build()
            .unwrap();
        assert_eq!(request.content_type(), Some("text/plain"));
        assert_eq!(request.body().as_ref(), b"raw data");
    }

    #[test]
    fn test_from_config() {
        let mut config = RequestConfig::default();
        config
            .default_headers
            .insert("accept-language".to_string(), "de".to_string());
        let request = RequestFactory::from_config(&config).head("/").build().unwrap();
        assert_eq!(request.header_str("accept-language"), Some("de"));
    }
}
