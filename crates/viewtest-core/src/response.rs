//! Response type produced by views, hooks and middleware.
//!
//! A [`Response`] may carry a deferred [`Template`]. Until it is rendered the
//! response is *renderable*: template-response hooks may still change the
//! template or its context before the body is materialised.

use crate::attributes::Attributes;
use crate::error::{ViewTestError, ViewTestResult};
use bytes::Bytes;
use handlebars::Handlebars;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// Status codes treated as redirects by the assertion helpers.
pub const REDIRECT_CODES: [StatusCode; 2] = [StatusCode::FOUND, StatusCode::MOVED_PERMANENTLY];

/// Registry name the template source is compiled under.
const TEMPLATE_NAME: &str = "response";

/// A template that has not been rendered yet.
///
/// The source is Handlebars: `{{ name }}` inserts an HTML-escaped context
/// value, `{{ user.name }}` walks nested objects and block helpers such as
/// `{{#if admin}}` work as usual. Missing values render as empty text unless
/// the template is [`strict`](Self::strict).
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Template source text.
    pub source: String,
    /// Values available to the template.
    pub context: Map<String, Value>,
    strict: bool,
}

impl Template {
    /// Creates a template with an empty context.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            context: Map::new(),
            strict: false,
        }
    }

    /// Adds a context value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Makes a reference to a missing context value a render error.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Renders the template into text.
    ///
    /// # Errors
    ///
    /// Returns [`ViewTestError::Template`] when the source does not parse or,
    /// for a strict template, when it references a missing value.
    pub fn render(&self) -> ViewTestResult<String> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(self.strict);
        handlebars.register_template_string(TEMPLATE_NAME, &self.source)?;
        Ok(handlebars.render(TEMPLATE_NAME, &self.context)?)
    }
}

/// The value returned by a view or by a middleware hook.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    template: Option<Template>,
    attributes: Attributes,
}

impl Response {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            template: None,
            attributes: Attributes::new(),
        }
    }

    /// Creates an empty `200 OK` response.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Creates a plain-text response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.body = Bytes::from(body.into());
        response
    }

    /// Creates a JSON response.
    #[must_use]
    pub fn json(status: StatusCode, value: &Value) -> Self {
        let mut response = Self::new(status);
        response
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response.body = Bytes::from(value.to_string());
        response
    }

    /// Creates a `302 Found` redirect.
    pub fn redirect(location: impl AsRef<str>) -> Self {
        Self::redirect_with(StatusCode::FOUND, location.as_ref())
    }

    /// Creates a `301 Moved Permanently` redirect.
    pub fn permanent_redirect(location: impl AsRef<str>) -> Self {
        Self::redirect_with(StatusCode::MOVED_PERMANENTLY, location.as_ref())
    }

    /// Creates a `403 Forbidden` response.
    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }

    /// Creates a `405 Method Not Allowed` response listing the allowed methods.
    #[must_use]
    pub fn not_allowed(allowed: &[Method]) -> Self {
        let mut response = Self::new(StatusCode::METHOD_NOT_ALLOWED);
        response.set_allow(allowed);
        response
    }

    /// Creates a renderable `200 OK` response around a template.
    #[must_use]
    pub fn template(template: Template) -> Self {
        let mut response = Self::ok();
        response.template = Some(template);
        response
    }

    fn redirect_with(status: StatusCode, location: &str) -> Self {
        let value = HeaderValue::from_str(location).unwrap_or_else(|_| {
            let encoded = urlencoding::encode(location).into_owned();
            HeaderValue::from_maybe_shared(Bytes::from(encoded))
                .unwrap_or_else(|_| HeaderValue::from_static("/"))
        });
        let mut response = Self::new(status);
        response.headers.insert(header::LOCATION, value);
        response
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Replaces the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns true for 301 and 302 responses.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        REDIRECT_CODES.contains(&self.status)
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

    /// Sets a header from string parts.
    pub fn set_header(
        &mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> ViewTestResult<()> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ViewTestError::InvalidHeader(e.to_string()))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ViewTestError::InvalidHeader(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name.as_ref()).and_then(|v| v.to_str().ok())
    }

    /// Returns the `Location` header value.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header_str(header::LOCATION.as_str())
    }

    /// Returns the raw body bytes.
    ///
    /// Empty until a renderable response has been rendered.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Returns the body as a string.
    pub fn text_body(&self) -> ViewTestResult<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| ViewTestError::RequestBuild(format!("invalid UTF-8 body: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json_body<T: DeserializeOwned>(&self) -> ViewTestResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns true while the response carries a template that has not been rendered.
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        self.template.is_some()
    }

    /// Returns the pending template.
    #[must_use]
    pub fn pending_template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// Returns the pending template for modification.
    pub fn pending_template_mut(&mut self) -> Option<&mut Template> {
        self.template.as_mut()
    }

    /// Materialises a pending template into the body.
    ///
    /// Does nothing for responses that are not renderable. On error the
    /// template is dropped and the body left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ViewTestError::Template`] when the template fails to render.
    pub fn render(&mut self) -> ViewTestResult<()> {
        if let Some(template) = self.template.take() {
            self.body = Bytes::from(template.render()?);
            if !self.headers.contains_key(header::CONTENT_TYPE) {
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
            }
        }
        Ok(())
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

    /// Sets the `Allow` header.
    pub fn set_allow(&mut self, allowed: &[Method]) {
        let joined = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&joined) {
            self.headers.insert(header::ALLOW, value);
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("renderable", &self.is_renderable())
            .field("attributes", &self.attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redirects() {
        let response = Response::redirect("/login/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.location(), Some("/login/"));
        assert!(response.is_redirect());

        let response = Response::permanent_redirect("/new/");
        assert_eq!(response.status_code(), 301);
        assert!(response.is_redirect());

        assert!(!Response::ok().is_redirect());
    }

    #[test]
    fn test_redirect_with_unencodable_location() {
        let response = Response::redirect("/a\nb");
        assert_eq!(response.location(), Some("%2Fa%0Ab"));
    }

    #[test]
    fn test_text_and_json() {
        let response = Response::text(StatusCode::OK, "hello");
        assert_eq!(response.text_body().unwrap(), "hello");
        assert_eq!(response.header_str("content-type"), Some("text/plain; charset=utf-8"));

        let response = Response::json(StatusCode::CREATED, &json!({"id": 1}));
        let value: Value = response.json_body().unwrap();
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_not_allowed_lists_methods() {
        let response = Response::not_allowed(&[Method::GET, Method::HEAD]);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header_str("Allow"), Some("GET, HEAD"));
    }

    #[test]
    fn test_template_render() {
        let template = Template::new("<h1>{{ title }}</h1><p>{{count}}</p>{{ missing }}")
            .with("title", "Hello")
            .with("count", 3);
        assert_eq!(template.render().unwrap(), "<h1>Hello</h1><p>3</p>");
    }

    #[test]
    fn test_template_escapes_and_walks_paths() {
        let template = Template::new("<p>{{ name }}</p>|{{ user.name }}|{{#if admin}}A{{/if}}{{#if guest}}G{{/if}}")
            .with("name", "<script>x</script>")
            .with("user", json!({"name": "alice"}))
            .with("admin", true)
            .with("guest", false);
        assert_eq!(
            template.render().unwrap(),
            "<p>&lt;script&gt;x&lt;/script&gt;</p>|alice|A"
        );
    }

    #[test]
    fn test_template_unterminated_placeholder() {
        let template = Template::new("a {{ b");
        assert!(matches!(template.render(), Err(ViewTestError::Template(_))));
    }

    #[test]
    fn test_strict_template_rejects_missing_value() {
        let template = Template::new("hi {{ who }}");
        assert_eq!(template.render().unwrap(), "hi ");
        assert!(matches!(template.strict().render(), Err(ViewTestError::Template(_))));
    }

    #[test]
    fn test_render_materialises_body_once() {
        let mut response = Response::template(Template::new("hi {{ who }}").with("who", "there"));
        assert!(response.is_renderable());
        assert!(response.body().is_empty());

        response.render().unwrap();
        assert!(!response.is_renderable());
        assert_eq!(response.text_body().unwrap(), "hi there");
        assert_eq!(
            response.header_str("content-type"),
            Some("text/html; charset=utf-8")
        );

        response.set_body("changed");
        response.render().unwrap();
        assert_eq!(response.text_body().unwrap(), "changed");
    }

    #[test]
    fn test_render_failure_keeps_body() {
        let mut response = Response::template(Template::new("{{#if}}"));
        response.set_body("fallback");
        assert!(response.render().is_err());
        assert!(!response.is_renderable());
        assert_eq!(response.text_body().unwrap(), "fallback");
        assert_eq!(response.header_str("content-type"), None);
    }

    #[test]
    fn test_set_header_rejects_invalid_name() {
        let mut response = Response::ok();
        assert!(response.set_header("X-Ok", "1").is_ok());
        assert!(matches!(
            response.set_header("bad header", "1"),
            Err(ViewTestError::InvalidHeader(_))
        ));
        assert_eq!(response.header_str("x-ok"), Some("1"));
    }
}
