//! Assertions for responses, captured mail, and queued messages.
//!
//! Every assertion panics with a descriptive message and reports the
//! caller's location.

use http::StatusCode;
use serde_json::Value;
use viewtest_core::{Request, Response, REDIRECT_CODES};

use crate::mail::{Email, EmailCriteria, Mailbox};
use crate::messages::{get_messages, Level, Message};

/// Assertions on a [`Response`]. Each returns the response for chaining.
///
/// # Example
///
/// ```
/// use viewtest::ResponseAssertions;
/// use viewtest_core::Response;
///
/// Response::redirect("/login/?next=/account/")
///     .assert_redirect(Some("/login/?next=/account/"))
///     .assert_status_in(&[301, 302]);
/// ```
pub trait ResponseAssertions {
    /// Asserts a 302 or 301 response, optionally to `expected_url`.
    #[track_caller]
    fn assert_redirect(&self, expected_url: Option<&str>) -> &Self;

    /// Asserts the response is not a redirect.
    #[track_caller]
    fn assert_not_redirect(&self) -> &Self;

    /// Asserts the status code.
    #[track_caller]
    fn assert_status_equal(&self, expected: u16) -> &Self;

    /// Asserts the status code is one of `expected`.
    #[track_caller]
    fn assert_status_in(&self, expected: &[u16]) -> &Self;

    /// Asserts a 403 response.
    #[track_caller]
    fn assert_forbidden(&self) -> &Self;

    /// Asserts a redirect to `{login_url}?{next_param}={request_path}`.
    #[track_caller]
    fn assert_login_required(&self, login_url: &str, next_param: &str, request_path: &str) -> &Self;

    /// Asserts a header value.
    #[track_caller]
    fn assert_header(&self, name: &str, expected: &str) -> &Self;

    /// Asserts the body contains `expected`.
    #[track_caller]
    fn assert_body_contains(&self, expected: &str) -> &Self;

    /// Asserts the body is JSON equal to `expected`.
    #[track_caller]
    fn assert_json_eq(&self, expected: &Value) -> &Self;

    /// Asserts a middleware marker is set and truthy.
    #[track_caller]
    fn assert_marker(&self, name: &str) -> &Self;
}

impl ResponseAssertions for Response {
    fn assert_redirect(&self, expected_url: Option<&str>) -> &Self {
        assert!(
            REDIRECT_CODES.contains(&self.status()),
            "Expected redirect status (302 or 301), got {}",
            self.status()
        );
        if let Some(expected) = expected_url {
            let actual = self.location().unwrap_or_else(|| panic!("Redirect has no Location header"));
            assert_eq!(actual, expected, "Redirect to '{actual}', expected '{expected}'");
        }
        self
    }

    fn assert_not_redirect(&self) -> &Self {
        assert!(
            !self.is_redirect(),
            "Expected no redirect, got {} to {:?}",
            self.status(),
            self.location()
        );
        self
    }

    fn assert_status_equal(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status_code(),
            expected,
            "Expected status {expected}, got {}",
            self.status_code()
        );
        self
    }

    fn assert_status_in(&self, expected: &[u16]) -> &Self {
        assert!(
            expected.contains(&self.status_code()),
            "Expected status in {expected:?}, got {}",
            self.status_code()
        );
        self
    }

    fn assert_forbidden(&self) -> &Self {
        assert_eq!(
            self.status(),
            StatusCode::FORBIDDEN,
            "Expected 403 Forbidden, got {}",
            self.status()
        );
        self
    }

    fn assert_login_required(&self, login_url: &str, next_param: &str, request_path: &str) -> &Self {
        self.assert_redirect(Some(&format!("{login_url}?{next_param}={request_path}")))
    }

    fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected, "Header '{name}': expected '{expected}', got '{actual}'");
        self
    }

    fn assert_body_contains(&self, expected: &str) -> &Self {
        let body = String::from_utf8_lossy(self.body());
        assert!(
            body.contains(expected),
            "Body should contain '{expected}', got: {body}"
        );
        self
    }

    fn assert_json_eq(&self, expected: &Value) -> &Self {
        let actual: Value = self
            .json_body()
            .unwrap_or_else(|e| panic!("Body is not JSON: {e}"));
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    fn assert_marker(&self, name: &str) -> &Self {
        assert!(
            self.attributes().flag(name),
            "Expected marker '{name}' on the response"
        );
        self
    }
}

/// Asserts `mailbox` holds exactly `count` emails.
///
/// # Panics
///
/// When the count differs.
#[track_caller]
pub fn assert_emails_in_mailbox(mailbox: &Mailbox, count: usize) {
    let actual = mailbox.len();
    assert_eq!(
        actual, count,
        "There is {actual} e-mails in mailbox, expected {count}."
    );
}

/// Asserts `email` satisfies `criteria`.
///
/// # Panics
///
/// Listing every mismatching field.
#[track_caller]
pub fn assert_email(email: &Email, criteria: &EmailCriteria) {
    let mismatches = criteria.mismatches(email);
    assert!(
        mismatches.is_empty(),
        "E-mail {:?} does not match: {}",
        email.subject,
        mismatches.join("; ")
    );
}

/// Asserts some email in `mailbox` satisfies `criteria`.
///
/// # Panics
///
/// When none does.
#[track_caller]
pub fn assert_email_exists(mailbox: &Mailbox, criteria: &EmailCriteria) {
    let emails = mailbox.emails();
    assert!(
        emails.iter().any(|email| criteria.matches(email)),
        "No e-mail matching {criteria:?} among {} sent",
        emails.len()
    );
}

/// Asserts exactly `count` messages were queued on `request`.
///
/// # Panics
///
/// When the count differs.
#[track_caller]
pub fn assert_messages_sent(request: &Request, count: usize) {
    let actual = get_messages(request).len();
    assert_eq!(
        actual, count,
        "There was {actual} messages sent, expected {count}."
    );
}

/// Asserts a message with `level` and `text` was queued on `request`.
///
/// # Panics
///
/// When no such message exists.
#[track_caller]
pub fn assert_message_exists(request: &Request, level: Level, text: &str) {
    let expected = Message::new(level, text);
    let messages = get_messages(request);
    assert!(
        messages.contains(&expected),
        "Message {expected:?} not found in {messages:?}"
    );
}
