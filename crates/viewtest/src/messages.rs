//! One-time user notifications ("flash messages").
//!
//! Views queue messages on the request's [`MessageStore`], which
//! [`MessageMiddleware`] attaches when the request has a session.
//! Messages below the store's minimum level are dropped; the minimum comes
//! from [`MessageStore::set_level`], else the `MESSAGE_LEVEL` setting, else
//! [`Level::Info`]:
//!
//! ```
//! use http::Method;
//! use viewtest::messages::{self, Level, MessageStore};
//! use viewtest_core::Request;
//!
//! let mut request = Request::new(Method::POST, "/profile/");
//! MessageStore::new().attach(&mut request);
//!
//! messages::success(&request, "Profile saved").unwrap();
//! assert_eq!(messages::get_messages(&request)[0].level, Level::Success);
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use viewtest_core::{Request, Response};
use viewtest_middleware::{HookKind, HookSet, Middleware};

use crate::error::MessageError;
use crate::session::Session;
use crate::settings;

/// Setting holding the default minimum level, as a number or a tag.
pub const MESSAGE_LEVEL_SETTING: &str = "MESSAGE_LEVEL";

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Development-only detail.
    Debug = 10,
    /// Informational.
    Info = 20,
    /// An action succeeded.
    Success = 25,
    /// Something may need attention.
    Warning = 30,
    /// An action failed.
    Error = 40,
}

impl Level {
    /// Returns the numeric level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Returns the lowercase tag used in templates.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns the level with numeric value `value`.
    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            10 => Some(Self::Debug),
            20 => Some(Self::Info),
            25 => Some(Self::Success),
            30 => Some(Self::Warning),
            40 => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A queued message. Two messages are equal when level and text are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Severity.
    pub level: Level,
    /// Text shown to the user.
    pub text: String,
}

impl Message {
    /// Creates a message.
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Per-request message queue. Cloning shares the queue.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Arc<Mutex<Vec<Message>>>,
    level: Arc<Mutex<Option<u8>>>,
}

impl MessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches this store to `request`, replacing any previous one.
    pub fn attach(&self, request: &mut Request) {
        request.attributes_mut().insert(self.clone());
    }

    /// Returns the store attached to `request`.
    #[must_use]
    pub fn of(request: &Request) -> Option<&Self> {
        request.attributes().get::<Self>()
    }

    /// Queues a message unless it is below [`level`](Self::level).
    ///
    /// Returns whether the message was kept.
    pub fn add(&self, message: Message) -> bool {
        let minimum = self.level();
        if message.level.value() < minimum {
            tracing::trace!(level = %message.level, minimum, "Message below minimum level dropped");
            return false;
        }
        self.messages.lock().push(message);
        true
    }

    /// Overrides the minimum level for this store. `None` falls back to the
    /// `MESSAGE_LEVEL` setting.
    pub fn set_level(&self, level: Option<u8>) {
        *self.level.lock() = level;
    }

    /// Returns the minimum numeric level a message needs to be kept.
    #[must_use]
    pub fn level(&self) -> u8 {
        (*self.level.lock()).unwrap_or_else(default_level)
    }

    /// Returns the queued messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Returns the number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

/// Legacy middleware attaching a [`MessageStore`] to each request.
///
/// Must come after [`SessionMiddleware`](crate::session::SessionMiddleware);
/// without a session no store is attached and adding messages fails with
/// [`MessageError::NotInstalled`].
#[derive(Debug, Default)]
pub struct MessageMiddleware;

impl Middleware for MessageMiddleware {
    fn name(&self) -> &'static str {
        "MessageMiddleware"
    }

    fn hooks(&self) -> HookSet {
        HookSet::of([HookKind::Request])
    }

    fn on_request(&self, request: &mut Request) -> Option<Response> {
        if request.attributes().contains::<Session>() {
            MessageStore::new().attach(request);
        } else {
            tracing::warn!(
                request_id = %request.id(),
                "MessageMiddleware requires SessionMiddleware before it; no message store attached"
            );
        }
        None
    }
}

/// Minimum level from the `MESSAGE_LEVEL` setting, [`Level::Info`] when the
/// setting is absent or malformed.
fn default_level() -> u8 {
    match settings::get(MESSAGE_LEVEL_SETTING) {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .unwrap_or(Level::Info.value()),
        Some(Value::String(tag)) => serde_json::from_value::<Level>(Value::String(tag))
            .map_or(Level::Info.value(), Level::value),
        _ => Level::Info.value(),
    }
}

/// Queues a message on the request's store.
///
/// Messages below the store's minimum level are silently dropped.
///
/// # Errors
///
/// Returns [`MessageError::NotInstalled`] when the request has no store.
pub fn add(request: &Request, level: Level, text: impl Into<String>) -> Result<(), MessageError> {
    let store = MessageStore::of(request).ok_or(MessageError::NotInstalled)?;
    store.add(Message::new(level, text));
    Ok(())
}

/// Queues a [`Level::Debug`] message.
///
/// # Errors
///
/// See [`add`].
pub fn debug(request: &Request, text: impl Into<String>) -> Result<(), MessageError> {
    add(request, Level::Debug, text)
}

/// Queues a [`Level::Info`] message.
///
/// # Errors
///
/// See [`add`].
pub fn info(request: &Request, text: impl Into<String>) -> Result<(), MessageError> {
    add(request, Level::Info, text)
}

/// Queues a [`Level::Success`] message.
///
/// # Errors
///
/// See [`add`].
pub fn success(request: &Request, text: impl Into<String>) -> Result<(), MessageError> {
    add(request, Level::Success, text)
}

/// Queues a [`Level::Warning`] message.
///
/// # Errors
///
/// See [`add`].
pub fn warning(request: &Request, text: impl Into<String>) -> Result<(), MessageError> {
    add(request, Level::Warning, text)
}

/// Queues a [`Level::Error`] message.
///
/// # Errors
///
/// See [`add`].
pub fn error(request: &Request, text: impl Into<String>) -> Result<(), MessageError> {
    add(request, Level::Error, text)
}

/// Returns the messages queued on `request`, empty when it has no store.
#[must_use]
pub fn get_messages(request: &Request) -> Vec<Message> {
    MessageStore::of(request).map(MessageStore::messages).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_level_values() {
        assert_eq!(Level::Debug.value(), 10);
        assert_eq!(Level::Info.value(), 20);
        assert_eq!(Level::Success.value(), 25);
        assert_eq!(Level::Warning.value(), 30);
        assert_eq!(Level::Error.value(), 40);
        assert!(Level::Warning > Level::Success);
        assert_eq!(Level::Warning.to_string(), "warning");
    }

    #[test]
    fn test_add_without_store_fails() {
        let request = Request::new(Method::GET, "/");
        assert_eq!(info(&request, "hi"), Err(MessageError::NotInstalled));
        assert!(get_messages(&request).is_empty());
    }

    #[test]
    fn test_shortcuts_queue_in_order() {
        let mut request = Request::new(Method::GET, "/");
        let store = MessageStore::new();
        store.set_level(Some(Level::Debug.value()));
        store.attach(&mut request);

        debug(&request, "d").unwrap();
        warning(&request, "w").unwrap();
        error(&request, "e").unwrap();

        assert_eq!(
            get_messages(&request),
            vec![
                Message::new(Level::Debug, "d"),
                Message::new(Level::Warning, "w"),
                Message::new(Level::Error, "e"),
            ]
        );
    }

    #[test]
    fn test_debug_dropped_at_default_level() {
        let mut request = Request::new(Method::GET, "/");
        MessageStore::new().attach(&mut request);

        debug(&request, "hidden").unwrap();
        info(&request, "shown").unwrap();

        assert_eq!(get_messages(&request), vec![Message::new(Level::Info, "shown")]);
    }

    #[test]
    fn test_minimum_level_from_setting() {
        let store = MessageStore::new();

        let mut values = serde_json::Map::new();
        values.insert(MESSAGE_LEVEL_SETTING.to_string(), serde_json::json!(10));
        let guard = settings::override_settings(values);
        assert_eq!(store.level(), 10);
        assert!(store.add(Message::new(Level::Debug, "kept")));
        drop(guard);

        let mut values = serde_json::Map::new();
        values.insert(MESSAGE_LEVEL_SETTING.to_string(), serde_json::json!("warning"));
        let _guard = settings::override_settings(values);
        assert_eq!(store.level(), 30);
        assert!(!store.add(Message::new(Level::Success, "dropped")));

        store.set_level(Some(Level::Error.value()));
        assert!(!store.add(Message::new(Level::Warning, "dropped")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_level_from_value() {
        assert_eq!(Level::from_value(25), Some(Level::Success));
        assert_eq!(Level::from_value(15), None);
    }

    #[test]
    fn test_middleware_requires_session() {
        let middleware = MessageMiddleware;

        let mut request = Request::new(Method::GET, "/");
        middleware.on_request(&mut request);
        assert!(MessageStore::of(&request).is_none());

        let mut request = Request::new(Method::GET, "/");
        request.attributes_mut().insert(Session::new());
        middleware.on_request(&mut request);
        assert!(MessageStore::of(&request).is_some_and(MessageStore::is_empty));
    }
}
