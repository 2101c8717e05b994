//! Caller identity attached to synthetic requests.
//!
//! The request builder attaches a [`CallerIdentity`] as the authenticated
//! principal. Requests built without one carry [`CallerIdentity::Anonymous`].

use serde::{Deserialize, Serialize};

/// The principal a request is made on behalf of.
///
/// # Example
///
/// ```rust
/// use viewtest_core::CallerIdentity;
///
/// let identity = CallerIdentity::user("user-123", "alice");
/// assert!(identity.is_authenticated());
/// assert_eq!(identity.log_id(), "user:user-123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// An end user.
    User {
        /// Stable user identifier (primary key).
        user_id: String,
        /// Login name.
        username: String,
        /// Email address, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        /// Roles or groups granted to the user.
        #[serde(default)]
        roles: Vec<String>,
        /// Whether the user may access staff-only views.
        #[serde(default)]
        is_staff: bool,
    },

    /// A machine client authenticated by API key.
    ApiKey {
        /// Key identifier (never the secret).
        key_id: String,
        /// Human-readable key name.
        name: String,
        /// Scopes granted to the key.
        #[serde(default)]
        scopes: Vec<String>,
    },

    /// No principal.
    #[default]
    Anonymous,
}

impl CallerIdentity {
    /// Creates a user identity with no email or roles.
    pub fn user(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
            username: username.into(),
            email: None,
            roles: Vec::new(),
            is_staff: false,
        }
    }

    /// Creates a staff user identity.
    pub fn staff(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
            username: username.into(),
            email: None,
            roles: Vec::new(),
            is_staff: true,
        }
    }

    /// Creates an API key identity.
    pub fn api_key(key_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ApiKey {
            key_id: key_id.into(),
            name: name.into(),
            scopes: Vec::new(),
        }
    }

    /// Creates the anonymous identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self::Anonymous
    }

    /// Returns a copy of this identity with the given roles (users) or scopes (keys).
    ///
    /// Has no effect on the anonymous identity.
    #[must_use]
    pub fn with_roles<I, S>(mut self, granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &mut self {
            Self::User { roles, .. } => roles.extend(granted.into_iter().map(Into::into)),
            Self::ApiKey { scopes, .. } => scopes.extend(granted.into_iter().map(Into::into)),
            Self::Anonymous => {}
        }
        self
    }

    /// Returns a copy of this user identity with the given email.
    #[must_use]
    pub fn with_email(mut self, address: impl Into<String>) -> Self {
        if let Self::User { email, .. } = &mut self {
            *email = Some(address.into());
        }
        self
    }

    /// Returns true for any identity other than [`CallerIdentity::Anonymous`].
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Returns true for staff users.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self, Self::User { is_staff: true, .. })
    }

    /// Returns a string identifier suitable for logging.
    ///
    /// - User: `user:<user_id>`
    /// - `ApiKey`: `apikey:<key_id>`
    /// - Anonymous: `anonymous`
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::User { user_id, .. } => format!("user:{user_id}"),
            Self::ApiKey { key_id, .. } => format!("apikey:{key_id}"),
            Self::Anonymous => "anonymous".to_string(),
        }
    }

    /// Returns the roles (users) or scopes (API keys) of this identity.
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        match self {
            Self::User { roles, .. } => roles.iter().map(String::as_str).collect(),
            Self::ApiKey { scopes, .. } => scopes.iter().map(String::as_str).collect(),
            Self::Anonymous => Vec::new(),
        }
    }
}
