//! # viewtest
//!
//! Unit-test views together with their middleware, without a server, a
//! socket, or a URL router.
//!
//! ## Key Features
//!
//! - **Request Factory**: synthetic requests with payload, headers, and identity
//! - **Middleware Emulation**: legacy hook-style or wrapper-style, never mixed
//! - **View Invocation**: one explicit state machine from request to response
//! - **Assertions**: redirects, status codes, mail, messages, persistence
//! - **Fakes**: mailbox, sessions, messages, in-memory storage, settings
//!
//! ## Example
//!
//! ```
//! use viewtest::{ResponseAssertions, ViewTestCase};
//! use viewtest_core::{Response, ViewArgs};
//! use viewtest_middleware::{HookKind, HookSet, Middleware, MiddlewareDescriptor};
//!
//! #[derive(Default)]
//! struct LoginRequired;
//!
//! impl Middleware for LoginRequired {
//!     fn hooks(&self) -> HookSet {
//!         HookSet::of([HookKind::Request])
//!     }
//!
//!     fn on_request(&self, request: &mut viewtest_core::Request) -> Option<Response> {
//!         request
//!             .is_anonymous()
//!             .then(|| Response::redirect(format!("/login/?next={}", request.path())))
//!     }
//! }
//!
//! let case = ViewTestCase::builder()
//!     .middleware(MiddlewareDescriptor::legacy::<LoginRequired>())
//!     .view_function("account", |_request, _args| Ok(Response::ok()))
//!     .build()
//!     .unwrap();
//!
//! let mut request = case.factory().get("/account/").build().unwrap();
//! case.view(&mut request, &ViewArgs::new())
//!     .unwrap()
//!     .assert_login_required("/login/", "next", "/account/");
//! ```
//!
//! ## Comparison with Other Approaches
//!
//! | Approach | Server | Middleware | Per-test isolation |
//! |----------|--------|------------|--------------------|
//! | viewtest | none | emulated, per test | thread-scoped guards |
//! | Calling the view | none | skipped | n/a |
//! | Test client | in-process | full stack | shared app state |

#![doc(html_root_url = "https://docs.rs/viewtest/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assertions;
pub mod error;
pub mod factory;
pub mod files;
pub mod mail;
pub mod messages;
pub mod persistence;
pub mod session;
pub mod settings;
pub mod storage;
mod testcase;

pub use assertions::{
    assert_email, assert_email_exists, assert_emails_in_mailbox, assert_message_exists,
    assert_messages_sent, ResponseAssertions,
};
pub use error::{MessageError, StorageError};
pub use factory::{RequestBuilder, RequestFactory};
pub use testcase::{ViewTestCase, ViewTestCaseBuilder};

pub use viewtest_config::{ConfigLoader, ViewTestConfig};
pub use viewtest_core::{
    CallerIdentity, Request, Response, Template, View, ViewArgs, ViewFn, ViewTestError,
    ViewTestResult,
};
pub use viewtest_middleware::{
    HookKind, HookSet, Middleware, MiddlewareDescriptor, MiddlewareStyle, Next, WrapperMiddleware,
};
pub use viewtest_telemetry::{try_init_test_logging, LogConfig};
