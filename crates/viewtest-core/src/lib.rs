//! # viewtest Core
//!
//! Core types shared by every viewtest crate:
//!
//! - [`Request`] - A synthetic HTTP request with an attribute bag
//! - [`Response`] - A response, possibly carrying a deferred [`Template`]
//! - [`Attributes`] - Typed extensions plus named markers
//! - [`CallerIdentity`] - The principal a request is made for
//! - [`View`], [`ViewClass`], [`ViewFn`] - View abstractions
//! - [`ViewTestError`] - Standard error type

#![doc(html_root_url = "https://docs.rs/viewtest-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod attributes;
mod error;
mod identity;
pub mod request;
mod response;
pub mod view;

pub use attributes::Attributes;
pub use error::{ViewError, ViewResult, ViewTestError, ViewTestResult};
pub use identity::CallerIdentity;
pub use request::{PayloadEncoding, Request, RequestId};
pub use response::{Response, Template, REDIRECT_CODES};
pub use view::{BoundView, View, ViewArgs, ViewClass, ViewFn, ViewKwargs};
