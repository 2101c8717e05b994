//! # viewtest Middleware
//!
//! Emulates a web framework's middleware pipeline around a single view, so
//! views can be unit-tested with their middleware but without a server.
//!
//! Two calling conventions are supported, selected per test by
//! [`MiddlewareStyle`] and never mixed:
//!
//! | Style | Instance built by | Pipeline |
//! |-------|-------------------|----------|
//! | Legacy | `Default` | [`LegacyPipeline`]: five ordered hook lists |
//! | Wrapper | [`WrapperMiddleware::wrap`] | [`WrapperPipeline`]: nested handler chain |
//!
//! ## Hook order (legacy)
//!
//! ```text
//! Request → request hooks → view hooks → View
//!                                          ↓ (error)
//!                                   exception hooks (reversed)
//!                                          ↓
//! Response ← response hooks (reversed) ← template-response hooks (reversed) + render
//! ```
//!
//! ## Example
//!
//! ```
//! use viewtest_core::{Request, Response, ViewFn};
//! use viewtest_middleware::{
//!     HookKind, HookSet, Middleware, MiddlewareDescriptor, MiddlewareStyle, PipelineBuilder,
//! };
//!
//! #[derive(Default)]
//! struct Stamp;
//!
//! impl Middleware for Stamp {
//!     fn hooks(&self) -> HookSet {
//!         HookSet::of([HookKind::Request])
//!     }
//!
//!     fn on_request(&self, request: &mut Request) -> Option<Response> {
//!         request.attributes_mut().set("process_request_was_here", true);
//!         None
//!     }
//! }
//!
//! let pipeline = PipelineBuilder::new(MiddlewareStyle::Legacy)
//!     .middleware(MiddlewareDescriptor::legacy::<Stamp>())
//!     .view(ViewFn::from_fn("ok", |_req, _args| Ok(Response::ok())))
//!     .build()
//!     .unwrap();
//!
//! let mut request = Request::new(http::Method::GET, "/");
//! pipeline.invoke(&mut request).unwrap();
//! assert!(request.attributes().flag("process_request_was_here"));
//! ```

#![doc(html_root_url = "https://docs.rs/viewtest-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod hook;
pub mod middleware;
pub mod pipeline;
pub mod registry;

pub use hook::{HookKind, HookSet};
pub use middleware::{supports, FnMiddleware, Handler, Middleware, Next, WrapperMiddleware};
pub use pipeline::{LegacyPipeline, Phase, Pipeline, PipelineBuilder, WrapperPipeline};
pub use registry::{
    classify, validate_style, Classified, ClassifiedMiddleware, MiddlewareDescriptor,
    MiddlewareStyle,
};
