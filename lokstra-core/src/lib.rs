//! Request/response core for Lokstra: per-request context, the standard
//! JSON envelope, the shared error taxonomy, and response construction
//! (including streaming bodies).
//!
//! This crate has no knowledge of routing, service registration, or
//! deployment; it is the leaf component every other Lokstra crate builds
//! on (component A of the runtime).

pub mod context;
pub mod envelope;
pub mod error;
pub mod request;
pub mod response;

pub use context::{BoxFuture, Ctx, MiddlewareFn};
pub use envelope::{api, ApiEnvelope, EnvelopeStatus, ErrorBody, FieldError, Meta};
pub use error::LokstraError;
pub use request::RequestParts;
pub use response::{Body, BodyStream, IntoResponse, Response};
