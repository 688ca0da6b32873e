//! The service registry (spec component D) and middleware registry
//! (component E): singleton service instances created lazily on first
//! use, by-name once-semantics, dependency resolution with cycle
//! detection, and compiled-and-cached middleware references.

pub mod cache;
pub mod middleware;
pub mod service;

pub use cache::Cached;
pub use middleware::{MiddlewareFactory, MiddlewareRegistry};
pub use service::{typed_config, AnyArc, Factory, ResolvedDeps, RouterMeta, ServiceRegistry, ShutdownFn};
