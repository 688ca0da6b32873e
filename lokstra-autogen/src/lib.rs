//! Convention-driven route generation for Lokstra (spec component F).
//!
//! A [`convention::Convention`] is a pure `(methodName, resource,
//! resourcePlural) -> (httpMethod, pathTemplate)` function; a
//! [`override_rules::RouteOverride`] layers prefixing, hiding, custom
//! routes, path rewrites and per-method middleware on top of it;
//! [`generator::generate_router`] drives both into a fully wired router for
//! any [`generator::AutogenService`]. `lokstra-proxy` depends on this crate
//! so its call-plan builder runs the exact same convention/override pair
//! (spec §8 property 1).

pub mod convention;
pub mod generator;
pub mod override_rules;

pub use convention::{Convention, ConventionRoute};
pub use generator::{generate_router, resolve_route, AutogenService, ResourceNames};
pub use override_rules::RouteOverride;
