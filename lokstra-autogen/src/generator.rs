//! `GenerateRouter` (spec §4.F): turns a service's exported method set into
//! a fully wired [`lokstra_router::Router`] by running each method name
//! through a [`Convention`] and a [`RouteOverride`], then bridging
//! request -> bind -> invoke -> respond for every surviving route.
//!
//! [`resolve_route`] is the one function [`GenerateRouter`] and
//! `lokstra-proxy`'s call-plan builder both call; that sharing is what
//! makes the server route and the proxy's target URL agree for every
//! method, convention and override (spec §8 property 1, "Symmetry").

use crate::convention::{Convention, ConventionRoute};
use crate::override_rules::RouteOverride;
use http::Method;
use lokstra_core::{Ctx, LokstraError};
use lokstra_router::{handler, Handler, Router};
use std::sync::Arc;

/// The resource name pair a convention needs (`user` / `users`).
#[derive(Debug, Clone)]
pub struct ResourceNames {
    pub resource: String,
    pub resource_plural: String,
}

impl ResourceNames {
    pub fn new(resource: impl Into<String>, resource_plural: impl Into<String>) -> Self {
        ResourceNames {
            resource: resource.into(),
            resource_plural: resource_plural.into(),
        }
    }
}

/// The method set a service exposes to autogen, plus a single dynamic
/// dispatch entry point. This is the Rust stand-in for reflecting over a
/// service's methods: implementors list their exported method names and
/// bridge each one to a concrete call inside `dispatch`.
pub trait AutogenService: Send + Sync {
    /// The method names autogen should derive routes/call-plan entries for.
    /// Order is preserved in the router's registration order, which matters
    /// for the router's explicit-beats-wildcard precedence (spec §3.1.b)
    /// only insofar as it affects registration order among equally-specific
    /// patterns.
    fn methods(&self) -> Vec<&'static str>;

    /// Run one method: bind the request (`ctx.bind()`), invoke the
    /// underlying implementation, and record the outcome on `ctx`
    /// (`ctx.respond(...)` / `ctx.fail(...)`). Spec §4.F steps 2-4.
    fn dispatch<'a>(&'a self, method_name: &'a str, ctx: &'a mut Ctx) -> lokstra_core::BoxFuture<'a, Result<(), LokstraError>>;
}

/// Apply a convention then an override to get the final `(verb, path)` for
/// one method. The one function the router generator and the proxy call
/// planner both call (spec §9, "Server/client symmetry").
pub fn resolve_route(convention: &Convention, overrides: &RouteOverride, method_name: &str, resource: &ResourceNames) -> ConventionRoute {
    let base = convention.apply(method_name, &resource.resource, &resource.resource_plural);
    overrides.resolve(method_name, base)
}

/// Build a router from a service's method set. Hidden methods are skipped
/// entirely; every other method is bound to the route `resolve_route`
/// computes, with `overrides`' per-method middleware appended after the
/// router's own chain.
pub fn generate_router(service: Arc<dyn AutogenService>, resource: &ResourceNames, convention: Convention, overrides: &RouteOverride) -> Result<Router, LokstraError> {
    let mut router = Router::new();
    for method_name in service.methods() {
        if overrides.is_hidden(method_name) {
            continue;
        }
        let route = resolve_route(&convention, overrides, method_name, resource);
        let mw = overrides.middleware_for(method_name);
        let bridge = bridge_handler(service.clone(), method_name);
        register(&mut router, route.method, &route.path, bridge, mw);
    }
    Ok(router)
}

/// Adapt one `AutogenService` method into the router's single handler
/// shape, closing over the method name so `dispatch` knows which method to
/// run (spec §9, "Dynamic dispatch over handler shapes").
fn bridge_handler(service: Arc<dyn AutogenService>, method_name: &'static str) -> Handler {
    handler(move |ctx: &mut Ctx| {
        let service = service.clone();
        async move { service.dispatch(method_name, ctx).await }
    })
}

fn register(router: &mut Router, method: Method, path: &str, h: Handler, mw: Vec<lokstra_core::MiddlewareFn>) {
    match method {
        Method::GET => router.get(path, h, mw),
        Method::POST => router.post(path, h, mw),
        Method::PUT => router.put(path, h, mw),
        Method::PATCH => router.patch(path, h, mw),
        Method::DELETE => router.delete(path, h, mw),
        _ => router.any(path, h, mw),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use lokstra_core::envelope::api;
    use lokstra_router::{serve, TreeMuxEngine};
    use tokio_util::sync::CancellationToken;

    struct Users;
    impl AutogenService for Users {
        fn methods(&self) -> Vec<&'static str> {
            vec!["List", "Get", "Create", "Internal"]
        }
        fn dispatch<'a>(&'a self, method_name: &'a str, ctx: &'a mut Ctx) -> lokstra_core::BoxFuture<'a, Result<(), LokstraError>> {
            Box::pin(async move {
                ctx.respond(api::ok(method_name));
                Ok(())
            })
        }
    }

    fn resource() -> ResourceNames {
        ResourceNames::new("user", "users")
    }

    #[tokio::test]
    async fn hidden_methods_are_not_registered() {
        let overrides = RouteOverride::new().hide("Internal");
        let router = generate_router(Arc::new(Users), &resource(), Convention::Rest, &overrides).unwrap();
        let mut engine = TreeMuxEngine::new();
        router.build(&mut engine).unwrap();

        // "Internal" would derive to POST /users/Internal (RPC fallback);
        // hiding it means the route never gets registered.
        let req = lokstra_core::RequestParts::new(
            Method::POST,
            "/users/Internal".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
        );
        let resp = serve(&engine, req, CancellationToken::new()).await;
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generated_route_dispatches_to_bound_method() {
        let overrides = RouteOverride::new().hide("Internal");
        let router = generate_router(Arc::new(Users), &resource(), Convention::Rest, &overrides).unwrap();
        let mut engine = TreeMuxEngine::new();
        router.build(&mut engine).unwrap();

        let req = lokstra_core::RequestParts::new(Method::GET, "/users".parse().unwrap(), http::HeaderMap::new(), bytes::Bytes::new());
        let resp = serve(&engine, req, CancellationToken::new()).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn resolve_route_is_identical_regardless_of_caller() {
        let overrides = RouteOverride::new().with_prefix("/api/v1");
        let a = resolve_route(&Convention::Rest, &overrides, "Get", &resource());
        let b = resolve_route(&Convention::Rest, &overrides, "Get", &resource());
        assert_eq!(a.method, b.method);
        assert_eq!(a.path, b.path);
        assert_eq!(a.path, "/api/v1/users/{id}");
    }
}
