//! The router façade (spec §4.C): groups, middleware stacks, the
//! middleware-lock state machine, and mount points, layered over whichever
//! [`RouterEngine`] backend an application picked.
//!
//! The façade is deliberately engine-agnostic: it assembles
//! `(method, normalised_pattern, chain)` triples and hands them to the
//! engine's native `handle()`. Everything about *inheritance* of
//! middleware, the lock, and the override flag lives here exactly once.

use crate::engine::{self, RouterEngine};
use crate::reverse_proxy::ReverseProxyMount;
use crate::static_files::StaticMount;
use http::Method;
use lokstra_core::{Ctx, LokstraError, MiddlewareFn, RequestParts, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A handler adapted to the single normalised shape the façade deals in
/// (spec §9, "Dynamic dispatch over handler shapes" design note). Adapters
/// for the richer handler-shape table (`func() T`, `func(*Req) (T, error)`,
/// ...) live in `lokstra-autogen`; by the time a route reaches the façade
/// it is always already in this form.
pub type Handler = MiddlewareFn;

/// One registered route, prior to being compiled into an engine chain.
struct RouteDef {
    method: Method,
    pattern: String,
    handler: Handler,
    middleware: Vec<MiddlewareFn>,
    override_middleware: bool,
}

enum Mount {
    Static { prefix: String, mount: StaticMount },
    ReverseProxy { prefix: String, mount: ReverseProxyMount },
    Handler { prefix: String, handler: Handler },
}

/// A router: an ordered list of not-yet-compiled routes, a prefix, and the
/// middleware stack inherited at the moment the router (or group) was
/// created. Becomes middleware-locked the first time a route or nested
/// group is added (spec §3, "Router" data model entry; property 3 of
/// spec §8).
pub struct Router {
    prefix: String,
    inherited: Vec<MiddlewareFn>,
    own: Vec<MiddlewareFn>,
    locked: bool,
    routes: Vec<RouteDef>,
    mounts: Vec<Mount>,
    next_override: bool,
}

impl Router {
    pub fn new() -> Self {
        Router {
            prefix: String::new(),
            inherited: Vec::new(),
            own: Vec::new(),
            locked: false,
            routes: Vec::new(),
            mounts: Vec::new(),
            next_override: false,
        }
    }

    fn with_prefix_and_inherited(prefix: String, inherited: Vec<MiddlewareFn>) -> Self {
        Router {
            prefix,
            inherited,
            own: Vec::new(),
            locked: false,
            routes: Vec::new(),
            mounts: Vec::new(),
            next_override: false,
        }
    }

    /// Register top-of-chain middleware. Fails once the router is locked
    /// (spec §4.C: "allowed only before the first route ... has been
    /// added").
    pub fn use_middleware(&mut self, mw: MiddlewareFn) -> Result<(), LokstraError> {
        if self.locked {
            return Err(LokstraError::Config(
                "Use() called after router was locked by a prior route/group registration".into(),
            ));
        }
        self.own.push(mw);
        Ok(())
    }

    /// Mark the next single registration (route or group) to discard
    /// inherited middleware. At router scope (no pending route yet) it
    /// marks the whole router.
    pub fn override_middleware(&mut self) -> &mut Self {
        self.next_override = true;
        self
    }

    fn take_override(&mut self) -> bool {
        std::mem::replace(&mut self.next_override, false)
    }

    fn effective_chain(&self, override_flag: bool) -> Vec<MiddlewareFn> {
        if override_flag {
            self.own.clone()
        } else {
            let mut chain = self.inherited.clone();
            chain.extend(self.own.iter().cloned());
            chain
        }
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn route(&mut self, method: Method, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) {
        let override_flag = self.take_override();
        self.lock();
        self.routes.push(RouteDef {
            method,
            pattern: format!("{}{}", self.prefix, path),
            handler,
            middleware: mw,
            override_middleware: override_flag,
        });
    }

    pub fn get(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        self.route(Method::GET, path, handler, mw);
        self
    }
    pub fn post(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        self.route(Method::POST, path, handler, mw);
        self
    }
    pub fn put(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        self.route(Method::PUT, path, handler, mw);
        self
    }
    pub fn patch(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        self.route(Method::PATCH, path, handler, mw);
        self
    }
    pub fn delete(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        self.route(Method::DELETE, path, handler, mw);
        self
    }
    pub fn any(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        self.route(Method::from_bytes(b"ANY").unwrap(), path, handler, mw);
        self
    }

    /// `*Prefix` variant: registers a wildcard suffix under `path`
    /// (spec §4.C: "register a wildcard suffix (`{path...}`)").
    pub fn any_prefix(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        let wildcard_path = format!("{}{{rest...}}", ensure_trailing_slash(path));
        self.any(&wildcard_path, handler, mw)
    }

    pub fn get_prefix(&mut self, path: &str, handler: Handler, mw: Vec<MiddlewareFn>) -> &mut Self {
        let wildcard_path = format!("{}{{rest...}}", ensure_trailing_slash(path));
        self.get(&wildcard_path, handler, mw)
    }

    /// A sub-router inheriting this router's current middleware snapshot
    /// at the moment of creation (spec §4.C: "inherits parent's middleware
    /// stack at the moment of creation").
    pub fn group(&mut self, prefix: &str, mw: Vec<MiddlewareFn>) -> Router {
        let override_flag = self.take_override();
        self.lock();
        let mut inherited = self.effective_chain(override_flag);
        inherited.extend(mw);
        Router::with_prefix_and_inherited(format!("{}{}", self.prefix, prefix), inherited)
    }

    /// `GroupBlock(prefix, fn)`: build the sub-router then merge its
    /// compiled routes/mounts back into `self`.
    pub fn group_block(&mut self, prefix: &str, mw: Vec<MiddlewareFn>, f: impl FnOnce(&mut Router)) -> &mut Self {
        let mut sub = self.group(prefix, mw);
        f(&mut sub);
        self.routes.extend(sub.routes);
        self.mounts.extend(sub.mounts);
        self
    }

    /// Install a plain handler mount below `prefix` (spec §4.C `Mount`).
    pub fn mount(&mut self, prefix: &str, handler: Handler) -> &mut Self {
        self.mounts.push(Mount::Handler {
            prefix: format!("{}{}", self.prefix, prefix),
            handler,
        });
        self
    }

    /// Install a static-file (optionally SPA-mode) mount below `prefix`.
    pub fn mount_static(&mut self, prefix: &str, mount: StaticMount) -> &mut Self {
        self.mounts.push(Mount::Static {
            prefix: format!("{}{}", self.prefix, prefix),
            mount,
        });
        self
    }

    /// Install a reverse-proxy mount below `prefix` (spec §4.C
    /// `Mount(prefix, ... reverseProxy)`).
    pub fn mount_reverse_proxy(&mut self, prefix: &str, mount: ReverseProxyMount) -> &mut Self {
        self.mounts.push(Mount::ReverseProxy {
            prefix: format!("{}{}", self.prefix, prefix),
            mount,
        });
        self
    }

    /// Wire `/health`, `/health/live` and `/health/ready` (spec §2
    /// "Supplemented features" - an ambient operational surface, not a
    /// Non-goal) from a [`crate::health::HealthRegistry`].
    pub fn mount_health(&mut self, registry: crate::health::HealthRegistry) -> &mut Self {
        let (health, live, ready) = registry.into_handlers();
        self.get("/health", health, vec![]);
        self.get("/health/live", live, vec![]);
        self.get("/health/ready", ready, vec![]);
        self
    }

    /// Compile every registered route and mount into `engine`, threading
    /// each route's effective middleware chain into a terminal handler
    /// adapter (spec §4.C route compilation). Consumes `self`.
    pub fn build(self, engine: &mut dyn RouterEngine) -> Result<(), LokstraError> {
        for r in self.routes {
            let mw = if r.override_middleware {
                r.middleware
            } else {
                let mut chain = self.inherited.clone();
                chain.extend(self.own.iter().cloned());
                chain.extend(r.middleware);
                chain
            };
            let mut full_chain = mw;
            full_chain.push(r.handler);
            engine.handle(r.method, &r.pattern, Arc::new(full_chain))?;
        }
        for mount in self.mounts {
            match mount {
                Mount::Handler { prefix, handler } => {
                    let wildcard_path = format!("{}{{rest...}}", ensure_trailing_slash(&prefix));
                    engine.handle(
                        Method::from_bytes(b"ANY").unwrap(),
                        &wildcard_path,
                        Arc::new(vec![handler]),
                    )?;
                }
                Mount::Static { prefix, mount } => {
                    let handler: Handler = mount.into_handler();
                    let wildcard_path = format!("{}{{rest...}}", ensure_trailing_slash(&prefix));
                    engine.handle(Method::GET, &wildcard_path, Arc::new(vec![handler]))?;
                }
                Mount::ReverseProxy { prefix, mount } => {
                    let handler: Handler = mount.into_handler();
                    let wildcard_path = format!("{}{{rest...}}", ensure_trailing_slash(&prefix));
                    engine.handle(
                        Method::from_bytes(b"ANY").unwrap(),
                        &wildcard_path,
                        Arc::new(vec![handler]),
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one request against a compiled [`RouterEngine`] using the shared
/// OPTIONS/404/405/HEAD machinery in `engine::serve`.
pub async fn serve(engine: &dyn RouterEngine, request: RequestParts, cancel: CancellationToken) -> Response {
    engine::serve(engine, request, cancel).await
}

/// Adapts a `func(&mut Ctx) -> Result<(), LokstraError>` into a
/// [`MiddlewareFn`]/[`Handler`] - the only handler shape the façade stores
/// directly. Richer shapes are adapted to this one level up.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(&mut Ctx) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), LokstraError>> + Send,
{
    engine::ctx_handler(f)
}
