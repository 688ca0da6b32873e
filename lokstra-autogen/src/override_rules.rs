//! [`RouteOverride`] (spec §4.F): the per-service knobs that sit between a
//! pure [`crate::convention::Convention`] and the routes/call-plan that
//! actually get generated - a path prefix, hidden methods, fully custom
//! routes for methods the convention gets wrong, regex path rewrites, and
//! per-method middleware.

use crate::convention::ConventionRoute;
use http::Method;
use lokstra_core::MiddlewareFn;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Builds up incrementally; `GenerateRouter`/`GenerateProxy` consume it by
/// reference so the exact same override set drives both generators.
#[derive(Default, Clone)]
pub struct RouteOverride {
    prefix: String,
    hidden: HashSet<String>,
    custom: HashMap<String, ConventionRoute>,
    rewrites: Vec<(Regex, String)>,
    middleware: HashMap<String, Vec<MiddlewareFn>>,
}

impl RouteOverride {
    pub fn new() -> Self {
        RouteOverride::default()
    }

    /// Prepend `prefix` to every generated path (e.g. `/api/v1`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Exclude a method from autogen entirely - it will not be routed or
    /// exposed on the proxy.
    pub fn hide(mut self, method_name: impl Into<String>) -> Self {
        self.hidden.insert(method_name.into());
        self
    }

    /// Replace the convention-derived route for one method with an explicit
    /// `(verb, path)`, bypassing the convention for that method only.
    pub fn custom_route(mut self, method_name: impl Into<String>, verb: Method, path: impl Into<String>) -> Self {
        self.custom.insert(
            method_name.into(),
            ConventionRoute {
                method: verb,
                path: path.into(),
            },
        );
        self
    }

    /// Apply a regex rewrite to every convention-derived (not custom) path,
    /// in registration order; the first matching rewrite wins.
    pub fn rewrite(mut self, pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        self.rewrites.push((Regex::new(pattern)?, replacement.into()));
        Ok(self)
    }

    /// Attach middleware that runs only for this method's route, appended
    /// after the router's own chain (never replacing it - see
    /// [`crate::generator::GenerateRouter`]).
    pub fn with_middleware(mut self, method_name: impl Into<String>, mw: Vec<MiddlewareFn>) -> Self {
        self.middleware.entry(method_name.into()).or_default().extend(mw);
        self
    }

    pub fn is_hidden(&self, method_name: &str) -> bool {
        self.hidden.contains(method_name)
    }

    pub fn middleware_for(&self, method_name: &str) -> Vec<MiddlewareFn> {
        self.middleware.get(method_name).cloned().unwrap_or_default()
    }

    /// Resolve the final `(verb, path)` for a method, given the route the
    /// convention produced: custom routes win outright; otherwise rewrites
    /// apply in order, then the shared prefix is prepended.
    pub fn resolve(&self, method_name: &str, convention_route: ConventionRoute) -> ConventionRoute {
        let route = self.custom.get(method_name).cloned().unwrap_or(convention_route);
        let path = self
            .rewrites
            .iter()
            .find(|(re, _)| re.is_match(&route.path))
            .map(|(re, repl)| re.replace(&route.path, repl.as_str()).into_owned())
            .unwrap_or(route.path);
        ConventionRoute {
            method: route.method,
            path: format!("{}{}", self.prefix, path),
        }
    }
}
