//! The three router "engines" named in the spec: tree-mux, chi, and
//! fasthttp. Each is a thin dialect-translation shim over the one shared
//! [`Trie`]; they differ only in the native pattern syntax they accept
//! (spec §4.B says the backends "share one interface").

use crate::pattern::Pattern;
use crate::trie::{MatchError, RouteChain, Trie};
use http::{HeaderValue, Method, StatusCode};
use lokstra_core::{Ctx, IntoResponse, LokstraError, MiddlewareFn, RequestParts, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Common interface every engine backend implements (spec §4.B:
/// `Handle(pattern, httpHandler)` and `ServeHTTP`).
pub trait RouterEngine: Send + Sync {
    /// Register `chain` (group middleware + route middleware + the
    /// terminal handler adapter, already composed by the router façade)
    /// for `method` at a pattern given in this engine's *native* syntax.
    fn handle(&mut self, method: Method, native_pattern: &str, chain: RouteChain) -> Result<(), LokstraError>;

    /// Look up the chain for `method`/`path`. Does not consult path
    /// parameters into anything; callers fold `Matched::params` onto the
    /// request before building a [`Ctx`].
    fn dispatch(&self, method: &Method, path: &str) -> DispatchOutcome;
}

pub enum DispatchOutcome {
    Matched {
        chain: RouteChain,
        params: HashMap<String, String>,
        is_auto_head: bool,
    },
    Options {
        allow: Vec<Method>,
    },
    MethodNotAllowed {
        allow: Vec<Method>,
    },
    NotFound,
}

fn respond_options(allow: &[Method]) -> Response {
    let allow_header = join_methods(allow);
    let mut resp = Response::new(StatusCode::NO_CONTENT, lokstra_core::Body::empty());
    if let Ok(value) = HeaderValue::from_str(&allow_header) {
        resp.headers_mut().insert(http::header::ALLOW, value);
    }
    resp
}

fn respond_method_not_allowed(allow: &[Method]) -> Response {
    LokstraError::MethodNotAllowed {
        allow: join_methods(allow),
    }
    .into_response()
}

fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(|m| m.as_str().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drive one request through `engine` to a final [`Response`]. Shared by
/// every backend so the OPTIONS/404/405 bodies and the error-wins/auto-HEAD
/// behaviour stay identical regardless of which dialect matched.
pub async fn serve(engine: &dyn RouterEngine, mut request: RequestParts, cancel: CancellationToken) -> Response {
    let method = request.method.clone();
    let path = request.path().to_string();

    if method == Method::OPTIONS {
        return match engine.dispatch(&Method::OPTIONS, &path) {
            DispatchOutcome::Options { allow } => respond_options(&allow),
            DispatchOutcome::Matched { .. } => respond_options(&[Method::OPTIONS]),
            DispatchOutcome::NotFound => LokstraError::NotFound("route not found".into()).into_response(),
            DispatchOutcome::MethodNotAllowed { allow } => respond_method_not_allowed(&allow),
        };
    }

    match engine.dispatch(&method, &path) {
        DispatchOutcome::Matched { chain, params, is_auto_head } => {
            request.path_params.extend(params);
            let mut ctx = Ctx::new(request, chain, cancel);
            if let Err(err) = ctx.next().await {
                ctx.fail(err);
            }
            let mut response = ctx.finish();
            if is_auto_head {
                truncate_for_head(&mut response);
            }
            response
        }
        DispatchOutcome::Options { allow } => respond_options(&allow),
        DispatchOutcome::MethodNotAllowed { allow } => respond_method_not_allowed(&allow),
        DispatchOutcome::NotFound => LokstraError::NotFound("route not found".into()).into_response(),
    }
}

/// HEAD responses run the GET handler in full then discard the body while
/// keeping `Content-Length` set to the would-be length (spec §4.B).
fn truncate_for_head(response: &mut Response) {
    let len = response.body_bytes().map(|b| b.len()).unwrap_or(0);
    let status = response.status();
    let mut empty = Response::new(status, lokstra_core::Body::empty());
    *empty.headers_mut() = response.headers().clone();
    empty.headers_mut().insert(
        http::header::CONTENT_LENGTH,
        HeaderValue::from_str(&len.to_string()).unwrap(),
    );
    *response = empty;
}

fn dispatch_via_trie(trie: &Trie, method: &Method, path: &str) -> DispatchOutcome {
    if method == Method::OPTIONS {
        return match trie.allowed_methods(path) {
            Some(allow) => DispatchOutcome::Options { allow },
            None => DispatchOutcome::NotFound,
        };
    }
    match trie.find(method, path) {
        Ok(m) => DispatchOutcome::Matched {
            chain: m.chain.clone(),
            params: m.params,
            is_auto_head: m.is_auto_head,
        },
        Err(MatchError::MethodNotAllowed(allow)) => DispatchOutcome::MethodNotAllowed { allow },
        Err(MatchError::NotFound) => DispatchOutcome::NotFound,
    }
}

/// The `tree-mux` dialect: native syntax is already the normalised form
/// (`{name}` / `{name...}`), so no translation is needed.
#[derive(Default)]
pub struct TreeMuxEngine {
    trie: Trie,
}

impl TreeMuxEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RouterEngine for TreeMuxEngine {
    fn handle(&mut self, method: Method, native_pattern: &str, chain: RouteChain) -> Result<(), LokstraError> {
        let pattern = Pattern::parse(native_pattern)?;
        self.trie.insert(method, &pattern, chain);
        Ok(())
    }

    fn dispatch(&self, method: &Method, path: &str) -> DispatchOutcome {
        dispatch_via_trie(&self.trie, method, path)
    }
}

/// The `chi` dialect: a trailing `*` stands in for a catch-all suffix
/// (`/a/*` ↔ normalised `/a/{path...}`), and `:name` stands in for a single
/// segment param (`/a/:id` ↔ `/a/{id}`).
#[derive(Default)]
pub struct ChiEngine {
    trie: Trie,
}

impl ChiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalise(native_pattern: &str) -> String {
        let mut out = String::new();
        for part in native_pattern.split('/') {
            if part.is_empty() {
                continue;
            }
            out.push('/');
            if part == "*" {
                out.push_str("{wildcard...}");
            } else if let Some(name) = part.strip_prefix(':') {
                out.push('{');
                out.push_str(name);
                out.push('}');
            } else {
                out.push_str(part);
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}

impl RouterEngine for ChiEngine {
    fn handle(&mut self, method: Method, native_pattern: &str, chain: RouteChain) -> Result<(), LokstraError> {
        let normalised = Self::normalise(native_pattern);
        let pattern = Pattern::parse(&normalised)?;
        self.trie.insert(method, &pattern, chain);
        Ok(())
    }

    fn dispatch(&self, method: &Method, path: &str) -> DispatchOutcome {
        dispatch_via_trie(&self.trie, method, path)
    }
}

/// The `fasthttp` dialect (as used by `fasthttp/router`): `{name}` single
/// segment params match the normalised form already; `{name:*}` is the
/// wildcard suffix spelling.
#[derive(Default)]
pub struct FastHttpEngine {
    trie: Trie,
}

impl FastHttpEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalise(native_pattern: &str) -> String {
        native_pattern.replace(":*}", "...}")
    }
}

impl RouterEngine for FastHttpEngine {
    fn handle(&mut self, method: Method, native_pattern: &str, chain: RouteChain) -> Result<(), LokstraError> {
        let normalised = Self::normalise(native_pattern);
        let pattern = Pattern::parse(&normalised)?;
        self.trie.insert(method, &pattern, chain);
        Ok(())
    }

    fn dispatch(&self, method: &Method, path: &str) -> DispatchOutcome {
        dispatch_via_trie(&self.trie, method, path)
    }
}

/// Builds a [`MiddlewareFn`] from a plain `func(*Ctx) error`-shaped async
/// closure (spec §4.C handler acceptance table, first form). The other
/// accepted shapes (`func() T`, `func(*Req) (T, error)`, ...) are adapted
/// by the convention/autogen bridge in `lokstra-autogen`, which always
/// bottoms out in this form before handing a route to the router façade.
pub fn ctx_handler<F, Fut>(f: F) -> MiddlewareFn
where
    F: Fn(&mut Ctx) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), LokstraError>> + Send,
{
    Arc::new(move |ctx: &mut Ctx| {
        let fut = f(ctx);
        Box::pin(fut)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chi_star_normalises_to_wildcard() {
        assert_eq!(ChiEngine::normalise("/static/*"), "/static/{wildcard...}");
    }

    #[test]
    fn chi_colon_param_normalises_to_brace_param() {
        assert_eq!(ChiEngine::normalise("/users/:id"), "/users/{id}");
    }

    #[test]
    fn fasthttp_colon_star_normalises_to_ellipsis() {
        assert_eq!(FastHttpEngine::normalise("/static/{path:*}"), "/static/{path...}");
    }

    #[tokio::test]
    async fn serve_runs_matched_chain_and_respects_error_wins() {
        let mut engine = TreeMuxEngine::new();
        let handler: MiddlewareFn = Arc::new(|ctx: &mut Ctx| {
            Box::pin(async move {
                ctx.respond(lokstra_core::envelope::api::ok("discarded"));
                Err(LokstraError::Internal("boom".into()))
            })
        });
        engine
            .handle(Method::GET, "/x", Arc::new(vec![handler]))
            .unwrap();
        let request = RequestParts::new(
            Method::GET,
            "/x".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
        );
        let resp = serve(&engine, request, CancellationToken::new()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn serve_returns_404_for_unmatched_path() {
        let engine = TreeMuxEngine::new();
        let request = RequestParts::new(
            Method::GET,
            "/missing".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
        );
        let resp = serve(&engine, request, CancellationToken::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
