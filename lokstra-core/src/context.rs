use crate::error::LokstraError;
use crate::request::RequestParts;
use crate::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single link in a middleware chain. The final link in any chain built
/// by the router façade is always the handler adapter (spec §4.C).
///
/// Middleware observes/mutates the [`Ctx`] and calls [`Ctx::next`] to
/// continue the chain; failing to call `next()` short-circuits the
/// remainder (auth guards, rate limiters, etc. rely on this).
pub type MiddlewareFn =
    Arc<dyn for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, Result<(), LokstraError>> + Send + Sync>;

/// Per-request context threaded through the middleware chain and into the
/// handler. Carries the parsed request, a scratch map for inter-middleware
/// communication, the in-progress response/error slots, and a cancellation
/// token derived from the listener's shutdown signal (spec §5).
pub struct Ctx {
    pub request: RequestParts,
    scratch: HashMap<String, Box<dyn Any + Send + Sync>>,
    response: Option<Response>,
    error: Option<LokstraError>,
    chain: Arc<Vec<MiddlewareFn>>,
    index: usize,
    cancel: CancellationToken,
    request_id: Uuid,
}

impl Ctx {
    pub fn new(request: RequestParts, chain: Arc<Vec<MiddlewareFn>>, cancel: CancellationToken) -> Self {
        Ctx {
            request,
            scratch: HashMap::new(),
            response: None,
            error: None,
            chain,
            index: 0,
            cancel,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Invoke the next middleware/handler in the chain. Runs to completion
    /// (and all remaining links) unless a link errors out.
    pub fn next(&mut self) -> BoxFuture<'_, Result<(), LokstraError>> {
        Box::pin(async move {
            if self.index >= self.chain.len() {
                return Ok(());
            }
            let link = self.chain[self.index].clone();
            self.index += 1;
            link(self).await
        })
    }

    // ── Per-request scratch (Set/Get) ───────────────────────────────────

    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.scratch.insert(key.to_string(), Box::new(value));
    }

    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.scratch.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    // ── Response/error slots ────────────────────────────────────────────

    /// Record a response. If a later link or the handler also records an
    /// error, the error wins (spec §4.A, property 4 of spec §8).
    pub fn respond(&mut self, response: impl IntoResponse) {
        self.response = Some(response.into_response());
    }

    pub fn fail(&mut self, error: LokstraError) {
        self.error = Some(error);
    }

    /// Peek at the status the response/error slots would resolve to if
    /// [`Ctx::finish`] were called right now, without consuming `self`.
    /// Outer middleware (request logging, metrics) calls this after
    /// `next()` returns to observe the outcome of everything further down
    /// the chain, honouring the error-wins rule without needing to own the
    /// final `Response` (spec §4.A).
    pub fn peek_status(&self) -> http::StatusCode {
        match &self.error {
            Some(err) => err.status(),
            None => self
                .response
                .as_ref()
                .map(|r| r.status())
                .unwrap_or(http::StatusCode::OK),
        }
    }

    /// Resolve the final response per the error-wins rule: an error always
    /// discards any response that was populated, and a missing response
    /// with no error materialises as `Api.Ok(nil)`.
    pub fn finish(self) -> Response {
        match self.error {
            Some(err) => err.into_response(),
            None => self.response.unwrap_or_else(|| ().into_response()),
        }
    }

    // ── Binding ──────────────────────────────────────────────────────────

    pub fn path_param(&self, name: &str, default: &str) -> String {
        self.request
            .path_params
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn bind_body<T: DeserializeOwned>(&self) -> Result<T, LokstraError> {
        if self.request.body.is_empty() {
            serde_json::from_value(Value::Object(Map::new()))
                .map_err(|e| LokstraError::request(format!("body bind failed: {e}")))
        } else {
            serde_json::from_slice(&self.request.body)
                .map_err(|e| LokstraError::request(format!("body bind failed: {e}")))
        }
    }

    pub fn bind_path<T: DeserializeOwned>(&self) -> Result<T, LokstraError> {
        let map: Map<String, Value> = self
            .request
            .path_params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| LokstraError::request(format!("path bind failed: {e}")))
    }

    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T, LokstraError> {
        let map: Map<String, Value> = self
            .request
            .query_pairs()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| LokstraError::request(format!("query bind failed: {e}")))
    }

    pub fn bind_header<T: DeserializeOwned>(&self) -> Result<T, LokstraError> {
        let map: Map<String, Value> = self
            .request
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), Value::String(v.to_string()))))
            .collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| LokstraError::request(format!("header bind failed: {e}")))
    }

    /// Bind a request struct from path params, query params, and the JSON
    /// body combined into one object (path/query fill in what the body
    /// does not supply - the body takes priority on key collisions). Used
    /// by the autogen bridge to allocate a method's request struct (spec
    /// §4.F step 2).
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, LokstraError> {
        let mut map = Map::new();
        for (k, v) in &self.request.path_params {
            map.insert(k.clone(), Value::String(v.clone()));
        }
        for (k, v) in self.request.query_pairs() {
            map.insert(k, Value::String(v));
        }
        if !self.request.body.is_empty() {
            if let Ok(Value::Object(body_map)) = serde_json::from_slice::<Value>(&self.request.body) {
                for (k, v) in body_map {
                    map.insert(k, v);
                }
            }
        }
        serde_json::from_value(Value::Object(map))
            .map_err(|e| LokstraError::request(format!("bind failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method, Uri};
    use serde::Deserialize;

    fn ctx_with(body: &str, path_params: &[(&str, &str)], query: &str) -> Ctx {
        let uri: Uri = format!("/x?{query}").parse().unwrap();
        let mut parts = RequestParts::new(Method::GET, uri, HeaderMap::new(), Bytes::from(body.to_string()));
        for (k, v) in path_params {
            parts.path_params.insert(k.to_string(), v.to_string());
        }
        Ctx::new(parts, Arc::new(Vec::new()), CancellationToken::new())
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Combined {
        id: String,
        q: String,
        name: String,
    }

    #[test]
    fn bind_merges_path_query_and_body_with_body_priority() {
        let ctx = ctx_with(r#"{"name":"from-body","id":"from-body-id"}"#, &[("id", "42")], "q=1&name=from-query");
        let combined: Combined = ctx.bind().unwrap();
        assert_eq!(combined.id, "from-body-id");
        assert_eq!(combined.q, "1");
        assert_eq!(combined.name, "from-body");
    }

    #[test]
    fn error_wins_over_populated_response() {
        let ctx = ctx_with("", &[], "");
        let mut ctx = ctx;
        ctx.respond(crate::envelope::api::ok("should be discarded"));
        ctx.fail(LokstraError::Internal("boom".into()));
        let resp = ctx.finish();
        assert_eq!(resp.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_response_materialises_as_ok_empty() {
        let ctx = ctx_with("", &[], "");
        let resp = ctx.finish();
        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[test]
    fn path_param_default_when_absent() {
        let ctx = ctx_with("", &[], "");
        assert_eq!(ctx.path_param("missing", "fallback"), "fallback");
    }

    #[test]
    fn scratch_set_get_roundtrip() {
        let mut ctx = ctx_with("", &[], "");
        ctx.set("user_id", 7u64);
        assert_eq!(ctx.get::<u64>("user_id"), Some(7));
        assert_eq!(ctx.get::<u64>("missing"), None);
    }
}
