//! Reverse-proxy mounts (spec §4.C `Mount(prefix, ... reverseProxy)`):
//! forward everything below a prefix to a remote base URL, passing the
//! response straight back to the caller.
//!
//! Grounded on `lokstra-proxy`'s `reqwest::Client` usage (same crate, same
//! HTTP client idiom) - the difference is this forwards an opaque
//! byte/header pair rather than a typed envelope call, since a reverse
//! proxy mount has no knowledge of the remote's method/route convention.

use lokstra_core::{Body, Ctx, LokstraError, MiddlewareFn, Response};
use std::sync::Arc;

/// A reverse-proxy mount: every request under the mount prefix is
/// forwarded to `target + <sub-path>` with its method, headers (minus
/// hop-by-hop ones) and body passed through.
pub struct ReverseProxyMount {
    target: String,
    http: reqwest::Client,
}

impl ReverseProxyMount {
    pub fn new(target: impl Into<String>) -> Self {
        ReverseProxyMount {
            target: target.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Adapt this mount into the façade's [`crate::router::Handler`]
    /// shape; the `{rest...}` path param supplies the requested sub-path,
    /// exactly as [`crate::static_files::StaticMount::into_handler`] does.
    pub fn into_handler(self) -> MiddlewareFn {
        let target = self.target;
        let http = self.http;
        Arc::new(move |ctx: &mut Ctx| {
            let target = target.clone();
            let http = http.clone();
            Box::pin(async move {
                let rest = ctx.path_param("rest", "");
                let mut url = format!("{}/{}", target.trim_end_matches('/'), rest.trim_start_matches('/'));
                if let Some(q) = ctx.request.uri.query() {
                    url.push('?');
                    url.push_str(q);
                }

                let method = reqwest::Method::from_bytes(ctx.request.method.as_str().as_bytes())
                    .unwrap_or(reqwest::Method::GET);
                let mut req = http.request(method, &url);
                for (name, value) in ctx.request.headers.iter() {
                    if is_hop_by_hop(name.as_str()) {
                        continue;
                    }
                    if let Ok(v) = value.to_str() {
                        req = req.header(name.as_str(), v);
                    }
                }
                if !ctx.request.body.is_empty() {
                    req = req.body(ctx.request.body.clone());
                }

                match req.send().await {
                    Ok(upstream) => {
                        let status = http::StatusCode::from_u16(upstream.status().as_u16())
                            .unwrap_or(http::StatusCode::BAD_GATEWAY);
                        let headers = upstream.headers().clone();
                        let bytes = upstream
                            .bytes()
                            .await
                            .map_err(|e| LokstraError::Transport(format!("reverse proxy body read failed: {e}")))?;
                        let mut resp = Response::new(status, Body::Full(bytes));
                        for (name, value) in headers.iter() {
                            if is_hop_by_hop(name.as_str()) {
                                continue;
                            }
                            if let (Ok(n), Ok(v)) = (
                                http::HeaderName::from_bytes(name.as_str().as_bytes()),
                                http::HeaderValue::from_bytes(value.as_bytes()),
                            ) {
                                resp.headers_mut().insert(n, v);
                            }
                        }
                        ctx.respond(resp);
                    }
                    Err(e) => ctx.fail(LokstraError::Transport(format!("reverse proxy request failed: {e}"))),
                }
                Ok(())
            })
        })
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection" | "keep-alive" | "proxy-authenticate" | "proxy-authorization" | "te" | "trailer" | "transfer-encoding" | "upgrade" | "host"
    )
}
