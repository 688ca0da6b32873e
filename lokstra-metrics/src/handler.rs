//! The `/metrics` endpoint (spec §4.L `GetHTTPHandler`), text-encoding the
//! registry exactly as `r2e-prometheus::handler::metrics_handler` does.

use crate::registry::MetricsRegistry;
use lokstra_core::response::Response;
use lokstra_router::{handler, Handler};

/// Build a router [`Handler`] that serves the current registry state in
/// Prometheus text exposition format.
pub fn metrics_handler(registry: MetricsRegistry) -> Handler {
    handler(move |ctx| {
        let registry = registry.clone();
        async move {
            let body = registry.encode();
            let mut resp = Response::text(http::StatusCode::OK, body);
            resp.headers_mut().insert(
                "content-type",
                "text/plain; version=0.0.4; charset=utf-8".parse().expect("static header value"),
            );
            ctx.respond(resp);
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method, Uri};
    use lokstra_core::{Ctx, RequestParts};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn metrics_handler_serves_gathered_vectors() {
        let registry = MetricsRegistry::new();
        registry.inc_counter("probe_total", &[("x", "1")]);

        let h = metrics_handler(registry);
        let uri: Uri = "/metrics".parse().unwrap();
        let parts = RequestParts::new(Method::GET, uri, HeaderMap::new(), Bytes::new());
        let mut ctx = Ctx::new(parts, Arc::new(vec![h.clone()]), CancellationToken::new());
        h(&mut ctx).await.unwrap();
        let resp = ctx.finish();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }
}
