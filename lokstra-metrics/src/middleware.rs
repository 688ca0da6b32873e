//! HTTP request metrics middleware, grounded on `r2e-prometheus`'s
//! `PrometheusLayer`/`PrometheusService`: track an in-flight gauge across
//! the call, then on completion record a request counter and a duration
//! histogram, with the same numeric-segment normalisation the teacher uses
//! to keep path cardinality bounded.

use crate::registry::MetricsRegistry;
use lokstra_core::{Ctx, LokstraError, MiddlewareFn};
use std::sync::Arc;
use std::time::Instant;

/// Builds the request-tracking [`MiddlewareFn`] for a given registry.
/// Mirrors `r2e-prometheus::PrometheusLayer::new(config)` but as a plain
/// middleware closure, since the router façade has no Tower `Layer` seam
/// (spec §9, "Dynamic dispatch over handler shapes": one normalised
/// handler type, adapters where needed - here the adapter is simply a
/// closure over `next()`).
pub struct HttpMetrics {
    registry: MetricsRegistry,
    exclude_prefixes: Vec<String>,
}

impl HttpMetrics {
    pub fn new(registry: MetricsRegistry) -> Self {
        HttpMetrics {
            registry,
            exclude_prefixes: vec!["/metrics".to_string()],
        }
    }

    pub fn with_excluded_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.exclude_prefixes.push(prefix.into());
        self
    }

    pub fn into_middleware(self) -> MiddlewareFn {
        let registry = self.registry;
        let exclude_prefixes = Arc::new(self.exclude_prefixes);
        Arc::new(move |ctx: &mut Ctx| {
            let registry = registry.clone();
            let exclude_prefixes = exclude_prefixes.clone();
            Box::pin(async move {
                let path = ctx.request.uri.path().to_string();
                let method = ctx.request.method.to_string();
                let tracked = !exclude_prefixes.iter().any(|p| path.starts_with(p.as_str()));

                if tracked {
                    registry.set_gauge(
                        "http_requests_in_flight",
                        1.0,
                        &[],
                    );
                }
                let start = Instant::now();

                let result: Result<(), LokstraError> = ctx.next().await;

                if tracked {
                    registry.set_gauge("http_requests_in_flight", 0.0, &[]);
                    let status = ctx.peek_status().as_u16().to_string();
                    let normalized = normalize_path(&path);
                    registry.inc_counter(
                        "http_requests_total",
                        &[("method", &method), ("path", &normalized), ("status", &status)],
                    );
                    registry.observe_histogram(
                        "http_request_duration_seconds",
                        start.elapsed().as_secs_f64(),
                        &[("method", &method), ("path", &normalized)],
                    );
                }

                result
            })
        })
    }
}

/// Replace numeric and UUID-shaped path segments with `{id}` to avoid a
/// cardinality explosion keyed by primary key (`r2e-prometheus::
/// normalize_path`/`is_uuid`, verbatim algorithm).
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() || is_uuid(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid(s: &str) -> bool {
    s.len() == 36 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-') && s.matches('-').count() == 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_replaces_numeric_and_uuid_segments() {
        assert_eq!(normalize_path("/users/42"), "/users/{id}");
        assert_eq!(
            normalize_path("/users/550e8400-e29b-41d4-a716-446655440000"),
            "/users/{id}"
        );
        assert_eq!(normalize_path("/users/list"), "/users/list");
    }

    #[tokio::test]
    async fn middleware_records_a_request_and_leaves_in_flight_at_zero() {
        use bytes::Bytes;
        use http::{HeaderMap, Method, Uri};
        use lokstra_core::{envelope::api, RequestParts};
        use tokio_util::sync::CancellationToken;

        let registry = MetricsRegistry::new();
        let mw = HttpMetrics::new(registry.clone()).into_middleware();

        let handler: MiddlewareFn = Arc::new(|ctx: &mut Ctx| {
            Box::pin(async move {
                ctx.respond(api::ok("hi"));
                Ok(())
            })
        });

        let chain = Arc::new(vec![mw, handler]);
        let uri: Uri = "/users/42".parse().unwrap();
        let parts = RequestParts::new(Method::GET, uri, HeaderMap::new(), Bytes::new());
        let mut ctx = Ctx::new(parts, chain, CancellationToken::new());
        ctx.next().await.unwrap();
        let resp = ctx.finish();
        assert_eq!(resp.status(), http::StatusCode::OK);

        let body = registry.encode();
        assert!(body.contains("http_requests_total"));
        assert!(body.contains(r#"path="/users/{id}""#));
    }
}
