//! Translates between `lokstra_core`'s transport-agnostic request/response
//! types and the `hyper`/`tower` plumbing the three listener backends sit
//! on. `lokstra_core::Ctx` is built directly on `http`+`bytes`, not on an
//! axum `Router`, so this is the one place that bridges the two worlds -
//! mirrors how `r2e_core::http` re-exports `axum::serve` for its own
//! (axum-native) app type, except our app type needs this translation
//! layer first.

use crate::drain::DrainState;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use lokstra_core::RequestParts;
use lokstra_router::RouterEngine;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tower::Service;

pub type OutBody = BoxBody<Bytes, std::io::Error>;

fn full_body(bytes: Bytes) -> OutBody {
    Full::new(bytes).map_err(|never: Infallible| match never {}).boxed()
}

fn retry_after_503() -> Response<OutBody> {
    let mut resp = Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .header("Retry-After", "5")
        .body(full_body(Bytes::from_static(
            br#"{"status":"error","message":"server is shutting down","data":null,"error":{"code":"SHUTDOWN","message":"server is shutting down"}}"#,
        )))
        .expect("503 response is well-formed");
    resp
}

fn to_out_response(response: lokstra_core::Response) -> Response<OutBody> {
    let (status, headers, body) = response.into_parts();
    let out_body = match body {
        lokstra_core::Body::Full(bytes) => full_body(bytes),
        lokstra_core::Body::Stream(stream) => {
            use futures_util::StreamExt;
            let frames = stream.map(|chunk| chunk.map(http_body::Frame::data));
            http_body_util::StreamBody::new(frames).boxed()
        }
    };
    let mut builder = Response::builder().status(status);
    *builder.headers_mut().expect("builder has no error yet") = headers;
    builder.body(out_body).expect("response body is infallible")
}

async fn to_request_parts<B>(req: Request<B>) -> Result<RequestParts, B::Error>
where
    B: http_body::Body<Data = Bytes>,
{
    let (parts, body) = req.into_parts();
    let bytes = body.collect().await?.to_bytes();
    Ok(RequestParts::new(parts.method, parts.uri, parts.headers, bytes))
}

/// The `tower::Service` every listener backend drives. Shared across
/// net/http, TLS and fasthttp variants so their request handling is
/// identical; only how bytes reach this point (plain TCP, TLS, or a raw
/// `hyper::server::conn` accept loop) differs per backend.
#[derive(Clone)]
pub struct RouterService {
    engine: Arc<dyn RouterEngine>,
    drain: Arc<DrainState>,
}

impl RouterService {
    pub fn new(engine: Arc<dyn RouterEngine>, drain: Arc<DrainState>) -> Self {
        RouterService { engine, drain }
    }
}

impl<B> Service<Request<B>> for RouterService
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display + Send,
{
    type Response = Response<OutBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let engine = self.engine.clone();
        let drain = self.drain.clone();
        Box::pin(async move {
            let Some(guard) = drain.try_enter() else {
                return Ok(retry_after_503());
            };

            let parts = match to_request_parts(req).await {
                Ok(parts) => parts,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read request body");
                    drop(guard);
                    return Ok(Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(full_body(Bytes::from_static(b"malformed request body")))
                        .expect("400 response is well-formed"));
                }
            };

            let response = lokstra_router::serve(engine.as_ref(), parts, CancellationToken::new()).await;
            drop(guard);
            Ok(to_out_response(response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Empty;
    use lokstra_router::TreeMuxEngine;

    #[tokio::test]
    async fn draining_state_short_circuits_to_503() {
        let drain = DrainState::new();
        drain.begin_shutdown(std::time::Duration::from_millis(0)).await;
        let engine: Arc<dyn RouterEngine> = Arc::new(TreeMuxEngine::new());
        let mut service = RouterService::new(engine, drain);

        let req = Request::builder()
            .uri("/anything")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let resp = service.call(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers().get("Retry-After").unwrap(), "5");
    }

    #[tokio::test]
    async fn not_found_path_maps_to_404() {
        let drain = DrainState::new();
        let engine: Arc<dyn RouterEngine> = Arc::new(TreeMuxEngine::new());
        let mut service = RouterService::new(engine, drain);

        let req = Request::builder()
            .uri("/missing")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let resp = service.call(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
