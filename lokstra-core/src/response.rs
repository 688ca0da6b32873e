use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use std::pin::Pin;

/// A chunk-producing stream used by [`Response::stream`].
pub type BodyStream =
    Pin<Box<dyn futures_core::Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// The response body: either fully buffered, or a lazily-produced stream.
///
/// Streaming responses are written after headers are flushed (spec §4.A);
/// [`Body::Stream`] carries the `Content-Type` separately because a
/// streaming writer function does not have a single up-front byte buffer to
/// derive it from.
pub enum Body {
    Full(Bytes),
    Stream(BodyStream),
}

impl Body {
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

/// An HTTP response being assembled by a handler or middleware.
///
/// Invariant (spec §4.A): the response is written exactly once. Mutating
/// methods return `&mut Self` / `Self` so handlers can chain
/// `Resp::with_status(n).json(x)`-style calls.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    pub fn new(status: StatusCode, body: Body) -> Self {
        Response {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Body) {
        (self.status, self.headers, self.body)
    }

    /// Serialise `value` as the standard JSON envelope body.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        let bytes = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        let mut resp = Response::new(status, Body::Full(Bytes::from(bytes)));
        resp.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        resp
    }

    pub fn text(status: StatusCode, value: impl Into<String>) -> Self {
        let mut resp = Response::new(status, Body::Full(Bytes::from(value.into())));
        resp.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        resp
    }

    pub fn html(status: StatusCode, value: impl Into<String>) -> Self {
        let mut resp = Response::new(status, Body::Full(Bytes::from(value.into())));
        resp.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        resp
    }

    /// A streaming response. `content_type` is applied as the `Content-Type`
    /// header; `Flush()` happens at the transport layer once headers are
    /// sent, so no explicit flush hook is required here (spec §4.A).
    pub fn stream(content_type: &str, body: BodyStream) -> Self {
        let mut resp = Response::new(StatusCode::OK, Body::Stream(body));
        if let Ok(value) = HeaderValue::from_str(content_type) {
            resp.headers.insert(http::header::CONTENT_TYPE, value);
        }
        resp
    }

    /// Read the full buffered body, if this response is not streaming.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Full(b) => Some(b),
            Body::Stream(_) => None,
        }
    }
}

/// Adapts a value into a [`Response`]. Implemented for `Response` itself,
/// `Result<Response, LokstraError>` bridges are handled one layer up by the
/// router façade (spec §4.C handler acceptance table).
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        crate::envelope::api::ok_empty()
    }
}

impl<T: Serialize> IntoResponse for crate::envelope::ApiEnvelope<T> {
    fn into_response(self) -> Response {
        let status = match self.status {
            crate::envelope::EnvelopeStatus::Success => StatusCode::OK,
            crate::envelope::EnvelopeStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Response::json(status, &self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type() {
        let resp = Response::json(StatusCode::OK, &serde_json::json!({"a": 1}));
        assert_eq!(resp.headers().get("content-type").unwrap(), "application/json");
        assert_eq!(resp.body_bytes().unwrap().as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn with_status_chains() {
        let resp = Response::text(StatusCode::OK, "hi").with_status(StatusCode::CREATED);
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[test]
    fn unit_into_response_is_ok_empty() {
        let resp = ().into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_slice(resp.body_bytes().unwrap()).unwrap();
        assert_eq!(body["status"], "success");
        assert!(body.get("data").is_none() || body["data"].is_null());
    }
}
