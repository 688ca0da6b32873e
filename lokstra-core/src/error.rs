use crate::envelope::{ApiEnvelope, ErrorBody, FieldError};
use crate::response::{IntoResponse, Response};
use http::StatusCode;

/// The stable error taxonomy shared by handlers, middleware, the autogen
/// bridge, and the proxy client.
///
/// Each variant carries the message that is surfaced to the caller. The
/// variant itself - not the message - is the stable contract: callers match
/// on kind, never on message text.
pub enum LokstraError {
    /// Malformed YAML, duplicate name, missing published service, unknown
    /// middleware type. Fatal at startup; never produced during request
    /// handling.
    Config(String),
    /// Unknown service, wrong service type at `Get`, dependency cycle.
    /// Fatal at first use (the registry panics); this variant exists so
    /// library code that surfaces registry failures as `Result` has
    /// something to return before the panic boundary.
    Registry(String),
    /// Bind failure or validation error. Surfaces as 400.
    Request {
        message: String,
        fields: Vec<FieldError>,
    },
    /// 401.
    Unauthorized(String),
    /// 403.
    Forbidden(String),
    /// 404.
    NotFound(String),
    /// 405, with the `Allow` header value already computed by the router.
    MethodNotAllowed { allow: String },
    /// Handler returned an unrecognised error, or a panic was recovered.
    Internal(String),
    /// Proxy only: connect/timeout. Always retriable.
    Transport(String),
    /// Proxy only: remote returned an error envelope. Code is preserved.
    Upstream { code: String, message: String },
    /// Listener is draining; 503 with `Retry-After`.
    Shutdown,
}

impl LokstraError {
    pub fn request(message: impl Into<String>) -> Self {
        LokstraError::Request {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn request_with_fields(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        LokstraError::Request {
            message: message.into(),
            fields,
        }
    }

    /// Stable error code string used in the envelope and by the proxy's
    /// reverse mapping.
    pub fn code(&self) -> &'static str {
        match self {
            LokstraError::Config(_) => "CONFIG_ERROR",
            LokstraError::Registry(_) => "REGISTRY_ERROR",
            LokstraError::Request { fields, .. } if !fields.is_empty() => "VALIDATION_ERROR",
            LokstraError::Request { .. } => "INVALID_INPUT",
            LokstraError::Unauthorized(_) => "UNAUTHORIZED",
            LokstraError::Forbidden(_) => "FORBIDDEN",
            LokstraError::NotFound(_) => "NOT_FOUND",
            LokstraError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            LokstraError::Internal(_) => "INTERNAL_ERROR",
            LokstraError::Transport(_) => "TRANSPORT_ERROR",
            LokstraError::Upstream { .. } => "UPSTREAM_ERROR",
            LokstraError::Shutdown => "SHUTDOWN",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LokstraError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LokstraError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LokstraError::Request { .. } => StatusCode::BAD_REQUEST,
            LokstraError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LokstraError::Forbidden(_) => StatusCode::FORBIDDEN,
            LokstraError::NotFound(_) => StatusCode::NOT_FOUND,
            LokstraError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            LokstraError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LokstraError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            LokstraError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            LokstraError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether a proxy caller may safely retry the call that produced this
    /// error. Timeouts, transport failures and 503s are retriable; 500/400
    /// are not (spec §4.G).
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            LokstraError::Transport(_) | LokstraError::Shutdown
        ) || matches!(self, LokstraError::Upstream { code, .. } if code == "SHUTDOWN" || code == "TRANSPORT_ERROR")
    }

    pub fn message(&self) -> String {
        match self {
            LokstraError::Config(m)
            | LokstraError::Registry(m)
            | LokstraError::Unauthorized(m)
            | LokstraError::Forbidden(m)
            | LokstraError::NotFound(m)
            | LokstraError::Internal(m)
            | LokstraError::Transport(m) => m.clone(),
            LokstraError::Request { message, .. } => message.clone(),
            LokstraError::MethodNotAllowed { allow } => format!("method not allowed (allow: {allow})"),
            LokstraError::Upstream { message, .. } => message.clone(),
            LokstraError::Shutdown => "server is shutting down".to_string(),
        }
    }
}

impl std::fmt::Display for LokstraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::fmt::Debug for LokstraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for LokstraError {}

impl IntoResponse for LokstraError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let mut resp = match &self {
            LokstraError::MethodNotAllowed { allow } => {
                let envelope = ApiEnvelope::<()>::error(ErrorBody {
                    code: code.clone(),
                    message: self.message(),
                    fields: Vec::new(),
                });
                let mut r = Response::json(status, &envelope);
                r.headers_mut()
                    .insert("Allow", allow.parse().expect("allow header value"));
                r
            }
            LokstraError::Shutdown => {
                let envelope = ApiEnvelope::<()>::error(ErrorBody {
                    code: code.clone(),
                    message: self.message(),
                    fields: Vec::new(),
                });
                let mut r = Response::json(status, &envelope);
                r.headers_mut().insert(
                    "Retry-After",
                    "5".parse().expect("retry-after header value"),
                );
                r
            }
            LokstraError::Request { fields, .. } => {
                let envelope = ApiEnvelope::<()>::error(ErrorBody {
                    code: code.clone(),
                    message: self.message(),
                    fields: fields.clone(),
                });
                Response::json(status, &envelope)
            }
            _ => {
                let envelope = ApiEnvelope::<()>::error(ErrorBody {
                    code: code.clone(),
                    message: self.message(),
                    fields: Vec::new(),
                });
                Response::json(status, &envelope)
            }
        };

        if matches!(self, LokstraError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        }

        resp.set_status(status);
        resp
    }
}

/// Generate `From<E> for LokstraError` implementations, mirroring the
/// teacher's `map_error!` macro.
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::error::LokstraError {
                fn from(err: $err_ty) -> Self {
                    $crate::error::LokstraError::$variant(err.to_string())
                }
            }
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = LokstraError::NotFound("user 7".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn validation_fields_select_validation_code() {
        let err = LokstraError::request_with_fields(
            "invalid body",
            vec![FieldError {
                field: "email".into(),
                message: "required".into(),
            }],
        );
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn bare_request_error_is_invalid_input() {
        let err = LokstraError::request("bad json");
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn transport_and_shutdown_are_retriable() {
        assert!(LokstraError::Transport("timeout".into()).retriable());
        assert!(LokstraError::Shutdown.retriable());
        assert!(!LokstraError::Internal("boom".into()).retriable());
        assert!(!LokstraError::request("bad").retriable());
    }

    #[test]
    fn shutdown_response_has_retry_after() {
        let resp = LokstraError::Shutdown.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers().get("Retry-After").unwrap(), "5");
    }

    #[test]
    fn method_not_allowed_carries_allow_header() {
        let resp = LokstraError::MethodNotAllowed {
            allow: "GET, HEAD, OPTIONS".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get("Allow").unwrap(), "GET, HEAD, OPTIONS");
    }
}
