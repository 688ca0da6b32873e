use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single field-level validation failure, embedded in [`ErrorBody`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// The `error` object of the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

/// Pagination metadata, the `meta` object of the envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meta {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Meta {
    pub fn paginate(page: u64, page_size: u64, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Meta {
            page,
            page_size,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// The standard HTTP API envelope (spec §6):
///
/// ```json
/// { "status": "success"|"error", "message": "...", "data": <any>,
///   "error": {...}, "meta": {...} }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: Option<T>) -> Self {
        ApiEnvelope {
            status: EnvelopeStatus::Success,
            message: None,
            data,
            error: None,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(error: ErrorBody) -> Self {
        ApiEnvelope {
            status: EnvelopeStatus::Error,
            message: Some(error.message.clone()),
            data: None,
            error: Some(error),
            meta: None,
        }
    }
}

impl ApiEnvelope<Value> {
    /// Parse a raw JSON body into the generic envelope shape used by the
    /// proxy client's reverse mapping (spec §4.G).
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Convenience constructors mirroring `Api.Ok/Created/BadRequest/Error` from
/// spec §4.A. These produce a [`crate::response::Response`] directly.
pub mod api {
    use super::*;
    use crate::response::Response;
    use http::StatusCode;

    pub fn ok<T: Serialize>(data: T) -> Response {
        Response::json(StatusCode::OK, &ApiEnvelope::success(Some(data)))
    }

    /// A `nil`/unit handler result is materialised as `Api.Ok(nil)` (spec §4.A).
    pub fn ok_empty() -> Response {
        Response::json(StatusCode::OK, &ApiEnvelope::<()>::success(None))
    }

    pub fn created<T: Serialize>(data: T) -> Response {
        Response::json(StatusCode::CREATED, &ApiEnvelope::success(Some(data)))
    }

    pub fn bad_request(code: &str, message: impl Into<String>) -> Response {
        Response::json(
            StatusCode::BAD_REQUEST,
            &ApiEnvelope::<()>::error(ErrorBody {
                code: code.to_string(),
                message: message.into(),
                fields: Vec::new(),
            }),
        )
    }

    pub fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
        Response::json(
            status,
            &ApiEnvelope::<()>::error(ErrorBody {
                code: code.to_string(),
                message: message.into(),
                fields: Vec::new(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_paginate_computes_pages_and_flags() {
        let meta = Meta::paginate(2, 10, 45);
        assert_eq!(meta.total_pages, 5);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn meta_paginate_first_page_has_no_prev() {
        let meta = Meta::paginate(1, 10, 45);
        assert!(!meta.has_prev);
        assert!(meta.has_next);
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let env = ApiEnvelope::success(Some(42)).with_meta(Meta::paginate(1, 10, 1));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], 42);
        let back: ApiEnvelope<i32> = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, Some(42));
    }

    #[test]
    fn error_envelope_serialises_fields() {
        let env = ApiEnvelope::<()>::error(ErrorBody {
            code: "VALIDATION_ERROR".into(),
            message: "invalid".into(),
            fields: vec![FieldError {
                field: "email".into(),
                message: "required".into(),
            }],
        });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["fields"][0]["field"], "email");
    }
}
