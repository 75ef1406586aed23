//! Versioned HTTP response envelope.
//!
//! Handlers return `Result<ApiPayload, ApiError>`; the conversions here are
//! the single place response bytes, status codes and protocol headers are
//! produced, so every endpoint behaves identically. Structured payloads are
//! JSON with the negotiation header set; string payloads pass through
//! untouched; empty payloads produce an empty body. Errors carry their code
//! as `{"message": "<CODE>"}` with the HTTP status mirrored.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Value of the protocol negotiation header.
pub const NSQ_CONTENT_TYPE: &str = "nsq; version=1.0";

/// Name of the protocol negotiation header.
pub const NSQ_CONTENT_TYPE_HEADER: &str = "X-NSQ-Content-Type";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A successful (200) response payload.
#[derive(Debug)]
pub enum ApiPayload {
    /// A structured payload, serialized as JSON.
    Json(serde_json::Value),
    /// A string payload, returned as-is.
    Text(String),
    /// No payload; the body is empty.
    Empty,
}

impl ApiPayload {
    /// Serialize `data` into a JSON payload.
    ///
    /// # Errors
    ///
    /// A serialization failure becomes a 500 whose message is the
    /// serializer's error text.
    pub fn json(data: impl Serialize) -> Result<Self, ApiError> {
        serde_json::to_value(data)
            .map(ApiPayload::Json)
            .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

impl IntoResponse for ApiPayload {
    fn into_response(self) -> Response {
        let mut response = match self {
            ApiPayload::Json(value) => match serde_json::to_vec(&value) {
                Ok(body) => {
                    let mut response = (StatusCode::OK, body).into_response();
                    response.headers_mut().insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static(JSON_CONTENT_TYPE),
                    );
                    response
                }
                Err(e) => {
                    return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                        .into_response()
                }
            },
            ApiPayload::Text(body) => (StatusCode::OK, body).into_response(),
            ApiPayload::Empty => StatusCode::OK.into_response(),
        };
        response.headers_mut().insert(
            NSQ_CONTENT_TYPE_HEADER,
            HeaderValue::from_static(NSQ_CONTENT_TYPE),
        );
        response
    }
}

/// An error response; the status is mirrored in the HTTP status line and the
/// message becomes `{"message": "<message>"}`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "message": self.message }).to_string();
        let mut response = (self.status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        response.headers_mut().insert(
            NSQ_CONTENT_TYPE_HEADER,
            HeaderValue::from_static(NSQ_CONTENT_TYPE),
        );
        response
    }
}

/// Panic handler for the catch-panic middleware: any handler panic becomes a
/// 500 in the standard envelope.
pub fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "panic in HTTP handler");

    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR").into_response()
}
