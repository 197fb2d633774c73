//! Gateway error types.
//!
//! [`GatewayError`] is the HTTP-facing error type: each variant maps to a
//! status code and a structured JSON error response. [`ProtocolError`] and
//! [`TransportError`] cover the WebSocket side, where failures are reported
//! in-band as protocol frames rather than HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "subprotocol not acceptable: expected graphql-ws",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 3000–3999 | Server          | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The upgrade request did not offer the required WebSocket subprotocol.
    #[error("subprotocol not acceptable: expected {expected}")]
    SubprotocolNotAcceptable {
        /// The subprotocol the server requires.
        expected: &'static str,
        /// Whatever the client offered, if anything.
        offered: Option<String>,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// The server could not bind or keep serving.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::SubprotocolNotAcceptable { .. } => 1002,
            Self::Internal(_) => 3000,
            Self::Config(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::SubprotocolNotAcceptable { .. } => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::SubprotocolNotAcceptable {
                offered: Some(offered),
                ..
            } => Some(format!("offered: {offered}")),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Connection-level protocol violation.
///
/// Never fatal: the connection reports it as a `connection_error` frame
/// and keeps processing subsequent frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a JSON object.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame has no string `type` field.
    #[error("message is missing a type")]
    MissingType,

    /// The `type` field names no known message.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// An operation-scoped message arrived without a string `id`.
    #[error("message of type {0} requires an id")]
    MissingId(String),

    /// The message is recognised but its fields do not fit its type.
    #[error("invalid {message_type} message: {reason}")]
    InvalidPayload {
        /// Wire type of the offending message.
        message_type: String,
        /// Deserializer explanation.
        reason: String,
    },

    /// An outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Failure reported by a [`crate::ws::transport::Transport`].
///
/// Always fatal to the connection it happens on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// Closing the socket failed.
    #[error("close failed: {0}")]
    Close(String),
}
