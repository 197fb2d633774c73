//! `graphql-ws` protocol frames and their JSON codec.
//!
//! Every frame is one JSON object tagged by `type`. Connection-scoped
//! messages carry no `id`; operation-scoped messages always do.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::engine::{GraphQLError, GraphQLRequest, GraphQLResponse};
use crate::error::ProtocolError;

/// WebSocket subprotocol identifier negotiated at upgrade time.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

const OPERATION_SCOPED: [&str; 5] = ["start", "stop", "data", "error", "complete"];
const CONNECTION_SCOPED: [&str; 5] = [
    "connection_init",
    "connection_terminate",
    "connection_ack",
    "connection_error",
    "ka",
];

/// A protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    /// Client → Server: open the connection, optionally with parameters.
    ConnectionInit {
        /// Arbitrary connection parameters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Client → Server: close the connection and every operation on it.
    ConnectionTerminate,
    /// Server → Client: `connection_init` accepted.
    ConnectionAck,
    /// Server → Client: connection-level problem.
    ConnectionError {
        /// Error description, `{"message": ...}`.
        payload: Value,
    },
    /// Server → Client: keep-alive heartbeat.
    #[serde(rename = "ka")]
    KeepAlive,
    /// Client → Server: start an operation.
    Start {
        /// Client-chosen operation id.
        id: String,
        /// The GraphQL request.
        payload: GraphQLRequest,
    },
    /// Client → Server: stop an operation.
    Stop {
        /// Operation id.
        id: String,
    },
    /// Server → Client: one execution result.
    Data {
        /// Operation id.
        id: String,
        /// `{data, errors}`.
        payload: GraphQLResponse,
    },
    /// Server → Client: the operation could not be started.
    Error {
        /// Operation id.
        id: String,
        /// The single request-level error.
        payload: GraphQLError,
    },
    /// Server → Client: nothing more will follow for this id.
    Complete {
        /// Operation id.
        id: String,
    },
}

impl ProtocolMessage {
    /// Builds a `data` frame.
    #[must_use]
    pub fn data(id: impl Into<String>, payload: GraphQLResponse) -> Self {
        Self::Data {
            id: id.into(),
            payload,
        }
    }

    /// Builds an `error` frame.
    #[must_use]
    pub fn error(id: impl Into<String>, payload: GraphQLError) -> Self {
        Self::Error {
            id: id.into(),
            payload,
        }
    }

    /// Builds a `complete` frame.
    #[must_use]
    pub fn complete(id: impl Into<String>) -> Self {
        Self::Complete { id: id.into() }
    }

    /// Builds a `connection_error` frame with `{"message": message}`.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            payload: json!({ "message": message.into() }),
        }
    }

    /// Wire name of this message's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::ConnectionInit { .. } => "connection_init",
            Self::ConnectionTerminate => "connection_terminate",
            Self::ConnectionAck => "connection_ack",
            Self::ConnectionError { .. } => "connection_error",
            Self::KeepAlive => "ka",
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Data { .. } => "data",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }

    /// Operation id, for operation-scoped messages.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Start { id, .. }
            | Self::Stop { id }
            | Self::Data { id, .. }
            | Self::Error { id, .. }
            | Self::Complete { id } => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Decodes one text frame.
///
/// # Errors
///
/// Returns a [`ProtocolError`] if the frame is not a JSON object, has no
/// `type`, names an unknown type, lacks the `id` an operation-scoped type
/// requires, or carries fields that do not fit its type.
pub fn decode(frame: &str) -> Result<ProtocolMessage, ProtocolError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(ProtocolError::Malformed(
            "expected a JSON object".to_string(),
        ));
    };
    let message_type = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if OPERATION_SCOPED.contains(&message_type.as_str()) {
        if !object.get("id").is_some_and(Value::is_string) {
            return Err(ProtocolError::MissingId(message_type));
        }
    } else if !CONNECTION_SCOPED.contains(&message_type.as_str()) {
        return Err(ProtocolError::UnknownType(message_type));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        message_type,
        reason: e.to_string(),
    })
}

/// Encodes one message as a text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails, which only
/// happens for payloads containing non-string map keys.
pub fn encode(message: &ProtocolMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}
