//! Request, response and error values exchanged with a GraphQL engine.

use std::fmt;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One GraphQL request as issued by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLRequest {
    /// Document text.
    pub query: String,
    /// Variable values, keyed by variable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
    /// Operation to run when the document defines several.
    #[serde(
        rename = "operationName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    /// Creates a request for `query` with no variables or operation name.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
        }
    }

    /// Sets the variable map.
    #[must_use]
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

/// Per-connection data handed to the engine alongside every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Identifier of the connection the request arrived on.
    pub connection_id: uuid::Uuid,
    /// Payload the client sent with `connection_init`, if any.
    pub connection_params: Option<Value>,
}

/// 1-based position inside a GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number, starting at 1.
    pub column: usize,
}

impl SourceLocation {
    /// Creates a location.
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// One segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Field name or alias.
    Field(String),
    /// List index.
    Index(usize),
}

/// A structured GraphQL error.
///
/// `locations` and `path` serialize as `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable description.
    pub message: String,
    /// Document positions the error relates to.
    #[serde(default)]
    pub locations: Option<Vec<SourceLocation>>,
    /// Response path of the field that failed.
    #[serde(default)]
    pub path: Option<Vec<PathSegment>>,
}

impl GraphQLError {
    /// Creates an error with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
        }
    }

    /// Attaches a single source location.
    #[must_use]
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.locations = Some(vec![location]);
        self
    }

    /// Attaches a response path.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A GraphQL execution result: `{data, errors}`.
///
/// `data` always serializes (possibly as `null`); `errors` is omitted when
/// there are none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    /// Result data, `None` when execution produced nothing.
    #[serde(default)]
    pub data: Option<Value>,
    /// Field-level or request-level errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
}

impl GraphQLResponse {
    /// A successful result carrying `data`.
    #[must_use]
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// A result with no data and the given errors.
    #[must_use]
    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    /// Returns `true` if the result carries at least one error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Lazy sequence of results produced for a subscription.
///
/// An `Err` item is a fatal stream error: nothing else is read from the
/// stream afterwards.
pub type ResponseStream = BoxStream<'static, Result<GraphQLResponse, GraphQLError>>;

/// What an engine hands back for one request.
pub enum Execution {
    /// Queries and mutations: exactly one result.
    Single(GraphQLResponse),
    /// Subscriptions: zero or more results.
    Stream(ResponseStream),
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(response) => f.debug_tuple("Single").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
