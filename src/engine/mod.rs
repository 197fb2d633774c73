//! GraphQL engine collaborator.
//!
//! The transport never interprets queries itself: it asks a
//! [`GraphQLEngine`] to validate each incoming document and to execute it,
//! receiving either a single result or a lazy stream of results.
//!
//! [`SchemaEngine`] adapts any `async-graphql` schema to that interface.
//! The binary serves the schema in [`demo`] through it.

pub mod demo;
pub mod schema;
pub mod types;

use std::fmt;

use async_trait::async_trait;

pub use schema::SchemaEngine;
pub use types::{
    Execution, GraphQLError, GraphQLRequest, GraphQLResponse, PathSegment, RequestContext,
    ResponseStream, SourceLocation,
};

/// Parses, validates and executes GraphQL documents.
#[async_trait]
pub trait GraphQLEngine: Send + Sync + fmt::Debug {
    /// Checks `query` for syntax errors and unresolvable fields or types.
    ///
    /// # Errors
    ///
    /// Returns every problem found; the list is never empty.
    fn validate(&self, query: &str) -> Result<(), Vec<GraphQLError>>;

    /// Executes a request that already passed [`GraphQLEngine::validate`].
    ///
    /// Failures are reported inside the returned [`Execution`], never as a
    /// Rust error.
    async fn execute(&self, request: GraphQLRequest, context: RequestContext) -> Execution;
}
