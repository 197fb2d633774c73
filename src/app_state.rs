//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::engine::GraphQLEngine;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Engine every connection executes operations against.
    pub engine: Arc<dyn GraphQLEngine>,
    /// Settings handed to each accepted connection.
    pub connection: ConnectionConfig,
}

impl AppState {
    /// Creates the state for `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn GraphQLEngine>, connection: ConnectionConfig) -> Self {
        Self { engine, connection }
    }
}
