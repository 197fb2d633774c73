//! graphql-ws-gateway server entry point.
//!
//! Serves the demo schema over the `graphql-ws` WebSocket endpoint.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use graphql_ws_gateway::api;
use graphql_ws_gateway::app_state::AppState;
use graphql_ws_gateway::config::GatewayConfig;
use graphql_ws_gateway::engine::demo::demo_engine;
use graphql_ws_gateway::error::GatewayError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting graphql-ws-gateway");

    // Build application state
    let engine = Arc::new(demo_engine(config.demo_example_delay).await);
    let app_state = AppState::new(engine, config.connection.clone());

    // Build router
    let app = api::app(app_state, &config.ws_path);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| GatewayError::Internal(format!("binding {}: {e}", config.listen_addr)))?;
    tracing::info!(
        addr = %config.listen_addr,
        path = %config.ws_path,
        keep_alive = ?config.connection.keep_alive_interval,
        "server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Internal(format!("server stopped: {e}")))?;

    Ok(())
}
