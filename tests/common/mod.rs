//! Shared helpers: a real server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use graphql_ws_gateway::api;
use graphql_ws_gateway::app_state::AppState;
use graphql_ws_gateway::config::ConnectionConfig;
use graphql_ws_gateway::engine::demo::demo_engine;
use tokio::net::TcpListener;
use tokio_test::assert_ok;

/// Upgrade route used by every test server.
pub const WS_PATH: &str = "/graphql";

/// Delay of the demo `example` subscription in tests.
pub const EXAMPLE_DELAY: Duration = Duration::from_millis(20);

/// Binds the demo app on `127.0.0.1:0` and serves it in the background.
pub async fn spawn_server(connection: ConnectionConfig) -> SocketAddr {
    let state = AppState::new(Arc::new(demo_engine(EXAMPLE_DELAY).await), connection);
    let app = api::app(state, WS_PATH);
    let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
    let addr = assert_ok!(listener.local_addr());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
