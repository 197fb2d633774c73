//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};

use super::connection::run_connection;
use super::messages::GRAPHQL_WS_PROTOCOL;
use super::transport::AxumTransport;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /graphql` — Upgrade to a `graphql-ws` WebSocket.
///
/// # Errors
///
/// Returns [`GatewayError::SubprotocolNotAcceptable`] when the client does
/// not offer the `graphql-ws` subprotocol.
#[utoipa::path(
    get,
    path = "/graphql",
    tag = "GraphQL",
    summary = "GraphQL over WebSocket",
    description = "Upgrades to a WebSocket speaking the `graphql-ws` subprotocol. \
                   The request must offer `graphql-ws` in `Sec-WebSocket-Protocol`.",
    responses(
        (status = 101, description = "Switching to the graphql-ws protocol"),
        (status = 400, description = "Subprotocol missing or not acceptable", body = ErrorResponse),
    )
)]
pub async fn graphql_ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, GatewayError> {
    let offered = headers
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok());
    if !offers_graphql_ws(offered) {
        tracing::warn!(?offered, "rejecting upgrade without graphql-ws subprotocol");
        return Err(GatewayError::SubprotocolNotAcceptable {
            expected: GRAPHQL_WS_PROTOCOL,
            offered: offered.map(str::to_string),
        });
    }

    let AppState { engine, connection } = state;
    Ok(ws
        .protocols([GRAPHQL_WS_PROTOCOL])
        .on_upgrade(move |socket| run_connection(AxumTransport::new(socket), engine, connection))
        .into_response())
}

/// Returns `true` if a `Sec-WebSocket-Protocol` value lists `graphql-ws`.
fn offers_graphql_ws(offered: Option<&str>) -> bool {
    offered.is_some_and(|value| {
        value
            .split(',')
            .any(|protocol| protocol.trim() == GRAPHQL_WS_PROTOCOL)
    })
}
