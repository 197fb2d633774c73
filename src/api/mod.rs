//! HTTP layer: router composition and the OpenAPI document.
//!
//! | Route                   | Handler                                        |
//! |-------------------------|------------------------------------------------|
//! | `GET {ws_path}`         | [`crate::ws::handler::graphql_ws_handler`]     |
//! | `GET /health`           | [`handlers::system::health_handler`]           |
//! | `GET /api-docs/openapi.json` | OpenAPI document                          |
//! | `GET /swagger-ui`       | Swagger UI (`swagger-ui` feature)              |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};
use crate::ws::handler::graphql_ws_handler;

/// Route serving the OpenAPI document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI description of the HTTP surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "graphql-ws-gateway",
        description = "GraphQL subscriptions over WebSocket (graphql-ws subprotocol)"
    ),
    paths(
        handlers::system::health_handler,
        crate::ws::handler::graphql_ws_handler,
    ),
    components(schemas(ErrorResponse, ErrorBody)),
    tags(
        (name = "System", description = "Service health"),
        (name = "GraphQL", description = "GraphQL over WebSocket"),
    )
)]
pub struct ApiDoc;

/// Builds the router with every endpoint, the upgrade served on `ws_path`.
pub fn build_router(ws_path: &str) -> Router<AppState> {
    let router = Router::new()
        .route(ws_path, get(graphql_ws_handler))
        .merge(handlers::system::routes());
    with_docs(router)
}

/// Builds the complete application: routes, HTTP layers and state.
pub fn app(state: AppState, ws_path: &str) -> Router {
    build_router(ws_path)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router.route(OPENAPI_PATH, get(|| async { axum::Json(ApiDoc::openapi()) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/graphql"));
    }
}
