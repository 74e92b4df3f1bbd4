//! Router assembly for the browser-facing HTTP server.

use std::time::Duration;

use axum::{Router, http::StatusCode, routing::any};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::websocket;

/// Creates the application router: the `/ws` endpoint plus, when configured,
/// the static web UI served straight from disk.
pub(crate) fn create_app(state: AppState) -> Router {
    let router = Router::new()
        .route("/ws", any(websocket::ws_handler))
        .with_state(state.clone());

    let router = match &state.config.server.assets_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(30),
            )),
    )
}
