//! HTTP status and control API.

pub mod api;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::WebState;

/// Build the API router.
pub fn router(web_state: Arc<WebState>) -> Router {
    Router::new()
        // Listener API
        .route("/api/listeners", get(api::get_listeners))
        .route("/api/stats", get(api::get_stats))
        // Stream API
        .route("/api/streams/:owner_id", get(api::get_stream))
        .route("/api/streams/:owner_id/lowest", get(api::get_lowest_stream))
        // Filter API
        .route("/api/filter", get(api::get_filter))
        .route("/api/filter/reload", post(api::reload_filter))
        .route(
            "/api/filter/:owner_id",
            post(api::add_filter).delete(api::remove_filter),
        )
        // Room actions
        .route("/api/rooms/:owner_id/comment", post(api::send_comment))
        .route("/api/rooms/:owner_id/gift", post(api::send_gift))
        .with_state(web_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until the monitor stops.
pub async fn start_web_server(
    listen_addr: SocketAddr,
    web_state: Arc<WebState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let shutdown = web_state.monitor.root_token().clone();
    let app = router(web_state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!("Status API listening on http://{}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
