//! Status API endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use acfun_api::BANANA_GIFT_ID;
use livewatch_protocol::OwnerId;

use crate::monitor::MonitorError;
use crate::web::state::WebState;

/// Comment request body.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// Gift request body. Defaults to a single banana.
#[derive(Debug, Deserialize)]
pub struct GiftRequest {
    #[serde(default)]
    pub gift_id: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

fn not_found(message: String) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": message
        })),
    )
        .into_response()
}

fn action_error(err: MonitorError) -> axum::response::Response {
    let status = match &err {
        MonitorError::UnknownRoom(_) => StatusCode::NOT_FOUND,
        MonitorError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
        MonitorError::Action(api) if !api.is_transport() => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(json!({
            "success": false,
            "error": err.to_string()
        })),
    )
        .into_response()
}

// ============================================================================
// Listener endpoints
// ============================================================================

/// Status of every active listener.
pub async fn get_listeners(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    let listeners = web_state.monitor.listener_statuses().await;
    Json(json!({
        "success": true,
        "count": listeners.len(),
        "listeners": listeners
    }))
}

/// Counts and counters.
pub async fn get_stats(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    let monitor = &web_state.monitor;
    Json(json!({
        "success": true,
        "stats": {
            "active_listeners": monitor.active_listener_count().await,
            "tracked_streams": monitor.streams().len().await,
            "filtered_owners": monitor.filter().len(),
            "metrics": monitor.metrics().snapshot()
        }
    }))
}

// ============================================================================
// Stream endpoints
// ============================================================================

pub async fn get_stream(
    State(web_state): State<Arc<WebState>>,
    Path(owner_id): Path<OwnerId>,
) -> impl IntoResponse {
    match web_state.monitor.streams().get(owner_id).await {
        Some(stream) => Json(json!({
            "success": true,
            "stream": stream
        }))
        .into_response(),
        None => not_found(format!("No stream info for room {}", owner_id)),
    }
}

/// Lowest bitrate variant of a room.
pub async fn get_lowest_stream(
    State(web_state): State<Arc<WebState>>,
    Path(owner_id): Path<OwnerId>,
) -> impl IntoResponse {
    match web_state.monitor.streams().lowest_quality_variant(owner_id).await {
        Some(variant) => Json(json!({
            "success": true,
            "variant": variant
        }))
        .into_response(),
        None => not_found(format!("No stream variant for room {}", owner_id)),
    }
}

// ============================================================================
// Filter endpoints
// ============================================================================

pub async fn get_filter(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "owner_ids": web_state.monitor.filter().snapshot()
    }))
}

/// Reload the filter list from disk.
pub async fn reload_filter(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    match web_state
        .monitor
        .filter()
        .reload(&web_state.filter_path)
        .await
    {
        Ok(count) => Json(json!({
            "success": true,
            "count": count
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": e.to_string()
            })),
        )
            .into_response(),
    }
}

pub async fn add_filter(
    State(web_state): State<Arc<WebState>>,
    Path(owner_id): Path<OwnerId>,
) -> impl IntoResponse {
    let added = web_state.monitor.filter().add(owner_id);
    Json(json!({
        "success": true,
        "added": added
    }))
}

pub async fn remove_filter(
    State(web_state): State<Arc<WebState>>,
    Path(owner_id): Path<OwnerId>,
) -> impl IntoResponse {
    let removed = web_state.monitor.filter().remove(owner_id);
    Json(json!({
        "success": true,
        "removed": removed
    }))
}

// ============================================================================
// Room action endpoints
// ============================================================================

pub async fn send_comment(
    State(web_state): State<Arc<WebState>>,
    Path(owner_id): Path<OwnerId>,
    Json(payload): Json<CommentRequest>,
) -> impl IntoResponse {
    match web_state
        .monitor
        .send_comment_to_room(owner_id, &payload.content)
        .await
    {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => action_error(e),
    }
}

pub async fn send_gift(
    State(web_state): State<Arc<WebState>>,
    Path(owner_id): Path<OwnerId>,
    Json(payload): Json<GiftRequest>,
) -> impl IntoResponse {
    let gift_id = payload.gift_id.unwrap_or(BANANA_GIFT_ID);
    let batch_size = payload.batch_size.unwrap_or(1);
    match web_state
        .monitor
        .send_gift_to_room(owner_id, gift_id, batch_size)
        .await
    {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => action_error(e),
    }
}
