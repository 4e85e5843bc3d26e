use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bridge::{Activity, Bridge, PendingBaud};
use crate::connectivity::StateHandle;
use crate::registry::ViewerRegistry;
use crate::websocket::websocket_handler;

/// Everything the HTTP and WebSocket layers share.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ViewerRegistry>,
    pub bridge: Arc<Bridge>,
    pub state: StateHandle,
    pub pending_baud: Arc<PendingBaud>,
    pub activity: Activity,
}

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/b", get(set_baud))
        .route("/health", get(health_check))
        .route("/ws", get(websocket_handler))
        .with_state(app)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

#[derive(Debug, Deserialize)]
pub struct BaudQuery {
    v: Option<u32>,
}

/// `GET /b?v=<rate>` — reconfigures the serial transmission rate. The
/// change is parked and picked up by the bridge on its next poll cycle,
/// so an in-flight relay is never disturbed.
async fn set_baud(State(app): State<AppState>, Query(query): Query<BaudQuery>) -> Response {
    match query.v {
        Some(rate) if rate > 0 => {
            info!(rate, "serial rate change requested");
            app.pending_baud.request(rate);
            (StatusCode::OK, "OK").into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "missing or invalid rate").into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connection: String,
    pub viewers: usize,
    pub replay_bytes: usize,
    pub idle_seconds: u64,
}

async fn health_check(State(app): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connection: app.state.get().to_string(),
        viewers: app.registry.viewer_count(),
        replay_bytes: app.registry.replay_len(),
        idle_seconds: app.activity.idle_for().as_secs(),
    })
}
