//! Room endpoints: the WebSocket registration entry point and hub stats.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{JoinParams, StatsResponse};
use crate::app_state::AppState;
use crate::connection::{Adapter, transport};
use crate::error::{ErrorResponse, HubError};

/// `GET /room`: Upgrade to a WebSocket and join the hub.
///
/// The request is assumed to be authorized upstream. Once upgraded, every
/// `{"body": "..."}` text frame the client sends is broadcast to all
/// connected clients as `{"name", "body", "when"}`.
///
/// # Errors
///
/// Returns [`HubError::InvalidName`] for an unusable display name,
/// [`HubError::UpgradeFailed`] if the request is not a valid WebSocket
/// handshake and [`HubError::HubClosed`] when the hub no longer accepts
/// clients.
#[utoipa::path(
    get,
    path = "/room",
    tag = "Room",
    summary = "Join the chat room",
    description = "Negotiates a WebSocket connection and registers it with the broadcast hub.",
    params(JoinParams),
    responses(
        (status = 101, description = "Switching protocols; connection joined"),
        (status = 400, description = "Not a WebSocket handshake or invalid name", body = ErrorResponse),
        (status = 503, description = "Hub is shut down", body = ErrorResponse),
    )
)]
pub async fn join_handler(
    State(state): State<AppState>,
    Query(params): Query<JoinParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, HubError> {
    let name = params.display_name()?;
    let ws = ws.map_err(|rejection| HubError::UpgradeFailed(rejection.body_text()))?;
    if state.hub.is_closed() {
        return Err(HubError::HubClosed);
    }

    let hub = state.hub;
    let settings = state.adapter_settings;
    let response = ws
        .on_failed_upgrade(|error| tracing::warn!(%error, "websocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            let (sink, source) = transport::websocket(socket);
            let mut adapter = Adapter::new(hub, name, settings);
            adapter.run(sink, source).await;
        });
    Ok(response)
}

/// `GET /room/stats`: Number of connected clients.
///
/// # Errors
///
/// Returns [`HubError::HubClosed`] when the hub is shut down.
#[utoipa::path(
    get,
    path = "/room/stats",
    tag = "Room",
    summary = "Room statistics",
    description = "Returns the size of the hub's client set.",
    responses(
        (status = 200, description = "Current stats", body = StatsResponse),
        (status = 503, description = "Hub is shut down", body = ErrorResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> Result<impl IntoResponse, HubError> {
    let clients = state.hub.client_count().await?;
    Ok((StatusCode::OK, Json(StatsResponse { clients })))
}

/// Room routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/room", get(join_handler))
        .route("/room/stats", get(stats_handler))
}
