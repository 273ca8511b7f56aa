//! Route Definitions

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/participants", get(participants_handler))
        .route("/api/round/current", get(current_round_handler))
        .route("/api/round/history", get(history_handler))
        .route("/api/rounds/:id", get(round_by_id_handler))
        .route("/api/config", get(config_handler))
        .route("/api/bets", post(place_bet_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}
