//! Request Handlers

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::*,
};
use crate::capability::Capability;
use crate::config::PaddockConfig;
use crate::metrics::RoundMetrics;
use crate::round::{BetRejection, BetSubmission, OrchestratorHandle};
use crate::store::RoundStore;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared application state
pub struct AppState {
    pub rounds: OrchestratorHandle,
    pub store: Capability<Arc<dyn RoundStore>>,
    pub metrics: Arc<RoundMetrics>,
    pub config: PaddockConfig,
    pub ledger_available: bool,
    pub version: String,
}

/// GET /api/health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ledger = if state.ledger_available { "available" } else { "unavailable" };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        ledger: ledger.to_string(),
        current_round: state.rounds.current_round().map(|r| r.id),
        timestamp: Utc::now(),
    })
}

/// GET /api/participants
pub async fn participants_handler(State(state): State<Arc<AppState>>) -> Json<ParticipantsResponse> {
    Json(ParticipantsResponse {
        participants: state.rounds.roster().iter().cloned().collect(),
    })
}

/// GET /api/round/current
pub async fn current_round_handler(State(state): State<Arc<AppState>>) -> Json<CurrentRoundResponse> {
    Json(CurrentRoundResponse {
        round: state.rounds.current_round(),
    })
}

/// GET /api/rounds/:id
pub async fn round_by_id_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<u64>,
) -> Result<Json<RoundResponse>, ApiError> {
    if let Some(round) = state.rounds.current_round().filter(|r| r.id == round_id) {
        return Ok(Json(RoundResponse { round }));
    }

    let missing = || ApiError::not_found(request_id.0.clone(), format!("Round {} not found", round_id));
    let Capability::Available(store) = &state.store else {
        return Err(missing());
    };
    match store.load_snapshot(round_id).await {
        Ok(Some(round)) => Ok(Json(RoundResponse { round })),
        Ok(None) => Err(missing()),
        Err(e) => {
            warn!(request_id = %request_id.0, round_id, error = %e, "Round lookup failed");
            Err(ApiError::service_unavailable(request_id.0.clone(), "Round store unavailable".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/round/history?limit={n}
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if params.limit == Some(0) {
        return Err(ApiError::bad_request(request_id.0, "limit must be positive".to_string()));
    }
    Ok(Json(HistoryResponse {
        rounds: state.rounds.recent_history(params.limit),
    }))
}

/// GET /api/config
pub async fn config_handler(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let config = &state.config;
    Json(ConfigResponse {
        bet_window_ms: config.round.bet_window_ms,
        race_duration_ms: config.round.race_duration_ms,
        countdown_interval_ms: config.round.countdown_interval_ms,
        cooldown_ms: config.round.cooldown_ms,
        min_bet: config.betting.min_bet,
        max_bet: config.betting.max_bet,
        house_edge: config.betting.edge_factor,
        participant_count: state.rounds.roster().len(),
    })
}

/// POST /api/bets
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BetSubmission>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(submission) = payload.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;

    let reply = state.rounds.submit_bet(submission).await;
    let status = match &reply {
        Ok(_) => StatusCode::OK,
        Err(BetRejection::ServiceUnavailable) => {
            return Err(ApiError::service_unavailable(
                request_id.0,
                BetRejection::ServiceUnavailable.to_string(),
            ));
        }
        Err(BetRejection::RoundNotOpen | BetRejection::OutsideWindow | BetRejection::RoundMismatch { .. }) => {
            StatusCode::CONFLICT
        }
        Err(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    if let Err(rejection) = &reply {
        debug!(request_id = %request_id.0, reason = %rejection, "Bet rejected");
    }
    Ok((status, Json(BetResponse::from(&reply))).into_response())
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.to_prometheus_format(),
    )
        .into_response()
}
