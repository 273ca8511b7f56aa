//! API Response Models

use crate::roster::Participant;
use crate::round::{BetRejection, BetReply, RoundSnapshot};
use crate::store::RoundRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ledger: String,
    pub current_round: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsResponse {
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRoundResponse {
    pub round: Option<RoundSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResponse {
    pub round: RoundSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub rounds: Vec<RoundRecord>,
}

/// Timings and bet bounds clients need to render a round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub bet_window_ms: u64,
    pub race_duration_ms: u64,
    pub countdown_interval_ms: u64,
    pub cooldown_ms: u64,
    pub min_bet: f64,
    pub max_bet: f64,
    pub house_edge: f64,
    pub participant_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BetResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pool: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl BetResponse {
    pub fn rejected(rejection: &BetRejection) -> Self {
        Self {
            success: false,
            round_id: None,
            total_pool: None,
            error: Some(rejection.to_string()),
            code: Some(rejection.code().to_string()),
        }
    }
}

impl From<&BetReply> for BetResponse {
    fn from(reply: &BetReply) -> Self {
        match reply {
            Ok(receipt) => Self {
                success: true,
                round_id: Some(receipt.round_id),
                total_pool: Some(receipt.total_pool),
                error: None,
                code: None,
            },
            Err(rejection) => Self::rejected(rejection),
        }
    }
}
