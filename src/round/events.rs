//! Outbound round events and the broadcast bus they travel on.

use super::state::RoundSnapshot;
use crate::engine::{Commitment, Probabilities, Trajectory};
use crate::roster::ParticipantSummary;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Event payloads as clients receive them, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RoundEvent {
    #[serde(rename = "round:created", rename_all = "camelCase")]
    Created {
        id: u64,
        participants: Vec<ParticipantSummary>,
        open_deadline: u64,
        commitment_hash: Commitment,
    },

    #[serde(rename = "round:countdown", rename_all = "camelCase")]
    Countdown {
        round_id: u64,
        remaining: u64,
        total_pool: f64,
        bet_count: u64,
    },

    #[serde(rename = "round:locked")]
    Locked { id: u64 },

    /// Carries the animation only; the winner stays hidden until `Result`
    #[serde(rename = "round:started", rename_all = "camelCase")]
    Started {
        round_id: u64,
        trajectory: Trajectory,
        duration: u64,
    },

    #[serde(rename = "round:result", rename_all = "camelCase")]
    Result {
        round_id: u64,
        winner: usize,
        winner_name: String,
        probabilities: Probabilities,
        seed: String,
        commitment_hash: Commitment,
        random_value: f64,
    },

    #[serde(rename = "round:settled")]
    Settled { id: u64 },

    #[serde(rename = "round:skipped", rename_all = "camelCase")]
    Skipped { round_id: u64, message: String },

    #[serde(rename = "round:cooldown", rename_all = "camelCase")]
    Cooldown { next_round_in: u64 },

    #[serde(rename = "round:error")]
    Error { message: String, code: String },

    /// Sent to a single client when it connects
    #[serde(rename = "round:state")]
    State { round: Option<RoundSnapshot> },

    #[serde(rename = "bet:confirmed", rename_all = "camelCase")]
    BetConfirmed {
        round_id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_ref: Option<String>,
    },

    #[serde(rename = "bet:error")]
    BetError { error: String },

    #[serde(rename = "bet:update", rename_all = "camelCase")]
    BetUpdate { round_id: u64, total_pool: f64 },
}

impl RoundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RoundEvent::Created { .. } => "round:created",
            RoundEvent::Countdown { .. } => "round:countdown",
            RoundEvent::Locked { .. } => "round:locked",
            RoundEvent::Started { .. } => "round:started",
            RoundEvent::Result { .. } => "round:result",
            RoundEvent::Settled { .. } => "round:settled",
            RoundEvent::Skipped { .. } => "round:skipped",
            RoundEvent::Cooldown { .. } => "round:cooldown",
            RoundEvent::Error { .. } => "round:error",
            RoundEvent::State { .. } => "round:state",
            RoundEvent::BetConfirmed { .. } => "bet:confirmed",
            RoundEvent::BetError { .. } => "bet:error",
            RoundEvent::BetUpdate { .. } => "bet:update",
        }
    }
}

/// Fan-out of [`RoundEvent`]s to every subscriber
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RoundEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers; returns how many received it
    pub fn send(&self, event: RoundEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(event = kind, "no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
