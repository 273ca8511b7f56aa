//! Settlement ledger seam
//!
//! The orchestrator only depends on [`LedgerGateway`]; the contract's own
//! logic lives elsewhere. Every call goes through [`LedgerClient`], which
//! bounds it with a timeout so an unreachable ledger degrades the round
//! instead of stalling it.

pub mod simulated;

use crate::engine::{Commitment, ServerSeed};
use crate::errors::LedgerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};

pub use simulated::SimulatedLedger;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerRoundStatus {
    Open,
    Locked,
    Settled,
    Cancelled,
}

/// Round record as the ledger reports it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRound {
    pub id: u64,
    pub created_at: u64,
    pub locked_at: Option<u64>,
    pub settled_at: Option<u64>,
    pub status: LedgerRoundStatus,
    pub winning_participant: Option<usize>,
    pub total_pool: f64,
    pub commitment: Commitment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revealed_seed: Option<String>,
}

/// Operations consumed from the settlement contract
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Register a new round under `commitment` and return its id
    async fn create_round(&self, commitment: &Commitment) -> Result<u64, LedgerError>;

    async fn lock_round(&self, round_id: u64) -> Result<(), LedgerError>;

    /// Finalize the winner; the ledger recomputes the commitment from `seed`
    async fn settle_round(&self, round_id: u64, winner: usize, seed: &ServerSeed) -> Result<(), LedgerError>;

    async fn get_round_participant_pool(&self, round_id: u64, participant: usize) -> Result<f64, LedgerError>;

    async fn get_current_round_id(&self) -> Result<u64, LedgerError>;

    async fn get_round(&self, round_id: u64) -> Result<LedgerRound, LedgerError>;
}

/// Timeout-bounded handle the orchestrator calls through
#[derive(Clone)]
pub struct LedgerClient {
    gateway: Arc<dyn LedgerGateway>,
    timeout: Duration,
}

impl LedgerClient {
    pub fn new(gateway: Arc<dyn LedgerGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    async fn bounded<T, F>(&self, call: &'static str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Unavailable(format!(
                "{} timed out after {}ms",
                call,
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn create_round(&self, commitment: &Commitment) -> Result<u64, LedgerError> {
        self.bounded("createRound", self.gateway.create_round(commitment)).await
    }

    pub async fn lock_round(&self, round_id: u64) -> Result<(), LedgerError> {
        self.bounded("lockRound", self.gateway.lock_round(round_id)).await
    }

    pub async fn settle_round(&self, round_id: u64, winner: usize, seed: &ServerSeed) -> Result<(), LedgerError> {
        self.bounded("settleRound", self.gateway.settle_round(round_id, winner, seed))
            .await
    }

    /// Per-participant pools for the whole roster; fails if any single lookup fails
    pub async fn participant_pools(&self, round_id: u64, participants: usize) -> Result<Vec<f64>, LedgerError> {
        let mut pools = Vec::with_capacity(participants);
        for index in 0..participants {
            let amount = self
                .bounded(
                    "getRoundParticipantPool",
                    self.gateway.get_round_participant_pool(round_id, index),
                )
                .await?;
            pools.push(amount);
        }
        Ok(pools)
    }

    pub async fn current_round_id(&self) -> Result<u64, LedgerError> {
        self.bounded("getCurrentRoundId", self.gateway.get_current_round_id())
            .await
    }

    pub async fn get_round(&self, round_id: u64) -> Result<LedgerRound, LedgerError> {
        self.bounded("getRound", self.gateway.get_round(round_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hanging;

    #[async_trait]
    impl LedgerGateway for Hanging {
        async fn create_round(&self, _c: &Commitment) -> Result<u64, LedgerError> {
            std::future::pending().await
        }
        async fn lock_round(&self, _id: u64) -> Result<(), LedgerError> {
            std::future::pending().await
        }
        async fn settle_round(&self, _id: u64, _w: usize, _s: &ServerSeed) -> Result<(), LedgerError> {
            std::future::pending().await
        }
        async fn get_round_participant_pool(&self, _id: u64, _p: usize) -> Result<f64, LedgerError> {
            std::future::pending().await
        }
        async fn get_current_round_id(&self) -> Result<u64, LedgerError> {
            std::future::pending().await
        }
        async fn get_round(&self, _id: u64) -> Result<LedgerRound, LedgerError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_ledger_times_out() {
        let client = LedgerClient::new(Arc::new(Hanging), Duration::from_secs(5));
        let seed = ServerSeed::from_bytes([1u8; 32]);
        let err = client.create_round(&seed.commitment()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_participant_pools_reads_every_entrant() {
        let ledger = Arc::new(SimulatedLedger::new(3));
        let seed = ServerSeed::from_bytes([2u8; 32]);
        let id = ledger.create_round(&seed.commitment()).await.unwrap();
        ledger.place_bet(id, 1, 0.5).unwrap();
        ledger.place_bet(id, 2, 0.25).unwrap();

        let client = LedgerClient::new(ledger, Duration::from_secs(1));
        assert_eq!(client.participant_pools(id, 3).await.unwrap(), vec![0.0, 0.5, 0.25]);
    }
}
