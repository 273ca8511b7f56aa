//! In-process ledger replica.
//!
//! Enforces the parts of the contract the orchestrator can observe: status
//! progression, per-participant pools, and the `keccak256(bytes32 seed)`
//! check on settlement. Used for local runs and tests; it can be taken
//! offline to exercise degraded mode.

use super::{LedgerGateway, LedgerRound, LedgerRoundStatus};
use crate::engine::{seed, Commitment, ServerSeed};
use crate::errors::LedgerError;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::{SystemTime, UNIX_EPOCH},
};

struct RoundEntry {
    record: LedgerRound,
    pools: Vec<f64>,
}

struct LedgerState {
    next_round_id: u64,
    rounds: HashMap<u64, RoundEntry>,
}

pub struct SimulatedLedger {
    participants: usize,
    online: AtomicBool,
    state: Mutex<LedgerState>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl SimulatedLedger {
    pub fn new(participants: usize) -> Self {
        Self {
            participants,
            online: AtomicBool::new(true),
            state: Mutex::new(LedgerState {
                next_round_id: 1,
                rounds: HashMap::new(),
            }),
        }
    }

    /// Toggle reachability; while offline every call fails with `Unavailable`
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), LedgerError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("simulated ledger offline".to_string()))
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>) -> Result<T, LedgerError> {
        self.check_online()?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger state poisoned".to_string()))?;
        f(&mut state)
    }

    /// Record a bet the way a player's on-chain transaction would
    pub fn place_bet(&self, round_id: u64, participant: usize, amount: f64) -> Result<(), LedgerError> {
        let participants = self.participants;
        self.with_state(|state| {
            let entry = state
                .rounds
                .get_mut(&round_id)
                .ok_or(LedgerError::UnknownRound(round_id))?;
            if entry.record.status != LedgerRoundStatus::Open {
                return Err(LedgerError::call_failed("placeBet", "Round not open for bets"));
            }
            if participant >= participants {
                return Err(LedgerError::call_failed("placeBet", "Invalid participant"));
            }
            entry.pools[participant] += amount;
            entry.record.total_pool += amount;
            Ok(())
        })
    }
}

#[async_trait]
impl LedgerGateway for SimulatedLedger {
    async fn create_round(&self, commitment: &Commitment) -> Result<u64, LedgerError> {
        let participants = self.participants;
        self.with_state(|state| {
            let id = state.next_round_id;
            state.next_round_id += 1;
            state.rounds.insert(
                id,
                RoundEntry {
                    record: LedgerRound {
                        id,
                        created_at: now_secs(),
                        locked_at: None,
                        settled_at: None,
                        status: LedgerRoundStatus::Open,
                        winning_participant: None,
                        total_pool: 0.0,
                        commitment: *commitment,
                        revealed_seed: None,
                    },
                    pools: vec![0.0; participants],
                },
            );
            Ok(id)
        })
    }

    async fn lock_round(&self, round_id: u64) -> Result<(), LedgerError> {
        self.with_state(|state| {
            let entry = state
                .rounds
                .get_mut(&round_id)
                .ok_or(LedgerError::UnknownRound(round_id))?;
            if entry.record.status != LedgerRoundStatus::Open {
                return Err(LedgerError::call_failed("lockRound", "Round not open"));
            }
            entry.record.status = LedgerRoundStatus::Locked;
            entry.record.locked_at = Some(now_secs());
            Ok(())
        })
    }

    async fn settle_round(&self, round_id: u64, winner: usize, revealed: &ServerSeed) -> Result<(), LedgerError> {
        let participants = self.participants;
        self.with_state(|state| {
            let entry = state
                .rounds
                .get_mut(&round_id)
                .ok_or(LedgerError::UnknownRound(round_id))?;
            if entry.record.status != LedgerRoundStatus::Locked {
                return Err(LedgerError::call_failed("settleRound", "Round not locked"));
            }
            if winner >= participants {
                return Err(LedgerError::call_failed("settleRound", "Invalid participant"));
            }
            if !seed::verify(revealed, &entry.record.commitment) {
                return Err(LedgerError::CommitmentRejected { round_id });
            }
            entry.record.status = LedgerRoundStatus::Settled;
            entry.record.settled_at = Some(now_secs());
            entry.record.winning_participant = Some(winner);
            entry.record.revealed_seed = Some(revealed.reveal_bytes32());
            Ok(())
        })
    }

    async fn get_round_participant_pool(&self, round_id: u64, participant: usize) -> Result<f64, LedgerError> {
        self.with_state(|state| {
            let entry = state
                .rounds
                .get(&round_id)
                .ok_or(LedgerError::UnknownRound(round_id))?;
            entry
                .pools
                .get(participant)
                .copied()
                .ok_or_else(|| LedgerError::call_failed("getRoundParticipantPool", "Invalid participant"))
        })
    }

    async fn get_current_round_id(&self) -> Result<u64, LedgerError> {
        self.with_state(|state| Ok(state.next_round_id.saturating_sub(1)))
    }

    async fn get_round(&self, round_id: u64) -> Result<LedgerRound, LedgerError> {
        self.with_state(|state| {
            state
                .rounds
                .get(&round_id)
                .map(|entry| entry.record.clone())
                .ok_or(LedgerError::UnknownRound(round_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_round_on_ledger() {
        let ledger = SimulatedLedger::new(6);
        let seed = ServerSeed::from_bytes([5u8; 32]);

        let id = ledger.create_round(&seed.commitment()).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(ledger.get_current_round_id().await.unwrap(), 1);

        ledger.place_bet(id, 2, 0.1).unwrap();
        ledger.lock_round(id).await.unwrap();
        assert!(ledger.place_bet(id, 2, 0.1).is_err());

        ledger.settle_round(id, 2, &seed).await.unwrap();
        let round = ledger.get_round(id).await.unwrap();
        assert_eq!(round.status, LedgerRoundStatus::Settled);
        assert_eq!(round.winning_participant, Some(2));
        assert_eq!(round.total_pool, 0.1);
        assert_eq!(round.revealed_seed, Some(seed.reveal_bytes32()));
    }

    #[tokio::test]
    async fn test_settle_rejects_wrong_seed() {
        let ledger = SimulatedLedger::new(6);
        let seed = ServerSeed::from_bytes([5u8; 32]);
        let id = ledger.create_round(&seed.commitment()).await.unwrap();
        ledger.lock_round(id).await.unwrap();

        let other = ServerSeed::from_bytes([6u8; 32]);
        assert_eq!(
            ledger.settle_round(id, 0, &other).await.unwrap_err(),
            LedgerError::CommitmentRejected { round_id: id }
        );
    }

    #[tokio::test]
    async fn test_settle_requires_lock() {
        let ledger = SimulatedLedger::new(6);
        let seed = ServerSeed::from_bytes([5u8; 32]);
        let id = ledger.create_round(&seed.commitment()).await.unwrap();
        assert!(ledger.settle_round(id, 0, &seed).await.is_err());
    }

    #[tokio::test]
    async fn test_offline_ledger_is_unavailable() {
        let ledger = SimulatedLedger::new(6);
        ledger.set_online(false);
        let seed = ServerSeed::from_bytes([5u8; 32]);
        assert!(matches!(
            ledger.create_round(&seed.commitment()).await,
            Err(LedgerError::Unavailable(_))
        ));
    }
}
