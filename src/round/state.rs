//! Round value owned by the orchestrator for exactly one cycle.

use crate::engine::{Commitment, Probabilities, Resolution, ServerSeed, Trajectory};
use crate::errors::RoundError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundStatus {
    Creating,
    Open,
    Locked,
    Running,
    Settled,
    Cancelled,
}

impl RoundStatus {
    /// Forward-only edges; cancellation only out of OPEN
    pub fn can_transition_to(self, next: RoundStatus) -> bool {
        use RoundStatus::*;
        matches!(
            (self, next),
            (Creating, Open) | (Open, Locked) | (Open, Cancelled) | (Locked, Running) | (Running, Settled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RoundStatus::Settled | RoundStatus::Cancelled)
    }
}

/// How settlement ended for a round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// The ledger accepted the winner and revealed seed
    Finalized,
    /// Ledger unavailable or failing; settled locally only
    Degraded,
    /// Fairness check failed; closed with no ledger settlement or history
    Withheld,
}

/// Per-participant bet totals plus the overall pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetPool {
    pub by_participant: Vec<f64>,
    pub total: f64,
    pub bet_count: u64,
}

impl BetPool {
    pub fn new(participants: usize) -> Self {
        Self {
            by_participant: vec![0.0; participants],
            total: 0.0,
            bet_count: 0,
        }
    }

    pub fn record(&mut self, participant: usize, amount: f64) -> Result<(), RoundError> {
        let roster_len = self.by_participant.len();
        let slot = self
            .by_participant
            .get_mut(participant)
            .ok_or(RoundError::ParticipantOutOfRange {
                index: participant,
                roster_len,
            })?;
        *slot += amount;
        self.total += amount;
        self.bet_count += 1;
        Ok(())
    }
}

/// Where the pool used for probabilities came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolSource {
    Ledger,
    Local,
}

#[derive(Debug)]
pub struct Round {
    pub id: u64,
    status: RoundStatus,
    seed: ServerSeed,
    pub commitment: Commitment,
    /// True when the id came from the local counter rather than the ledger
    pub degraded: bool,
    pub pool: BetPool,
    pub created_at: u64,
    pub opened_at: Option<u64>,
    pub open_deadline: u64,
    pub locked_at: Option<u64>,
    pub settled_at: Option<u64>,
    resolution: Option<Resolution>,
    pub probabilities: Option<Probabilities>,
    pub pool_source: Option<PoolSource>,
    trajectory: Option<Trajectory>,
    pub settlement: Option<SettlementOutcome>,
    revealed: bool,
}

impl Round {
    pub fn new(
        id: u64,
        seed: ServerSeed,
        commitment: Commitment,
        degraded: bool,
        participants: usize,
        created_at: u64,
        open_deadline: u64,
    ) -> Self {
        Self {
            id,
            status: RoundStatus::Creating,
            seed,
            commitment,
            degraded,
            pool: BetPool::new(participants),
            created_at,
            opened_at: None,
            open_deadline,
            locked_at: None,
            settled_at: None,
            resolution: None,
            probabilities: None,
            pool_source: None,
            trajectory: None,
            settlement: None,
            revealed: false,
        }
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn advance(&mut self, next: RoundStatus) -> Result<(), RoundError> {
        if !self.status.can_transition_to(next) {
            return Err(RoundError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Enter OPEN; the deadline counts from the same instant as `opened_at`
    pub fn open(&mut self, opened_at: u64, window_ms: u64) -> Result<(), RoundError> {
        self.advance(RoundStatus::Open)?;
        self.opened_at = Some(opened_at);
        self.open_deadline = opened_at.saturating_add(window_ms);
        Ok(())
    }

    pub fn seed(&self) -> &ServerSeed {
        &self.seed
    }

    pub fn winner(&self) -> Option<usize> {
        self.resolution.map(|r| r.winner)
    }

    /// Fix the outcome; a round gets exactly one
    pub fn set_resolution(&mut self, resolution: Resolution, probabilities: Probabilities) -> Result<(), RoundError> {
        if self.resolution.is_some() {
            return Err(RoundError::AlreadySet {
                round_id: self.id,
                field: "winner",
            });
        }
        self.resolution = Some(resolution);
        self.probabilities = Some(probabilities);
        Ok(())
    }

    pub fn set_trajectory(&mut self, trajectory: Trajectory) -> Result<(), RoundError> {
        if self.trajectory.is_some() {
            return Err(RoundError::AlreadySet {
                round_id: self.id,
                field: "trajectory",
            });
        }
        self.trajectory = Some(trajectory);
        Ok(())
    }

    /// Mark the seed public; only valid once the round is past betting
    pub fn reveal(&mut self) -> Result<&ServerSeed, RoundError> {
        if !matches!(self.status, RoundStatus::Running | RoundStatus::Settled) {
            return Err(RoundError::IllegalTransition {
                from: self.status,
                to: RoundStatus::Settled,
            });
        }
        self.revealed = true;
        Ok(&self.seed)
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Public view; seed, winner and probabilities stay out until the reveal
    pub fn snapshot(&self) -> RoundSnapshot {
        let revealed = self.revealed;
        RoundSnapshot {
            id: self.id,
            status: self.status,
            commitment_hash: self.commitment,
            degraded: self.degraded,
            created_at: self.created_at,
            opened_at: self.opened_at,
            open_deadline: self.open_deadline,
            locked_at: self.locked_at,
            settled_at: self.settled_at,
            total_pool: self.pool.total,
            bet_count: self.pool.bet_count,
            pools: self.pool.by_participant.clone(),
            trajectory: self.trajectory.clone(),
            winner: self.winner().filter(|_| revealed),
            random_value: self.resolution.map(|r| r.random_value).filter(|_| revealed),
            probabilities: self.probabilities.clone().filter(|_| revealed),
            seed: revealed.then(|| self.seed.reveal_hex()),
            settlement: self.settlement,
        }
    }
}

/// Read-only copy of a round published to queries and new clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub id: u64,
    pub status: RoundStatus,
    pub commitment_hash: Commitment,
    pub degraded: bool,
    pub created_at: u64,
    pub opened_at: Option<u64>,
    pub open_deadline: u64,
    pub locked_at: Option<u64>,
    pub settled_at: Option<u64>,
    pub total_pool: f64,
    pub bet_count: u64,
    pub pools: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trajectory: Option<Trajectory>,
    pub winner: Option<usize>,
    pub random_value: Option<f64>,
    pub probabilities: Option<Probabilities>,
    pub seed: Option<String>,
    pub settlement: Option<SettlementOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round() -> Round {
        let seed = ServerSeed::from_bytes([3u8; 32]);
        let commitment = seed.commitment();
        Round::new(1, seed, commitment, false, 6, 0, 120_000)
    }

    #[test]
    fn test_forward_only_transitions() {
        let mut r = round();
        r.advance(RoundStatus::Open).unwrap();
        r.advance(RoundStatus::Locked).unwrap();
        assert_eq!(
            r.advance(RoundStatus::Open),
            Err(RoundError::IllegalTransition {
                from: RoundStatus::Locked,
                to: RoundStatus::Open
            })
        );
        r.advance(RoundStatus::Running).unwrap();
        r.advance(RoundStatus::Settled).unwrap();
        assert!(r.status().is_terminal());
    }

    #[test]
    fn test_open_deadline_counts_from_open() {
        let mut r = round();
        r.open(5_000, 120_000).unwrap();
        assert_eq!(r.status(), RoundStatus::Open);
        assert_eq!(r.opened_at, Some(5_000));
        assert_eq!(r.open_deadline, 125_000);
        assert!(r.open(6_000, 120_000).is_err());
        assert_eq!(r.open_deadline, 125_000);
    }

    #[test]
    fn test_cancel_only_from_open() {
        use RoundStatus::*;
        assert!(Open.can_transition_to(Cancelled));
        for from in [Creating, Locked, Running, Settled, Cancelled] {
            assert!(!from.can_transition_to(Cancelled), "{:?}", from);
        }
    }

    #[test]
    fn test_resolution_set_once() {
        let mut r = round();
        let res = Resolution { winner: 2, random_value: 0.4 };
        let p = Probabilities::new(vec![1.0 / 6.0; 6]);
        r.set_resolution(res, p.clone()).unwrap();
        assert!(r.set_resolution(res, p).is_err());
        assert_eq!(r.winner(), Some(2));
    }

    #[test]
    fn test_reveal_refused_while_open() {
        let mut r = round();
        r.advance(RoundStatus::Open).unwrap();
        assert!(r.reveal().is_err());
        assert!(!r.is_revealed());
    }

    #[test]
    fn test_snapshot_hides_outcome_until_reveal() {
        let mut r = round();
        r.advance(RoundStatus::Open).unwrap();
        r.advance(RoundStatus::Locked).unwrap();
        r.advance(RoundStatus::Running).unwrap();
        r.set_resolution(
            Resolution { winner: 4, random_value: 0.9 },
            Probabilities::new(vec![1.0 / 6.0; 6]),
        )
        .unwrap();

        let hidden = r.snapshot();
        assert_eq!(hidden.winner, None);
        assert_eq!(hidden.seed, None);
        assert_eq!(hidden.probabilities, None);

        r.reveal().unwrap();
        let shown = r.snapshot();
        assert_eq!(shown.winner, Some(4));
        assert_eq!(shown.seed, Some(hex::encode([3u8; 32])));
    }

    #[test]
    fn test_pool_record() {
        let mut pool = BetPool::new(3);
        pool.record(1, 0.5).unwrap();
        pool.record(1, 0.25).unwrap();
        assert!(pool.record(3, 1.0).is_err());
        assert_eq!(pool.by_participant, vec![0.0, 0.75, 0.0]);
        assert_eq!(pool.total, 0.75);
        assert_eq!(pool.bet_count, 2);
    }
}
