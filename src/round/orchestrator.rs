//! Round lifecycle driver.
//!
//! One task owns the current [`Round`] and is the only writer of it. Each
//! cycle runs CREATING, OPEN, LOCKED, RUNNING, SETTLED and COOLDOWN in
//! order, or cancels out of OPEN when no bets arrived. Bets reach the
//! round through the command channel; queries read the `watch` snapshots.
//! A failing cycle is reported and followed by a fresh one.

use super::bets::{BetCommand, BetLimits, BetReceipt, BetRejection, BetReply, BetSubmission, BetSubmitter};
use super::events::{EventBus, RoundEvent};
use super::state::{PoolSource, Round, RoundSnapshot, RoundStatus, SettlementOutcome};
use crate::capability::Capability;
use crate::config::{LedgerConfig, PaddockConfig, RoundConfig};
use crate::engine::{self, ProbabilityModel, TrajectorySynthesizer};
use crate::errors::{ConfigError, LedgerError, PaddockError, PaddockResult, RoundError};
use crate::ledger::{LedgerClient, LedgerRoundStatus};
use crate::metrics::RoundMetrics;
use crate::roster::Roster;
use crate::store::{RoundRecord, RoundStore};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

pub const FAIRNESS_VIOLATION: &str = "FAIRNESS_VIOLATION";

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

fn error_code(err: &PaddockError) -> &'static str {
    match err {
        PaddockError::Ledger(_) => "LEDGER_ERROR",
        PaddockError::Trajectory(_) => "TRAJECTORY_ERROR",
        _ => "RACE_ERROR",
    }
}

/// Read side handed to the API layer
#[derive(Clone)]
pub struct OrchestratorHandle {
    submitter: BetSubmitter,
    current: watch::Receiver<Option<RoundSnapshot>>,
    history: watch::Receiver<VecDeque<RoundRecord>>,
    events: EventBus,
    roster: Roster,
    query_limit: usize,
}

impl OrchestratorHandle {
    pub async fn submit_bet(&self, submission: BetSubmission) -> BetReply {
        self.submitter.submit(submission).await
    }

    pub fn current_round(&self) -> Option<RoundSnapshot> {
        self.current.borrow().clone()
    }

    /// Newest first, capped at the configured query limit
    pub fn recent_history(&self, limit: Option<usize>) -> Vec<RoundRecord> {
        let take = limit.unwrap_or(self.query_limit).min(self.query_limit);
        self.history.borrow().iter().take(take).cloned().collect()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }
}

pub struct Orchestrator {
    timings: RoundConfig,
    ledger_config: LedgerConfig,
    limits: BetLimits,
    roster: Roster,
    model: ProbabilityModel,
    synthesizer: TrajectorySynthesizer,
    ledger: Capability<LedgerClient>,
    store: Capability<Arc<dyn RoundStore>>,
    events: EventBus,
    metrics: Arc<RoundMetrics>,
    commands: mpsc::Receiver<BetCommand>,
    current: watch::Sender<Option<RoundSnapshot>>,
    history: watch::Sender<VecDeque<RoundRecord>>,
    last_round_id: u64,
}

impl Orchestrator {
    pub fn new(
        config: &PaddockConfig,
        roster: Roster,
        ledger: Capability<LedgerClient>,
        store: Capability<Arc<dyn RoundStore>>,
        events: EventBus,
        metrics: Arc<RoundMetrics>,
    ) -> PaddockResult<(Self, OrchestratorHandle)> {
        if config.round.countdown_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "round.countdown_interval_ms".to_string(),
                value: "0".to_string(),
                reason: "Countdown interval cannot be zero".to_string(),
            }
            .into());
        }
        let edge_factor = config.betting.edge_factor;
        let model = ProbabilityModel::with_edge_factor(roster.clone(), edge_factor).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "betting.edge_factor".to_string(),
                value: edge_factor.to_string(),
                reason: "Edge factor must be in [0, 1]".to_string(),
            }
        })?;

        let (submitter, commands) = BetSubmitter::channel(config.betting.command_capacity);
        let (current_tx, current_rx) = watch::channel(None);
        let (history_tx, history_rx) = watch::channel(VecDeque::new());

        let handle = OrchestratorHandle {
            submitter,
            current: current_rx,
            history: history_rx,
            events: events.clone(),
            roster: roster.clone(),
            query_limit: config.round.history_query_limit,
        };

        let orchestrator = Self {
            timings: config.round.clone(),
            ledger_config: config.ledger.clone(),
            limits: BetLimits {
                min: config.betting.min_bet,
                max: config.betting.max_bet,
            },
            synthesizer: TrajectorySynthesizer::new(roster.clone()),
            roster,
            model,
            ledger,
            store,
            events,
            metrics,
            commands,
            current: current_tx,
            history: history_tx,
            last_round_id: 0,
        };
        Ok((orchestrator, handle))
    }

    /// Drive rounds until the task is dropped
    pub async fn run(mut self) {
        self.probe_ledger().await;
        self.restore_history().await;

        loop {
            if let Err(e) = self.run_cycle().await {
                self.metrics.record_cycle_error();
                error!(error = %e, "Round cycle failed, restarting after error delay");
                self.events.send(RoundEvent::Error {
                    message: e.to_string(),
                    code: error_code(&e).to_string(),
                });
                self.idle(self.timings.error_delay()).await;
            }
        }
    }

    async fn probe_ledger(&mut self) {
        let Capability::Available(ledger) = &self.ledger else {
            warn!("No ledger configured, rounds will settle locally");
            return;
        };
        match ledger.current_round_id().await {
            Ok(id) => {
                self.last_round_id = self.last_round_id.max(id);
                info!(current_round_id = id, "Ledger reachable");
            }
            Err(e) => warn!(error = %e, "Ledger probe failed, continuing in degraded mode"),
        }
    }

    async fn restore_history(&mut self) {
        let Capability::Available(store) = &self.store else {
            return;
        };
        match store.recent_history(self.timings.history_capacity).await {
            Ok(records) => {
                debug!(count = records.len(), "Restored round history");
                if let Some(newest) = records.first() {
                    self.last_round_id = self.last_round_id.max(newest.id);
                }
                self.history.send_replace(records.into_iter().collect());
            }
            Err(e) => debug!(error = %e, "Round history not restored"),
        }
    }

    async fn run_cycle(&mut self) -> PaddockResult<()> {
        let mut round = self.create_round().await?;

        // OPEN
        let opened = Instant::now();
        round.open(now_ms(), self.timings.bet_window_ms)?;
        let deadline = opened + self.timings.bet_window();
        self.publish(&round);
        self.events.send(RoundEvent::Created {
            id: round.id,
            participants: self.roster.summaries(),
            open_deadline: round.open_deadline,
            commitment_hash: round.commitment,
        });
        info!(round_id = round.id, commitment = %round.commitment, "Betting open");

        self.run_open_window(&mut round, opened, deadline).await;

        if round.pool.bet_count == 0 {
            round.advance(RoundStatus::Cancelled)?;
            self.publish(&round);
            self.persist(&round).await;
            self.metrics.record_round_skipped();
            info!(round_id = round.id, "No bets placed, skipping race");
            self.events.send(RoundEvent::Skipped {
                round_id: round.id,
                message: "No bets placed, skipping race".to_string(),
            });
            self.idle(self.timings.skip_delay()).await;
            return Ok(());
        }

        // LOCKED
        round.advance(RoundStatus::Locked)?;
        round.locked_at = Some(now_ms());
        self.lock_on_ledger(&round).await;
        self.publish(&round);
        self.events.send(RoundEvent::Locked { id: round.id });
        info!(
            round_id = round.id,
            total_pool = round.pool.total,
            bet_count = round.pool.bet_count,
            "Betting locked"
        );
        self.idle(self.timings.lock_delay()).await;

        // RUNNING
        let (pools, source) = self.bet_distribution(&round).await;
        let probabilities = self.model.compute_probabilities(&pools);
        let resolution = engine::determine_winner(round.seed(), round.id, &probabilities);
        round.advance(RoundStatus::Running)?;
        round.set_resolution(resolution, probabilities.clone())?;
        round.pool_source = Some(source);

        let duration = self.timings.race_duration_ms;
        let trajectory = {
            let mut rng = rand::thread_rng();
            self.synthesizer.generate(resolution.winner, duration, &mut rng)?
        };
        round.set_trajectory(trajectory.clone())?;
        self.publish(&round);
        self.events.send(RoundEvent::Started {
            round_id: round.id,
            trajectory,
            duration,
        });
        info!(round_id = round.id, pool_source = ?source, "Race started");

        self.idle(self.timings.race_duration() + self.timings.result_buffer())
            .await;

        let seed_hex = round.reveal()?.reveal_hex();
        let winner = resolution.winner;
        let winner_name = self.roster.name_of(winner).to_string();
        self.publish(&round);
        self.events.send(RoundEvent::Result {
            round_id: round.id,
            winner,
            winner_name: winner_name.clone(),
            probabilities,
            seed: seed_hex,
            commitment_hash: round.commitment,
            random_value: resolution.random_value,
        });
        info!(round_id = round.id, winner, winner_name = %winner_name, "Result revealed");

        // SETTLED
        let outcome = self.settle(&round).await?;
        round.settlement = Some(outcome);
        round.advance(RoundStatus::Settled)?;
        let settled_at = now_ms();
        round.settled_at = Some(settled_at);
        self.publish(&round);
        self.persist(&round).await;

        if outcome == SettlementOutcome::Withheld {
            warn!(round_id = round.id, "Settlement withheld, round closed without history");
        } else {
            let record = RoundRecord {
                id: round.id,
                winner,
                winner_name,
                total_pool: round.pool.total,
                settled_at,
            };
            self.record_history(record).await;

            if outcome == SettlementOutcome::Degraded {
                self.metrics.record_round_degraded();
            }
            self.metrics.record_round_settled();
            self.events.send(RoundEvent::Settled { id: round.id });
            info!(round_id = round.id, outcome = ?outcome, "Round settled");
        }

        // COOLDOWN
        self.events.send(RoundEvent::Cooldown {
            next_round_in: self.timings.cooldown_ms,
        });
        self.idle(self.timings.cooldown()).await;
        Ok(())
    }

    async fn create_round(&mut self) -> PaddockResult<Round> {
        let seed = engine::generate_seed();
        let commitment = seed.commitment();

        let ledger_id = match &self.ledger {
            Capability::Available(ledger) => match ledger.create_round(&commitment).await {
                Ok(id) => Some(id),
                Err(e) => {
                    self.metrics.record_ledger_failure();
                    warn!(error = %e, "createRound failed, using local round id");
                    None
                }
            },
            Capability::Unavailable => None,
        };
        let degraded = ledger_id.is_none();
        let id = match ledger_id {
            Some(id) => id,
            None => self.next_local_id(),
        };
        self.last_round_id = self.last_round_id.max(id);

        let created_at = now_ms();
        let open_deadline = created_at + self.timings.bet_window_ms;
        let round = Round::new(id, seed, commitment, degraded, self.roster.len(), created_at, open_deadline);

        self.persist(&round).await;
        self.metrics.record_round_created();
        debug!(round_id = id, degraded, "Round created");
        Ok(round)
    }

    /// Strictly increasing, and at least the wall clock in ms
    fn next_local_id(&mut self) -> u64 {
        let id = self.last_round_id.saturating_add(1).max(now_ms());
        self.last_round_id = id;
        id
    }

    async fn run_open_window(&mut self, round: &mut Round, opened: Instant, deadline: Instant) {
        let every = self.timings.countdown_interval();
        let mut countdown = interval_at(opened + every, every);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let close = sleep_until(deadline);
        tokio::pin!(close);

        loop {
            tokio::select! {
                biased;
                _ = &mut close => break,
                Some(command) = self.commands.recv() => {
                    self.apply_bet(round, command, opened, deadline);
                }
                _ = countdown.tick() => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    self.events.send(RoundEvent::Countdown {
                        round_id: round.id,
                        remaining: remaining.as_millis() as u64,
                        total_pool: round.pool.total,
                        bet_count: round.pool.bet_count,
                    });
                }
            }
        }

        // Already queued before the deadline; timestamps decide
        while let Ok(command) = self.commands.try_recv() {
            self.apply_bet(round, command, opened, deadline);
        }
    }

    fn apply_bet(&self, round: &mut Round, command: BetCommand, opened: Instant, deadline: Instant) {
        let result = self.accept_bet(round, &command.submission, command.submitted_at, opened, deadline);
        match &result {
            Ok(receipt) => {
                self.metrics.record_bet_accepted();
                debug!(
                    round_id = round.id,
                    participant = command.submission.participant_id,
                    amount = command.submission.amount,
                    "Bet accepted"
                );
                self.publish(round);
                self.events.send(RoundEvent::BetUpdate {
                    round_id: receipt.round_id,
                    total_pool: receipt.total_pool,
                });
            }
            Err(rejection) => {
                self.metrics.record_bet_rejected();
                debug!(round_id = round.id, reason = %rejection, "Bet rejected");
            }
        }
        let _ = command.reply.send(result);
    }

    fn accept_bet(
        &self,
        round: &mut Round,
        submission: &BetSubmission,
        submitted_at: Instant,
        opened: Instant,
        deadline: Instant,
    ) -> BetReply {
        if round.status() != RoundStatus::Open {
            return Err(BetRejection::RoundNotOpen);
        }
        if submitted_at < opened || submitted_at >= deadline {
            return Err(BetRejection::OutsideWindow);
        }
        if let Some(submitted) = submission.round_id {
            if submitted != round.id {
                return Err(BetRejection::RoundMismatch {
                    submitted,
                    current: round.id,
                });
            }
        }
        let participant = self.limits.check(submission, self.roster.len())?;
        round
            .pool
            .record(participant, submission.amount)
            .map_err(|_| BetRejection::InvalidParticipant(submission.participant_id))?;

        Ok(BetReceipt {
            round_id: round.id,
            total_pool: round.pool.total,
            tx_ref: submission.tx_ref.clone(),
        })
    }

    /// Sleep while refusing any bet that arrives
    async fn idle(&mut self, duration: Duration) {
        let until = sleep(duration);
        tokio::pin!(until);
        loop {
            tokio::select! {
                biased;
                _ = &mut until => break,
                Some(command) = self.commands.recv() => {
                    self.metrics.record_bet_rejected();
                    let _ = command.reply.send(Err(BetRejection::RoundNotOpen));
                }
            }
        }
    }

    async fn lock_on_ledger(&self, round: &Round) {
        if round.degraded {
            return;
        }
        if let Capability::Available(ledger) = &self.ledger {
            if let Err(e) = ledger.lock_round(round.id).await {
                self.metrics.record_ledger_failure();
                warn!(round_id = round.id, error = %e, "lockRound failed, continuing");
            }
        }
    }

    /// Ledger pools when they can be read and reflect the bets; local otherwise
    async fn bet_distribution(&self, round: &Round) -> (Vec<f64>, PoolSource) {
        let local = || (round.pool.by_participant.clone(), PoolSource::Local);
        if round.degraded {
            return local();
        }
        let Capability::Available(ledger) = &self.ledger else {
            return local();
        };

        match ledger.participant_pools(round.id, self.roster.len()).await {
            Ok(pools) => {
                let total: f64 = pools.iter().filter(|p| p.is_finite() && **p > 0.0).sum();
                if total > 0.0 || round.pool.total <= 0.0 {
                    (pools, PoolSource::Ledger)
                } else {
                    debug!(round_id = round.id, "Ledger pool empty, using local bets");
                    local()
                }
            }
            Err(e) => {
                self.metrics.record_ledger_failure();
                warn!(round_id = round.id, error = %e, "Pool read failed, using local bets");
                local()
            }
        }
    }

    fn fairness_violation(&self, round_id: u64, message: String) -> SettlementOutcome {
        self.metrics.record_fairness_violation();
        error!(round_id, "{}", message);
        self.events.send(RoundEvent::Error {
            message,
            code: FAIRNESS_VIOLATION.to_string(),
        });
        SettlementOutcome::Withheld
    }

    async fn settle(&mut self, round: &Round) -> PaddockResult<SettlementOutcome> {
        if !engine::verify(round.seed(), &round.commitment) {
            let err = RoundError::CommitmentMismatch {
                round_id: round.id,
                commitment: round.commitment.to_hex(),
            };
            return Ok(self.fairness_violation(round.id, err.to_string()));
        }
        let winner = round.winner().ok_or(RoundError::Missing {
            round_id: round.id,
            field: "winner",
        })?;

        let ledger = match &self.ledger {
            Capability::Available(ledger) if !round.degraded => ledger.clone(),
            _ => return Ok(SettlementOutcome::Degraded),
        };

        let attempts = self.ledger_config.settle_attempts.max(1);
        for attempt in 1..=attempts {
            match ledger.settle_round(round.id, winner, round.seed()).await {
                Ok(()) => {
                    self.confirm_settlement(&ledger, round.id, winner).await;
                    return Ok(SettlementOutcome::Finalized);
                }
                Err(e @ LedgerError::CommitmentRejected { .. }) => {
                    return Ok(self.fairness_violation(round.id, e.to_string()));
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    self.metrics.record_ledger_failure();
                    warn!(round_id = round.id, attempt, error = %e, "settleRound failed, retrying");
                    self.idle(self.ledger_config.settle_retry_delay()).await;
                }
                Err(e) => {
                    self.metrics.record_ledger_failure();
                    warn!(round_id = round.id, attempt, error = %e, "settleRound failed, settling locally");
                    break;
                }
            }
        }
        Ok(SettlementOutcome::Degraded)
    }

    async fn confirm_settlement(&self, ledger: &LedgerClient, round_id: u64, winner: usize) {
        match ledger.get_round(round_id).await {
            Ok(record) if record.status == LedgerRoundStatus::Settled && record.winning_participant == Some(winner) => {
                debug!(round_id, "Ledger settlement confirmed");
            }
            Ok(record) => warn!(
                round_id,
                status = ?record.status,
                ledger_winner = ?record.winning_participant,
                "Ledger round disagrees with local settlement"
            ),
            Err(e) => debug!(round_id, error = %e, "Settlement confirmation unavailable"),
        }
    }

    fn publish(&self, round: &Round) {
        self.current.send_replace(Some(round.snapshot()));
    }

    async fn persist(&self, round: &Round) {
        if let Capability::Available(store) = &self.store {
            if let Err(e) = store.save_snapshot(&round.snapshot()).await {
                self.metrics.record_store_failure();
                debug!(round_id = round.id, error = %e, "Snapshot not persisted");
            }
        }
    }

    async fn record_history(&self, record: RoundRecord) {
        if let Capability::Available(store) = &self.store {
            if let Err(e) = store.append_history(&record).await {
                self.metrics.record_store_failure();
                debug!(round_id = record.id, error = %e, "History not persisted");
            }
        }
        let capacity = self.timings.history_capacity;
        self.history.send_modify(|history| {
            history.push_front(record);
            history.truncate(capacity);
        });
    }
}
