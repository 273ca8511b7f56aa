//! Shared doubles for lifecycle tests

#![allow(dead_code)]

use async_trait::async_trait;
use paddock::{
    capability::Capability,
    config::PaddockConfig,
    engine::{Commitment, ServerSeed},
    errors::LedgerError,
    ledger::{LedgerClient, LedgerGateway, LedgerRound, SimulatedLedger},
    metrics::RoundMetrics,
    roster::Roster,
    round::{EventBus, Orchestrator, OrchestratorHandle, RoundEvent},
    store::{MemoryRoundStore, RoundStore},
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::broadcast;

/// Simulated ledger that logs every call and can script settle failures
pub struct ScriptedLedger {
    inner: SimulatedLedger,
    calls: Mutex<Vec<&'static str>>,
    settle_script: Mutex<VecDeque<LedgerError>>,
}

impl ScriptedLedger {
    pub fn new(participants: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: SimulatedLedger::new(participants),
            calls: Mutex::new(Vec::new()),
            settle_script: Mutex::new(VecDeque::new()),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.inner.set_online(online);
    }

    /// Next settle calls fail with these errors, in order
    pub fn fail_settles(&self, errors: impl IntoIterator<Item = LedgerError>) {
        self.settle_script.lock().unwrap().extend(errors);
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    fn log(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LedgerGateway for ScriptedLedger {
    async fn create_round(&self, commitment: &Commitment) -> Result<u64, LedgerError> {
        self.log("createRound");
        self.inner.create_round(commitment).await
    }

    async fn lock_round(&self, round_id: u64) -> Result<(), LedgerError> {
        self.log("lockRound");
        self.inner.lock_round(round_id).await
    }

    async fn settle_round(&self, round_id: u64, winner: usize, seed: &ServerSeed) -> Result<(), LedgerError> {
        self.log("settleRound");
        let scripted = self.settle_script.lock().unwrap().pop_front();
        match scripted {
            Some(err) => Err(err),
            None => self.inner.settle_round(round_id, winner, seed).await,
        }
    }

    async fn get_round_participant_pool(&self, round_id: u64, participant: usize) -> Result<f64, LedgerError> {
        self.log("getRoundParticipantPool");
        self.inner.get_round_participant_pool(round_id, participant).await
    }

    async fn get_current_round_id(&self) -> Result<u64, LedgerError> {
        self.log("getCurrentRoundId");
        self.inner.get_current_round_id().await
    }

    async fn get_round(&self, round_id: u64) -> Result<LedgerRound, LedgerError> {
        self.log("getRound");
        self.inner.get_round(round_id).await
    }
}

/// Short timings so paused-clock tests run many phases quickly
pub fn fast_config() -> PaddockConfig {
    let mut config = PaddockConfig::default();
    config.round.bet_window_ms = 1_000;
    config.round.countdown_interval_ms = 250;
    config.round.lock_delay_ms = 100;
    config.round.race_duration_ms = 500;
    config.round.result_buffer_ms = 100;
    config.round.cooldown_ms = 200;
    config.round.skip_delay_ms = 100;
    config.round.error_delay_ms = 300;
    config.ledger.timeout_ms = 1_000;
    config.ledger.settle_retry_delay_ms = 50;
    config
}

pub struct Harness {
    pub handle: OrchestratorHandle,
    pub events: broadcast::Receiver<RoundEvent>,
    pub metrics: Arc<RoundMetrics>,
    pub store: Arc<MemoryRoundStore>,
    pub task: tokio::task::JoinHandle<()>,
}

pub fn start(config: PaddockConfig, ledger: Option<Arc<ScriptedLedger>>) -> Harness {
    let roster = Roster::default();
    let ledger: Capability<LedgerClient> = ledger
        .map(|l| LedgerClient::new(l, config.ledger.timeout()))
        .into();
    let store = Arc::new(MemoryRoundStore::new());
    let store_dyn: Arc<dyn RoundStore> = store.clone();
    let metrics = Arc::new(RoundMetrics::new());

    let (orchestrator, handle) = Orchestrator::new(
        &config,
        roster,
        ledger,
        Capability::Available(store_dyn),
        EventBus::new(1024),
        metrics.clone(),
    )
    .unwrap();
    let events = handle.subscribe();
    let task = tokio::spawn(orchestrator.run());

    Harness {
        handle,
        events,
        metrics,
        store,
        task,
    }
}

/// Wait (in virtual time) for the next event of the given kind
pub async fn next_event(events: &mut broadcast::Receiver<RoundEvent>, kind: &str) -> RoundEvent {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if event.kind() == kind => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event bus closed: {}", e),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(600), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", kind))
}

pub fn created_id(event: &RoundEvent) -> u64 {
    match event {
        RoundEvent::Created { id, .. } => *id,
        other => panic!("expected round:created, got {:?}", other),
    }
}
