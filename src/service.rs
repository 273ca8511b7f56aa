//! Wires configuration into a runnable orchestrator plus API state.

use crate::api::AppState;
use crate::capability::Capability;
use crate::config::{ConfigLoader, LedgerMode, PaddockConfig, StorageBackend};
use crate::errors::PaddockResult;
use crate::ledger::{LedgerClient, SimulatedLedger};
use crate::metrics::RoundMetrics;
use crate::roster::Roster;
use crate::round::{EventBus, Orchestrator};
use crate::store::{MemoryRoundStore, RocksRoundStore, RoundStore};
use std::sync::Arc;
use tracing::info;

pub struct Service {
    pub orchestrator: Orchestrator,
    pub state: Arc<AppState>,
}

pub fn ledger_for(config: &PaddockConfig, roster: &Roster) -> Capability<LedgerClient> {
    match config.ledger.mode {
        LedgerMode::Disabled => Capability::Unavailable,
        LedgerMode::Simulated => {
            let gateway = Arc::new(SimulatedLedger::new(roster.len()));
            Capability::Available(LedgerClient::new(gateway, config.ledger.timeout()))
        }
    }
}

pub fn store_for(config: &PaddockConfig) -> PaddockResult<Capability<Arc<dyn RoundStore>>> {
    let store: Capability<Arc<dyn RoundStore>> = match config.storage.backend {
        StorageBackend::Disabled => Capability::Unavailable,
        StorageBackend::Memory => Capability::Available(Arc::new(MemoryRoundStore::new())),
        StorageBackend::Rocksdb => {
            std::fs::create_dir_all(&config.storage.data_dir)?;
            let store = RocksRoundStore::open(&config.storage.data_dir)?;
            info!(data_dir = %config.storage.data_dir, "Round store opened");
            Capability::Available(Arc::new(store))
        }
    };
    Ok(store)
}

/// Assemble with explicit collaborators; the config is validated first
pub fn build_with(
    config: PaddockConfig,
    roster: Roster,
    ledger: Capability<LedgerClient>,
    store: Capability<Arc<dyn RoundStore>>,
) -> PaddockResult<Service> {
    ConfigLoader::new().validate(&config)?;
    let metrics = Arc::new(RoundMetrics::new());
    let events = EventBus::new(config.server.event_capacity);
    let ledger_available = ledger.is_available();

    let (orchestrator, handle) = Orchestrator::new(&config, roster, ledger, store.clone(), events, metrics.clone())?;
    let state = Arc::new(AppState {
        rounds: handle,
        store,
        metrics,
        config,
        ledger_available,
        version: env!("CARGO_PKG_VERSION").to_string(),
    });
    Ok(Service { orchestrator, state })
}

pub fn build(config: PaddockConfig) -> PaddockResult<Service> {
    let roster = Roster::default();
    let ledger = ledger_for(&config, &roster);
    let store = store_for(&config)?;
    build_with(config, roster, ledger, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PaddockError;

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = PaddockConfig::default();
        config.round.race_duration_ms = 0;
        let result = build_with(config, Roster::default(), Capability::Unavailable, Capability::Unavailable);
        assert!(matches!(result, Err(PaddockError::Configuration(_))));
    }

    #[test]
    fn test_build_with_defaults() {
        let service = build_with(
            PaddockConfig::default(),
            Roster::default(),
            Capability::Unavailable,
            Capability::Unavailable,
        )
        .unwrap();
        assert!(!service.state.ledger_available);
        assert!(service.state.rounds.current_round().is_none());
    }
}
