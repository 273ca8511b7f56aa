//! Paddock - provably-fair race rounds
//!
//! A repeating round lifecycle with a pre-committed seed, deterministic
//! winner resolution and a cosmetic race trajectory, settled against an
//! external ledger when one is reachable.

pub mod api;
pub mod capability;
pub mod config;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod roster;
pub mod round;
pub mod service;
pub mod store;

pub use capability::Capability;
pub use config::{ConfigLoader, PaddockConfig};
pub use errors::{PaddockError, PaddockResult};
pub use roster::Roster;
pub use round::{Orchestrator, OrchestratorHandle};
