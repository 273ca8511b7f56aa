//! Round lifecycle: state, bet intake, events and the orchestrator task.

pub mod bets;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use bets::{BetLimits, BetReceipt, BetRejection, BetReply, BetSubmission, BetSubmitter};
pub use events::{EventBus, RoundEvent};
pub use orchestrator::{Orchestrator, OrchestratorHandle, FAIRNESS_VIOLATION};
pub use state::{BetPool, PoolSource, Round, RoundSnapshot, RoundStatus, SettlementOutcome};
