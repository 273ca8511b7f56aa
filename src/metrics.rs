//! Round service counters with Prometheus text output

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct RoundMetrics {
    start_time: Instant,
    rounds_created: AtomicU64,
    rounds_settled: AtomicU64,
    rounds_skipped: AtomicU64,
    rounds_degraded: AtomicU64,
    cycle_errors: AtomicU64,
    fairness_violations: AtomicU64,
    bets_accepted: AtomicU64,
    bets_rejected: AtomicU64,
    ledger_failures: AtomicU64,
    store_failures: AtomicU64,
    ws_clients: AtomicU64,
}

impl Default for RoundMetrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter_fns {
    ($($inc:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl RoundMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_created: AtomicU64::new(0),
            rounds_settled: AtomicU64::new(0),
            rounds_skipped: AtomicU64::new(0),
            rounds_degraded: AtomicU64::new(0),
            cycle_errors: AtomicU64::new(0),
            fairness_violations: AtomicU64::new(0),
            bets_accepted: AtomicU64::new(0),
            bets_rejected: AtomicU64::new(0),
            ledger_failures: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            ws_clients: AtomicU64::new(0),
        }
    }

    counter_fns! {
        record_round_created => rounds_created,
        record_round_settled => rounds_settled,
        record_round_skipped => rounds_skipped,
        record_round_degraded => rounds_degraded,
        record_cycle_error => cycle_errors,
        record_fairness_violation => fairness_violations,
        record_bet_accepted => bets_accepted,
        record_bet_rejected => bets_rejected,
        record_ledger_failure => ledger_failures,
        record_store_failure => store_failures,
    }

    pub fn ws_connected(&self) {
        self.ws_clients.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ws_disconnected(&self) {
        let _ = self
            .ws_clients
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn rounds_settled(&self) -> u64 {
        self.rounds_settled.load(Ordering::Relaxed)
    }

    pub fn rounds_skipped(&self) -> u64 {
        self.rounds_skipped.load(Ordering::Relaxed)
    }

    pub fn cycle_errors(&self) -> u64 {
        self.cycle_errors.load(Ordering::Relaxed)
    }

    pub fn bets_accepted(&self) -> u64 {
        self.bets_accepted.load(Ordering::Relaxed)
    }

    pub fn bets_rejected(&self) -> u64 {
        self.bets_rejected.load(Ordering::Relaxed)
    }

    pub fn fairness_violations(&self) -> u64 {
        self.fairness_violations.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn to_prometheus_format(&self) -> String {
        let counters: [(&str, &str, &AtomicU64); 10] = [
            ("rounds_created_total", "Rounds opened", &self.rounds_created),
            ("rounds_settled_total", "Rounds settled", &self.rounds_settled),
            ("rounds_skipped_total", "Rounds cancelled with no bets", &self.rounds_skipped),
            ("rounds_degraded_total", "Rounds settled without the ledger", &self.rounds_degraded),
            ("cycle_errors_total", "Round cycles aborted by an error", &self.cycle_errors),
            ("fairness_violations_total", "Settlements withheld on commitment mismatch", &self.fairness_violations),
            ("bets_accepted_total", "Bets applied to a round", &self.bets_accepted),
            ("bets_rejected_total", "Bets refused", &self.bets_rejected),
            ("ledger_failures_total", "Failed or timed out ledger calls", &self.ledger_failures),
            ("store_failures_total", "Failed persistence writes", &self.store_failures),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP paddock_{name} {help}\n# TYPE paddock_{name} counter\npaddock_{name} {}\n\n",
                value.load(Ordering::Relaxed)
            ));
        }
        output.push_str(&format!(
            "# HELP paddock_ws_clients Connected WebSocket clients\n\
             # TYPE paddock_ws_clients gauge\n\
             paddock_ws_clients {}\n\n",
            self.ws_clients.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "# HELP paddock_uptime_seconds Service uptime\n\
             # TYPE paddock_uptime_seconds gauge\n\
             paddock_uptime_seconds {}\n",
            self.uptime_seconds()
        ));
        output
    }
}
