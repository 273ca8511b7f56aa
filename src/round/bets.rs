//! Bet submission handoff.
//!
//! Callers never touch round state. A [`BetSubmitter`] turns each submission
//! into a [`BetCommand`] on the orchestrator's channel and awaits the reply;
//! the orchestrator is the single writer that applies or rejects it.

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};

/// Inbound bet notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BetSubmission {
    pub participant_address: String,
    pub participant_id: i64,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BetReceipt {
    pub round_id: u64,
    pub total_pool: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
}

/// Typed reasons a bet is refused; none of them mutate round state
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum BetRejection {
    #[error("Round not open for bets")]
    RoundNotOpen,

    #[error("Invalid participant {0}")]
    InvalidParticipant(i64),

    #[error("Bet amount {amount} outside [{min}, {max}]")]
    AmountOutOfBounds { amount: f64, min: f64, max: f64 },

    #[error("Bet is for round {submitted}, current round is {current}")]
    RoundMismatch { submitted: u64, current: u64 },

    #[error("Bet submitted outside the betting window")]
    OutsideWindow,

    #[error("Round service unavailable")]
    ServiceUnavailable,
}

impl BetRejection {
    pub fn code(&self) -> &'static str {
        match self {
            BetRejection::RoundNotOpen => "ROUND_NOT_OPEN",
            BetRejection::InvalidParticipant(_) => "INVALID_PARTICIPANT",
            BetRejection::AmountOutOfBounds { .. } => "AMOUNT_OUT_OF_BOUNDS",
            BetRejection::RoundMismatch { .. } => "ROUND_MISMATCH",
            BetRejection::OutsideWindow => "OUTSIDE_WINDOW",
            BetRejection::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

pub type BetReply = Result<BetReceipt, BetRejection>;

/// Accepted bet amount range, inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetLimits {
    pub min: f64,
    pub max: f64,
}

impl BetLimits {
    /// Checks that do not depend on round state
    pub fn check(&self, submission: &BetSubmission, participants: usize) -> Result<usize, BetRejection> {
        let index = usize::try_from(submission.participant_id)
            .ok()
            .filter(|i| *i < participants)
            .ok_or(BetRejection::InvalidParticipant(submission.participant_id))?;

        let amount = submission.amount;
        if !amount.is_finite() || amount < self.min || amount > self.max {
            return Err(BetRejection::AmountOutOfBounds {
                amount,
                min: self.min,
                max: self.max,
            });
        }
        Ok(index)
    }
}

pub struct BetCommand {
    pub submission: BetSubmission,
    pub submitted_at: Instant,
    pub reply: oneshot::Sender<BetReply>,
}

/// Cloneable entry point for concurrent bet callers
#[derive(Clone)]
pub struct BetSubmitter {
    tx: mpsc::Sender<BetCommand>,
}

impl BetSubmitter {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<BetCommand>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn submit(&self, submission: BetSubmission) -> BetReply {
        let (reply, response) = oneshot::channel();
        let command = BetCommand {
            submission,
            submitted_at: Instant::now(),
            reply,
        };
        self.tx
            .send(command)
            .await
            .map_err(|_| BetRejection::ServiceUnavailable)?;
        response.await.map_err(|_| BetRejection::ServiceUnavailable)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(participant_id: i64, amount: f64) -> BetSubmission {
        BetSubmission {
            participant_address: "0xabc".to_string(),
            participant_id,
            amount,
            tx_ref: None,
            round_id: None,
        }
    }

    const LIMITS: BetLimits = BetLimits { min: 0.001, max: 1.0 };

    #[test]
    fn test_limits() {
        assert_eq!(LIMITS.check(&submission(2, 0.5), 6), Ok(2));
        assert_eq!(
            LIMITS.check(&submission(6, 0.5), 6),
            Err(BetRejection::InvalidParticipant(6))
        );
        assert_eq!(
            LIMITS.check(&submission(-1, 0.5), 6),
            Err(BetRejection::InvalidParticipant(-1))
        );
        assert!(matches!(
            LIMITS.check(&submission(0, 0.0001), 6),
            Err(BetRejection::AmountOutOfBounds { .. })
        ));
        assert!(matches!(
            LIMITS.check(&submission(0, f64::NAN), 6),
            Err(BetRejection::AmountOutOfBounds { .. })
        ));
        assert_eq!(LIMITS.check(&submission(0, 1.0), 6), Ok(0));
    }

    #[test]
    fn test_submission_wire_format() {
        let json = r#"{"participantAddress":"0x1234","participantId":3,"amount":0.05,"txRef":"0xdead"}"#;
        let parsed: BetSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.participant_id, 3);
        assert_eq!(parsed.tx_ref.as_deref(), Some("0xdead"));
        assert_eq!(parsed.round_id, None);
    }

    #[tokio::test]
    async fn test_closed_channel_is_unavailable() {
        let (submitter, rx) = BetSubmitter::channel(4);
        drop(rx);
        assert_eq!(
            submitter.submit(submission(0, 0.5)).await,
            Err(BetRejection::ServiceUnavailable)
        );
    }
}
