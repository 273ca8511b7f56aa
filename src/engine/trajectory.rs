//! Cosmetic race trajectories consistent with a winner fixed in advance.
//!
//! The curves only decorate the outcome; nothing here feeds back into the
//! resolver. Jitter comes from whatever `Rng` the caller passes, never from
//! the round seed.

use crate::errors::TrajectoryError;
use crate::roster::{Participant, Roster};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const FRAME_COUNT: usize = 60;
pub const SAMPLE_COUNT: usize = FRAME_COUNT + 1;

/// Positions stay below this for non-winners at every frame
pub const NON_WINNER_CEILING: f64 = 0.97;
/// Finish window non-winner curves are rescaled into
pub const NON_WINNER_FINISH_MIN: f64 = 0.90;
pub const NON_WINNER_FINISH_MAX: f64 = 0.96;

const JITTER_SCALE: f64 = 0.3;
const FATIGUE_START: f64 = 0.6;
const FATIGUE_SCALE: f64 = 0.3;
const SURGE_START: f64 = 0.7;
const SURGE_SCALE: f64 = 2.5;
const WINNER_MIN_SPEED: f64 = 0.6;
const FADE_START: f64 = 0.85;
const FADE_MULTIPLIER: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub frame: usize,
    /// Elapsed milliseconds since the start
    pub time: f64,
    pub position: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub participant_id: usize,
    pub name: String,
    pub color: String,
    pub keyframes: Vec<Sample>,
}

impl Track {
    pub fn final_position(&self) -> f64 {
        self.keyframes.last().map(|s| s.position).unwrap_or(0.0)
    }
}

/// One track per participant, in roster order
pub type Trajectory = Vec<Track>;

#[derive(Debug, Clone)]
pub struct TrajectorySynthesizer {
    roster: Roster,
}

impl TrajectorySynthesizer {
    pub fn new(roster: Roster) -> Self {
        Self { roster }
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        winner: usize,
        duration_ms: u64,
        rng: &mut R,
    ) -> Result<Trajectory, TrajectoryError> {
        if duration_ms == 0 {
            return Err(TrajectoryError::ZeroDuration);
        }
        if self.roster.is_empty() {
            return Err(TrajectoryError::EmptyRoster);
        }
        if !self.roster.contains(winner) {
            return Err(TrajectoryError::WinnerOutOfRange {
                winner,
                roster_len: self.roster.len(),
            });
        }

        let frame_interval = duration_ms as f64 / FRAME_COUNT as f64;
        Ok(self
            .roster
            .iter()
            .map(|p| Track {
                participant_id: p.id,
                name: p.name.clone(),
                color: p.color.clone(),
                keyframes: run_curve(p, p.id == winner, frame_interval, rng),
            })
            .collect())
    }
}

fn run_curve<R: Rng + ?Sized>(
    participant: &Participant,
    is_winner: bool,
    frame_interval: f64,
    rng: &mut R,
) -> Vec<Sample> {
    let stats = &participant.stats;
    let base_speed = (stats.speed / 100.0) * 0.8 + 0.2;
    let jitter_range = JITTER_SCALE * (1.0 - stats.consistency / 100.0);
    let ceiling = if is_winner { 1.0 } else { NON_WINNER_CEILING };

    let mut keyframes = Vec::with_capacity(SAMPLE_COUNT);
    let mut position: f64 = 0.0;

    for frame in 0..=FRAME_COUNT {
        let progress = frame as f64 / FRAME_COUNT as f64;

        let mut speed = base_speed + (rng.gen::<f64>() - 0.5) * jitter_range;

        if progress > FATIGUE_START {
            speed -= (1.0 - stats.stamina / 100.0) * progress * FATIGUE_SCALE;
        }

        if is_winner {
            if progress > SURGE_START {
                speed += (progress - SURGE_START) * SURGE_SCALE;
            }
            speed = speed.max(WINNER_MIN_SPEED);
        } else if progress > FADE_START {
            speed *= FADE_MULTIPLIER;
        }

        position = (position + speed / FRAME_COUNT as f64).clamp(0.0, ceiling);
        if !is_winner && position >= NON_WINNER_CEILING {
            position = NON_WINNER_CEILING - f64::EPSILON;
        }

        keyframes.push(Sample {
            frame,
            time: frame as f64 * frame_interval,
            position,
            speed,
        });
    }

    if is_winner {
        if let Some(last) = keyframes.last_mut() {
            last.position = 1.0;
        }
    } else {
        let last = keyframes.last().map(|s| s.position).unwrap_or(0.0);
        if last > NON_WINNER_FINISH_MAX {
            let target = rng.gen_range(NON_WINNER_FINISH_MIN..=NON_WINNER_FINISH_MAX);
            let scale = target / last;
            for sample in &mut keyframes {
                sample.position *= scale;
            }
            // float error must not push the finish back over the window
            if let Some(last) = keyframes.last_mut() {
                last.position = last.position.min(NON_WINNER_FINISH_MAX);
            }
        }
    }

    keyframes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::tests::roster_of;
    use crate::roster::Attributes;
    use rand::{rngs::StdRng, SeedableRng};

    fn synth() -> TrajectorySynthesizer {
        TrajectorySynthesizer::new(Roster::default())
    }

    #[test]
    fn test_shape_and_timing() {
        let mut rng = StdRng::seed_from_u64(1);
        let trajectory = synth().generate(2, 30_000, &mut rng).unwrap();
        assert_eq!(trajectory.len(), 6);
        for track in &trajectory {
            assert_eq!(track.keyframes.len(), SAMPLE_COUNT);
            assert_eq!(track.keyframes[0].time, 0.0);
            assert!((track.keyframes[FRAME_COUNT].time - 30_000.0).abs() < 1e-6);
            assert!(track.keyframes.windows(2).all(|w| w[1].time > w[0].time));
            assert!(track
                .keyframes
                .iter()
                .all(|s| (0.0..=1.0).contains(&s.position)));
        }
    }

    #[test]
    fn test_terminal_positions_for_every_winner() {
        for seed in 0..50u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let winner = (seed % 6) as usize;
            let trajectory = synth().generate(winner, 30_000, &mut rng).unwrap();
            for track in &trajectory {
                if track.participant_id == winner {
                    assert_eq!(track.final_position(), 1.0);
                } else {
                    assert!(track.final_position() <= NON_WINNER_FINISH_MAX, "seed {}", seed);
                    assert!(track
                        .keyframes
                        .iter()
                        .all(|s| s.position < NON_WINNER_CEILING));
                }
            }
        }
    }

    #[test]
    fn test_fast_loser_rescaled_into_window() {
        // maximal attributes push the raw curve into the ceiling
        let roster = roster_of(&[
            Attributes::new(100.0, 100.0, 100.0, 100.0, 100.0),
            Attributes::new(0.0, 0.0, 0.0, 0.0, 0.0),
        ]);
        let mut rng = StdRng::seed_from_u64(9);
        let trajectory = TrajectorySynthesizer::new(roster)
            .generate(1, 10_000, &mut rng)
            .unwrap();

        let loser = &trajectory[0];
        let finish = loser.final_position();
        assert!((NON_WINNER_FINISH_MIN - 1e-9..=NON_WINNER_FINISH_MAX).contains(&finish));
        assert_eq!(trajectory[1].final_position(), 1.0);
    }

    #[test]
    fn test_winner_keeps_minimum_speed() {
        let roster = roster_of(&[Attributes::new(0.0, 0.0, 0.0, 0.0, 0.0)]);
        let mut rng = StdRng::seed_from_u64(3);
        let trajectory = TrajectorySynthesizer::new(roster)
            .generate(0, 6_000, &mut rng)
            .unwrap();
        assert!(trajectory[0].keyframes.iter().all(|s| s.speed >= WINNER_MIN_SPEED));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            synth().generate(0, 0, &mut rng).unwrap_err(),
            TrajectoryError::ZeroDuration
        );
        assert_eq!(
            synth().generate(6, 1_000, &mut rng).unwrap_err(),
            TrajectoryError::WinnerOutOfRange { winner: 6, roster_len: 6 }
        );
    }
}
