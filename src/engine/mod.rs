//! Outcome engine: seed commitment, probabilities, winner resolution and
//! the cosmetic trajectory shown while the result is still hidden.

pub mod probability;
pub mod resolver;
pub mod seed;
pub mod trajectory;

pub use probability::{Probabilities, ProbabilityModel};
pub use resolver::{determine_winner, Resolution};
pub use seed::{commit, generate_seed, verify, Commitment, ServerSeed};
pub use trajectory::{Sample, Track, Trajectory, TrajectorySynthesizer};
