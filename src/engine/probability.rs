//! Win probabilities from participant attributes with a bet-concentration house edge.
//!
//! Participants attracting a larger share of the pool get a proportionally
//! smaller chance: `p_i *= 1 - (bets_i / total) * edge_factor`, then the
//! vector is renormalized.

use crate::roster::{Attributes, Roster};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EDGE_FACTOR: f64 = 0.15;

const SPEED_WEIGHT: f64 = 0.30;
const STAMINA_WEIGHT: f64 = 0.25;
const CONSISTENCY_WEIGHT: f64 = 0.20;
const AGGRESSION_WEIGHT: f64 = 0.10;
const LUCK_WEIGHT: f64 = 0.15;

/// Attribute-weighted score before normalization
pub fn base_score(stats: &Attributes) -> f64 {
    stats.speed * SPEED_WEIGHT
        + stats.stamina * STAMINA_WEIGHT
        + stats.consistency * CONSISTENCY_WEIGHT
        + stats.aggression * AGGRESSION_WEIGHT
        + stats.luck * LUCK_WEIGHT
}

/// Probability vector in roster order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Probabilities(Vec<f64>);

impl Probabilities {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    roster: Roster,
    edge_factor: f64,
}

impl ProbabilityModel {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            edge_factor: DEFAULT_EDGE_FACTOR,
        }
    }

    /// Override the edge factor; `None` unless it lies in [0, 1]
    pub fn with_edge_factor(roster: Roster, edge_factor: f64) -> Option<Self> {
        if !(0.0..=1.0).contains(&edge_factor) {
            return None;
        }
        Some(Self { roster, edge_factor })
    }

    pub fn edge_factor(&self) -> f64 {
        self.edge_factor
    }

    /// Normalized attribute scores, no house edge
    pub fn base_probabilities(&self) -> Probabilities {
        let scores: Vec<f64> = self.roster.iter().map(|p| base_score(&p.stats)).collect();
        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            // every attribute zero: nothing distinguishes entrants
            let uniform = 1.0 / scores.len() as f64;
            return Probabilities(vec![uniform; scores.len()]);
        }
        Probabilities(scores.into_iter().map(|s| s / total).collect())
    }

    /// Probabilities given per-participant bet totals in roster order.
    ///
    /// Missing trailing entries count as zero; negative or non-finite totals
    /// are ignored.
    pub fn compute_probabilities(&self, bet_totals: &[f64]) -> Probabilities {
        let base = self.base_probabilities();

        let bets: Vec<f64> = (0..self.roster.len())
            .map(|i| bet_totals.get(i).copied().filter(|b| b.is_finite() && *b > 0.0).unwrap_or(0.0))
            .collect();
        let total_bets: f64 = bets.iter().sum();
        if total_bets <= 0.0 {
            return base;
        }

        let adjusted: Vec<f64> = base
            .0
            .iter()
            .zip(&bets)
            .map(|(p, b)| p * (1.0 - (b / total_bets) * self.edge_factor))
            .collect();
        let adjusted_total: f64 = adjusted.iter().sum();
        if adjusted_total <= 0.0 {
            return base;
        }

        Probabilities(adjusted.into_iter().map(|p| p / adjusted_total).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::tests::roster_of;

    const EPSILON: f64 = 1e-9;

    fn default_model() -> ProbabilityModel {
        ProbabilityModel::new(Roster::default())
    }

    #[test]
    fn test_speed_only_base_score() {
        let stats = Attributes::new(100.0, 0.0, 0.0, 0.0, 0.0);
        assert!((base_score(&stats) - 30.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_bets_returns_base_vector() {
        let model = default_model();
        let base = model.base_probabilities();
        assert_eq!(model.compute_probabilities(&[0.0; 6]), base);
        assert_eq!(model.compute_probabilities(&[]), base);
        assert!((base.sum() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_base_vector_matches_weight_table() {
        let roster = roster_of(&[
            Attributes::new(100.0, 0.0, 0.0, 0.0, 0.0),
            Attributes::new(0.0, 0.0, 0.0, 0.0, 100.0),
        ]);
        let base = ProbabilityModel::new(roster).base_probabilities();
        // 30 vs 15
        assert!((base.as_slice()[0] - 2.0 / 3.0).abs() < EPSILON);
        assert!((base.as_slice()[1] - 1.0 / 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_concentrated_bets_lower_favourite() {
        let model = default_model();
        let base = model.base_probabilities();
        let adjusted = model.compute_probabilities(&[9.0, 1.0, 0.0, 0.0, 0.0, 0.0]);

        assert!(adjusted.as_slice()[0] < base.as_slice()[0]);
        assert!((adjusted.sum() - 1.0).abs() < EPSILON);
        // unbet entrants gain share
        assert!(adjusted.as_slice()[3] > base.as_slice()[3]);
    }

    #[test]
    fn test_full_concentration_keeps_positive_probability() {
        let model = default_model();
        let adjusted = model.compute_probabilities(&[0.0, 0.0, 5.0, 0.0, 0.0, 0.0]);
        assert!(adjusted.as_slice().iter().all(|p| *p > 0.0));
        assert!((adjusted.sum() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_sums_to_one_across_distributions() {
        let model = default_model();
        let distributions: [[f64; 6]; 5] = [
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            [0.001, 0.0, 0.0, 0.0, 0.0, 1.0],
            [1e9, 3.0, 0.0, 7.5, 0.0, 0.2],
            [0.0, 0.0, 0.0, 0.0, 0.0, 42.0],
            [0.5, 0.25, 0.125, 0.0625, 0.03125, 0.015625],
        ];
        for bets in distributions {
            let p = model.compute_probabilities(&bets);
            assert!((p.sum() - 1.0).abs() < EPSILON, "{:?}", bets);
            assert!(p.as_slice().iter().all(|v| *v > 0.0), "{:?}", bets);
        }
    }

    #[test]
    fn test_invalid_totals_ignored() {
        let model = default_model();
        let p = model.compute_probabilities(&[f64::NAN, -4.0, f64::INFINITY, 0.0, 0.0, 0.0]);
        assert_eq!(p, model.base_probabilities());
    }

    #[test]
    fn test_edge_factor_bounds() {
        assert!(ProbabilityModel::with_edge_factor(Roster::default(), 1.5).is_none());
        assert!(ProbabilityModel::with_edge_factor(Roster::default(), -0.1).is_none());

        let model = ProbabilityModel::with_edge_factor(Roster::default(), 1.0).unwrap();
        let p = model.compute_probabilities(&[0.0, 3.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(p.as_slice()[1], 0.0);
        assert!((p.sum() - 1.0).abs() < EPSILON);
    }
}
