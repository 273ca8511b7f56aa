//! Participant roster
//!
//! Each entrant carries a static attribute set on a 0-100 scale that feeds
//! both the probability model and the cosmetic trajectory. The roster never
//! changes at runtime; its order is the order the resolver walks.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Static attributes, each in [0, 100]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Attributes {
    pub speed: f64,
    pub stamina: f64,
    pub consistency: f64,
    pub aggression: f64,
    pub luck: f64,
}

impl Attributes {
    pub const fn new(speed: f64, stamina: f64, consistency: f64, aggression: f64, luck: f64) -> Self {
        Self {
            speed,
            stamina,
            consistency,
            aggression,
            luck,
        }
    }

    fn in_range(&self) -> bool {
        [self.speed, self.stamina, self.consistency, self.aggression, self.luck]
            .iter()
            .all(|v| (0.0..=100.0).contains(v))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: usize,
    pub name: String,
    pub color: String,
    pub image: String,
    pub bio: String,
    pub stats: Attributes,
}

/// Public view sent with `round:created` (no stats, matching what players see on the track)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantSummary {
    pub id: usize,
    pub name: String,
    pub color: String,
    pub image: String,
    pub bio: String,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            color: p.color.clone(),
            image: p.image.clone(),
            bio: p.bio.clone(),
        }
    }
}

/// Immutable, cheaply cloneable participant table
#[derive(Debug, Clone)]
pub struct Roster {
    participants: Arc<[Participant]>,
}

impl Roster {
    /// Build a roster; ids are taken from position and attributes must be in range
    pub fn new(participants: Vec<Participant>) -> Option<Self> {
        if participants.is_empty() {
            return None;
        }
        if participants
            .iter()
            .enumerate()
            .any(|(i, p)| p.id != i || !p.stats.in_range())
        {
            return None;
        }
        Some(Self {
            participants: participants.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Participant> {
        self.participants.get(index)
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.participants.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn name_of(&self, index: usize) -> &str {
        self.get(index).map(|p| p.name.as_str()).unwrap_or("Unknown")
    }

    pub fn summaries(&self) -> Vec<ParticipantSummary> {
        self.iter().map(ParticipantSummary::from).collect()
    }
}

impl Default for Roster {
    fn default() -> Self {
        let entry = |id: usize, name: &str, color: &str, bio: &str, stats: Attributes| Participant {
            id,
            name: name.to_string(),
            color: color.to_string(),
            image: format!("/{}.png", name.to_lowercase()),
            bio: bio.to_string(),
            stats,
        };

        Self {
            participants: vec![
                entry(
                    0,
                    "Alexa",
                    "#e74c3c",
                    "A blazing fast sprinter with explosive acceleration. Struggles on longer races.",
                    Attributes::new(92.0, 55.0, 60.0, 85.0, 50.0),
                ),
                entry(
                    1,
                    "Dan",
                    "#2c3e50",
                    "The dark horse. Quiet and calculating, often surprises with late surges.",
                    Attributes::new(70.0, 85.0, 75.0, 40.0, 80.0),
                ),
                entry(
                    2,
                    "Peter",
                    "#f39c12",
                    "The crowd favorite. Consistent performer with a winning mentality.",
                    Attributes::new(78.0, 78.0, 90.0, 65.0, 60.0),
                ),
                entry(
                    3,
                    "Robert",
                    "#27ae60",
                    "Volatile as the market. Can either moon or crash spectacularly.",
                    Attributes::new(85.0, 60.0, 30.0, 90.0, 75.0),
                ),
                entry(
                    4,
                    "Robin",
                    "#8e44ad",
                    "The tank. Slow start but builds unstoppable momentum.",
                    Attributes::new(60.0, 95.0, 85.0, 50.0, 45.0),
                ),
                entry(
                    5,
                    "Tommy",
                    "#3498db",
                    "Unpredictable but beloved. Runs on pure vibes and energy.",
                    Attributes::new(72.0, 65.0, 40.0, 70.0, 95.0),
                ),
            ]
            .into(),
        }
    }
}
