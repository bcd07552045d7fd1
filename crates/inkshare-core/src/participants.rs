//! Connected participants and their display colors.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-connection identifier.
pub type ParticipantId = Uuid;

/// Palette participant colors are drawn from.
pub const PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
    "#F8B739", "#52B788",
];

/// Pick a palette color uniformly at random.
///
/// Collisions between connected participants are allowed.
pub fn random_color() -> String {
    PALETTE
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(PALETTE[0])
        .to_string()
}

/// One connected session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub color: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
}

/// Roster of connected participants in join order.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant.
    ///
    /// Re-adding a known id updates its color but keeps its place in the roster.
    pub fn add(&mut self, id: ParticipantId, color: impl Into<String>) -> &Participant {
        let color = color.into();
        let index = match self.participants.iter().position(|p| p.id == id) {
            Some(index) => {
                self.participants[index].color = color;
                index
            }
            None => {
                self.participants.push(Participant {
                    id,
                    color,
                    joined_at: Utc::now(),
                });
                self.participants.len() - 1
            }
        };
        &self.participants[index]
    }

    /// Remove a participant. Unknown ids are ignored.
    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == *id)?;
        Some(self.participants.remove(index))
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == *id)
    }

    /// Participants ordered by join time.
    pub fn list(&self) -> Vec<Participant> {
        self.participants.clone()
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}
