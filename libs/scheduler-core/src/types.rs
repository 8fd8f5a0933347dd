//! Core types for the review scheduler.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Default ease factor for a freshly created card.
pub const DEFAULT_EASE: f64 = 2.5;

/// Lowest ease factor the scheduler will ever store.
pub const MINIMUM_EASE: f64 = 1.3;

/// Grade submitted for a single review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    /// SM-2 quality score (0-5 scale, only 0/3/4/5 are used).
    pub fn quality(self) -> u8 {
        match self {
            Self::Again => 0,
            Self::Hard => 3,
            Self::Good => 4,
            Self::Easy => 5,
        }
    }

    /// Create from a quality score. Only the four values the client sends are accepted.
    pub fn from_quality(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Again),
            3 => Some(Self::Hard),
            4 => Some(Self::Good),
            5 => Some(Self::Easy),
            _ => None,
        }
    }

    /// Whether the grade counts as a successful recall.
    pub fn is_pass(self) -> bool {
        self.quality() >= 3
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "again" => Ok(Self::Again),
            "hard" => Ok(Self::Hard),
            "good" => Ok(Self::Good),
            "easy" => Ok(Self::Easy),
            _ => Err(ScheduleError::UnknownGrade(s.to_string())),
        }
    }
}

/// Per-card scheduling state. One instance per card, owned by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub interval_days: f64,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub lapses: u32,
    pub due_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewState {
    /// State for a card created at `created_at`: due immediately, never reviewed.
    pub fn new(created_at: DateTime<Utc>, initial_ease: f64) -> Self {
        Self {
            interval_days: 0.0,
            ease_factor: initial_ease,
            repetitions: 0,
            lapses: 0,
            due_at: created_at,
            last_reviewed_at: None,
        }
    }

    /// Whether the card has never been graded.
    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }

    pub fn is_due(&self, cutoff: DateTime<Utc>) -> bool {
        self.due_at <= cutoff
    }
}

/// Card with its owning document reference. Front/back are opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub document_id: i64,
    pub front: String,
    pub back: String,
    pub created_at: DateTime<Utc>,
}

/// Card content handed over by the generation service before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub front: String,
    pub back: String,
}

impl CardDraft {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }

    /// Reject drafts with a blank side.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.front.trim().is_empty() {
            return Err(ScheduleError::EmptyContent("front"));
        }
        if self.back.trim().is_empty() {
            return Err(ScheduleError::EmptyContent("back"));
        }
        Ok(())
    }
}

/// Card paired with its current state, as returned by due queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueCard {
    pub card: Card,
    pub state: ReviewState,
}
