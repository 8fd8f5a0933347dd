//! Core review-scheduling library used by the backend.
//!
//! Provides:
//! - Spaced repetition algorithm (SM-2) behind a common trait
//! - Ordered due-time index for due-card queries
//! - Shared types (Card, ReviewState, Grade, etc.)

pub mod algorithm;
pub mod due;
pub mod error;
pub mod types;

pub use algorithm::{due_after, interval_to_duration, max_interval_days, SpacedRepetitionAlgorithm};
pub use due::{sort_by_due, DueIndex, DueKey};
pub use error::{Result, ScheduleError};
pub use types::{Card, CardDraft, DueCard, Grade, ReviewState, DEFAULT_EASE, MINIMUM_EASE};
