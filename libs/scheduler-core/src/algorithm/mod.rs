//! Spaced repetition algorithm implementations.

pub mod sm2;

use crate::types::{Grade, ReviewState};
use chrono::{DateTime, Duration, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Trait for spaced repetition algorithms.
pub trait SpacedRepetitionAlgorithm: Send + Sync {
    /// Algorithm identifier.
    fn name(&self) -> &'static str;

    /// Next review state after a review graded at `now`.
    fn schedule(&self, state: &ReviewState, grade: Grade, now: DateTime<Utc>) -> ReviewState;

    /// Initial state for a card created at `created_at`.
    fn initial_state(&self, created_at: DateTime<Utc>) -> ReviewState;
}

/// Convert a fractional day count to a duration with millisecond precision.
///
/// Values too large to represent saturate at the maximum duration.
pub fn interval_to_duration(interval_days: f64) -> Duration {
    let millis = (interval_days.max(0.0) * MILLIS_PER_DAY).round();
    if millis >= i64::MAX as f64 {
        return Duration::MAX;
    }
    Duration::try_milliseconds(millis as i64).unwrap_or(Duration::MAX)
}

/// Longest interval, in days, that still lands on a representable instant after `from`.
pub fn max_interval_days(from: DateTime<Utc>) -> f64 {
    let millis = (DateTime::<Utc>::MAX_UTC - from).num_milliseconds();
    millis as f64 / MILLIS_PER_DAY
}

/// `from + interval`, clamped to the latest representable instant.
pub fn due_after(from: DateTime<Utc>, interval_days: f64) -> DateTime<Utc> {
    from.checked_add_signed(interval_to_duration(interval_days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
