//! SM-2 spaced repetition algorithm.
//!
//! Based on SuperMemo 2 with configurable parameters. Failed reviews use a
//! short relearning step and a fixed ease penalty instead of the quality
//! formula, so one "again" cannot crater the ease factor.

use super::{due_after, max_interval_days, SpacedRepetitionAlgorithm};
use crate::error::{Result, ScheduleError};
use crate::types::{Grade, ReviewState, DEFAULT_EASE, MINIMUM_EASE};
use chrono::{DateTime, Utc};

const MINUTES_PER_DAY: f64 = 1440.0;

/// SM-2 algorithm with configurable parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Sm2 {
    pub initial_ease: f64,
    pub minimum_ease: f64,
    pub lapse_penalty: f64,
    pub relearning_minutes: f64,
    pub first_interval: f64,
    pub second_interval: f64,
}

impl Default for Sm2 {
    fn default() -> Self {
        Self {
            initial_ease: DEFAULT_EASE,
            minimum_ease: MINIMUM_EASE,
            lapse_penalty: 0.2,
            relearning_minutes: 10.0,
            first_interval: 1.0,
            second_interval: 6.0,
        }
    }
}

impl SpacedRepetitionAlgorithm for Sm2 {
    fn name(&self) -> &'static str {
        "sm2"
    }

    fn initial_state(&self, created_at: DateTime<Utc>) -> ReviewState {
        ReviewState::new(created_at, self.initial_ease)
    }

    fn schedule(&self, state: &ReviewState, grade: Grade, now: DateTime<Utc>) -> ReviewState {
        let (repetitions, interval, ease, lapses) = if grade.is_pass() {
            self.schedule_pass(state, grade.quality())
        } else {
            self.schedule_lapse(state)
        };

        // Growth is unbounded up to the last representable due time.
        let interval = interval.min(max_interval_days(now));

        // Early reviews reschedule from `now`, never from the old due date.
        ReviewState {
            interval_days: interval,
            ease_factor: ease,
            repetitions,
            lapses,
            due_at: due_after(now, interval),
            last_reviewed_at: Some(now),
        }
    }
}

impl Sm2 {
    /// Build a parameter set, rejecting values that would break the state invariants.
    pub fn with_params(
        initial_ease: f64,
        minimum_ease: f64,
        lapse_penalty: f64,
        relearning_minutes: f64,
    ) -> Result<Self> {
        if !minimum_ease.is_finite() || minimum_ease <= 0.0 {
            return Err(invalid("minimum_ease", "must be a positive number"));
        }
        if !initial_ease.is_finite() || initial_ease < minimum_ease {
            return Err(invalid("initial_ease", "must be at least minimum_ease"));
        }
        if !lapse_penalty.is_finite() || lapse_penalty < 0.0 {
            return Err(invalid("lapse_penalty", "must be zero or positive"));
        }
        if !relearning_minutes.is_finite() || relearning_minutes < 0.0 {
            return Err(invalid("relearning_minutes", "must be zero or positive"));
        }

        Ok(Self {
            initial_ease,
            minimum_ease,
            lapse_penalty,
            relearning_minutes,
            ..Self::default()
        })
    }

    /// Relearning step expressed in days.
    pub fn relearning_interval(&self) -> f64 {
        self.relearning_minutes / MINUTES_PER_DAY
    }

    fn schedule_pass(&self, state: &ReviewState, quality: u8) -> (u32, f64, f64, u32) {
        let repetitions = state.repetitions.saturating_add(1);
        let interval = match repetitions {
            1 => self.first_interval,
            2 => self.second_interval,
            _ => state.interval_days * state.ease_factor,
        };

        // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
        let q = 5.0 - f64::from(quality);
        let ease = (state.ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(self.minimum_ease);

        (repetitions, interval.max(0.0), ease, state.lapses)
    }

    fn schedule_lapse(&self, state: &ReviewState) -> (u32, f64, f64, u32) {
        (
            0,
            self.relearning_interval(),
            (state.ease_factor - self.lapse_penalty).max(self.minimum_ease),
            state.lapses.saturating_add(1),
        )
    }
}

fn invalid(name: &'static str, reason: &str) -> ScheduleError {
    ScheduleError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}
