//! Error types for scheduler-core.

use thiserror::Error;

/// Result type alias using ScheduleError.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Validation errors raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("invalid grade {0}: expected one of 0, 3, 4, 5")]
    InvalidGrade(i64),

    #[error("unknown grade '{0}': expected again, hard, good or easy")]
    UnknownGrade(String),

    #[error("card {0} cannot be empty")]
    EmptyContent(&'static str),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
