//! Storage records and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Re-export shared types from scheduler-core
pub use scheduler_core::types::{Card, CardDraft, DueCard, Grade, ReviewState};

// === Storage Entity Types ===

/// Registered user. The bearer token resolves to one of these per request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub token: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: Uuid::new_v4().simple().to_string(),
            name: name.map(str::to_string),
            created_at: now,
            last_seen_at: now,
        }
    }
}

/// Card together with its review state and commit version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCard {
    pub owner_id: Uuid,
    pub card: Card,
    pub state: ReviewState,
    pub version: i64,
}

impl StoredCard {
    pub fn into_due_card(self) -> DueCard {
        DueCard {
            card: self.card,
            state: self.state,
        }
    }
}

/// Joined `cards` + `review_states` row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbCardRow {
    pub id: i64,
    pub owner_id: Uuid,
    pub document_id: i64,
    pub front: String,
    pub back: String,
    pub created_at: DateTime<Utc>,
    pub interval_days: f64,
    pub ease_factor: f64,
    pub repetitions: i32,
    pub lapses: i32,
    pub due_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl DbCardRow {
    /// Convert to the storage-agnostic record
    pub fn into_stored(self) -> StoredCard {
        StoredCard {
            owner_id: self.owner_id,
            card: Card {
                id: self.id,
                document_id: self.document_id,
                front: self.front,
                back: self.back,
                created_at: self.created_at,
            },
            state: ReviewState {
                interval_days: self.interval_days,
                ease_factor: self.ease_factor,
                repetitions: u32::try_from(self.repetitions).unwrap_or(0),
                lapses: u32::try_from(self.lapses).unwrap_or(0),
                due_at: self.due_at,
                last_reviewed_at: self.last_reviewed_at,
            },
            version: self.version,
        }
    }
}

/// One committed review, appended in the same transaction as the state update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReviewLog {
    pub id: Uuid,
    pub card_id: i64,
    pub owner_id: Uuid,
    pub grade: String,
    pub reviewed_at: DateTime<Utc>,
    pub interval_before: f64,
    pub interval_after: f64,
    pub ease_before: f64,
    pub ease_after: f64,
    pub repetitions_after: i32,
    pub algorithm: String,
}

impl ReviewLog {
    pub fn new(
        request: &ReviewRequest,
        before: &ReviewState,
        after: &ReviewState,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id: request.card_id,
            owner_id: request.owner_id,
            grade: request.grade.as_str().to_string(),
            reviewed_at: request.reviewed_at,
            interval_before: before.interval_days,
            interval_after: after.interval_days,
            ease_before: before.ease_factor,
            ease_after: after.ease_factor,
            repetitions_after: i32::try_from(after.repetitions).unwrap_or(i32::MAX),
            algorithm: request.algorithm.to_string(),
        }
    }
}

/// Everything the store needs to commit one review.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub owner_id: Uuid,
    pub card_id: i64,
    pub grade: Grade,
    pub reviewed_at: DateTime<Utc>,
    pub expected_version: Option<i64>,
    pub algorithm: &'static str,
}

/// Result of a committed review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub card_id: i64,
    pub previous: ReviewState,
    pub state: ReviewState,
    pub version: i64,
}

/// Due query parameters after boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DueFilter {
    pub cutoff: DateTime<Utc>,
    pub document_id: Option<i64>,
    pub limit: Option<usize>,
}

impl DueFilter {
    pub fn until(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            document_id: None,
            limit: None,
        }
    }

    pub fn matches(&self, card: &StoredCard) -> bool {
        card.state.due_at <= self.cutoff
            && self.document_id.map_or(true, |d| card.card.document_id == d)
    }
}

// === API Request/Response Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct UserRegisterRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserRegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserStatusResponse {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}

// Study types
#[derive(Debug, Serialize, Deserialize)]
pub struct DueQuery {
    pub document_id: Option<i64>,
    pub at: Option<String>,
    pub timezone_offset: Option<i32>,
    #[serde(default)]
    pub end_of_day: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueCardResponse {
    pub id: i64,
    pub document_id: i64,
    pub front: String,
    pub back: String,
    pub due_at: DateTime<Utc>,
    pub interval_days: f64,
    pub ease_factor: f64,
    pub repetitions: u32,
}

impl From<DueCard> for DueCardResponse {
    fn from(due: DueCard) -> Self {
        Self {
            id: due.card.id,
            document_id: due.card.document_id,
            front: due.card.front,
            back: due.card.back,
            due_at: due.state.due_at,
            interval_days: due.state.interval_days,
            ease_factor: due.state.ease_factor,
            repetitions: due.state.repetitions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DueListResponse {
    pub cards: Vec<DueCardResponse>,
    pub cutoff: DateTime<Utc>,
}

/// Grade as sent by clients: the numeric quality or the grade name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GradeInput {
    Quality(i64),
    Name(String),
    /// Anything else (floats, objects, null) so it is rejected as a bad grade.
    Other(serde_json::Value),
}

impl GradeInput {
    /// Validate against the closed grade vocabulary.
    pub fn into_grade(self) -> scheduler_core::Result<Grade> {
        match self {
            GradeInput::Quality(q) => {
                Grade::from_quality(q).ok_or(scheduler_core::ScheduleError::InvalidGrade(q))
            }
            GradeInput::Name(name) => name.parse(),
            GradeInput::Other(value) => {
                Err(scheduler_core::ScheduleError::UnknownGrade(value.to_string()))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitReviewRequest {
    pub card_id: i64,
    pub grade: GradeInput,
    pub reviewed_at: Option<String>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardReviewRequest {
    pub grade: GradeInput,
    pub reviewed_at: Option<String>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitReviewResponse {
    pub card_id: i64,
    pub interval_days: f64,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub due_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl From<ReviewOutcome> for SubmitReviewResponse {
    fn from(outcome: ReviewOutcome) -> Self {
        Self {
            card_id: outcome.card_id,
            interval_days: outcome.state.interval_days,
            ease_factor: outcome.state.ease_factor,
            repetitions: outcome.state.repetitions,
            due_at: outcome.state.due_at,
            last_reviewed_at: outcome.state.last_reviewed_at,
            version: outcome.version,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsQuery {
    pub document_id: Option<i64>,
    pub at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyStatsResponse {
    pub total_cards: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub young_cards: usize,
    pub mature_cards: usize,
    pub average_ease: f64,
    pub total_lapses: u64,
    pub reviews_last_24h: u64,
}

// Card types
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCardsRequest {
    pub cards: Vec<CardDraft>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardResponse {
    pub id: i64,
    pub document_id: i64,
    pub front: String,
    pub back: String,
    pub created_at: DateTime<Utc>,
    pub state: ReviewState,
    pub version: i64,
}

impl From<StoredCard> for CardResponse {
    fn from(stored: StoredCard) -> Self {
        Self {
            id: stored.card.id,
            document_id: stored.card.document_id,
            front: stored.card.front,
            back: stored.card.back,
            created_at: stored.card.created_at,
            state: stored.state,
            version: stored.version,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCardsResponse {
    pub cards: Vec<CardResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewHistoryResponse {
    pub reviews: Vec<ReviewLog>,
}
