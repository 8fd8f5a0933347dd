//! Review state storage.
//!
//! `ReviewStore` is the only path that mutates review state. Both
//! implementations run a review's read-modify-write as one serialized unit:
//! PostgreSQL with a row lock inside a transaction, the in-memory store under
//! its write guard.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

pub use memory::MemoryStore;
pub use postgres::Database;

/// PostgreSQL error codes that mean "try again later" rather than "bad request".
const QUERY_CANCELED: &str = "57014";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const SERIALIZATION_FAILURE: &str = "40001";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(QUERY_CANCELED) | Some(LOCK_NOT_AVAILABLE) => {
                    StoreError::Unavailable(err.to_string())
                }
                Some(SERIALIZATION_FAILURE) => StoreError::Conflict(err.to_string()),
                _ => StoreError::Backend(err.to_string()),
            },
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Persistence contract for cards, review state and review history.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    // === Users ===

    async fn create_user(&self, name: Option<&str>) -> Result<User, StoreError>;

    async fn get_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    async fn touch_user(&self, user_id: Uuid) -> Result<(), StoreError>;

    // === Cards ===

    /// Create cards and their initial state in one write. All or nothing.
    async fn create_cards(
        &self,
        owner_id: Uuid,
        document_id: i64,
        drafts: &[CardDraft],
        initial: &ReviewState,
    ) -> Result<Vec<StoredCard>, StoreError>;

    async fn get_card(&self, owner_id: Uuid, card_id: i64) -> Result<Option<StoredCard>, StoreError>;

    /// All cards of an owner, ordered by id.
    async fn list_cards(
        &self,
        owner_id: Uuid,
        document_id: Option<i64>,
    ) -> Result<Vec<StoredCard>, StoreError>;

    /// Delete a card with its state and history. Returns whether it existed.
    async fn delete_card(&self, owner_id: Uuid, card_id: i64) -> Result<bool, StoreError>;

    /// Delete every card of a document with its state and history.
    async fn delete_document_cards(&self, owner_id: Uuid, document_id: i64) -> Result<u64, StoreError>;

    // === Scheduling ===

    /// Cards due at or before `filter.cutoff`, ordered by `(due_at, id)`.
    async fn list_due(&self, owner_id: Uuid, filter: &DueFilter) -> Result<Vec<StoredCard>, StoreError>;

    /// Serialized read-modify-write of one card's state plus its review log.
    ///
    /// `transition` receives the committed state and returns the next one. It
    /// runs while the card is locked, so concurrent reviews of the same card
    /// never interleave.
    async fn apply_review(
        &self,
        request: &ReviewRequest,
        transition: &(dyn for<'a> Fn(&'a ReviewState) -> ReviewState + Send + Sync),
    ) -> Result<ReviewOutcome, StoreError>;

    // === History ===

    /// Review logs for a card, oldest first.
    async fn review_history(&self, owner_id: Uuid, card_id: i64) -> Result<Vec<ReviewLog>, StoreError>;

    async fn count_reviews_since(
        &self,
        owner_id: Uuid,
        document_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

fn version_conflict(card_id: i64, expected: i64, actual: i64) -> StoreError {
    StoreError::Conflict(format!(
        "card {card_id} is at version {actual}, expected {expected}"
    ))
}
