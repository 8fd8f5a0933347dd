//! PostgreSQL review store

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use uuid::Uuid;

use super::{version_conflict, ReviewStore, StoreError};
use crate::config::DatabaseConfig;
use crate::models::*;

const CARD_COLUMNS: &str = r#"
    c.id, c.owner_id, c.document_id, c.front, c.back, c.created_at,
    s.interval_days, s.ease_factor, s.repetitions, s.lapses,
    s.due_at, s.last_reviewed_at, s.version
"#;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let statement_timeout = format!("{}s", config.statement_timeout_secs);
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .options([("statement_timeout", statement_timeout.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl ReviewStore for Database {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // === User Repository ===

    async fn create_user(&self, name: Option<&str>) -> Result<User, StoreError> {
        let user = User::new(name, Utc::now());
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, token, name, created_at, last_seen_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, token, name, created_at, last_seen_at
            "#,
        )
        .bind(user.id)
        .bind(&user.token)
        .bind(&user.name)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, token, name, created_at, last_seen_at
            FROM users
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn touch_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_seen_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // === Card Repository ===

    async fn create_cards(
        &self,
        owner_id: Uuid,
        document_id: i64,
        drafts: &[CardDraft],
        initial: &ReviewState,
    ) -> Result<Vec<StoredCard>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let card_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO cards (owner_id, document_id, front, back, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(owner_id)
            .bind(document_id)
            .bind(&draft.front)
            .bind(&draft.back)
            // A fresh state is due at creation time.
            .bind(initial.due_at)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO review_states (card_id, interval_days, ease_factor, repetitions,
                                           lapses, due_at, last_reviewed_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
                "#,
            )
            .bind(card_id)
            .bind(initial.interval_days)
            .bind(initial.ease_factor)
            .bind(to_db_count(initial.repetitions))
            .bind(to_db_count(initial.lapses))
            .bind(initial.due_at)
            .bind(initial.last_reviewed_at)
            .execute(&mut *tx)
            .await?;

            created.push(StoredCard {
                owner_id,
                card: Card {
                    id: card_id,
                    document_id,
                    front: draft.front.clone(),
                    back: draft.back.clone(),
                    created_at: initial.due_at,
                },
                state: initial.clone(),
                version: 1,
            });
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_card(&self, owner_id: Uuid, card_id: i64) -> Result<Option<StoredCard>, StoreError> {
        let row = sqlx::query_as::<_, DbCardRow>(&format!(
            r#"
            SELECT {CARD_COLUMNS}
            FROM cards c
            JOIN review_states s ON s.card_id = c.id
            WHERE c.id = $1 AND c.owner_id = $2
            "#
        ))
        .bind(card_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DbCardRow::into_stored))
    }

    async fn list_cards(
        &self,
        owner_id: Uuid,
        document_id: Option<i64>,
    ) -> Result<Vec<StoredCard>, StoreError> {
        let rows = sqlx::query_as::<_, DbCardRow>(&format!(
            r#"
            SELECT {CARD_COLUMNS}
            FROM cards c
            JOIN review_states s ON s.card_id = c.id
            WHERE c.owner_id = $1 AND ($2::BIGINT IS NULL OR c.document_id = $2)
            ORDER BY c.id
            "#
        ))
        .bind(owner_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DbCardRow::into_stored).collect())
    }

    async fn delete_card(&self, owner_id: Uuid, card_id: i64) -> Result<bool, StoreError> {
        // review_states and reviews cascade on the foreign key.
        let result = sqlx::query(
            r#"
            DELETE FROM cards
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(card_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_document_cards(&self, owner_id: Uuid, document_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM cards
            WHERE owner_id = $1 AND document_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(document_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // === Scheduling ===

    async fn list_due(&self, owner_id: Uuid, filter: &DueFilter) -> Result<Vec<StoredCard>, StoreError> {
        let limit = filter
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let rows = sqlx::query_as::<_, DbCardRow>(&format!(
            r#"
            SELECT {CARD_COLUMNS}
            FROM cards c
            JOIN review_states s ON s.card_id = c.id
            WHERE c.owner_id = $1
              AND s.due_at <= $2
              AND ($3::BIGINT IS NULL OR c.document_id = $3)
            ORDER BY s.due_at, c.id
            LIMIT $4
            "#
        ))
        .bind(owner_id)
        .bind(filter.cutoff)
        .bind(filter.document_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DbCardRow::into_stored).collect())
    }

    async fn apply_review(
        &self,
        request: &ReviewRequest,
        transition: &(dyn for<'a> Fn(&'a ReviewState) -> ReviewState + Send + Sync),
    ) -> Result<ReviewOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the state serializes concurrent reviews of this card.
        let current = sqlx::query_as::<_, DbCardRow>(&format!(
            r#"
            SELECT {CARD_COLUMNS}
            FROM cards c
            JOIN review_states s ON s.card_id = c.id
            WHERE c.id = $1 AND c.owner_id = $2
            FOR UPDATE OF s
            "#
        ))
        .bind(request.card_id)
        .bind(request.owner_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(DbCardRow::into_stored)
        .ok_or_else(|| StoreError::NotFound(format!("card {}", request.card_id)))?;

        if let Some(expected) = request.expected_version {
            if expected != current.version {
                return Err(version_conflict(request.card_id, expected, current.version));
            }
        }

        let next = transition(&current.state);

        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE review_states
            SET interval_days = $2,
                ease_factor = $3,
                repetitions = $4,
                lapses = $5,
                due_at = $6,
                last_reviewed_at = $7,
                version = version + 1,
                updated_at = NOW()
            WHERE card_id = $1 AND version = $8
            RETURNING version
            "#,
        )
        .bind(request.card_id)
        .bind(next.interval_days)
        .bind(next.ease_factor)
        .bind(to_db_count(next.repetitions))
        .bind(to_db_count(next.lapses))
        .bind(next.due_at)
        .bind(next.last_reviewed_at)
        .bind(current.version)
        .fetch_optional(&mut *tx)
        .await?;

        let version = version.ok_or_else(|| {
            StoreError::Conflict(format!("card {} changed during review", request.card_id))
        })?;

        let log = ReviewLog::new(request, &current.state, &next);
        sqlx::query(
            r#"
            INSERT INTO reviews (id, card_id, owner_id, grade, reviewed_at,
                                 interval_before, interval_after, ease_before, ease_after,
                                 repetitions_after, algorithm)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(log.id)
        .bind(log.card_id)
        .bind(log.owner_id)
        .bind(&log.grade)
        .bind(log.reviewed_at)
        .bind(log.interval_before)
        .bind(log.interval_after)
        .bind(log.ease_before)
        .bind(log.ease_after)
        .bind(log.repetitions_after)
        .bind(&log.algorithm)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReviewOutcome {
            card_id: request.card_id,
            previous: current.state,
            state: next,
            version,
        })
    }

    // === Review Repository ===

    async fn review_history(&self, owner_id: Uuid, card_id: i64) -> Result<Vec<ReviewLog>, StoreError> {
        if self.get_card(owner_id, card_id).await?.is_none() {
            return Err(StoreError::NotFound(format!("card {card_id}")));
        }

        let reviews = sqlx::query_as::<_, ReviewLog>(
            r#"
            SELECT id, card_id, owner_id, grade, reviewed_at,
                   interval_before, interval_after, ease_before, ease_after,
                   repetitions_after, algorithm
            FROM reviews
            WHERE card_id = $1 AND owner_id = $2
            ORDER BY reviewed_at, created_at
            "#,
        )
        .bind(card_id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn count_reviews_since(
        &self,
        owner_id: Uuid,
        document_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM reviews r
            JOIN cards c ON r.card_id = c.id
            WHERE r.owner_id = $1 AND r.reviewed_at >= $2
              AND ($3::BIGINT IS NULL OR c.document_id = $3)
            "#,
        )
        .bind(owner_id)
        .bind(since)
        .bind(document_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
