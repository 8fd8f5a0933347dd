//! Review scheduling service.
//!
//! Owns the algorithm and routes every state change through
//! `ReviewStore::apply_review`, so a grade is always applied to the latest
//! committed state of the card.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use scheduler_core::algorithm::sm2::Sm2;
use scheduler_core::{sort_by_due, DueKey, SpacedRepetitionAlgorithm};
use uuid::Uuid;

use crate::db::ReviewStore;
use crate::error::{ApiError, Result};
use crate::models::*;

/// Interval at which a card counts as mature.
pub const MATURE_INTERVAL_DAYS: f64 = 21.0;

pub struct ReviewScheduler {
    store: Arc<dyn ReviewStore>,
    algorithm: Arc<dyn SpacedRepetitionAlgorithm>,
}

impl ReviewScheduler {
    pub fn new(store: Arc<dyn ReviewStore>, algorithm: Arc<dyn SpacedRepetitionAlgorithm>) -> Self {
        Self { store, algorithm }
    }

    pub fn with_sm2(store: Arc<dyn ReviewStore>, sm2: Sm2) -> Self {
        Self::new(store, Arc::new(sm2))
    }

    /// Cards of `owner_id` due at or before `filter.cutoff`, earliest first.
    pub async fn list_due(&self, owner_id: Uuid, filter: &DueFilter) -> Result<Vec<DueCard>> {
        let mut due: Vec<DueCard> = self
            .store
            .list_due(owner_id, filter)
            .await?
            .into_iter()
            .map(StoredCard::into_due_card)
            .collect();
        sort_by_due(&mut due, |d| DueKey::new(d.state.due_at, d.card.id));

        tracing::debug!(
            owner = %owner_id,
            cutoff = %filter.cutoff,
            count = due.len(),
            "listed due cards"
        );
        Ok(due)
    }

    /// Apply one graded review to the card's committed state.
    pub async fn submit_review(
        &self,
        owner_id: Uuid,
        card_id: i64,
        grade: Grade,
        now: DateTime<Utc>,
        expected_version: Option<i64>,
    ) -> Result<ReviewOutcome> {
        let request = ReviewRequest {
            owner_id,
            card_id,
            grade,
            reviewed_at: now,
            expected_version,
            algorithm: self.algorithm.name(),
        };
        let algorithm = self.algorithm.as_ref();
        let transition = |state: &ReviewState| algorithm.schedule(state, grade, now);

        let outcome = self.store.apply_review(&request, &transition).await?;

        tracing::info!(
            owner = %owner_id,
            card_id,
            grade = %grade,
            interval_days = outcome.state.interval_days,
            due_at = %outcome.state.due_at,
            version = outcome.version,
            "review committed"
        );
        Ok(outcome)
    }

    pub async fn create_cards(
        &self,
        owner_id: Uuid,
        document_id: i64,
        drafts: &[CardDraft],
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredCard>> {
        if drafts.is_empty() {
            return Err(ApiError::InvalidArgument("no cards given".to_string()));
        }
        for draft in drafts {
            draft.validate()?;
        }

        let initial = self.algorithm.initial_state(now);
        let created = self
            .store
            .create_cards(owner_id, document_id, drafts, &initial)
            .await?;

        tracing::info!(owner = %owner_id, document_id, count = created.len(), "cards created");
        Ok(created)
    }

    pub async fn get_card(&self, owner_id: Uuid, card_id: i64) -> Result<StoredCard> {
        self.store
            .get_card(owner_id, card_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("card {card_id} not found")))
    }

    pub async fn delete_card(&self, owner_id: Uuid, card_id: i64) -> Result<()> {
        if !self.store.delete_card(owner_id, card_id).await? {
            return Err(ApiError::NotFound(format!("card {card_id} not found")));
        }
        tracing::info!(owner = %owner_id, card_id, "card deleted");
        Ok(())
    }

    pub async fn delete_document_cards(&self, owner_id: Uuid, document_id: i64) -> Result<u64> {
        let deleted = self.store.delete_document_cards(owner_id, document_id).await?;
        tracing::info!(owner = %owner_id, document_id, deleted, "document cards deleted");
        Ok(deleted)
    }

    pub async fn review_history(&self, owner_id: Uuid, card_id: i64) -> Result<Vec<ReviewLog>> {
        Ok(self.store.review_history(owner_id, card_id).await?)
    }

    /// Collection summary as of `now`.
    pub async fn stats(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
        document_id: Option<i64>,
    ) -> Result<StudyStatsResponse> {
        let cards = self.store.list_cards(owner_id, document_id).await?;
        let reviews_last_24h = self
            .store
            .count_reviews_since(owner_id, document_id, now - Duration::hours(24))
            .await?;

        let mut stats = StudyStatsResponse {
            total_cards: cards.len(),
            due_cards: 0,
            new_cards: 0,
            learning_cards: 0,
            young_cards: 0,
            mature_cards: 0,
            average_ease: 0.0,
            total_lapses: 0,
            reviews_last_24h,
        };

        let mut ease_sum = 0.0;
        for stored in &cards {
            let state = &stored.state;
            ease_sum += state.ease_factor;
            stats.total_lapses += u64::from(state.lapses);

            if state.is_due(now) {
                stats.due_cards += 1;
            }
            if state.is_new() {
                stats.new_cards += 1;
            } else if state.repetitions == 0 {
                stats.learning_cards += 1;
            } else if state.interval_days >= MATURE_INTERVAL_DAYS {
                stats.mature_cards += 1;
            } else {
                stats.young_cards += 1;
            }
        }
        if !cards.is_empty() {
            stats.average_ease = ease_sum / cards.len() as f64;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
    }

    fn setup() -> (ReviewScheduler, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let scheduler = ReviewScheduler::with_sm2(store.clone(), Sm2::default());
        (scheduler, store, Uuid::new_v4())
    }

    async fn seed(scheduler: &ReviewScheduler, owner: Uuid, n: usize) -> Vec<StoredCard> {
        let drafts: Vec<CardDraft> = (0..n)
            .map(|i| CardDraft::new(format!("front {i}"), format!("back {i}")))
            .collect();
        scheduler.create_cards(owner, 1, &drafts, t0()).await.unwrap()
    }

    fn ids(due: &[DueCard]) -> Vec<i64> {
        due.iter().map(|d| d.card.id).collect()
    }

    #[tokio::test]
    async fn new_cards_are_due_immediately() {
        let (scheduler, _, owner) = setup();
        let created = seed(&scheduler, owner, 2).await;

        let due = scheduler.list_due(owner, &DueFilter::until(t0())).await.unwrap();
        assert_eq!(ids(&due), vec![created[0].card.id, created[1].card.id]);
        assert!(due.iter().all(|d| d.state.repetitions == 0 && d.state.ease_factor == 2.5));
    }

    #[tokio::test]
    async fn good_then_good_follows_sm2_intervals() {
        let (scheduler, _, owner) = setup();
        let card_id = seed(&scheduler, owner, 1).await[0].card.id;

        let first = scheduler
            .submit_review(owner, card_id, Grade::Good, t0(), None)
            .await
            .unwrap();
        assert_eq!(first.state.repetitions, 1);
        assert_eq!(first.state.interval_days, 1.0);
        assert_eq!(first.state.due_at, t0() + Duration::days(1));
        assert_eq!(first.version, 2);

        let second = scheduler
            .submit_review(owner, card_id, Grade::Good, t0() + Duration::days(1), None)
            .await
            .unwrap();
        assert_eq!(second.state.repetitions, 2);
        assert_eq!(second.state.interval_days, 6.0);
        assert_eq!(second.state.due_at, t0() + Duration::days(7));
        assert_eq!(second.previous, first.state);
    }

    #[tokio::test]
    async fn again_resets_and_penalizes() {
        let (scheduler, _, owner) = setup();
        let card_id = seed(&scheduler, owner, 1).await[0].card.id;
        scheduler
            .submit_review(owner, card_id, Grade::Good, t0(), None)
            .await
            .unwrap();

        let now = t0() + Duration::days(1);
        let lapse = scheduler
            .submit_review(owner, card_id, Grade::Again, now, None)
            .await
            .unwrap();
        assert_eq!(lapse.state.repetitions, 0);
        assert_eq!(lapse.state.lapses, 1);
        assert_eq!(lapse.state.due_at, now + Duration::minutes(10));
        assert!((lapse.state.ease_factor - (lapse.previous.ease_factor - 0.2)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_card_is_not_found_without_mutation() {
        let (scheduler, store, owner) = setup();
        seed(&scheduler, owner, 1).await;

        let err = scheduler
            .submit_review(owner, 999, Grade::Good, t0(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(
            store.count_reviews_since(owner, None, t0() - Duration::days(1)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let (scheduler, _, owner) = setup();
        seed(&scheduler, owner, 5).await;
        let filter = DueFilter::until(t0());

        let first = scheduler.list_due(owner, &filter).await.unwrap();
        let second = scheduler.list_due(owner, &filter).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn due_list_is_ordered_by_due_then_id() {
        let (scheduler, _, owner) = setup();
        let cards = seed(&scheduler, owner, 3).await;
        let (a, b, c) = (cards[0].card.id, cards[1].card.id, cards[2].card.id);

        // a: due in 10 minutes, b: due in 1 day, c: untouched and due now.
        scheduler.submit_review(owner, b, Grade::Good, t0(), None).await.unwrap();
        scheduler.submit_review(owner, a, Grade::Again, t0(), None).await.unwrap();

        let later = DueFilter::until(t0() + Duration::days(2));
        let due = scheduler.list_due(owner, &later).await.unwrap();
        assert_eq!(ids(&due), vec![c, a, b]);

        let limited = DueFilter {
            limit: Some(2),
            ..later
        };
        let due = scheduler.list_due(owner, &limited).await.unwrap();
        assert_eq!(ids(&due), vec![c, a]);
    }

    #[tokio::test]
    async fn passing_review_is_never_due_immediately() {
        let (scheduler, _, owner) = setup();
        let card_id = seed(&scheduler, owner, 1).await[0].card.id;

        let grades = [Grade::Hard, Grade::Good, Grade::Easy, Grade::Again, Grade::Hard];
        let mut now = t0();
        for grade in grades {
            let outcome = scheduler
                .submit_review(owner, card_id, grade, now, None)
                .await
                .unwrap();
            assert!(outcome.state.due_at > now);
            assert!(outcome.state.ease_factor >= 1.3);
            now = outcome.state.due_at;
        }
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let (scheduler, _, owner) = setup();
        let card = seed(&scheduler, owner, 1).await.remove(0);

        scheduler
            .submit_review(owner, card.card.id, Grade::Good, t0(), Some(card.version))
            .await
            .unwrap();
        let err = scheduler
            .submit_review(owner, card.card.id, Grade::Easy, t0(), Some(card.version))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let current = scheduler.get_card(owner, card.card.id).await.unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.state.repetitions, 1);
    }

    #[tokio::test]
    async fn concurrent_reviews_apply_in_sequence() {
        let (scheduler, _, owner) = setup();
        let scheduler = Arc::new(scheduler);
        let card_id = seed(&scheduler, owner, 1).await[0].card.id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move {
                    scheduler
                        .submit_review(owner, card_id, Grade::Good, t0(), None)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let card = scheduler.get_card(owner, card_id).await.unwrap();
        assert_eq!(card.state.repetitions, 8);
        assert_eq!(card.version, 9);
        assert_eq!(scheduler.review_history(owner, card_id).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn blank_drafts_are_rejected() {
        let (scheduler, store, owner) = setup();
        let drafts = vec![CardDraft::new("Q", "A"), CardDraft::new("  ", "A")];

        let err = scheduler.create_cards(owner, 1, &drafts, t0()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert!(store.list_cards(owner, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_outage_fails_due_listing_and_reviews() {
        let (scheduler, store, owner) = setup();
        let card_id = seed(&scheduler, owner, 1).await[0].card.id;

        store.set_offline(true);
        let err = scheduler.list_due(owner, &DueFilter::until(t0())).await.unwrap_err();
        assert!(matches!(err, ApiError::Unavailable(_)));
        let err = scheduler
            .submit_review(owner, card_id, Grade::Good, t0(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unavailable(_)));

        store.set_offline(false);
        let due = scheduler.list_due(owner, &DueFilter::until(t0())).await.unwrap();
        assert_eq!(ids(&due), vec![card_id]);
        assert_eq!(due[0].state.repetitions, 0);
    }

    #[tokio::test]
    async fn deleting_missing_card_is_not_found() {
        let (scheduler, _, owner) = setup();
        let card_id = seed(&scheduler, owner, 1).await[0].card.id;

        scheduler.delete_card(owner, card_id).await.unwrap();
        let err = scheduler.delete_card(owner, card_id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn stats_bucket_cards() {
        let (scheduler, _, owner) = setup();
        let cards = seed(&scheduler, owner, 4).await;
        let (learning, young, mature) = (cards[1].card.id, cards[2].card.id, cards[3].card.id);

        scheduler.submit_review(owner, learning, Grade::Again, t0(), None).await.unwrap();
        scheduler.submit_review(owner, young, Grade::Good, t0(), None).await.unwrap();
        // Four easy reviews well before the 24h window push the interval past 21 days.
        let mut now = t0() - Duration::days(60);
        for _ in 0..4 {
            let outcome = scheduler
                .submit_review(owner, mature, Grade::Easy, now, None)
                .await
                .unwrap();
            now = outcome.state.due_at;
        }

        let stats = scheduler
            .stats(owner, t0() + Duration::hours(1), None)
            .await
            .unwrap();
        assert_eq!(stats.total_cards, 4);
        assert_eq!(stats.new_cards, 1);
        assert_eq!(stats.learning_cards, 1);
        assert_eq!(stats.young_cards, 1);
        assert_eq!(stats.mature_cards, 1);
        assert_eq!(stats.total_lapses, 1);
        // The new card and the relearning card.
        assert_eq!(stats.due_cards, 2);
        assert_eq!(stats.reviews_last_24h, 2);
    }
}
