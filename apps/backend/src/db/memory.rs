//! In-memory review store for tests and local runs without PostgreSQL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_core::DueIndex;
use uuid::Uuid;

use super::{version_conflict, ReviewStore, StoreError};
use crate::models::*;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    tokens: HashMap<String, Uuid>,
    cards: HashMap<i64, StoredCard>,
    /// One due index per owner so due scans never touch other users' cards.
    due: HashMap<Uuid, DueIndex>,
    reviews: Vec<ReviewLog>,
    last_card_id: i64,
}

impl Inner {
    fn owned_card(&self, owner_id: Uuid, card_id: i64) -> Option<&StoredCard> {
        self.cards.get(&card_id).filter(|c| c.owner_id == owner_id)
    }

    fn remove_card(&mut self, card_id: i64) {
        if let Some(stored) = self.cards.remove(&card_id) {
            let emptied = self
                .due
                .get_mut(&stored.owner_id)
                .is_some_and(|index| index.remove(card_id) && index.is_empty());
            if emptied {
                self.due.remove(&stored.owner_id);
            }
            self.reviews.retain(|r| r.card_id != card_id);
        }
    }
}

/// Review store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable; every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.check_online()?;
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.check_online()?;
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    async fn create_user(&self, name: Option<&str>) -> Result<User, StoreError> {
        let mut guard = self.write()?;
        let user = User::new(name, Utc::now());
        guard.tokens.insert(user.token.clone(), user.id);
        guard.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let guard = self.read()?;
        Ok(guard
            .tokens
            .get(token)
            .and_then(|id| guard.users.get(id))
            .cloned())
    }

    async fn touch_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.write()?;
        if let Some(user) = guard.users.get_mut(&user_id) {
            user.last_seen_at = Utc::now();
        }
        Ok(())
    }

    async fn create_cards(
        &self,
        owner_id: Uuid,
        document_id: i64,
        drafts: &[CardDraft],
        initial: &ReviewState,
    ) -> Result<Vec<StoredCard>, StoreError> {
        let mut guard = self.write()?;
        let mut created = Vec::with_capacity(drafts.len());

        for draft in drafts {
            guard.last_card_id += 1;
            let stored = StoredCard {
                owner_id,
                card: Card {
                    id: guard.last_card_id,
                    document_id,
                    front: draft.front.clone(),
                    back: draft.back.clone(),
                    // A fresh state is due at creation time.
                    created_at: initial.due_at,
                },
                state: initial.clone(),
                version: 1,
            };
            guard
                .due
                .entry(owner_id)
                .or_default()
                .upsert(stored.card.id, stored.state.due_at);
            guard.cards.insert(stored.card.id, stored.clone());
            created.push(stored);
        }

        Ok(created)
    }

    async fn get_card(&self, owner_id: Uuid, card_id: i64) -> Result<Option<StoredCard>, StoreError> {
        let guard = self.read()?;
        Ok(guard.owned_card(owner_id, card_id).cloned())
    }

    async fn list_cards(
        &self,
        owner_id: Uuid,
        document_id: Option<i64>,
    ) -> Result<Vec<StoredCard>, StoreError> {
        let guard = self.read()?;
        let mut cards: Vec<StoredCard> = guard
            .cards
            .values()
            .filter(|c| c.owner_id == owner_id)
            .filter(|c| document_id.map_or(true, |d| c.card.document_id == d))
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.card.id);
        Ok(cards)
    }

    async fn delete_card(&self, owner_id: Uuid, card_id: i64) -> Result<bool, StoreError> {
        let mut guard = self.write()?;
        if guard.owned_card(owner_id, card_id).is_none() {
            return Ok(false);
        }
        guard.remove_card(card_id);
        Ok(true)
    }

    async fn delete_document_cards(&self, owner_id: Uuid, document_id: i64) -> Result<u64, StoreError> {
        let mut guard = self.write()?;
        let ids: Vec<i64> = guard
            .cards
            .values()
            .filter(|c| c.owner_id == owner_id && c.card.document_id == document_id)
            .map(|c| c.card.id)
            .collect();
        for id in &ids {
            guard.remove_card(*id);
        }
        Ok(ids.len() as u64)
    }

    async fn list_due(&self, owner_id: Uuid, filter: &DueFilter) -> Result<Vec<StoredCard>, StoreError> {
        let guard = self.read()?;
        let Some(index) = guard.due.get(&owner_id) else {
            return Ok(Vec::new());
        };

        let due = index
            .due_until(filter.cutoff)
            .filter_map(|key| guard.cards.get(&key.card_id))
            .filter(|c| filter.matches(c))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(due)
    }

    async fn apply_review(
        &self,
        request: &ReviewRequest,
        transition: &(dyn for<'a> Fn(&'a ReviewState) -> ReviewState + Send + Sync),
    ) -> Result<ReviewOutcome, StoreError> {
        let mut guard = self.write()?;

        let current = guard
            .owned_card(request.owner_id, request.card_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("card {}", request.card_id)))?;

        if let Some(expected) = request.expected_version {
            if expected != current.version {
                return Err(version_conflict(request.card_id, expected, current.version));
            }
        }

        let next = transition(&current.state);
        let version = current.version + 1;

        guard
            .due
            .entry(request.owner_id)
            .or_default()
            .upsert(request.card_id, next.due_at);
        guard
            .reviews
            .push(ReviewLog::new(request, &current.state, &next));
        if let Some(stored) = guard.cards.get_mut(&request.card_id) {
            stored.state = next.clone();
            stored.version = version;
        }

        Ok(ReviewOutcome {
            card_id: request.card_id,
            previous: current.state,
            state: next,
            version,
        })
    }

    async fn review_history(&self, owner_id: Uuid, card_id: i64) -> Result<Vec<ReviewLog>, StoreError> {
        let guard = self.read()?;
        if guard.owned_card(owner_id, card_id).is_none() {
            return Err(StoreError::NotFound(format!("card {card_id}")));
        }
        let mut logs: Vec<ReviewLog> = guard
            .reviews
            .iter()
            .filter(|r| r.card_id == card_id)
            .cloned()
            .collect();
        logs.sort_by_key(|r| r.reviewed_at);
        Ok(logs)
    }

    async fn count_reviews_since(
        &self,
        owner_id: Uuid,
        document_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let guard = self.read()?;
        let count = guard
            .reviews
            .iter()
            .filter(|r| r.owner_id == owner_id && r.reviewed_at >= since)
            .filter(|r| {
                document_id.map_or(true, |d| {
                    guard
                        .cards
                        .get(&r.card_id)
                        .is_some_and(|c| c.card.document_id == d)
                })
            })
            .count();
        Ok(count as u64)
    }
}
