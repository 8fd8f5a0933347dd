//! Common test utilities and fixtures for integration tests.
//!
//! `TestContext::new` runs the full router against the in-memory store.
//! `TestContext::with_postgres` needs DATABASE_URL and is only used by tests
//! marked `#[ignore = "requires database"]`.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use axum_test::TestServer;
use tokio_test::assert_ok;
use uuid::Uuid;

use study_scheduler_backend::config::Config;
use study_scheduler_backend::db::{Database, MemoryStore, ReviewStore};
use study_scheduler_backend::models::{CardDraft, StoredCard};
use study_scheduler_backend::{router, AppState};

/// Test context holding the store and the router under test.
pub struct TestContext {
    pub state: AppState,
    memory: Option<Arc<MemoryStore>>,
    db: Option<Arc<Database>>,
    app: Router,
}

impl TestContext {
    /// Context backed by a fresh in-memory store.
    pub fn new() -> Self {
        let memory = Arc::new(MemoryStore::new());
        let state = AppState::new(memory.clone(), Config::default().scheduler);
        let app = router(state.clone());

        Self {
            state,
            memory: Some(memory),
            db: None,
            app,
        }
    }

    /// Context backed by PostgreSQL.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or the connection fails.
    pub async fn with_postgres() -> Self {
        dotenvy::dotenv().ok();

        let config = Config::from_env().expect("Invalid test configuration");
        let database = config
            .database
            .as_ref()
            .expect("DATABASE_URL must be set for database tests");

        let db = Database::connect(database)
            .await
            .expect("Failed to connect to test database");
        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        let db = Arc::new(db);
        let state = AppState::new(db.clone(), config.scheduler.clone());
        let app = router(state.clone());

        Self {
            state,
            memory: None,
            db: Some(db),
            app,
        }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn server(&self) -> TestServer {
        assert_ok!(TestServer::new(self.router()))
    }

    pub fn store(&self) -> &Arc<dyn ReviewStore> {
        &self.state.store
    }

    /// Create a test user and return its ID and token.
    pub async fn create_test_user(&self, name: Option<&str>) -> (Uuid, String) {
        let user = self
            .store()
            .create_user(name)
            .await
            .expect("Failed to create test user");
        (user.id, user.token)
    }

    /// Create `count` cards in `document_id` directly through the scheduler.
    pub async fn seed_cards(&self, owner_id: Uuid, document_id: i64, count: usize) -> Vec<StoredCard> {
        let drafts: Vec<CardDraft> = (0..count)
            .map(|i| CardDraft::new(format!("Question {}?", i + 1), format!("Answer {}.", i + 1)))
            .collect();
        self.state
            .scheduler
            .create_cards(owner_id, document_id, &drafts, chrono::Utc::now())
            .await
            .expect("Failed to seed cards")
    }

    /// Format authorization header value.
    pub fn auth_header_value(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("token is a valid header value")
    }

    /// Toggle the in-memory store's availability.
    pub fn set_store_offline(&self, offline: bool) {
        self.memory
            .as_ref()
            .expect("only the in-memory store can be taken offline")
            .set_offline(offline);
    }

    /// Remove a user and everything it owns from PostgreSQL.
    pub async fn cleanup_user(&self, user_id: Uuid) {
        if let Some(db) = &self.db {
            // Cards, states and reviews cascade from the user row.
            let _ = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user_id)
                .execute(db.pool())
                .await;
        }
    }
}
