pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};
use scheduler_core::algorithm::sm2::Sm2;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::{Database, MemoryStore, ReviewStore};
use crate::services::ReviewScheduler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<ReviewScheduler>,
    pub store: Arc<dyn ReviewStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReviewStore>, sm2: Sm2) -> Self {
        Self {
            scheduler: Arc::new(ReviewScheduler::with_sm2(store.clone(), sm2)),
            store,
        }
    }
}

/// Build the full HTTP router.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        // User routes
        .route("/api/users/me", get(routes::users::me))
        // Study routes
        .route("/api/study/due", get(routes::study::due))
        .route("/api/study/review", post(routes::study::review))
        .route(
            "/api/study/flashcards/:card_id/review",
            post(routes::study::card_review),
        )
        .route("/api/study/stats", get(routes::study::stats))
        // Document routes
        .route(
            "/api/documents/:document_id/cards",
            post(routes::documents::create_cards).delete(routes::documents::delete_cards),
        )
        // Card routes
        .route(
            "/api/cards/:card_id",
            get(routes::cards::get).delete(routes::cards::delete),
        )
        .route("/api/cards/:card_id/reviews", get(routes::cards::history))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/users/register", post(routes::users::register))
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn ReviewStore> = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to database...");
            let db = Database::connect(database).await?;

            tracing::info!("Running migrations...");
            db.run_migrations().await?;
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let app = router(AppState::new(store, config.scheduler.clone()));
    let addr = config.bind_addr();

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<AppState>) -> error::Result<&'static str> {
    state.store.ping().await?;
    Ok("OK")
}
