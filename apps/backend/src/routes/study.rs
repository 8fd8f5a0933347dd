//! Study endpoints

use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::error::Result;
use crate::models::*;
use crate::routes::auth::AuthenticatedUser;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::time::{end_of_local_day, parse_timestamp, validate_offset};
use crate::AppState;

/// GET /api/study/due
pub async fn due(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiQuery(query): ApiQuery<DueQuery>,
) -> Result<Json<DueListResponse>> {
    let now = parse_timestamp(query.at.as_deref(), Utc::now())?;
    let cutoff = match (query.end_of_day, query.timezone_offset) {
        (true, offset) => end_of_local_day(now, offset.unwrap_or(0))?,
        (false, Some(offset)) => {
            validate_offset(offset)?;
            now
        }
        (false, None) => now,
    };

    let filter = DueFilter {
        cutoff,
        document_id: query.document_id,
        limit: query.limit,
    };
    let cards = state.scheduler.list_due(auth.user_id, &filter).await?;

    Ok(Json(DueListResponse {
        cards: cards.into_iter().map(DueCardResponse::from).collect(),
        cutoff,
    }))
}

/// POST /api/study/review
pub async fn review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiJson(payload): ApiJson<SubmitReviewRequest>,
) -> Result<Json<SubmitReviewResponse>> {
    let grade = payload.grade.into_grade()?;
    let now = parse_timestamp(payload.reviewed_at.as_deref(), Utc::now())?;

    let outcome = state
        .scheduler
        .submit_review(auth.user_id, payload.card_id, grade, now, payload.expected_version)
        .await?;

    Ok(Json(outcome.into()))
}

/// POST /api/study/flashcards/:card_id/review
pub async fn card_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(card_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CardReviewRequest>,
) -> Result<Json<SubmitReviewResponse>> {
    let grade = payload.grade.into_grade()?;
    let now = parse_timestamp(payload.reviewed_at.as_deref(), Utc::now())?;

    let outcome = state
        .scheduler
        .submit_review(auth.user_id, card_id, grade, now, payload.expected_version)
        .await?;

    Ok(Json(outcome.into()))
}

/// GET /api/study/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<StudyStatsResponse>> {
    let now = parse_timestamp(query.at.as_deref(), Utc::now())?;
    let stats = state
        .scheduler
        .stats(auth.user_id, now, query.document_id)
        .await?;

    Ok(Json(stats))
}
