//! Per-document card endpoints

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;

use crate::error::Result;
use crate::models::{CardResponse, CreateCardsRequest, CreateCardsResponse, DeleteResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::AppState;

/// POST /api/documents/:document_id/cards
pub async fn create_cards(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(document_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CreateCardsRequest>,
) -> Result<(StatusCode, Json<CreateCardsResponse>)> {
    let created = state
        .scheduler
        .create_cards(auth.user_id, document_id, &payload.cards, Utc::now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCardsResponse {
            cards: created.into_iter().map(CardResponse::from).collect(),
        }),
    ))
}

/// DELETE /api/documents/:document_id/cards
pub async fn delete_cards(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(document_id): ApiPath<i64>,
) -> Result<Json<DeleteResponse>> {
    let deleted_count = state
        .scheduler
        .delete_document_cards(auth.user_id, document_id)
        .await?;

    Ok(Json(DeleteResponse { deleted_count }))
}
