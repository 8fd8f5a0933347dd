//! Card lookup and deletion endpoints

use axum::{extract::State, Extension, Json};

use crate::error::Result;
use crate::models::{CardResponse, DeleteResponse, ReviewHistoryResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::routes::extract::ApiPath;
use crate::AppState;

/// GET /api/cards/:card_id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(card_id): ApiPath<i64>,
) -> Result<Json<CardResponse>> {
    let card = state.scheduler.get_card(auth.user_id, card_id).await?;
    Ok(Json(card.into()))
}

/// DELETE /api/cards/:card_id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(card_id): ApiPath<i64>,
) -> Result<Json<DeleteResponse>> {
    state.scheduler.delete_card(auth.user_id, card_id).await?;
    Ok(Json(DeleteResponse { deleted_count: 1 }))
}

/// GET /api/cards/:card_id/reviews
pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(card_id): ApiPath<i64>,
) -> Result<Json<ReviewHistoryResponse>> {
    let reviews = state.scheduler.review_history(auth.user_id, card_id).await?;
    Ok(Json(ReviewHistoryResponse { reviews }))
}
