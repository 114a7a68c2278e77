//! Review endpoints

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::response::PaginatedResponse;

use crate::auth::UserIdentity;
use crate::db;
use crate::state::AppState;

use super::ApiResult;

/// POST /api/reviews
#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub product_id: String,
    pub rating: i32,
    pub comment: String,
}

pub async fn create_review(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<CreateReviewRequest>,
) -> ApiResult<db::reviews::Review> {
    if !(1..=5).contains(&req.rating) {
        return Err(AppError::new(ErrorCode::ReviewInvalidRating));
    }
    let comment = req.comment.trim();
    if comment.is_empty() || comment.len() > 500 {
        return Err(AppError::validation("Comment must be 1-500 characters")
            .with_detail("field", "comment"));
    }

    if db::products::find_by_id(&state.pool, &req.product_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .is_none()
    {
        return Err(AppError::new(ErrorCode::ProductNotFound));
    }

    // Verified purchase: a delivered order containing this product
    let order_id = db::reviews::eligible_order(&state.pool, &identity.user_id, &req.product_id)
        .await
        .map_err(|e| {
            tracing::error!("Review eligibility query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::ReviewNotEligible))?;

    let review_id = uuid::Uuid::new_v4().to_string();
    let now = crate::util::now_millis();

    let review = db::reviews::create(
        &state.pool,
        &db::reviews::CreateReview {
            id: &review_id,
            product_id: &req.product_id,
            user_id: &identity.user_id,
            order_id: &order_id,
            rating: req.rating,
            comment,
            now,
        },
    )
    .await?;

    tracing::info!(
        review_id = %review_id,
        product_id = %req.product_id,
        rating = req.rating,
        "Review created"
    );

    Ok(Json(review))
}

/// GET /api/reviews/product/:id
#[derive(Deserialize)]
pub struct ReviewsQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
}

pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<ReviewsQuery>,
) -> ApiResult<PaginatedResponse<db::reviews::Review>> {
    let (page, per_page, offset) = super::page_params(query.page, query.per_page, 10);

    let reviews = db::reviews::list_by_product(&state.pool, &product_id, per_page, offset)
        .await
        .map_err(|e| {
            tracing::error!("Reviews query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    let total = db::reviews::count_by_product(&state.pool, &product_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?;

    Ok(Json(PaginatedResponse::new(
        reviews,
        page as u32,
        per_page as u32,
        total as u64,
    )))
}
