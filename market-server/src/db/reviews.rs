//! Product reviews and their rating aggregates

use shared::error::{AppError, ErrorCode};
use sqlx::PgPool;

use crate::error::{ServiceError, ServiceResult};

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub order_id: String,
    pub rating: i32,
    pub comment: String,
    pub helpful: i32,
    pub is_verified_purchase: bool,
    pub created_at: i64,
}

pub struct CreateReview<'a> {
    pub id: &'a str,
    pub product_id: &'a str,
    pub user_id: &'a str,
    pub order_id: &'a str,
    pub rating: i32,
    pub comment: &'a str,
    pub now: i64,
}

/// Insert a review and fold it into the product and seller rating
/// aggregates in the same transaction. One review per user+product is
/// enforced by the unique constraint.
pub async fn create(pool: &PgPool, review: &CreateReview<'_>) -> ServiceResult<Review> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO reviews (id, product_id, user_id, order_id, rating, comment, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (product_id, user_id) DO NOTHING",
    )
    .bind(review.id)
    .bind(review.product_id)
    .bind(review.user_id)
    .bind(review.order_id)
    .bind(review.rating)
    .bind(review.comment)
    .bind(review.now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Err(ServiceError::App(AppError::new(
            ErrorCode::ReviewAlreadyExists,
        )));
    }

    // Running average without rescanning all reviews
    sqlx::query(
        "UPDATE products SET
            rating = (rating * review_count + $1) / (review_count + 1),
            review_count = review_count + 1
         WHERE id = $2",
    )
    .bind(review.rating as f64)
    .bind(review.product_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE users SET
            rating = (rating * review_count + $1) / (review_count + 1),
            review_count = review_count + 1
         WHERE id = (SELECT seller_id FROM products WHERE id = $2)",
    )
    .bind(review.rating as f64)
    .bind(review.product_id)
    .execute(&mut *tx)
    .await?;

    crate::db::orders::set_reviewed(&mut tx, review.order_id).await?;

    tx.commit().await.map_err(ServiceError::from)?;

    find_by_id(pool, review.id)
        .await?
        .ok_or_else(|| ServiceError::App(AppError::new(ErrorCode::ReviewNotFound)))
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_product(
    pool: &PgPool,
    product_id: &str,
    limit: i32,
    offset: i32,
) -> Result<Vec<Review>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_by_product(pool: &PgPool, product_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
}

/// A delivered, not-yet-reviewed order for this buyer+product, if any
pub async fn eligible_order(
    pool: &PgPool,
    user_id: &str,
    product_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT o.id FROM orders o
         JOIN order_items oi ON oi.order_id = o.id
         WHERE o.buyer_id = $1 AND oi.product_id = $2 AND o.status = 'delivered'
         ORDER BY o.created_at DESC
         LIMIT 1",
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}
