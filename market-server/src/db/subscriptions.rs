use shared::models::Plan;
use sqlx::PgPool;

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    pub stripe_price_id: String,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    pub max_listings: Option<i32>,
    pub featured_listings: i32,
    pub analytics: bool,
    pub priority_support: bool,
    pub custom_branding: bool,
    pub created_at: i64,
}

pub struct CreateSubscription<'a> {
    /// Stripe subscription id
    pub id: &'a str,
    pub user_id: &'a str,
    pub plan: Plan,
    pub stripe_price_id: &'a str,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub now: i64,
}

/// Idempotent upsert keyed by the Stripe subscription id (webhook retries)
pub async fn create(pool: &PgPool, sub: &CreateSubscription<'_>) -> Result<(), sqlx::Error> {
    let features = sub.plan.features();
    sqlx::query(
        "INSERT INTO subscriptions (id, user_id, plan, stripe_price_id, status,
            current_period_start, current_period_end, max_listings, featured_listings,
            analytics, priority_support, custom_branding, created_at)
         VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (id) DO UPDATE SET
            status = 'active', plan = $3, stripe_price_id = $4,
            current_period_start = $5, current_period_end = $6,
            max_listings = $7, featured_listings = $8,
            analytics = $9, priority_support = $10, custom_branding = $11",
    )
    .bind(sub.id)
    .bind(sub.user_id)
    .bind(sub.plan.as_db())
    .bind(sub.stripe_price_id)
    .bind(sub.current_period_start)
    .bind(sub.current_period_end)
    .bind(features.max_listings)
    .bind(features.featured_listings)
    .bind(features.analytics)
    .bind(features.priority_support)
    .bind(features.custom_branding)
    .bind(sub.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_active_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM subscriptions
         WHERE user_id = $1 AND status = 'active'
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_status(
    pool: &PgPool,
    subscription_id: &str,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscriptions SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(subscription_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_cancel_at_period_end(
    pool: &PgPool,
    subscription_id: &str,
    cancel: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscriptions SET cancel_at_period_end = $1 WHERE id = $2")
        .bind(cancel)
        .bind(subscription_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_period_end(
    pool: &PgPool,
    subscription_id: &str,
    period_end: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscriptions SET current_period_end = $1 WHERE id = $2")
        .bind(period_end)
        .bind(subscription_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find_user_by_sub_id(
    pool: &PgPool,
    stripe_sub_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM subscriptions WHERE id = $1")
        .bind(stripe_sub_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}
