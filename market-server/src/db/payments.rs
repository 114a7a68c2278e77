//! Payment records mirroring processor-side payment intents

use shared::error::{AppError, ErrorCode};
use shared::models::{OrderStatus, PaymentStatus};
use sqlx::PgPool;

use crate::error::{ServiceError, ServiceResult};

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub stripe_payment_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    pub refund_amount: f64,
    pub refund_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct CreatePayment<'a> {
    pub id: &'a str,
    pub order_id: &'a str,
    pub user_id: &'a str,
    pub stripe_payment_id: &'a str,
    pub amount: f64,
    pub currency: &'a str,
    pub payment_method: &'a str,
    pub now: i64,
}

pub async fn create(pool: &PgPool, payment: &CreatePayment<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payments (id, order_id, user_id, stripe_payment_id, amount, currency,
            status, payment_method, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $8)",
    )
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(payment.user_id)
    .bind(payment.stripe_payment_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.payment_method)
    .bind(payment.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_order(pool: &PgPool, order_id: &str) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_stripe_id(
    pool: &PgPool,
    stripe_payment_id: &str,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE stripe_payment_id = $1")
        .bind(stripe_payment_id)
        .fetch_optional(pool)
        .await
}

/// Webhook failure path: pending -> failed (succeeded payments are untouched)
pub async fn mark_failed(
    pool: &PgPool,
    stripe_payment_id: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE payments SET status = 'failed', updated_at = $1
         WHERE stripe_payment_id = $2 AND status = 'pending'",
    )
    .bind(now)
    .bind(stripe_payment_id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}

/// Local bookkeeping for a processor-confirmed refund.
///
/// Payment -> refunded with amount/reason, order -> refunded, and the
/// buyer/seller counters the confirmation incremented are reversed — one
/// transaction, symmetric with `apply_payment_success`. Stock is not
/// restored (the goods shipped); product sold/revenue counters track
/// physical sales and are only reversed by cancellation.
pub async fn apply_refund(
    pool: &PgPool,
    payment_id: &str,
    refund_amount: f64,
    refund_reason: Option<&str>,
    now: i64,
) -> ServiceResult<Payment> {
    let mut tx = pool.begin().await?;

    let payment: Option<Payment> =
        sqlx::query_as("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?;
    let payment =
        payment.ok_or_else(|| ServiceError::App(AppError::new(ErrorCode::PaymentNotFound)))?;

    let status = PaymentStatus::from_db(&payment.status).ok_or_else(|| {
        ServiceError::Db(format!("payment {payment_id} has unknown status {}", payment.status).into())
    })?;

    if status == PaymentStatus::Refunded {
        return Err(ServiceError::App(AppError::new(
            ErrorCode::PaymentAlreadyRefunded,
        )));
    }
    if !status.can_refund() {
        return Err(ServiceError::App(
            AppError::new(ErrorCode::PaymentNotRefundable).with_detail("status", payment.status.clone()),
        ));
    }
    if refund_amount <= 0.0 || !refund_amount.is_finite() {
        return Err(ServiceError::App(AppError::validation(
            "Refund amount must be positive",
        )));
    }
    if refund_amount > payment.amount {
        return Err(ServiceError::App(
            AppError::new(ErrorCode::PaymentRefundExceedsAmount)
                .with_detail("amount", payment.amount),
        ));
    }

    let order: Option<crate::db::orders::Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(&payment.order_id)
            .fetch_optional(&mut *tx)
            .await?;
    let order = order.ok_or_else(|| ServiceError::App(AppError::new(ErrorCode::OrderNotFound)))?;

    let order_status = OrderStatus::from_db(&order.status).ok_or_else(|| {
        ServiceError::Db(format!("order {} has unknown status {}", order.id, order.status).into())
    })?;
    if !order_status.can_transition_to(OrderStatus::Refunded) {
        return Err(ServiceError::App(
            AppError::new(ErrorCode::OrderInvalidTransition)
                .with_detail("status", order.status.clone()),
        ));
    }

    sqlx::query(
        "UPDATE payments SET status = 'refunded', refund_amount = $1, refund_reason = $2,
            updated_at = $3
         WHERE id = $4",
    )
    .bind(refund_amount)
    .bind(refund_reason)
    .bind(now)
    .bind(payment_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE orders SET status = 'refunded' WHERE id = $1")
        .bind(&order.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE users SET total_purchases = total_purchases - 1,
            waste_reduced = waste_reduced - $1, co2_saved = co2_saved - $2
         WHERE id = $3",
    )
    .bind(order.total_waste_reduced)
    .bind(order.total_co2_saved)
    .bind(&order.buyer_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET total_sales = total_sales - 1 WHERE id = $1")
        .bind(&order.seller_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await.map_err(ServiceError::from)?;

    tracing::info!(
        payment_id = payment_id,
        order_id = %order.id,
        amount = refund_amount,
        "Payment refunded"
    );

    find_by_id(pool, payment_id)
        .await?
        .ok_or_else(|| ServiceError::App(AppError::new(ErrorCode::PaymentNotFound)))
}

/// Webhook `charge.refunded` path: records a processor-initiated refund
/// by payment-intent id, reusing the same transactional reversal.
pub async fn apply_refund_by_stripe_id(
    pool: &PgPool,
    stripe_payment_id: &str,
    refund_amount: f64,
    now: i64,
) -> ServiceResult<Option<Payment>> {
    let Some(payment) = find_by_stripe_id(pool, stripe_payment_id).await? else {
        return Ok(None);
    };
    match apply_refund(pool, &payment.id, refund_amount, Some("processor refund"), now).await {
        Ok(p) => Ok(Some(p)),
        // Already refunded locally: the webhook is an echo of our own refund
        Err(ServiceError::App(e)) if e.code == ErrorCode::PaymentAlreadyRefunded => Ok(None),
        Err(e) => Err(e),
    }
}
