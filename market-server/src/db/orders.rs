//! Order storage and the transactional fulfillment routines
//!
//! Payment success, cancellation and refund each mutate the order, its
//! products and both user rows. Every one of those sequences runs inside a
//! single transaction with guarded UPDATEs, so a partial failure rolls the
//! whole thing back and concurrent requests serialize on the order row.

use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use sqlx::PgPool;

use crate::error::{ServiceError, ServiceResult};

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub status: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub payment_method: String,
    pub payment_result: Option<serde_json::Value>,
    pub items_price: f64,
    pub shipping_price: f64,
    pub platform_fee: f64,
    pub total_price: f64,
    pub total_waste_reduced: f64,
    pub total_co2_saved: f64,
    pub paid_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub cancellation_reason: Option<String>,
    pub tracking_number: Option<String>,
    pub is_reviewed: bool,
    pub created_at: i64,
}

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: String,
    pub product_id: String,
    pub title: String,
    pub quantity: i32,
    pub price: f64,
    pub image: Option<String>,
    pub waste_reduced: f64,
    pub co2_saved: f64,
}

/// Line item snapshot taken at placement (server-side priced)
pub struct NewOrderItem {
    pub product_id: String,
    pub title: String,
    pub quantity: i32,
    pub price: f64,
    pub image: Option<String>,
    pub waste_reduced: f64,
    pub co2_saved: f64,
}

pub struct NewOrder<'a> {
    pub id: &'a str,
    pub order_number: &'a str,
    pub buyer_id: &'a str,
    pub seller_id: &'a str,
    pub street: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub zip_code: &'a str,
    pub country: &'a str,
    pub payment_method: &'a str,
    pub items_price: f64,
    pub shipping_price: f64,
    pub platform_fee: f64,
    pub total_price: f64,
    pub total_waste_reduced: f64,
    pub total_co2_saved: f64,
    pub items: &'a [NewOrderItem],
    pub now: i64,
}

/// Insert the order and its line items atomically.
pub async fn create(pool: &PgPool, order: &NewOrder<'_>) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO orders (id, order_number, buyer_id, seller_id, status,
            street, city, state, zip_code, country, payment_method,
            items_price, shipping_price, platform_fee, total_price,
            total_waste_reduced, total_co2_saved, created_at)
         VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(order.id)
    .bind(order.order_number)
    .bind(order.buyer_id)
    .bind(order.seller_id)
    .bind(order.street)
    .bind(order.city)
    .bind(order.state)
    .bind(order.zip_code)
    .bind(order.country)
    .bind(order.payment_method)
    .bind(order.items_price)
    .bind(order.shipping_price)
    .bind(order.platform_fee)
    .bind(order.total_price)
    .bind(order.total_waste_reduced)
    .bind(order.total_co2_saved)
    .bind(order.now)
    .execute(&mut *tx)
    .await?;

    for item in order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, title, quantity, price, image,
                waste_reduced, co2_saved)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.id)
        .bind(&item.product_id)
        .bind(&item.title)
        .bind(item.quantity)
        .bind(item.price)
        .bind(&item.image)
        .bind(item.waste_reduced)
        .bind(item.co2_saved)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn items(pool: &PgPool, order_id: &str) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(pool)
        .await
}

pub async fn list_by_buyer(
    pool: &PgPool,
    buyer_id: &str,
    limit: i32,
    offset: i32,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(buyer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_by_seller(
    pool: &PgPool,
    seller_id: &str,
    status_filter: Option<&str>,
    limit: i32,
    offset: i32,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM orders
         WHERE seller_id = $1 AND ($2::TEXT IS NULL OR status = $2)
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(seller_id)
    .bind(status_filter)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Outcome of [`apply_payment_success`]
#[derive(Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Side effects applied exactly once
    Applied,
    /// Order was not pending; nothing was touched (duplicate confirmation)
    AlreadyPaid,
}

/// The single authoritative payment-success path.
///
/// Used by BOTH the synchronous confirmation endpoint and the webhook, so
/// side effects cannot be applied twice:
/// 1. Guarded flip pending -> confirmed (zero rows = duplicate, stop).
/// 2. Per line item, guarded stock decrement (`stock >= qty`); a failed
///    decrement rolls back the flip and everything else.
/// 3. Buyer/seller counters and the payment row, same transaction.
pub async fn apply_payment_success(
    pool: &PgPool,
    order_id: &str,
    payment_result: &serde_json::Value,
    now: i64,
) -> ServiceResult<PaymentOutcome> {
    let mut tx = pool.begin().await?;

    let flipped = sqlx::query(
        "UPDATE orders SET status = 'confirmed', paid_at = $1, payment_result = $2
         WHERE id = $3 AND status = 'pending'",
    )
    .bind(now)
    .bind(payment_result)
    .bind(order_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if flipped == 0 {
        let exists: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;
        return match exists {
            None => Err(ServiceError::App(AppError::new(ErrorCode::OrderNotFound))),
            Some(_) => Ok(PaymentOutcome::AlreadyPaid),
        };
    }

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

    let items: Vec<OrderItem> =
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

    for item in &items {
        let updated = sqlx::query(
            "UPDATE products SET
                stock = stock - $1,
                total_sold = total_sold + $1,
                total_revenue = total_revenue + $2,
                status = CASE WHEN stock - $1 <= 0 THEN 'sold-out' ELSE status END,
                updated_at = $3
             WHERE id = $4 AND stock >= $1",
        )
        .bind(item.quantity)
        .bind(crate::money::line_total(item.price, item.quantity))
        .bind(now)
        .bind(&item.product_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            // Insufficient stock: dropping the transaction rolls back the flip
            return Err(ServiceError::App(
                AppError::new(ErrorCode::ProductOutOfStock)
                    .with_detail("product_id", item.product_id.clone()),
            ));
        }
    }

    sqlx::query(
        "UPDATE users SET total_purchases = total_purchases + 1,
            waste_reduced = waste_reduced + $1, co2_saved = co2_saved + $2
         WHERE id = $3",
    )
    .bind(order.total_waste_reduced)
    .bind(order.total_co2_saved)
    .bind(&order.buyer_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET total_sales = total_sales + 1 WHERE id = $1")
        .bind(&order.seller_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE payments SET status = 'succeeded', updated_at = $1
         WHERE order_id = $2 AND status = 'pending'",
    )
    .bind(now)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await.map_err(ServiceError::from)?;

    tracing::info!(
        order_id = order_id,
        order_number = %order.order_number,
        total = order.total_price,
        "Order confirmed, stock deducted"
    );

    Ok(PaymentOutcome::Applied)
}

/// Guarded shipment transition: confirmed/processing -> shipped.
/// Returns false when the order was not in a shippable state.
pub async fn mark_shipped(
    pool: &PgPool,
    order_id: &str,
    tracking_number: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE orders SET status = 'shipped', tracking_number = COALESCE($1, tracking_number)
         WHERE id = $2 AND status IN ('confirmed', 'processing')",
    )
    .bind(tracking_number)
    .bind(order_id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}

/// Guarded delivery transition: shipped -> delivered.
pub async fn mark_delivered(pool: &PgPool, order_id: &str, now: i64) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE orders SET status = 'delivered', delivered_at = $1
         WHERE id = $2 AND status = 'shipped'",
    )
    .bind(now)
    .bind(order_id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}

/// Cancel an order within the cancellation window.
///
/// For a paid order, restores exactly the quantities the confirmation
/// deducted, reverses the revenue/sold counters, and re-derives each
/// product's status from stock and expiry (a listing that was expired or
/// deactivated for independent reasons is never forced back to active).
pub async fn cancel(
    pool: &PgPool,
    order_id: &str,
    reason: Option<&str>,
    now: i64,
) -> ServiceResult<Order> {
    let mut tx = pool.begin().await?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

    let order = order.ok_or_else(|| ServiceError::App(AppError::new(ErrorCode::OrderNotFound)))?;

    let status = OrderStatus::from_db(&order.status).ok_or_else(|| {
        ServiceError::Db(format!("order {order_id} has unknown status {}", order.status).into())
    })?;

    if status == OrderStatus::Cancelled {
        return Err(ServiceError::App(AppError::new(
            ErrorCode::OrderAlreadyCancelled,
        )));
    }
    if !status.can_cancel() {
        return Err(ServiceError::App(
            AppError::new(ErrorCode::OrderNotCancellable).with_detail("status", order.status.clone()),
        ));
    }

    sqlx::query(
        "UPDATE orders SET status = 'cancelled', cancelled_at = $1, cancellation_reason = $2
         WHERE id = $3",
    )
    .bind(now)
    .bind(reason)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    // Unpaid orders never deducted stock; nothing to restore
    if status.is_paid() {
        let items: Vec<OrderItem> =
            sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;

        for item in &items {
            sqlx::query(
                "UPDATE products SET
                    stock = stock + $1,
                    total_sold = total_sold - $1,
                    total_revenue = total_revenue - $2,
                    updated_at = $3
                 WHERE id = $4",
            )
            .bind(item.quantity)
            .bind(crate::money::line_total(item.price, item.quantity))
            .bind(now)
            .bind(&item.product_id)
            .execute(&mut *tx)
            .await?;

            // Re-derive status rather than forcing 'active'
            sqlx::query(
                "UPDATE products SET status = CASE
                    WHEN status = 'inactive' THEN 'inactive'
                    WHEN stock <= 0 THEN 'sold-out'
                    WHEN expiry_date IS NOT NULL AND expiry_date < $1 THEN 'expired'
                    ELSE 'active'
                 END
                 WHERE id = $2",
            )
            .bind(now)
            .bind(&item.product_id)
            .execute(&mut *tx)
            .await?;
        }

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
    }

    tx.commit().await.map_err(ServiceError::from)?;

    tracing::info!(
        order_id = order_id,
        was_paid = status.is_paid(),
        "Order cancelled"
    );

    find_by_id(pool, order_id)
        .await?
        .ok_or_else(|| ServiceError::App(AppError::new(ErrorCode::OrderNotFound)))
}

pub async fn set_reviewed(
    tx: &mut sqlx::PgConnection,
    order_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET is_reviewed = TRUE WHERE id = $1")
        .bind(order_id)
        .execute(tx)
        .await?;
    Ok(())
}
