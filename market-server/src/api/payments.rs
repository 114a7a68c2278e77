//! Payment endpoints: intent creation, lookup, admin refunds

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{OrderStatus, PaymentStatus};

use crate::auth::UserIdentity;
use crate::db;
use crate::money;
use crate::state::AppState;
use crate::stripe;

use super::ApiResult;

/// POST /api/payments/create-intent
#[derive(Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: String,
}

#[derive(serde::Serialize)]
pub struct CreateIntentResponse {
    pub payment_id: String,
    pub client_secret: String,
}

pub async fn create_intent(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<CreateIntentRequest>,
) -> ApiResult<CreateIntentResponse> {
    let order = db::orders::find_by_id(&state.pool, &req.order_id)
        .await
        .map_err(|e| {
            tracing::error!("Order query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

    if order.buyer_id != identity.user_id {
        return Err(AppError::permission_denied(
            "Not authorized to pay this order",
        ));
    }

    match OrderStatus::from_db(&order.status) {
        Some(OrderStatus::Pending) => {}
        Some(s) if s.is_paid() => return Err(AppError::new(ErrorCode::OrderAlreadyPaid)),
        _ => {
            return Err(AppError::new(ErrorCode::OrderInvalidTransition)
                .with_detail("status", order.status.clone()));
        }
    }

    // One payment per order, enforced by the unique constraint as well
    if db::payments::find_by_order(&state.pool, &order.id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .is_some()
    {
        return Err(AppError::new(ErrorCode::PaymentAlreadyExists));
    }

    let intent = stripe::create_payment_intent(
        &state.stripe.secret_key,
        money::to_cents(order.total_price),
        "usd",
        &order.id,
        &identity.user_id,
    )
    .await
    .map_err(|e| {
        tracing::error!(order_id = %order.id, "Stripe intent creation failed: {e}");
        AppError::new(ErrorCode::PaymentSetupFailed)
    })?;

    let payment_id = uuid::Uuid::new_v4().to_string();
    let now = crate::util::now_millis();
    db::payments::create(
        &state.pool,
        &db::payments::CreatePayment {
            id: &payment_id,
            order_id: &order.id,
            user_id: &identity.user_id,
            stripe_payment_id: &intent.id,
            amount: order.total_price,
            currency: "usd",
            payment_method: &order.payment_method,
            now,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Payment insert error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    tracing::info!(
        payment_id = %payment_id,
        order_id = %order.id,
        amount = order.total_price,
        "Payment intent created"
    );

    Ok(Json(CreateIntentResponse {
        payment_id,
        client_secret: intent.client_secret,
    }))
}

/// GET /api/payments/:id
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
) -> ApiResult<db::payments::Payment> {
    let payment = db::payments::find_by_id(&state.pool, &id)
        .await
        .map_err(|e| {
            tracing::error!("Payment query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound))?;

    if !identity.is_self_or_admin(&payment.user_id) {
        return Err(AppError::permission_denied(
            "Not authorized to view this payment",
        ));
    }

    Ok(Json(payment))
}

/// POST /api/payments/:id/refund — admin only
#[derive(Deserialize)]
pub struct RefundRequest {
    /// Defaults to the full captured amount
    pub amount: Option<f64>,
    pub reason: Option<String>,
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> ApiResult<db::payments::Payment> {
    identity.require_admin()?;

    let payment = db::payments::find_by_id(&state.pool, &id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound))?;

    // Pre-check before touching the processor; the transactional reversal
    // re-checks under the row lock
    let status = PaymentStatus::from_db(&payment.status)
        .ok_or_else(|| AppError::new(ErrorCode::InternalError))?;
    if status == PaymentStatus::Refunded {
        return Err(AppError::new(ErrorCode::PaymentAlreadyRefunded));
    }
    if !status.can_refund() {
        return Err(AppError::new(ErrorCode::PaymentNotRefundable)
            .with_detail("status", payment.status.clone()));
    }
    let amount = req.amount.unwrap_or(payment.amount);
    if amount <= 0.0 || !amount.is_finite() {
        return Err(AppError::validation("Refund amount must be positive"));
    }
    if amount > payment.amount {
        return Err(AppError::new(ErrorCode::PaymentRefundExceedsAmount)
            .with_detail("amount", payment.amount));
    }

    stripe::create_refund(
        &state.stripe.secret_key,
        &payment.stripe_payment_id,
        money::to_cents(amount),
        req.reason.as_deref(),
    )
    .await
    .map_err(|e| {
        tracing::error!(payment_id = %id, "Stripe refund failed: {e}");
        AppError::new(ErrorCode::PaymentFailed)
    })?;

    let now = crate::util::now_millis();
    let payment =
        db::payments::apply_refund(&state.pool, &id, amount, req.reason.as_deref(), now).await?;

    if let Ok(Some(buyer)) = db::users::find_by_id(&state.pool, &payment.user_id).await {
        let _ =
            crate::email::send_refund_processed(&state.ses, &state.ses_from_email, &buyer.email)
                .await;
    }

    let detail = serde_json::json!({
        "payment_id": id,
        "order_id": payment.order_id,
        "amount": amount,
        "reason": req.reason,
    });
    let _ = db::audit::log(
        &state.pool,
        &identity.user_id,
        "payment_refunded",
        Some(&detail),
        None,
        now,
    )
    .await;

    Ok(Json(payment))
}
