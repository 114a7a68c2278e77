//! Stripe webhook handler
//!
//! POST /api/payments/webhook — handles Stripe events (raw body for
//! signature verification). Event ids are recorded in an idempotency
//! ledger before dispatch, so a retried delivery cannot reapply side
//! effects; the payment/order routines carry their own status guards on
//! top of that.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use shared::models::{Plan, SubscriptionStatus};

use crate::db::orders::PaymentOutcome;
use crate::state::AppState;
use crate::{db, email, stripe};

/// Handle incoming Stripe webhook events
///
/// Must receive raw body (not JSON) for HMAC signature verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // 1. Get Stripe-Signature header
    let sig_header = match headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // 2. Verify signature
    if let Err(e) = stripe::verify_webhook_signature(&body, sig_header, &state.stripe.webhook_secret)
    {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST.into_response();
    }

    // 3. Parse JSON event
    let event: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let event_type = event["type"].as_str().unwrap_or("");
    tracing::info!(event_type = event_type, "Received Stripe webhook");

    // 4. Idempotency: INSERT first, check rows_affected (eliminates TOCTOU race)
    let event_id = match event["id"].as_str() {
        Some(id) => id,
        None => {
            tracing::warn!("Webhook event missing id");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let now = crate::util::now_millis();
    match db::webhook_events::try_record(&state.pool, event_id, event_type, now).await {
        Ok(true) => {} // New event, proceed
        Ok(false) => {
            tracing::info!(event_id = event_id, "Duplicate webhook event, skipping");
            return received();
        }
        Err(e) => {
            tracing::error!(%e, "DB error recording webhook event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    // 5. Handle event types
    let status = match event_type {
        "payment_intent.succeeded" => handle_payment_succeeded(&state, &event).await,
        "payment_intent.payment_failed" => handle_payment_failed(&state, &event).await,
        "charge.refunded" => handle_charge_refunded(&state, &event).await,
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        "customer.subscription.updated" => handle_subscription_updated(&state, &event).await,
        "customer.subscription.deleted" => handle_subscription_deleted(&state, &event).await,
        "invoice.paid" => handle_invoice_paid(&state, &event).await,
        "invoice.payment_failed" => handle_invoice_payment_failed(&state, &event).await,
        _ => {
            tracing::debug!(event_type = event_type, "Unhandled webhook event type");
            StatusCode::OK
        }
    };

    if status != StatusCode::OK {
        // Free the ledger slot so the processor's retry can reprocess
        let _ = sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&state.pool)
            .await;
        return status.into_response();
    }

    received()
}

fn received() -> Response {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "received": true })),
    )
        .into_response()
}

fn event_object<'a>(event: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
    event.get("data").and_then(|d| d.get("object"))
}

/// payment_intent.succeeded → confirm the order and deduct stock
async fn handle_payment_succeeded(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };
    let Some(intent_id) = obj["id"].as_str() else {
        tracing::warn!("payment_intent.succeeded missing id");
        return StatusCode::OK;
    };

    let payment = match db::payments::find_by_stripe_id(&state.pool, intent_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::warn!(intent_id = intent_id, "No payment for intent");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error finding payment");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let now = crate::util::now_millis();
    let payment_result = serde_json::json!({
        "id": intent_id,
        "status": obj["status"].as_str().unwrap_or("succeeded"),
        "source": "webhook",
        "update_time": now,
    });

    match db::orders::apply_payment_success(&state.pool, &payment.order_id, &payment_result, now)
        .await
    {
        Ok(PaymentOutcome::Applied) => {
            if let Ok(Some(buyer)) = db::users::find_by_id(&state.pool, &payment.user_id).await
                && let Ok(Some(order)) = db::orders::find_by_id(&state.pool, &payment.order_id).await
            {
                let _ = email::send_order_confirmation(
                    &state.ses,
                    &state.ses_from_email,
                    &buyer.email,
                    &order.order_number,
                    order.total_price,
                )
                .await;
            }
            StatusCode::OK
        }
        Ok(PaymentOutcome::AlreadyPaid) => {
            tracing::info!(
                order_id = %payment.order_id,
                "Order already confirmed, webhook was a duplicate path"
            );
            StatusCode::OK
        }
        Err(e) => {
            let app_err: shared::error::AppError = e.into();
            tracing::error!(
                order_id = %payment.order_id,
                code = %app_err.code,
                "Failed to apply payment success: {}",
                app_err.message
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// payment_intent.payment_failed → mark payment failed, notify buyer
async fn handle_payment_failed(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };
    let Some(intent_id) = obj["id"].as_str() else {
        return StatusCode::OK;
    };

    let now = crate::util::now_millis();
    match db::payments::mark_failed(&state.pool, intent_id, now).await {
        Ok(true) => {
            if let Ok(Some(payment)) = db::payments::find_by_stripe_id(&state.pool, intent_id).await
                && let Ok(Some(buyer)) = db::users::find_by_id(&state.pool, &payment.user_id).await
            {
                let _ =
                    email::send_payment_failed(&state.ses, &state.ses_from_email, &buyer.email)
                        .await;
            }
            StatusCode::OK
        }
        Ok(false) => StatusCode::OK,
        Err(e) => {
            tracing::error!(%e, "Failed to mark payment failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// charge.refunded → mirror a processor-initiated refund
async fn handle_charge_refunded(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };
    let Some(intent_id) = obj["payment_intent"].as_str() else {
        return StatusCode::OK;
    };
    // Stripe reports refunded amounts in cents
    let refunded = obj["amount_refunded"].as_i64().unwrap_or(0) as f64 / 100.0;
    if refunded <= 0.0 {
        return StatusCode::OK;
    }

    let now = crate::util::now_millis();
    match db::payments::apply_refund_by_stripe_id(&state.pool, intent_id, refunded, now).await {
        Ok(Some(payment)) => {
            if let Ok(Some(buyer)) = db::users::find_by_id(&state.pool, &payment.user_id).await {
                let _ =
                    email::send_refund_processed(&state.ses, &state.ses_from_email, &buyer.email)
                        .await;
            }
            StatusCode::OK
        }
        Ok(None) => StatusCode::OK,
        Err(e) => {
            let app_err: shared::error::AppError = e.into();
            tracing::error!(intent_id = intent_id, "Failed to mirror refund: {}", app_err.message);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// checkout.session.completed → create seller subscription
async fn handle_checkout_completed(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };

    let Some(customer_id) = obj["customer"].as_str() else {
        tracing::warn!("checkout.session.completed missing customer");
        return StatusCode::OK;
    };
    let Some(subscription_id) = obj["subscription"].as_str() else {
        tracing::warn!("checkout.session.completed missing subscription");
        return StatusCode::OK;
    };

    let user = match db::users::find_by_stripe_customer(&state.pool, customer_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::warn!(customer_id = customer_id, "No user for Stripe customer");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error finding user by Stripe customer");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let plan = obj
        .get("metadata")
        .and_then(|m| m["plan"].as_str())
        .and_then(Plan::from_db)
        .unwrap_or(Plan::Basic);

    let price_id = match plan {
        Plan::Basic => &state.stripe.basic_price_id,
        Plan::Premium => &state.stripe.premium_price_id,
        Plan::Enterprise => &state.stripe.enterprise_price_id,
    };

    let now = crate::util::now_millis();
    let sub = db::subscriptions::CreateSubscription {
        id: subscription_id,
        user_id: &user.id,
        plan,
        stripe_price_id: price_id,
        current_period_start: Some(now),
        current_period_end: None, // set by invoice.paid events
        now,
    };
    if let Err(e) = db::subscriptions::create(&state.pool, &sub).await {
        tracing::error!(%e, "Failed to create subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Err(e) = db::users::set_subscription_mirror(
        &state.pool,
        &user.id,
        Some(plan.as_db()),
        Some(SubscriptionStatus::Active.as_db()),
        None,
    )
    .await
    {
        tracing::error!(%e, "Failed to mirror subscription on user");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    tracing::info!(
        user_id = %user.id,
        subscription_id = subscription_id,
        plan = plan.as_db(),
        "Subscription activated via Stripe checkout"
    );

    let _ = email::send_subscription_activated(
        &state.ses,
        &state.ses_from_email,
        &user.email,
        plan.as_db(),
    )
    .await;

    let detail = serde_json::json!({ "subscription_id": subscription_id, "plan": plan.as_db() });
    let _ = db::audit::log(
        &state.pool,
        &user.id,
        "subscription_activated",
        Some(&detail),
        None,
        now,
    )
    .await;

    StatusCode::OK
}

/// customer.subscription.updated → update local mirror
async fn handle_subscription_updated(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };
    let Some(sub_id) = obj["id"].as_str() else {
        return StatusCode::OK;
    };

    let status = SubscriptionStatus::from_processor(obj["status"].as_str().unwrap_or("active"));

    if let Err(e) = db::subscriptions::update_status(&state.pool, sub_id, status.as_db()).await {
        tracing::error!(%e, "Failed to update subscription status");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Ok(Some(user_id)) = db::subscriptions::find_user_by_sub_id(&state.pool, sub_id).await
        && let Ok(Some(sub)) = db::subscriptions::find_by_id(&state.pool, sub_id).await
    {
        let _ = db::users::set_subscription_mirror(
            &state.pool,
            &user_id,
            Some(&sub.plan),
            Some(status.as_db()),
            sub.current_period_end,
        )
        .await;
    }

    tracing::info!(
        subscription_id = sub_id,
        status = status.as_db(),
        "Subscription updated"
    );
    StatusCode::OK
}

/// customer.subscription.deleted → cancel local mirror
async fn handle_subscription_deleted(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };
    let Some(sub_id) = obj["id"].as_str() else {
        return StatusCode::OK;
    };

    if let Err(e) =
        db::subscriptions::update_status(&state.pool, sub_id, SubscriptionStatus::Cancelled.as_db())
            .await
    {
        tracing::error!(%e, "Failed to cancel subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Ok(Some(user_id)) = db::subscriptions::find_user_by_sub_id(&state.pool, sub_id).await {
        let _ = db::users::set_subscription_mirror(
            &state.pool,
            &user_id,
            None,
            Some(SubscriptionStatus::Cancelled.as_db()),
            None,
        )
        .await;
        tracing::info!(user_id = %user_id, "Subscription cancelled (deleted at processor)");

        if let Ok(Some(user)) = db::users::find_by_id(&state.pool, &user_id).await {
            let _ =
                email::send_subscription_canceled(&state.ses, &state.ses_from_email, &user.email)
                    .await;
        }
    }

    StatusCode::OK
}

/// invoice.paid → update current_period_end
async fn handle_invoice_paid(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };
    let Some(sub_id) = obj["subscription"].as_str() else {
        return StatusCode::OK;
    };

    if let Some(period_end) = obj
        .get("lines")
        .and_then(|l| l.get("data"))
        .and_then(|d| d.as_array())
        .and_then(|a| a.first())
        .and_then(|line| line.get("period"))
        .and_then(|p| p["end"].as_i64())
    {
        let period_end_ms = period_end * 1000; // Stripe uses seconds
        if let Err(e) =
            db::subscriptions::update_period_end(&state.pool, sub_id, period_end_ms).await
        {
            tracing::error!(%e, "Failed to update subscription period");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    tracing::info!(subscription_id = sub_id, "Invoice paid, period updated");
    StatusCode::OK
}

/// invoice.payment_failed → subscription past_due, notify seller
async fn handle_invoice_payment_failed(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(obj) = event_object(event) else {
        return StatusCode::OK;
    };
    let Some(sub_id) = obj["subscription"].as_str() else {
        return StatusCode::OK;
    };

    if let Err(e) =
        db::subscriptions::update_status(&state.pool, sub_id, SubscriptionStatus::PastDue.as_db())
            .await
    {
        tracing::error!(%e, "Failed to update subscription to past_due");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Ok(Some(sub)) = db::subscriptions::find_by_id(&state.pool, sub_id).await {
        let user_id = sub.user_id.clone();
        let _ = db::users::set_subscription_mirror(
            &state.pool,
            &user_id,
            Some(&sub.plan),
            Some(SubscriptionStatus::PastDue.as_db()),
            sub.current_period_end,
        )
        .await;
        if let Ok(Some(user)) = db::users::find_by_id(&state.pool, &user_id).await {
            let _ =
                email::send_payment_failed(&state.ses, &state.ses_from_email, &user.email).await;
        }
        tracing::info!(user_id = %user_id, "Subscription past due (invoice payment failed)");
    }

    StatusCode::OK
}
