//! Seller subscription endpoints: plan catalog, checkout, portal, cancel

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::Plan;

use crate::auth::UserIdentity;
use crate::db;
use crate::state::AppState;
use crate::stripe;

use super::ApiResult;

/// GET /api/subscriptions/plans
pub async fn list_plans() -> ApiResult<serde_json::Value> {
    let plans: Vec<serde_json::Value> = [Plan::Basic, Plan::Premium, Plan::Enterprise]
        .into_iter()
        .map(|p| {
            serde_json::json!({
                "plan": p.as_db(),
                "price_cents": p.price_cents(),
                "features": p.features(),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "plans": plans })))
}

/// POST /api/subscriptions/checkout
#[derive(Deserialize)]
pub struct CreateCheckoutRequest {
    pub plan: String,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<serde_json::Value> {
    identity.require_seller()?;

    let plan = Plan::from_db(&req.plan).ok_or_else(|| AppError::new(ErrorCode::PlanInvalid))?;

    let user = db::users::find_by_id(&state.pool, &identity.user_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    if db::subscriptions::find_active_by_user(&state.pool, &identity.user_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .is_some()
    {
        return Err(AppError::new(ErrorCode::SubscriptionAlreadyActive));
    }

    // Create or reuse Stripe customer
    let customer_id = if let Some(ref cid) = user.stripe_customer_id {
        cid.clone()
    } else {
        let cid = stripe::create_customer(&state.stripe.secret_key, &user.email, &user.id)
            .await
            .map_err(|e| {
                tracing::error!(%e, "Failed to create Stripe customer");
                AppError::new(ErrorCode::PaymentSetupFailed)
            })?;
        db::users::set_stripe_customer(&state.pool, &user.id, &cid)
            .await
            .map_err(|_| AppError::new(ErrorCode::InternalError))?;
        cid
    };

    let price_id = match plan {
        Plan::Basic => &state.stripe.basic_price_id,
        Plan::Premium => &state.stripe.premium_price_id,
        Plan::Enterprise => &state.stripe.enterprise_price_id,
    };

    let checkout_url = stripe::create_checkout_session(
        &state.stripe.secret_key,
        &customer_id,
        price_id,
        plan.as_db(),
        &state.checkout_success_url,
        &state.checkout_cancel_url,
    )
    .await
    .map_err(|e| {
        tracing::error!(%e, "Failed to create Stripe checkout");
        AppError::new(ErrorCode::PaymentSetupFailed)
    })?;

    let now = crate::util::now_millis();
    let detail = serde_json::json!({ "plan": plan.as_db() });
    let _ = db::audit::log(
        &state.pool,
        &identity.user_id,
        "checkout_created",
        Some(&detail),
        None,
        now,
    )
    .await;

    Ok(Json(serde_json::json!({ "checkout_url": checkout_url })))
}

/// GET /api/subscriptions/current
pub async fn current_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Option<db::subscriptions::Subscription>> {
    let sub = db::subscriptions::find_active_by_user(&state.pool, &identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Subscription query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(Json(sub))
}

/// DELETE /api/subscriptions/current — cancel at period end
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<serde_json::Value> {
    let sub = db::subscriptions::find_active_by_user(&state.pool, &identity.user_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::SubscriptionNotFound))?;

    stripe::cancel_subscription_at_period_end(&state.stripe.secret_key, &sub.id)
        .await
        .map_err(|e| {
            tracing::error!(subscription_id = %sub.id, "Stripe cancel failed: {e}");
            AppError::new(ErrorCode::PaymentSetupFailed)
        })?;

    db::subscriptions::set_cancel_at_period_end(&state.pool, &sub.id, true)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?;

    let now = crate::util::now_millis();
    let detail = serde_json::json!({ "subscription_id": sub.id });
    let _ = db::audit::log(
        &state.pool,
        &identity.user_id,
        "subscription_cancel_requested",
        Some(&detail),
        None,
        now,
    )
    .await;

    Ok(Json(serde_json::json!({
        "message": "Subscription will end at the current period boundary"
    })))
}

/// POST /api/subscriptions/portal — Stripe Customer Portal URL
pub async fn billing_portal(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<serde_json::Value> {
    let user = db::users::find_by_id(&state.pool, &identity.user_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    let customer_id = user
        .stripe_customer_id
        .as_deref()
        .ok_or_else(|| AppError::validation("No billing account on file"))?;

    let url = stripe::create_billing_portal_session(
        &state.stripe.secret_key,
        customer_id,
        &state.checkout_success_url,
    )
    .await
    .map_err(|e| {
        tracing::error!("Billing portal error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    Ok(Json(serde_json::json!({ "url": url })))
}
