//! Analytics endpoints: seller/buyer dashboards, platform totals

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::Plan;

use crate::auth::UserIdentity;
use crate::db;
use crate::state::AppState;

use super::ApiResult;

/// GET /api/analytics/seller?from=&to=
#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

pub async fn seller_analytics(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<db::analytics::SellerOverview> {
    identity.require_seller()?;

    // The dashboard is a premium-plan feature for sellers
    if !identity.role.is_admin() {
        let sub = db::subscriptions::find_active_by_user(&state.pool, &identity.user_id)
            .await
            .map_err(|_| AppError::new(ErrorCode::InternalError))?;
        let has_analytics = sub
            .and_then(|s| Plan::from_db(&s.plan))
            .map(|p| p.features().analytics)
            .unwrap_or(false);
        if !has_analytics {
            return Err(AppError::new(ErrorCode::FeatureNotAvailable)
                .with_detail("feature", "analytics"));
        }
    }

    let overview =
        db::analytics::seller_overview(&state.pool, &identity.user_id, query.from, query.to)
            .await
            .map_err(|e| {
                tracing::error!("Seller analytics query error: {e}");
                AppError::new(ErrorCode::InternalError)
            })?;

    Ok(Json(overview))
}

/// GET /api/analytics/buyer
pub async fn buyer_analytics(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<db::analytics::BuyerOverview> {
    let overview = db::analytics::buyer_overview(&state.pool, &identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Buyer analytics query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(Json(overview))
}

/// GET /api/analytics/platform — admin only
pub async fn platform_analytics(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<db::analytics::PlatformOverview> {
    identity.require_admin()?;

    let overview = db::analytics::platform_overview(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Platform analytics query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(Json(overview))
}
