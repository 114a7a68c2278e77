//! Account endpoints: profile, password change, audit log

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};

use crate::auth::UserIdentity;
use crate::db;
use crate::state::AppState;
use crate::util::{hash_password, verify_password};

use super::ApiResult;

/// GET /api/users/me
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<serde_json::Value> {
    let user = db::users::find_by_id(&state.pool, &identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Profile query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    let subscription = db::subscriptions::find_active_by_user(&state.pool, &identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Subscription query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    Ok(Json(serde_json::json!({
        "user": user,
        "subscription": subscription,
    })))
}

/// PUT /api/users/me
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
    pub business_category: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<serde_json::Value> {
    if let Some(ref name) = req.name {
        let name = name.trim();
        if name.is_empty() || name.len() > 50 {
            return Err(
                AppError::validation("Name must be 1-50 characters").with_detail("field", "name"),
            );
        }
    }
    if let Some(ref desc) = req.business_description
        && desc.len() > 500
    {
        return Err(AppError::validation("Description cannot be more than 500 characters")
            .with_detail("field", "business_description"));
    }

    db::users::update_profile(
        &state.pool,
        &identity.user_id,
        &db::users::UpdateProfile {
            name: req.name.as_deref().map(str::trim),
            phone: req.phone.as_deref(),
            street: req.street.as_deref(),
            city: req.city.as_deref(),
            state: req.state.as_deref(),
            zip_code: req.zip_code.as_deref(),
            country: req.country.as_deref(),
            business_name: req.business_name.as_deref(),
            business_description: req.business_description.as_deref(),
            business_category: req.business_category.as_deref(),
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Profile update error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    Ok(Json(serde_json::json!({ "message": "Profile updated" })))
}

/// PUT /api/users/me/password
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<serde_json::Value> {
    if req.new_password.len() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooShort));
    }

    let user = db::users::find_by_id(&state.pool, &identity.user_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    if !verify_password(&req.current_password, &user.hashed_password) {
        return Err(AppError::new(ErrorCode::InvalidCredentials));
    }

    let hashed =
        hash_password(&req.new_password).map_err(|_| AppError::new(ErrorCode::InternalError))?;
    db::users::update_password(&state.pool, &identity.user_id, &hashed)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?;

    let now = crate::util::now_millis();
    let _ = db::audit::log(
        &state.pool,
        &identity.user_id,
        "password_changed",
        None,
        None,
        now,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Password changed" })))
}

/// GET /api/users/me/audit-log
#[derive(Deserialize)]
pub struct AuditQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
}

pub async fn audit_log(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<db::audit::AuditEntry>> {
    let (_, per_page, offset) = super::page_params(query.page, query.per_page, 20);

    let entries = db::audit::query(&state.pool, &identity.user_id, per_page, offset)
        .await
        .map_err(|e| {
            tracing::error!("Audit log query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    Ok(Json(entries))
}
