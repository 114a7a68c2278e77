//! Authentication endpoints: register, login, forgot-password, reset-password

use axum::{Json, extract::State};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::UserRole;

use crate::db;
use crate::state::AppState;
use crate::util::{generate_code, hash_password, verify_password};

use super::ApiResult;

/// POST /api/auth/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// buyer (default) or seller; admins are provisioned out of band
    pub role: Option<String>,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
    pub business_category: Option<String>,
}

#[derive(serde::Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: db::users::User,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim();

    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("Invalid email").with_detail("field", "email"));
    }
    if name.is_empty() || name.len() > 50 {
        return Err(
            AppError::validation("Name must be 1-50 characters").with_detail("field", "name"),
        );
    }
    if req.password.len() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooShort));
    }

    let role = match req.role.as_deref() {
        None | Some("buyer") => UserRole::Buyer,
        Some("seller") => UserRole::Seller,
        Some(other) => {
            return Err(AppError::validation(format!("Invalid role: {other}"))
                .with_detail("field", "role"));
        }
    };

    match db::users::find_by_email(&state.pool, &email).await {
        Ok(Some(_)) => return Err(AppError::new(ErrorCode::EmailAlreadyRegistered)),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("DB error checking email: {e}");
            return Err(AppError::new(ErrorCode::InternalError));
        }
    }

    let hashed_password = hash_password(&req.password).map_err(|e| {
        tracing::error!("Password hash error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    let user_id = uuid::Uuid::new_v4().to_string();
    let now = crate::util::now_millis();

    db::users::create(
        &state.pool,
        &db::users::CreateUser {
            id: &user_id,
            name,
            email: &email,
            hashed_password: &hashed_password,
            role: role.as_db(),
            business_name: req.business_name.as_deref(),
            business_description: req.business_description.as_deref(),
            business_category: req.business_category.as_deref(),
            now,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create user: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    let token = crate::auth::user_auth::create_token(&user_id, &email, role, &state.jwt_secret)
        .map_err(|e| {
            tracing::error!("JWT creation failed: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    let user = db::users::find_by_id(&state.pool, &user_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::InternalError))?;

    tracing::info!(user_id = %user_id, role = role.as_db(), "User registered");

    let _ = db::audit::log(&state.pool, &user_id, "register", None, None, now).await;

    Ok(Json(AuthResponse { token, user }))
}

/// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let email = req.email.trim().to_lowercase();
    let user = db::users::find_by_email(&state.pool, &email)
        .await
        .map_err(|e| {
            tracing::error!("DB error during login: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::InvalidCredentials))?;

    if !verify_password(&req.password, &user.hashed_password) {
        return Err(AppError::new(ErrorCode::InvalidCredentials));
    }

    if !user.is_active {
        return Err(AppError::new(ErrorCode::AccountDisabled));
    }

    let role = UserRole::from_db(&user.role).ok_or_else(|| {
        tracing::error!(user_id = %user.id, role = %user.role, "Unknown role in users table");
        AppError::new(ErrorCode::InternalError)
    })?;

    let token = crate::auth::user_auth::create_token(&user.id, &user.email, role, &state.jwt_secret)
        .map_err(|e| {
            tracing::error!("JWT creation failed: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    let now = crate::util::now_millis();
    let _ = db::audit::log(&state.pool, &user.id, "login", None, None, now).await;

    Ok(Json(AuthResponse { token, user }))
}

// ── Password reset endpoints ──

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<serde_json::Value> {
    let email_addr = req.email.trim().to_lowercase();

    // Always return OK to prevent email enumeration
    let _user = match db::users::find_by_email(&state.pool, &email_addr).await {
        Ok(Some(u)) => u,
        _ => {
            return Ok(Json(serde_json::json!({
                "message": "If the email exists, a reset code has been sent"
            })));
        }
    };

    let code = generate_code();
    let code_hash = hash_password(&code).map_err(|_| AppError::new(ErrorCode::InternalError))?;
    let now = crate::util::now_millis();
    let expires_at = now + 5 * 60 * 1000;

    let _ = db::email_verifications::upsert(
        &state.pool,
        &email_addr,
        &code_hash,
        expires_at,
        now,
        "password_reset",
    )
    .await;

    let _ = crate::email::send_password_reset_code(
        &state.ses,
        &state.ses_from_email,
        &email_addr,
        &code,
    )
    .await;

    Ok(Json(serde_json::json!({
        "message": "If the email exists, a reset code has been sent"
    })))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<serde_json::Value> {
    let email_addr = req.email.trim().to_lowercase();

    if req.new_password.len() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooShort));
    }

    let record = db::email_verifications::find(&state.pool, &email_addr, "password_reset")
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::NotFound))?;

    let now = crate::util::now_millis();
    if now > record.expires_at {
        return Err(AppError::new(ErrorCode::VerificationCodeExpired));
    }
    if record.attempts >= 3 {
        return Err(AppError::new(ErrorCode::TooManyAttempts));
    }

    db::email_verifications::increment_attempts(&state.pool, &email_addr, "password_reset")
        .await
        .map_err(|e| {
            tracing::error!("Failed to increment attempts: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    if !verify_password(&req.code, &record.code) {
        return Err(AppError::new(ErrorCode::VerificationCodeInvalid));
    }

    let user = db::users::find_by_email(&state.pool, &email_addr)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    let hashed =
        hash_password(&req.new_password).map_err(|_| AppError::new(ErrorCode::InternalError))?;
    db::users::update_password(&state.pool, &user.id, &hashed)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?;

    let _ = db::email_verifications::delete(&state.pool, &email_addr, "password_reset").await;

    let _ = db::audit::log(&state.pool, &user.id, "password_reset", None, None, now).await;

    Ok(Json(
        serde_json::json!({ "message": "Password has been reset" }),
    ))
}
