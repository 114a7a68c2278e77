//! User JWT authentication for the marketplace API

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::UserRole;

use crate::state::AppState;

/// JWT claims for user authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    /// User ID
    pub sub: String,
    /// User email
    pub email: String,
    /// Role: buyer | seller | admin
    pub role: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Authenticated user identity extracted from JWT
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

impl UserIdentity {
    /// The acting user, or any admin
    pub fn is_self_or_admin(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.role.is_admin()
    }

    /// Guard: seller or admin role required
    pub fn require_seller(&self) -> Result<(), AppError> {
        if self.role.can_sell() {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::SellerRequired))
        }
    }

    /// Guard: admin role required
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::AdminRequired))
        }
    }
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Create a JWT token for a user
pub fn create_token(
    user_id: &str,
    email: &str,
    role: UserRole,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = UserClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.as_db().to_string(),
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Middleware that extracts and verifies the user JWT from the Authorization header
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::new(ErrorCode::NotAuthenticated).into_response())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format").into_response())?;

    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        AppError::invalid_token("Invalid or expired token").into_response()
    })?;

    let role = UserRole::from_db(&token_data.claims.role)
        .ok_or_else(|| AppError::invalid_token("Unknown role claim").into_response())?;

    let identity = UserIdentity {
        user_id: token_data.claims.sub,
        email: token_data.claims.email,
        role,
    };

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = create_token("user-1", "a@b.com", UserRole::Seller, "test-secret").unwrap();
        let decoded = jsonwebtoken::decode::<UserClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, "user-1");
        assert_eq!(decoded.claims.role, "seller");
        assert!(decoded.claims.exp > decoded.claims.iat);
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let token = create_token("user-1", "a@b.com", UserRole::Buyer, "secret-a").unwrap();
        let result = jsonwebtoken::decode::<UserClaims>(
            &token,
            &DecodingKey::from_secret(b"secret-b"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_role_guards() {
        let buyer = UserIdentity {
            user_id: "u1".into(),
            email: "b@x.com".into(),
            role: UserRole::Buyer,
        };
        assert!(buyer.require_seller().is_err());
        assert!(buyer.require_admin().is_err());
        assert!(buyer.is_self_or_admin("u1"));
        assert!(!buyer.is_self_or_admin("u2"));

        let admin = UserIdentity {
            user_id: "a1".into(),
            email: "a@x.com".into(),
            role: UserRole::Admin,
        };
        assert!(admin.require_seller().is_ok());
        assert!(admin.require_admin().is_ok());
        assert!(admin.is_self_or_admin("anyone"));
    }
}
