use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tripnest_core::{Role, User};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let ttl = i64::try_from(auth.expiration).unwrap_or(i64::MAX);
    let exp = Utc::now().timestamp().saturating_add(ttl);

    let claims = Claims {
        sub: user.id,
        role: user.role.as_str().to_string(),
        exp: usize::try_from(exp).unwrap_or(usize::MAX),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

pub fn verify_token(auth: &AuthConfig, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("rejected bearer token: {}", e);
        AppError::AuthenticationError("Invalid or expired token".to_string())
    })
}

// ============================================================================
// Authenticated user extractor
// ============================================================================

/// The caller behind a valid bearer token. The account must still exist.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            <TypedHeader<Authorization<Bearer>> as FromRequestParts<AppState>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::AuthenticationError("Access denied. No token provided".to_string()))?;

        let claims = verify_token(&state.auth, bearer.token())?;

        let user = state
            .repos
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::AuthenticationError("User not found".to_string()))?;

        Ok(AuthUser(user))
    }
}

/// An authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::AuthorizationError(
                "Access denied. Admin privileges required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

/// `Option<AuthUser>`: a missing or unusable token is simply an anonymous caller.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(<AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state)
            .await
            .ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            secret: "unit-test-secret".to_string(),
            expiration: 3600,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let user = User::new("Ana".into(), "Lee".into(), "ana@example.com".into(), String::new(), Role::Host);
        let token = issue_token(&config(), &user).unwrap();
        let claims = verify_token(&config(), &token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, "host");
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let user = User::new("Ana".into(), "Lee".into(), "ana@example.com".into(), String::new(), Role::Guest);
        let token = issue_token(&config(), &user).unwrap();
        let other = AuthConfig {
            secret: "someone-else".to_string(),
            expiration: 3600,
        };
        assert!(matches!(verify_token(&other, &token), Err(AppError::AuthenticationError(_))));
    }
}
