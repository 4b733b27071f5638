//! JWT bearer authentication.
//!
//! Token issuance (login, registration) lives in the account service; this
//! module only validates tokens and attaches the caller identity to the
//! request.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::error::AppError;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub role: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&req) else {
        return AppError::not_authenticated().into_response();
    };

    match verify_token(&state.jwt_secret, token) {
        Ok(claims) => {
            req.extensions_mut().insert(Identity {
                user_id: claims.sub,
                role: claims.role,
            });
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "token verification failed");
            AppError::not_authenticated().into_response()
        }
    }
}

/// Layered after `auth_middleware` on admin routes.
pub async fn require_admin(req: Request, next: Next) -> Response {
    match req.extensions().get::<Identity>() {
        Some(identity) if identity.is_admin() => next.run(req).await,
        Some(_) => AppError::permission_denied("admin role required").into_response(),
        None => AppError::not_authenticated().into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    /// Token issuance lives in the account service; this mirrors it for tests.
    fn create_token(
        secret: &str,
        user_id: i64,
        role: &str,
        ttl_secs: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = shared::util::now_millis() / 1000;
        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            exp: now + ttl_secs,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    #[test]
    fn token_round_trips_claims() {
        let token = create_token("test-secret", 42, "customer", 3600).unwrap();
        let claims = verify_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "customer");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("test-secret", 42, "customer", 3600).unwrap();
        assert!(verify_token("other-secret", &token).is_err());
    }

    #[test]
    fn admin_check() {
        let admin = Identity {
            user_id: 1,
            role: "admin".into(),
        };
        let customer = Identity {
            user_id: 2,
            role: "customer".into(),
        };
        assert!(admin.is_admin());
        assert!(!customer.is_admin());
    }
}
