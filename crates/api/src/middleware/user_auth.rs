//! Bearer JWT authentication for the `/api/v1` routes.
//!
//! Tokens are issued by the identity provider; this service only verifies
//! them and reads the user id from `sub`.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::jwt::{extract_user_id, JwtVerifier};

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl AuthenticatedUser {
    pub fn from_token(verifier: &JwtVerifier, token: &str) -> Result<Self, ApiError> {
        let claims = verifier.validate_token(token).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;
        let user_id = extract_user_id(&claims)
            .map_err(|_| ApiError::Unauthorized("Invalid user ID in token".into()))?;
        Ok(Self { user_id })
    }
}

/// Rejects requests without a valid bearer token.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match bearer_token(req.headers()) {
        Some(token) => token,
        None => {
            return ApiError::Unauthorized("Missing or invalid Authorization header".into())
                .into_response()
        }
    };

    match AuthenticatedUser::from_token(&state.jwt, token) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

/// Token from an `Authorization: Bearer ...` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
