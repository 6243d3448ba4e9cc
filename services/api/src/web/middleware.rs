//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use rag_chat_core::domain::Role;
use rag_chat_core::ports::PortError;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::state::{AppState, AuthUser};
use crate::web::token::verify_token;

/// Middleware that validates the bearer token and attaches the caller's
/// identity to the request.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers
/// and downstream middleware to use. If invalid or missing, returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Port(PortError::Unauthenticated))?;

    let claims = verify_token(&state.config.jwt_secret, token)?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        role: claims.role,
    });
    Ok(next.run(req).await)
}

/// Middleware that gates admin-only routes. Runs after `require_auth`.
///
/// The token's role claim is only a first filter; the stored role is
/// re-read on every request so a demoted admin loses access as soon as
/// the database says so, not when the token expires.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or(ApiError::Port(PortError::Unauthenticated))?;

    if auth.role != Role::Admin {
        return Err(ApiError::Port(PortError::Forbidden));
    }

    let stored_role = state.db.get_user_role(auth.user_id).await?;
    if stored_role != Role::Admin {
        warn!(user_id = %auth.user_id, "token claims admin but stored role disagrees");
        return Err(ApiError::Port(PortError::Forbidden));
    }

    Ok(next.run(req).await)
}
