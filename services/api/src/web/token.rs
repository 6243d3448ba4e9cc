//! services/api/src/web/token.rs
//!
//! Signed bearer tokens carrying the caller's identity and role claim.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rag_chat_core::domain::Role;
use rag_chat_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long an issued token stays valid.
const TOKEN_LIFETIME_DAYS: i64 = 30;

/// The claims embedded in every issued token. The role claim is a hint
/// only; admin routes re-check the stored role on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The account id.
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a token for the given account.
pub fn issue_token(secret: &str, user_id: Uuid, role: Role) -> PortResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role,
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| PortError::Unexpected(format!("failed to sign token: {e}")))
}

/// Verifies a token's signature and expiry, returning its claims.
/// Any failure collapses to `Unauthenticated`; the caller never learns
/// whether the token was malformed, forged, or expired.
pub fn verify_token(secret: &str, token: &str) -> PortResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| PortError::Unauthenticated)
}
