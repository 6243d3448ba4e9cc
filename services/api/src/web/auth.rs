//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup, signin, and the admin signin gate.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rag_chat_core::domain::Role;
use rag_chat_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;
use crate::web::token::issue_token;
use crate::web::Envelope;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct SignupData {
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct SigninData {
    pub token: String,
    #[schema(value_type = String)]
    pub role: Role,
    pub name: String,
}

//=========================================================================================
// Password Hashing
//=========================================================================================

pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PortError::Unexpected(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, stored_hash: &str) -> PortResult<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| PortError::Unexpected(format!("stored hash is malformed: {e}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PortError::Unauthenticated)
}

fn validate_signup(req: &SignupRequest) -> PortResult<()> {
    if req.name.trim().is_empty() {
        return Err(PortError::InvalidInput("Name is required".to_string()));
    }
    if !is_plausible_email(&req.email) {
        return Err(PortError::InvalidInput(
            "A valid email address is required".to_string(),
        ));
    }
    if req.password.len() < 6 {
        return Err(PortError::InvalidInput(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /signup - Register a new account and return a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupData),
        (status = 400, description = "Invalid name, email, or password"),
        (status = 401, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_signup(&req)?;

    let password_hash = hash_password(&req.password)?;
    let user = state
        .db
        .create_user(req.name.trim(), req.email.trim(), &password_hash, Role::User)
        .await?;

    info!(user_id = %user.id, "account created");
    let token = issue_token(&state.config.jwt_secret, user.id, user.role)?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Account created", SignupData { token })),
    ))
}

/// POST /signin - Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = SigninData),
        (status = 401, description = "Unknown account or wrong password"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let creds = state.db.get_user_by_email(req.email.trim()).await?;
    verify_password(&req.password, &creds.password_hash)?;

    let token = issue_token(&state.config.jwt_secret, creds.id, creds.role)?;
    Ok(Json(Envelope::new(
        "Signed in",
        SigninData {
            token,
            role: creds.role,
            name: creds.name,
        },
    )))
}

/// POST /admin/signin - Signin restricted to admin accounts.
///
/// The stored role is checked before the password, so a non-admin account
/// is told "access denied" rather than learning whether its password
/// was right.
#[utoipa::path(
    post,
    path = "/api/v1/admin/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in as admin", body = SigninData),
        (status = 401, description = "Unknown account or wrong password"),
        (status = 403, description = "Account is not an admin"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn admin_signin_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let creds = state.db.get_user_by_email(req.email.trim()).await?;
    if creds.role != Role::Admin {
        return Err(ApiError::Port(PortError::Forbidden));
    }
    verify_password(&req.password, &creds.password_hash)?;

    let token = issue_token(&state.config.jwt_secret, creds.id, creds.role)?;
    Ok(Json(Envelope::new(
        "Signed in",
        SigninData {
            token,
            role: creds.role,
            name: creds.name,
        },
    )))
}


#[cfg(test)]
mod handler_tests {
    use super::*;
    use crate::web::test_support::{self, respond};
    use axum::http::StatusCode;
    use rag_chat_core::ports::DatabaseService;

    fn signup(name: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn signup_then_signin_round_trips() {
        let (state, _db) = test_support::state();

        let created = respond(
            signup_handler(
                State(state.clone()),
                Json(signup("Pat", "pat@example.com", "secret1")),
            )
            .await,
        );
        assert_eq!(created.status(), StatusCode::CREATED);

        let signed_in = respond(
            signin_handler(
                State(state),
                Json(SigninRequest {
                    email: "pat@example.com".to_string(),
                    password: "secret1".to_string(),
                }),
            )
            .await,
        );
        assert_eq!(signed_in.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_email_reports_unauthorized() {
        let (state, _db) = test_support::state();
        let first = respond(
            signup_handler(
                State(state.clone()),
                Json(signup("Pat", "pat@example.com", "secret1")),
            )
            .await,
        );
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = respond(
            signup_handler(
                State(state),
                Json(signup("Other", "pat@example.com", "secret2")),
            )
            .await,
        );
        assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (state, _db) = test_support::state();
        respond(
            signup_handler(
                State(state.clone()),
                Json(signup("Pat", "pat@example.com", "secret1")),
            )
            .await,
        );

        let response = respond(
            signin_handler(
                State(state),
                Json(SigninRequest {
                    email: "pat@example.com".to_string(),
                    password: "wrong-password".to_string(),
                }),
            )
            .await,
        );
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_signin_rejects_non_admin_even_with_correct_password() {
        let (state, _db) = test_support::state();
        respond(
            signup_handler(
                State(state.clone()),
                Json(signup("Pat", "pat@example.com", "secret1")),
            )
            .await,
        );

        // Correct password, but the stored role is user: the gate wins.
        let response = respond(
            admin_signin_handler(
                State(state),
                Json(SigninRequest {
                    email: "pat@example.com".to_string(),
                    password: "secret1".to_string(),
                }),
            )
            .await,
        );
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_signin_accepts_admin() {
        let (state, _db) = test_support::state();
        let hash = hash_password("admin-pass").unwrap();
        state
            .db
            .create_user("Ops", "ops@example.com", &hash, Role::Admin)
            .await
            .unwrap();

        let response = respond(
            admin_signin_handler(
                State(state),
                Json(SigninRequest {
                    email: "ops@example.com".to_string(),
                    password: "admin-pass".to_string(),
                }),
            )
            .await,
        );
        assert_eq!(response.status(), StatusCode::OK);
    }
}
