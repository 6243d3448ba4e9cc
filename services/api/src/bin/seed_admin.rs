//! services/api/src/bin/seed_admin.rs
//!
//! One-shot bootstrap for the first admin account. Reads ADMIN_NAME,
//! ADMIN_EMAIL, and ADMIN_PASSWORD from the environment and creates the
//! account (or promotes an existing one) so document uploads have an
//! operator from day one.

use api_lib::{adapters::db::DbAdapter, config::Config, error::ApiError, web::auth::hash_password};
use rag_chat_core::domain::Role;
use rag_chat_core::ports::{DatabaseService, PortError};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn required(var: &str) -> Result<String, ApiError> {
    std::env::var(var).map_err(|_| ApiError::Internal(format!("{var} is required")))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let name = required("ADMIN_NAME")?;
    let email = required("ADMIN_EMAIL")?;
    let password = required("ADMIN_PASSWORD")?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    let db = DbAdapter::new(pool.clone());
    db.run_migrations().await?;

    let password_hash = hash_password(&password)?;
    match db.create_user(&name, &email, &password_hash, Role::Admin).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "admin account created");
        }
        Err(PortError::Conflict(_)) => {
            // The account exists; make sure it holds the admin role.
            sqlx::query("UPDATE users SET role = 'admin' WHERE email = $1")
                .bind(&email)
                .execute(&pool)
                .await?;
            info!(email = %email, "existing account promoted to admin");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
