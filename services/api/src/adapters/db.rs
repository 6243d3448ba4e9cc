//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rag_chat_core::domain::{Message, MessageRole, Role, Thread, User, UserCredentials};
use rag_chat_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
}

impl UserRecord {
    fn role(&self) -> PortResult<Role> {
        Role::parse(&self.role)
            .ok_or_else(|| PortError::Unexpected(format!("unknown role '{}'", self.role)))
    }

    fn to_domain(self) -> PortResult<User> {
        let role = self.role()?;
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role,
        })
    }

    fn to_credentials(self) -> PortResult<UserCredentials> {
        let role = self.role()?;
        Ok(UserCredentials {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role,
        })
    }
}

#[derive(FromRow)]
struct ThreadRecord {
    id: Uuid,
    owner_user_id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ThreadRecord {
    fn to_domain(self) -> Thread {
        Thread {
            id: self.id,
            owner_user_id: self.owner_user_id,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    thread_id: Uuid,
    role: String,
    content: String,
    image_path: Option<String>,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        let role = MessageRole::parse(&self.role)
            .ok_or_else(|| PortError::Unexpected(format!("unknown message role '{}'", self.role)))?;
        Ok(Message {
            id: self.id,
            thread_id: self.thread_id,
            role,
            content: self.content,
            image_path: self.image_path,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, name, email, password_hash, role",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false);
            if duplicate {
                PortError::Conflict(format!("email {} already registered", email))
            } else {
                unexpected(e)
            }
        })?;

        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("no account for {}", email)),
            _ => unexpected(e),
        })?;

        record.to_credentials()
    }

    async fn get_user_role(&self, user_id: Uuid) -> PortResult<Role> {
        let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("user {}", user_id)),
                _ => unexpected(e),
            })?;

        Role::parse(&role).ok_or_else(|| PortError::Unexpected(format!("unknown role '{role}'")))
    }

    async fn find_thread(&self, user_id: Uuid) -> PortResult<Option<Thread>> {
        let record = sqlx::query_as::<_, ThreadRecord>(
            "SELECT id, owner_user_id, title, created_at, updated_at \
             FROM threads WHERE owner_user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn find_or_create_thread(&self, user_id: Uuid) -> PortResult<Thread> {
        // The UNIQUE constraint on owner_user_id makes this find-or-create
        // atomic: two racing turns both pass the INSERT (one is a no-op)
        // and re-select the same row.
        sqlx::query(
            "INSERT INTO threads (id, owner_user_id, title) VALUES ($1, $2, $3) \
             ON CONFLICT (owner_user_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind("New chat")
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, ThreadRecord>(
            "SELECT id, owner_user_id, title, created_at, updated_at \
             FROM threads WHERE owner_user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn append_message(
        &self,
        thread_id: Uuid,
        role: MessageRole,
        content: &str,
        image_path: Option<&str>,
    ) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, thread_id, role, content, image_path) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, thread_id, role, content, image_path, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(thread_id)
        .bind(role.as_str())
        .bind(content)
        .bind(image_path)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        sqlx::query("UPDATE threads SET updated_at = now() WHERE id = $1")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        record.to_domain()
    }

    async fn list_messages(&self, thread_id: Uuid) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, thread_id, role, content, image_path, created_at \
             FROM messages WHERE thread_id = $1 ORDER BY created_at ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}
