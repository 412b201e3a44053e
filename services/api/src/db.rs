//! Data Access Layer
//!
//! This module contains all the functions for interacting with the PostgreSQL
//! database via `sqlx`, plus the database-backed implementation of the core
//! key-value store capability.

use anyhow::Result;
use async_trait::async_trait;
use sahay_core::language::Language;
use sahay_core::registry::TutorialId;
use sahay_core::store::KeyValueStore;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Message, MessageRole, Session, SessionStatus};

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn create_session(
        &self,
        user_id: &str,
        tutorial: TutorialId,
        language: Language,
    ) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, tutorial, language)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, tutorial, language, status, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(tutorial.as_str())
        .bind(language.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    /// Retrieves a single session by its ID, scoped to a specific user.
    pub async fn get_session(&self, session_id: Uuid, user_id: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, tutorial, language, status, created_at, updated_at
            FROM sessions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Retrieves a session by ID alone, for the WebSocket handshake where the
    /// session ID acts as the channel credential.
    pub async fn get_session_by_id(&self, session_id: Uuid) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, tutorial, language, status, created_at, updated_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, tutorial, language, status, created_at, updated_at
            FROM sessions
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    pub async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, user_id, tutorial, language, status, created_at, updated_at
            "#,
        )
        .bind(session_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn update_session_language(
        &self,
        session_id: Uuid,
        language: Language,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET language = $2, updated_at = now() WHERE id = $1",
        )
        .bind(session_id)
        .bind(language.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (session_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING id, session_id, role, content, created_at
            "#,
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    pub async fn get_session_messages(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_entries WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    pub async fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn kv_remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// A `KeyValueStore` view of the database scoped to one user, so core code
/// like `LanguagePreference` can read/write preferences without knowing
/// about users or SQL.
pub struct UserScopedStore {
    db: Arc<Db>,
    user_id: String,
}

impl UserScopedStore {
    pub fn new(db: Arc<Db>, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
        }
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("user:{}:{}", self.user_id, key)
    }
}

#[async_trait]
impl KeyValueStore for UserScopedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.db.kv_get(&self.scoped_key(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db.kv_set(&self.scoped_key(key), value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db.kv_remove(&self.scoped_key(key)).await
    }
}
