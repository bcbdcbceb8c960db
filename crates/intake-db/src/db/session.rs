use async_trait::async_trait;
use intake_core::models::{SessionRecord, SessionStatus};
use intake_core::{AppError, SessionId};
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{Completion, IdentityStore, Reservation};

/// PostgreSQL-backed identity store
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the full row, mainly for diagnostics.
    #[tracing::instrument(skip(self), fields(session_id = %id))]
    pub async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, AppError> {
        let row = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, status, created_at, updated_at, completed_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl IdentityStore for SessionRepository {
    #[tracing::instrument(skip(self), fields(session_id = %id))]
    async fn exists(&self, id: SessionId) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1)")
            .bind(Uuid::from(id))
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(session_id = %id))]
    async fn status(&self, id: SessionId) -> Result<Option<SessionStatus>, AppError> {
        let status: Option<SessionStatus> =
            sqlx::query_scalar("SELECT status FROM sessions WHERE id = $1")
                .bind(Uuid::from(id))
                .fetch_optional(&self.pool)
                .await?;

        Ok(status)
    }

    #[tracing::instrument(skip(self), fields(session_id = %id))]
    async fn reserve(&self, id: SessionId) -> Result<Reservation, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (id, status, created_at, updated_at)
            VALUES ($1, 'reserved', NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(id))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(Reservation::Reserved)
        } else {
            tracing::debug!("Session id already present");
            Ok(Reservation::Duplicate)
        }
    }

    #[tracing::instrument(skip(self), fields(session_id = %id))]
    async fn complete(&self, id: SessionId) -> Result<Completion, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'complete', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'reserved'
            "#,
        )
        .bind(Uuid::from(id))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Completion::Completed);
        }

        match self.status(id).await? {
            Some(SessionStatus::Complete) => Ok(Completion::AlreadyComplete),
            Some(SessionStatus::Reserved) => Err(AppError::Internal(
                "session remained reserved after completion update".to_string(),
            )),
            None => Ok(Completion::Unknown),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
