// Repository layer for database operations

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use followup_core::{EventPatch, NewEvent};

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUser) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, display_name, password_digest)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, display_name, password_digest, next_event_seq, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.username)
        .bind(&input.display_name)
        .bind(&input.password_digest)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, display_name, password_digest, next_event_seq, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, display_name, password_digest, next_event_seq, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ============================================
    // Events
    // ============================================

    /// Insert an event, claiming the next per-user id in the same transaction
    ///
    /// The id claim is an UPDATE on the owner's row, so concurrent inserts
    /// for one user serialize on the row lock and never collide.
    pub async fn create_event(&self, user_id: Uuid, input: NewEvent) -> Result<EventRow> {
        let mut tx = self.pool.begin().await?;

        let event_id: i64 = sqlx::query_scalar(
            r#"
            UPDATE users
            SET next_event_seq = next_event_seq + 1
            WHERE id = $1
            RETURNING next_event_seq
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (user_id, event_id, title, start_time, end_time, location,
                                description, source_type, is_followed, recurrence_rule, recurrence_end)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING user_id, event_id, title, start_time, end_time, location, description,
                      source_type, is_followed, recurrence_rule, recurrence_end, created_at
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .bind(&input.title)
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(&input.location)
        .bind(&input.description)
        .bind(input.source_type.to_string())
        .bind(input.is_followed)
        .bind(&input.recurrence_rule)
        .bind(input.recurrence_end)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row)
    }

    pub async fn get_event(&self, user_id: Uuid, event_id: i64) -> Result<Option<EventRow>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT user_id, event_id, title, start_time, end_time, location, description,
                   source_type, is_followed, recurrence_rule, recurrence_end, created_at
            FROM events
            WHERE user_id = $1 AND event_id = $2
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_events(&self, user_id: Uuid, followed_only: bool) -> Result<Vec<EventRow>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT user_id, event_id, title, start_time, end_time, location, description,
                   source_type, is_followed, recurrence_rule, recurrence_end, created_at
            FROM events
            WHERE user_id = $1 AND (NOT $2 OR is_followed)
            ORDER BY event_id ASC
            "#,
        )
        .bind(user_id)
        .bind(followed_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_event(
        &self,
        user_id: Uuid,
        event_id: i64,
        patch: EventPatch,
    ) -> Result<Option<EventRow>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            UPDATE events
            SET
                title = COALESCE($3, title),
                start_time = COALESCE($4, start_time),
                end_time = COALESCE($5, end_time),
                location = COALESCE($6, location),
                description = COALESCE($7, description),
                is_followed = COALESCE($8, is_followed)
            WHERE user_id = $1 AND event_id = $2
            RETURNING user_id, event_id, title, start_time, end_time, location, description,
                      source_type, is_followed, recurrence_rule, recurrence_end, created_at
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .bind(&patch.title)
        .bind(patch.start_time)
        .bind(patch.end_time)
        .bind(&patch.location)
        .bind(&patch.description)
        .bind(patch.is_followed)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_event(&self, user_id: Uuid, event_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
