//! User repository for database operations.

use async_trait::async_trait;
use domain::models::{NewUser, User, UserId};
use domain::repositories::{StoreError, UserRepository};
use sqlx::PgPool;

use super::map_sqlx_error;
use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

/// Repository for user-related database operations.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Creates a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, first_name, last_name, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, first_name, last_name, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(shared::validation::normalize_email(email))
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.map(Into::into))
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let timer = QueryTimer::new("find_users_by_ids");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, first_name, last_name, created_at
            FROM users
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (email, first_name, last_name)
            VALUES ($1, $2, $3)
            RETURNING id, email, first_name, last_name, created_at
            "#,
        )
        .bind(shared::validation::normalize_email(&new_user.email))
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.into())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_user");
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.rows_affected() > 0)
    }

    async fn delete_if_unattached(&self, id: UserId) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_unattached_user");
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM event_attendees WHERE user_id = $1)
              AND NOT EXISTS (SELECT 1 FROM event_organizers WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.rows_affected() > 0)
    }
}
