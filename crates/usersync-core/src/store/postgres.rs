//! Postgres-backed user store.
//!
//! Thin repository over the `users` table. Every query runs under a
//! caller-configured deadline so a stalled connection fails the request
//! instead of hanging it.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::{CoreError, Result},
    models::{User, UserId, UserUpdate},
    store::UserStore,
};

/// Postgres implementation of the user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl PgUserStore {
    /// Creates a store over the given connection pool.
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs a query under the store deadline.
    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = sqlx::Result<T>> + Send,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert(&self, user: &User) -> Result<()> {
        // The conflict arm deliberately leaves `resume` alone: it belongs
        // to the application, not the identity provider.
        self.bounded(
            sqlx::query(
                r"
                INSERT INTO users (id, email, name, image, resume)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE
                SET email = EXCLUDED.email,
                    name = EXCLUDED.name,
                    image = EXCLUDED.image,
                    updated_at = NOW()
                ",
            )
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.image)
            .bind(&user.resume)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn update(&self, id: &UserId, changes: &UserUpdate) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        // Zero rows affected means the record does not exist; that is a
        // no-op by contract.
        self.bounded(
            sqlx::query(
                r"
                UPDATE users
                SET email = COALESCE($2, email),
                    name = COALESCE($3, name),
                    image = COALESCE($4, image),
                    updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(changes.email.as_deref())
            .bind(changes.name.as_deref())
            .bind(changes.image.as_deref())
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &UserId) -> Result<()> {
        self.bounded(sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool))
            .await?;

        Ok(())
    }

    async fn find(&self, id: &UserId) -> Result<Option<User>> {
        let user = self
            .bounded(
                sqlx::query_as::<_, User>(
                    "SELECT id, email, name, image, resume FROM users WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(user)
    }

    async fn health_check(&self) -> Result<()> {
        let _: (i32,) = self.bounded(sqlx::query_as("SELECT 1").fetch_one(&self.pool)).await?;

        Ok(())
    }
}
