//! User persistence

use sqlx::SqlitePool;
use tracing::{debug, error};

use super::models::{FederatedIdentity, User};
use crate::common::generate_user_id;

/// Result of an insert attempt. A unique-email violation is an expected
/// outcome under concurrent first logins, not an error.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(User),
    EmailTaken,
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert(&self, identity: &FederatedIdentity) -> Result<InsertOutcome, sqlx::Error> {
        let id = generate_user_id();

        let result = sqlx::query(
            "INSERT INTO users (id, email, name, avatar, provider, provider_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&identity.email)
        .bind(&identity.display_name)
        .bind(identity.avatar_url.as_deref())
        .bind(identity.provider.as_str())
        .bind(&identity.provider_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(
                    provider = %identity.provider,
                    "User insert hit unique email constraint"
                );
                return Ok(InsertOutcome::EmailTaken);
            }
            Err(e) => {
                error!(
                    error = %e,
                    user_id = %id,
                    provider = %identity.provider,
                    "Database error inserting new user"
                );
                return Err(e);
            }
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;

        Ok(InsertOutcome::Created(user))
    }

    /// Attach provider details to a user that has none yet. The WHERE clause
    /// keeps the first writer's values if two backfills race.
    pub async fn backfill_provider(
        &self,
        user_id: &str,
        identity: &FederatedIdentity,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET provider = ?, provider_id = ?, avatar = ?
            WHERE id = ? AND (provider_id IS NULL OR TRIM(provider_id) = '')
            "#,
        )
        .bind(identity.provider.as_str())
        .bind(&identity.provider_id)
        .bind(identity.avatar_url.as_deref())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
