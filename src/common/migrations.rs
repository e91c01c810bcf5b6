// src/common/migrations.rs
//! Database schema management

use sqlx::SqlitePool;
use std::env;
use tracing::{info, warn};

/// Run all database migrations
///
/// `RESET_DB=true` drops the users table first. Otherwise tables are only
/// created when missing so restarts keep their data.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("RESET_DB=true - dropping users table and recreating schema");
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(pool)
            .await?;
    }

    create_user_tables(pool).await?;

    info!("Database migration completed successfully");
    Ok(())
}

/// The UNIQUE constraint on `email` is what settles two concurrent
/// first logins for the same address.
async fn create_user_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            name TEXT,
            avatar TEXT,
            provider TEXT NOT NULL DEFAULT 'local',
            provider_id TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_users_provider ON users(provider, provider_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
