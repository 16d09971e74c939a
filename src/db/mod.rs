mod models;

pub use models::*;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Split a migration file into statements, dropping `--` comment lines.
/// Comments are stripped before splitting so a semicolon inside a comment
/// does not cut a statement in half.
fn split_statements(sql: &str) -> Vec<String> {
    let without_comments: String = sql
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Execute a SQL migration file
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in split_statements(sql) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("punchr.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    // foreign_keys must be set per connection so the user -> log cascade holds
    // on every pooled connection.
    let options = SqliteConnectOptions::from_str(&db_url)?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// In-memory database for tests and local experiments. A single connection is
/// used so the database outlives individual acquires.
pub async fn init_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Identity, sessions, password resets
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Application profiles
    let has_profiles_table: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name='profiles'")
            .fetch_optional(pool)
            .await?;
    if has_profiles_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/002_profiles.sql")).await?;
    }

    // Migration 003: DTR log entries
    let has_dtr_logs_table: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name='dtr_logs'")
            .fetch_optional(pool)
            .await?;
    if has_dtr_logs_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/003_dtr_logs.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements_ignores_semicolons_in_comments() {
        let sql = "-- header; with a semicolon\n\
                   CREATE TABLE t (id TEXT PRIMARY KEY);\n\
                   -- trailing note\n\
                   CREATE INDEX idx_t ON t(id);\n";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE"));
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[tokio::test]
    async fn test_migrations_run_clean() {
        let pool = init_memory().await.unwrap();

        // All three migration files applied and the tables usable.
        for table in ["users", "sessions", "password_resets", "profiles", "dtr_logs"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
    }
}
