//! Database module for SQLite persistence

pub mod models;
pub mod repository;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Create a new database connection pool, creating the database file if missing
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    if let Some(parent) = options.get_filename().parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
    }

    tracing::debug!(url = %database_url, "Connecting to SQLite");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::info!(url = %database_url, "SQLite connection established");

    Ok(pool)
}

/// Initialize database schema
pub async fn init_schema(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incidents (
            incident_id TEXT PRIMARY KEY,
            file_name TEXT,
            file_type TEXT,
            file_size INTEGER,
            content_hash TEXT,
            user_email TEXT,
            vendor_data TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            incident_id TEXT NOT NULL REFERENCES incidents (incident_id),
            model TEXT NOT NULL,
            verdict TEXT NOT NULL,
            confidence REAL NOT NULL,
            summary TEXT NOT NULL,
            reasoning TEXT NOT NULL,
            risk_level TEXT,
            verdict_json TEXT NOT NULL,
            raw_response TEXT NOT NULL,
            processing_time REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            incident_id TEXT NOT NULL REFERENCES incidents (incident_id),
            analysis_id INTEGER REFERENCES analysis (id),
            original_verdict TEXT NOT NULL,
            corrected_verdict TEXT NOT NULL,
            analyst_comment TEXT NOT NULL,
            relevance_score REAL NOT NULL,
            lesson_learned TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes separately
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_incidents_status ON incidents(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analysis_incident_id ON analysis(incident_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_feedback_relevance ON feedback(relevance_score, created_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// In-memory database with the schema applied
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_schema(&pool).await.expect("schema");
    pool
}
