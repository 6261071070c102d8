//! Database access for the Sentra pipeline
//!
//! All services share one SQLite database. Entity rows use TEXT
//! UUIDs; timestamps default to CURRENT_TIMESTAMP.

pub mod assignments;
pub mod models;
pub mod monitors;
pub mod reports;
pub mod responders;

pub use models::*;

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to the shared sentra.db, creating the file and parent
/// directory when missing, and runs table migrations.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the Sentra tables if they don't exist
///
/// Responder/monitor rows are provisioned out-of-band (seed/admin
/// flow); reports, evidence and assignments are written by the
/// report factory.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS responders (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            address TEXT,
            lat TEXT,
            long TEXT,
            role TEXT NOT NULL,
            push_token TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS monitors (
            guid TEXT PRIMARY KEY,
            responder_id TEXT NOT NULL REFERENCES responders(guid),
            source TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incident_reports (
            guid TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evidence_images (
            guid TEXT PRIMARY KEY,
            report_id TEXT NOT NULL REFERENCES incident_reports(guid),
            uri TEXT NOT NULL,
            position INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            guid TEXT PRIMARY KEY,
            responder_id TEXT NOT NULL REFERENCES responders(guid),
            report_id TEXT NOT NULL UNIQUE REFERENCES incident_reports(guid),
            status TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (responders, monitors, incident_reports, evidence_images, assignments)"
    );

    Ok(())
}

/// Parse a TEXT UUID column value
pub(crate) fn parse_guid(s: &str, context: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(s)
        .map_err(|e| crate::Error::Internal(format!("Invalid {} GUID: {}", context, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_tables_is_idempotent() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_tables(&pool).await.unwrap();
        init_tables(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM responders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
