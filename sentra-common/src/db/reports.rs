//! Incident report and evidence reads
//!
//! Writes go through the report factory's transaction; this module
//! only reads back what the factory committed.

use super::models::{EvidenceImage, IncidentReport};
use super::parse_guid;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fetch an incident report by id
pub async fn get(pool: &SqlitePool, report_id: Uuid) -> Result<Option<IncidentReport>> {
    let row: Option<(String, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT guid, description, created_at FROM incident_reports WHERE guid = ?",
    )
    .bind(report_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|(guid, description, created_at)| {
        Ok(IncidentReport {
            guid: parse_guid(&guid, "report")?,
            description,
            created_at,
        })
    })
    .transpose()
}

/// List a report's evidence images in capture order
pub async fn evidence_for(pool: &SqlitePool, report_id: Uuid) -> Result<Vec<EvidenceImage>> {
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
        "SELECT guid, report_id, uri, position FROM evidence_images \
         WHERE report_id = ? ORDER BY position",
    )
    .bind(report_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(guid, report_id, uri, position)| {
            Ok(EvidenceImage {
                guid: parse_guid(&guid, "evidence image")?,
                report_id: parse_guid(&report_id, "evidence report")?,
                uri,
                position,
            })
        })
        .collect()
}
