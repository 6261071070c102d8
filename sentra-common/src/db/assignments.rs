//! Assignment queries
//!
//! One assignment per incident report. Status only moves forward;
//! the update helper enforces the no-regression invariant.

use super::models::{Assignment, AssignmentStatus};
use super::parse_guid;
use crate::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

fn from_row(row: (String, String, String, String)) -> Result<Assignment> {
    let status = AssignmentStatus::parse(&row.3)
        .ok_or_else(|| Error::Internal(format!("Unknown assignment status: {}", row.3)))?;
    Ok(Assignment {
        guid: parse_guid(&row.0, "assignment")?,
        responder_id: parse_guid(&row.1, "assignment responder")?,
        report_id: parse_guid(&row.2, "assignment report")?,
        status,
    })
}

/// Fetch the assignment for a report
pub async fn get_for_report(pool: &SqlitePool, report_id: Uuid) -> Result<Option<Assignment>> {
    let row: Option<(String, String, String, String)> = sqlx::query_as(
        "SELECT guid, responder_id, report_id, status FROM assignments WHERE report_id = ?",
    )
    .bind(report_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(from_row).transpose()
}

/// Advance an assignment's status
///
/// Backward transitions are refused with `Conflict`; setting the
/// current status again is a no-op.
pub async fn set_status(
    pool: &SqlitePool,
    report_id: Uuid,
    status: AssignmentStatus,
) -> Result<()> {
    let current = get_for_report(pool, report_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No assignment for report {}", report_id)))?;

    if status < current.status {
        return Err(Error::Conflict(format!(
            "Assignment status cannot regress from {} to {}",
            current.status.as_str(),
            status.as_str()
        )));
    }

    sqlx::query(
        "UPDATE assignments SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE report_id = ?",
    )
    .bind(status.as_str())
    .bind(report_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
