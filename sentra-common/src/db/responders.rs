//! Responder queries

use super::models::{Responder, Role};
use super::parse_guid;
use crate::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

type ResponderRow = (
    String,         // guid
    String,         // name
    String,         // email
    Option<String>, // address
    Option<String>, // lat
    Option<String>, // long
    String,         // role
    Option<String>, // push_token
);

fn from_row(row: ResponderRow) -> Result<Responder> {
    let role = Role::parse(&row.6)
        .ok_or_else(|| Error::Internal(format!("Unknown responder role: {}", row.6)))?;
    Ok(Responder {
        guid: parse_guid(&row.0, "responder")?,
        name: row.1,
        email: row.2,
        address: row.3,
        lat: row.4,
        long: row.5,
        role,
        push_token: row.7,
    })
}

const SELECT_COLUMNS: &str = "guid, name, email, address, lat, long, role, push_token";

/// Insert a responder row (seed/admin flow and tests)
pub async fn insert(pool: &SqlitePool, responder: &Responder) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO responders (guid, name, email, address, lat, long, role, push_token)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(responder.guid.to_string())
    .bind(&responder.name)
    .bind(&responder.email)
    .bind(&responder.address)
    .bind(&responder.lat)
    .bind(&responder.long)
    .bind(responder.role.as_str())
    .bind(&responder.push_token)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a responder by id
pub async fn get(pool: &SqlitePool, responder_id: Uuid) -> Result<Option<Responder>> {
    let row: Option<ResponderRow> = sqlx::query_as(&format!(
        "SELECT {} FROM responders WHERE guid = ?",
        SELECT_COLUMNS
    ))
    .bind(responder_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(from_row).transpose()
}

/// List all responders with a given role
///
/// Candidate population for the geo resolver; coordinate filtering
/// happens in-process so unparseable rows can be skipped rather than
/// failing the query.
pub async fn list_by_role(pool: &SqlitePool, role: Role) -> Result<Vec<Responder>> {
    let rows: Vec<ResponderRow> = sqlx::query_as(&format!(
        "SELECT {} FROM responders WHERE role = ?",
        SELECT_COLUMNS
    ))
    .bind(role.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(from_row).collect()
}

/// Resolve a responder's push token
///
/// `Ok(None)` covers both a missing row and a row without a token;
/// the dispatcher treats either as "nothing to deliver to".
pub async fn get_push_token(pool: &SqlitePool, responder_id: Uuid) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT push_token FROM responders WHERE guid = ?")
            .bind(responder_id.to_string())
            .fetch_optional(pool)
            .await?;

    Ok(row.and_then(|(token,)| token))
}
