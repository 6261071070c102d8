//! Monitor queries

use super::models::Monitor;
use super::parse_guid;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Insert a monitor row (seed/admin flow and tests)
pub async fn insert(pool: &SqlitePool, monitor: &Monitor) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO monitors (guid, responder_id, source, name)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(monitor.guid.to_string())
    .bind(monitor.responder_id.to_string())
    .bind(&monitor.source)
    .bind(&monitor.name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a monitor by its camera source identifier
pub async fn get_by_source(pool: &SqlitePool, source: &str) -> Result<Option<Monitor>> {
    let row: Option<(String, String, String, String)> = sqlx::query_as(
        "SELECT guid, responder_id, source, name FROM monitors WHERE source = ?",
    )
    .bind(source)
    .fetch_optional(pool)
    .await?;

    row.map(|(guid, responder_id, source, name)| {
        Ok(Monitor {
            guid: parse_guid(&guid, "monitor")?,
            responder_id: parse_guid(&responder_id, "monitor owner")?,
            source,
            name,
        })
    })
    .transpose()
}

/// Resolve the owning responder for a camera source
pub async fn owner_for_source(pool: &SqlitePool, source: &str) -> Result<Option<Uuid>> {
    Ok(get_by_source(pool, source).await?.map(|m| m.responder_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Responder, Role};
    use crate::db::{init_tables, responders};

    #[tokio::test]
    async fn test_owner_for_source() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_tables(&pool).await.unwrap();

        let owner_id = Uuid::new_v4();
        responders::insert(
            &pool,
            &Responder {
                guid: owner_id,
                name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
                address: None,
                lat: None,
                long: None,
                role: Role::Owner,
                push_token: None,
            },
        )
        .await
        .unwrap();

        insert(
            &pool,
            &Monitor {
                guid: Uuid::new_v4(),
                responder_id: owner_id,
                source: "rtsp://10.0.0.7/video".to_string(),
                name: "front-gate".to_string(),
            },
        )
        .await
        .unwrap();

        let resolved = owner_for_source(&pool, "rtsp://10.0.0.7/video")
            .await
            .unwrap();
        assert_eq!(resolved, Some(owner_id));

        let missing = owner_for_source(&pool, "rtsp://10.0.0.8/video")
            .await
            .unwrap();
        assert_eq!(missing, None);
    }
}
