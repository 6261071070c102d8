//! Incident report creation and dispatch
//!
//! The report factory is the only writer of incident reports: the
//! report row, its evidence images, and its PENDING assignment are
//! inserted in one transaction so no reader ever observes a partial
//! report. After commit it ranks nearby responders and publishes the
//! alert envelope; a publish failure never rolls back the report.

use sentra_common::db::models::Role;
use sentra_common::db::responders;
use sentra_common::events::{AlertEvent, EventBus, ReportPayload, ResponderHit, ALERT_KEY};
use sentra_common::{geo, Error, Result};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// What happened after the report transaction committed
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Envelope published; count of subscribers reached
    Published { subscribers: usize },
    /// No responder within the radius; nothing was published
    NoRespondersInRange,
    /// Commit succeeded but the bus rejected the publish; callers
    /// must not assume report creation implies notification delivery
    PublishDeferred { reason: String },
}

/// Result of a successful `create_and_dispatch`
///
/// The report id is always present: by the time dispatch can fail,
/// the report is already committed.
#[derive(Debug, Clone)]
pub struct CreatedReport {
    pub report_id: Uuid,
    pub responders: Vec<ResponderHit>,
    pub outcome: DispatchOutcome,
}

/// Report creation seam for the evidence accumulator
pub trait ReportSink: Send + Sync {
    fn create_and_dispatch(
        &self,
        owner_id: Uuid,
        evidence_uris: Vec<String>,
        description: String,
    ) -> impl Future<Output = Result<CreatedReport>> + Send;
}

/// Transactional report factory
pub struct ReportFactory {
    db: SqlitePool,
    bus: Arc<EventBus>,
    topic: String,
    radius_km: f64,
}

impl ReportFactory {
    pub fn new(db: SqlitePool, bus: Arc<EventBus>, topic: String, radius_km: f64) -> Self {
        Self {
            db,
            bus,
            topic,
            radius_km,
        }
    }

    /// Create a report and publish the alert event
    ///
    /// Validation failures have no side effects. The insert set is
    /// all-or-nothing; the geo lookup and publish run after commit
    /// and report their outcome on the returned value instead of
    /// undoing creation.
    pub async fn create_and_dispatch(
        &self,
        owner_id: Uuid,
        evidence_uris: Vec<String>,
        description: String,
    ) -> Result<CreatedReport> {
        if evidence_uris.is_empty() {
            return Err(Error::Validation(
                "A report requires at least one evidence image".to_string(),
            ));
        }
        if description.trim().is_empty() {
            return Err(Error::Validation(
                "A report requires a description".to_string(),
            ));
        }

        let owner = responders::get(&self.db, owner_id)
            .await?
            .filter(|r| r.role == Role::Owner)
            .ok_or_else(|| Error::NotFound(format!("Owner {} not found", owner_id)))?;

        let origin = geo::coordinates_of(&owner).ok_or_else(|| {
            Error::NotFound(format!("Owner {} has no usable coordinates", owner_id))
        })?;

        let report_id = Uuid::new_v4();
        let created_at = chrono::Utc::now();

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO incident_reports (guid, description, created_at) VALUES (?, ?, ?)",
        )
        .bind(report_id.to_string())
        .bind(&description)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        for (position, uri) in evidence_uris.iter().enumerate() {
            sqlx::query(
                "INSERT INTO evidence_images (guid, report_id, uri, position) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(report_id.to_string())
            .bind(uri)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO assignments (guid, responder_id, report_id, status) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(owner_id.to_string())
        .bind(report_id.to_string())
        .bind("PENDING")
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            report_id = %report_id,
            owner_id = %owner_id,
            evidence_count = evidence_uris.len(),
            "Incident report committed"
        );

        // The report exists from here on regardless of what the geo
        // lookup or the publish do.
        let population = responders::list_by_role(&self.db, Role::Responder).await?;
        let nearby = geo::find_within(origin, self.radius_km, Role::Responder, &population);

        if nearby.is_empty() {
            tracing::warn!(
                report_id = %report_id,
                radius_km = self.radius_km,
                "No responders in range; alert not published"
            );
            return Ok(CreatedReport {
                report_id,
                responders: Vec::new(),
                outcome: DispatchOutcome::NoRespondersInRange,
            });
        }

        let hits: Vec<ResponderHit> = nearby
            .iter()
            .map(|m| ResponderHit {
                id: m.responder.guid.to_string(),
                name: m.responder.name.clone(),
                distance_km: m.distance_km,
            })
            .collect();

        let event = AlertEvent {
            user_id: owner_id.to_string(),
            report: ReportPayload {
                report_id: report_id.to_string(),
                owner_id: owner_id.to_string(),
                address: owner.address.clone().unwrap_or_default(),
                description,
                images: evidence_uris,
                created_at,
                responders_in_radius: hits.clone(),
            },
        };

        let payload = serde_json::to_vec(&event)
            .map_err(|e| Error::Internal(format!("Cannot encode alert event: {}", e)))?;

        let outcome = match self.bus.publish(&self.topic, ALERT_KEY, payload) {
            Ok(subscribers) => {
                tracing::info!(
                    report_id = %report_id,
                    subscribers,
                    responders = hits.len(),
                    "Alert event published"
                );
                DispatchOutcome::Published { subscribers }
            }
            Err(e) => {
                tracing::warn!(
                    report_id = %report_id,
                    error = %e,
                    "Alert publish deferred; report remains committed"
                );
                DispatchOutcome::PublishDeferred {
                    reason: e.to_string(),
                }
            }
        };

        Ok(CreatedReport {
            report_id,
            responders: hits,
            outcome,
        })
    }
}

impl ReportSink for ReportFactory {
    fn create_and_dispatch(
        &self,
        owner_id: Uuid,
        evidence_uris: Vec<String>,
        description: String,
    ) -> impl Future<Output = Result<CreatedReport>> + Send {
        ReportFactory::create_and_dispatch(self, owner_id, evidence_uris, description)
    }
}
