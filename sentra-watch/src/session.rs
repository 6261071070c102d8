//! Evidence accumulation state machine
//!
//! One session per monitoring run. A session moves
//! IDLE → MONITORING → {REPORTED | STOPPED}; both end states are
//! terminal. Frames may be submitted concurrently, so the
//! MONITORING → REPORTED edge is a compare-and-swap on the session
//! phase: exactly one submitter wins and calls the report sink,
//! every other submitter observes a closed session.

use crate::detect::{Detection, DetectionFilter, EvidenceStore, Frame};
use crate::report::ReportSink;
use sentra_common::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Session lifecycle phase, stored as an atomic for lock-free
/// transition checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    Idle = 0,
    Monitoring = 1,
    Reported = 2,
    Stopped = 3,
}

impl SessionPhase {
    fn from_u8(value: u8) -> SessionPhase {
        match value {
            0 => SessionPhase::Idle,
            1 => SessionPhase::Monitoring,
            2 => SessionPhase::Reported,
            _ => SessionPhase::Stopped,
        }
    }
}

/// Outcome of one `submit` call
#[derive(Debug, Clone)]
pub enum AccumulatorOutcome {
    /// Session still monitoring; evidence gathered so far
    Monitoring { evidence_count: usize },
    /// This submission completed the evidence set and created the report
    Reported { report_id: Uuid },
    /// The session already reported or stopped; submission ignored
    SessionClosed,
}

struct Session {
    owner_id: Uuid,
    description: String,
    phase: AtomicU8,
    evidence: Mutex<Vec<String>>,
    stop: CancellationToken,
}

impl Session {
    fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }
}

/// Per-session evidence accumulator
///
/// Depends on the evidence store for frame persistence and on the
/// report sink (the report factory in production) for the terminal
/// report-creation step.
pub struct EvidenceAccumulator<E, R> {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
    store: Arc<E>,
    sink: Arc<R>,
    filter: DetectionFilter,
    capacity: usize,
}

impl<E: EvidenceStore, R: ReportSink> EvidenceAccumulator<E, R> {
    pub fn new(store: Arc<E>, sink: Arc<R>, filter: DetectionFilter, capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
            sink,
            filter,
            capacity,
        }
    }

    fn session(&self, session_id: Uuid) -> Result<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Unknown session {}", session_id)))
    }

    /// Register a session and move it IDLE → MONITORING
    pub fn start(&self, session_id: Uuid, owner_id: Uuid, description: String) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&session_id) {
            return Err(Error::Conflict(format!(
                "Session {} already started",
                session_id
            )));
        }
        sessions.insert(
            session_id,
            Arc::new(Session {
                owner_id,
                description,
                phase: AtomicU8::new(SessionPhase::Monitoring as u8),
                evidence: Mutex::new(Vec::new()),
                stop: CancellationToken::new(),
            }),
        );
        tracing::info!(session_id = %session_id, owner_id = %owner_id, "Monitoring session started");
        Ok(())
    }

    /// Cooperative stop signal for the session's driving loop
    pub fn stop_signal(&self, session_id: Uuid) -> Result<CancellationToken> {
        Ok(self.session(session_id)?.stop.clone())
    }

    /// Current phase, for loop control and tests
    pub fn phase(&self, session_id: Uuid) -> Result<SessionPhase> {
        Ok(self.session(session_id)?.phase())
    }

    /// Submit one frame's detections
    ///
    /// Qualifying detections persist the frame and append its URI to
    /// the session's evidence set (bounded by capacity, deduplicated
    /// by URI). A store failure skips that frame and keeps
    /// monitoring. Reaching capacity reports exactly once.
    pub async fn submit(
        &self,
        session_id: Uuid,
        frame: &Frame,
        detections: &[Detection],
    ) -> Result<AccumulatorOutcome> {
        let session = self.session(session_id)?;

        if session.phase() != SessionPhase::Monitoring {
            return Ok(AccumulatorOutcome::SessionClosed);
        }

        if detections.is_empty() {
            let count = session
                .evidence
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len();
            return Ok(AccumulatorOutcome::Monitoring {
                evidence_count: count,
            });
        }

        for detection in detections.iter().filter(|d| self.filter.qualifies(d)) {
            {
                let evidence = session
                    .evidence
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if evidence.len() >= self.capacity {
                    break;
                }
            }

            let path = evidence_path(session.owner_id, frame.captured_at, &detection.label);
            match self.store.put(&frame.bytes, &path).await {
                Ok(uri) => {
                    let mut evidence = session
                        .evidence
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if evidence.len() < self.capacity && !evidence.contains(&uri) {
                        evidence.push(uri);
                        tracing::info!(
                            session_id = %session_id,
                            label = %detection.label,
                            confidence = detection.confidence,
                            evidence_count = evidence.len(),
                            "Evidence captured"
                        );
                    }
                }
                Err(e) => {
                    // Non-fatal: skip this frame, keep monitoring
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "Evidence upload failed; frame skipped"
                    );
                }
            }
        }

        let evidence_count = session
            .evidence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();

        if evidence_count < self.capacity {
            return Ok(AccumulatorOutcome::Monitoring { evidence_count });
        }

        // Single atomic step: only the CAS winner calls the sink, so
        // concurrent submissions can never produce two reports.
        let won = session
            .phase
            .compare_exchange(
                SessionPhase::Monitoring as u8,
                SessionPhase::Reported as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if !won {
            return Ok(AccumulatorOutcome::SessionClosed);
        }

        let uris: Vec<String> = {
            let evidence = session
                .evidence
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            evidence.iter().take(self.capacity).cloned().collect()
        };

        tracing::info!(
            session_id = %session_id,
            evidence_count = uris.len(),
            "Evidence capacity reached; creating report"
        );

        let created = self
            .sink
            .create_and_dispatch(session.owner_id, uris, session.description.clone())
            .await?;

        session.stop.cancel();

        Ok(AccumulatorOutcome::Reported {
            report_id: created.report_id,
        })
    }

    /// Move a MONITORING session to STOPPED without reporting
    ///
    /// Stopping an already reported or stopped session is a no-op.
    pub fn stop(&self, session_id: Uuid) -> Result<()> {
        let session = self.session(session_id)?;
        let stopped = session
            .phase
            .compare_exchange(
                SessionPhase::Monitoring as u8,
                SessionPhase::Stopped as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        session.stop.cancel();
        if stopped {
            tracing::info!(session_id = %session_id, "Monitoring session stopped");
        }
        Ok(())
    }
}

fn evidence_path(
    owner_id: Uuid,
    captured_at: chrono::DateTime<chrono::Utc>,
    label: &str,
) -> String {
    let timestamp = captured_at.format("%Y%m%d_%H%M");
    format!("{}/{}/{}_{}.jpg", owner_id, timestamp, label, Uuid::new_v4())
}
