//! Monitoring loop
//!
//! Drives one session: grab a frame, run the classifier, submit the
//! detections. Cancellation is cooperative; the per-session stop
//! signal is checked every iteration and there is no hard preemption
//! of in-flight frame processing.

use crate::detect::{EvidenceStore, FrameClassifier, FrameSource};
use crate::report::ReportSink;
use crate::session::{AccumulatorOutcome, EvidenceAccumulator};
use sentra_common::Result;
use std::time::Duration;
use uuid::Uuid;

/// Run a started session until it reports, stops, or the camera dies
///
/// Returns the report id when the session ended in REPORTED.
pub async fn run_session<S, C, E, R>(
    source: &S,
    classifier: &C,
    accumulator: &EvidenceAccumulator<E, R>,
    session_id: Uuid,
    frame_interval: Duration,
) -> Result<Option<Uuid>>
where
    S: FrameSource,
    C: FrameClassifier,
    E: EvidenceStore,
    R: ReportSink,
{
    let stop = accumulator.stop_signal(session_id)?;
    tracing::info!(session_id = %session_id, "Watch loop started");

    loop {
        if stop.is_cancelled() {
            tracing::info!(session_id = %session_id, "Watch loop cancelled");
            return Ok(None);
        }

        let frame = match source.next_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to read frame; ending watch");
                accumulator.stop(session_id)?;
                return Ok(None);
            }
        };

        let detections = match classifier.detect(&frame).await {
            Ok(detections) => detections,
            Err(e) => {
                // Model hiccups are transient; keep watching
                tracing::warn!(session_id = %session_id, error = %e, "Classifier error; frame skipped");
                Vec::new()
            }
        };

        match accumulator.submit(session_id, &frame, &detections).await? {
            AccumulatorOutcome::Reported { report_id } => {
                tracing::info!(session_id = %session_id, report_id = %report_id, "Session reported");
                return Ok(Some(report_id));
            }
            AccumulatorOutcome::SessionClosed => {
                tracing::info!(session_id = %session_id, "Session closed");
                return Ok(None);
            }
            AccumulatorOutcome::Monitoring { .. } => {}
        }

        tokio::select! {
            _ = stop.cancelled() => {}
            _ = tokio::time::sleep(frame_interval) => {}
        }
    }
}
