//! Event bus consumer loop
//!
//! Polls a subscription with a bounded timeout so cancellation is
//! observed between polls, hands each message to the handler, and
//! never dies on a single bad message. Bus failures back off and
//! retry instead of crashing; the supervising process restarts the
//! loop on the truly unrecoverable path.

use sentra_common::events::{EventHandler, Subscription};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounded poll wait, so the loop can observe cancellation
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Run the consumer loop until cancelled
pub async fn run_consumer<H: EventHandler>(
    mut subscription: Subscription,
    handler: H,
    cancel: CancellationToken,
) {
    tracing::debug!("Consumer loop started");
    let mut backoff = BACKOFF_INITIAL;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let polled = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = subscription.poll(POLL_TIMEOUT) => polled,
        };

        match polled {
            Ok(Some(message)) => {
                backoff = BACKOFF_INITIAL;
                if let Err(e) = handler.on_event(&message).await {
                    if e.is_recoverable() {
                        tracing::warn!(
                            topic = %message.topic,
                            error = %e,
                            "Skipping message"
                        );
                    } else {
                        tracing::error!(
                            topic = %message.topic,
                            error = %e,
                            "Handler failed; skipping message"
                        );
                    }
                }
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    backoff_secs = backoff.as_secs(),
                    "Bus poll failed; backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(BACKOFF_MAX);
            }
        }
    }

    tracing::debug!("Consumer loop stopped");
}
