//! sentra-watch - threat monitoring service
//!
//! Wires the whole pipeline together: camera frames through the
//! detection filter into the evidence accumulator, incident reports
//! onto the event bus, and the notification dispatcher consuming
//! alerts on the other side.

use anyhow::{Context, Result};
use clap::Parser;
use sentra_common::config::SentraConfig;
use sentra_common::db::{self, monitors};
use sentra_common::events::EventBus;
use sentra_watch::adapters::{
    HttpClassifier, HttpEvidenceStore, HttpPushGateway, SnapshotFrameSource,
};
use sentra_watch::consumer::run_consumer;
use sentra_watch::detect::DetectionFilter;
use sentra_watch::notify::NotificationDispatcher;
use sentra_watch::report::ReportFactory;
use sentra_watch::session::EvidenceAccumulator;
use sentra_watch::watch::run_session;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Command-line arguments for sentra-watch
#[derive(Parser, Debug)]
#[command(name = "sentra-watch")]
#[command(about = "Camera threat monitoring and alert dispatch service")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SENTRA_CONFIG")]
    config: Option<PathBuf>,

    /// Camera source to watch (must match a registered monitor)
    #[arg(short, long, env = "SENTRA_MONITOR_SOURCE")]
    monitor_source: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentra_watch=debug,sentra_common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting sentra-watch");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = SentraConfig::load(args.config.as_deref())?;

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data dir {}", parent.display()))?;
    }
    info!("Database: {}", db_path.display());
    let pool = db::init_database_pool(&db_path).await?;

    let bus = Arc::new(EventBus::new(config.bus_capacity));
    info!(topic = %config.topic, "Event bus initialized");

    let shutdown = CancellationToken::new();

    // Alert consumer: subscribe before anything can publish so no
    // report is dispatched into an empty topic.
    let gateway_url = config
        .endpoints
        .push_gateway_url
        .clone()
        .context("endpoints.push_gateway_url is required")?;
    let subscription = bus.subscribe(&config.topic, &config.group_id);
    let dispatcher =
        NotificationDispatcher::new(pool.clone(), Arc::new(HttpPushGateway::new(gateway_url)));
    let consumer = tokio::spawn(run_consumer(subscription, dispatcher, shutdown.clone()));
    info!(group_id = %config.group_id, "Notification dispatcher running");

    // Watch loop: only when a monitor source is named; an alert-only
    // deployment runs the consumer alone.
    let watch = match &args.monitor_source {
        Some(source) => Some(spawn_watch(&config, &pool, bus.clone(), source).await?),
        None => {
            info!("No monitor source given; running alert dispatch only");
            None
        }
    };

    shutdown_signal().await;
    info!("Shutdown requested");
    shutdown.cancel();

    if let Some((accumulator_stop, handle)) = watch {
        accumulator_stop.cancel();
        if let Err(e) = handle.await {
            warn!(error = %e, "Watch task ended abnormally");
        }
    }
    consumer.await.context("Consumer task panicked")?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolve the monitor, build the capture-side pipeline, and spawn
/// the watch loop for one session.
async fn spawn_watch(
    config: &SentraConfig,
    pool: &sqlx::SqlitePool,
    bus: Arc<EventBus>,
    source: &str,
) -> Result<(CancellationToken, tokio::task::JoinHandle<()>)> {
    let monitor = monitors::get_by_source(pool, source)
        .await?
        .with_context(|| format!("No monitor registered for source {}", source))?;
    let owner_id = monitor.responder_id;
    info!(monitor = %monitor.name, owner_id = %owner_id, "Monitor resolved");

    let camera_url = config
        .endpoints
        .camera_url
        .clone()
        .unwrap_or_else(|| monitor.source.clone());
    let classifier_url = config
        .endpoints
        .classifier_url
        .clone()
        .context("endpoints.classifier_url is required to watch a monitor")?;
    let store_url = config
        .endpoints
        .evidence_store_url
        .clone()
        .context("endpoints.evidence_store_url is required to watch a monitor")?;

    let factory = Arc::new(ReportFactory::new(
        pool.clone(),
        bus,
        config.topic.clone(),
        config.responder_radius_km,
    ));
    let accumulator = Arc::new(EvidenceAccumulator::new(
        Arc::new(HttpEvidenceStore::new(store_url)),
        factory,
        DetectionFilter::new(&config.detection),
        config.detection.evidence_capacity,
    ));

    let session_id = Uuid::new_v4();
    let description = format!("Weapon detected on camera {}", monitor.name);
    accumulator.start(session_id, owner_id, description)?;

    let source = SnapshotFrameSource::new(camera_url);
    let classifier = HttpClassifier::new(classifier_url);
    let frame_interval = Duration::from_millis(config.frame_interval_ms);
    let stop = accumulator.stop_signal(session_id)?;

    let handle = tokio::spawn(async move {
        match run_session(&source, &classifier, &*accumulator, session_id, frame_interval).await {
            Ok(Some(report_id)) => info!(report_id = %report_id, "Session ended with a report"),
            Ok(None) => info!("Session ended without a report"),
            Err(e) => warn!(error = %e, "Watch loop failed"),
        }
    });

    Ok((stop, handle))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
