//! End-to-end pipeline tests
//!
//! Exercises the full path with an in-memory database and mock
//! external services: qualifying detections accumulate evidence, the
//! fifth capture commits a report, the alert event crosses the bus,
//! and the consumer delivers a push notification.

use sentra_common::config::DetectionConfig;
use sentra_common::db::models::{AssignmentStatus, Responder, Role};
use sentra_common::db::{self, responders};
use sentra_common::events::{EventBus, ALERT_TOPIC};
use sentra_common::Result;
use sentra_watch::consumer::run_consumer;
use sentra_watch::detect::{BoundingBox, Detection, DetectionFilter, EvidenceStore, Frame};
use sentra_watch::notify::{Notification, NotificationDispatcher, PushError, PushGateway};
use sentra_watch::report::ReportFactory;
use sentra_watch::session::{AccumulatorOutcome, EvidenceAccumulator};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct MemoryStore {
    uploads: AtomicUsize,
}

impl EvidenceStore for MemoryStore {
    async fn put(&self, _bytes: &[u8], path: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("mem://{}", path)
    }
}

struct RecordingGateway {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl PushGateway for RecordingGateway {
    async fn send(
        &self,
        token: &str,
        notification: &Notification,
    ) -> std::result::Result<String, PushError> {
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), notification.clone()));
        Ok("msg-1".to_string())
    }
}

async fn seed_database(pool: &SqlitePool) -> (Uuid, Uuid) {
    db::init_tables(pool).await.unwrap();

    let owner_id = Uuid::new_v4();
    responders::insert(
        pool,
        &Responder {
            guid: owner_id,
            name: "Pak Budi".to_string(),
            email: "budi@example.com".to_string(),
            address: Some("Jl. Veteran 12".to_string()),
            lat: Some("-0.9262".to_string()),
            long: Some("100.4343".to_string()),
            role: Role::Owner,
            push_token: Some("owner-device-token".to_string()),
        },
    )
    .await
    .unwrap();

    let near_id = Uuid::new_v4();
    responders::insert(
        pool,
        &Responder {
            guid: near_id,
            name: "Officer Rahmat".to_string(),
            email: "rahmat@example.com".to_string(),
            address: None,
            lat: Some("-0.9300".to_string()),
            long: Some("100.4256".to_string()),
            role: Role::Responder,
            push_token: Some("responder-device-token".to_string()),
        },
    )
    .await
    .unwrap();

    // Out of radius, must never be ranked
    responders::insert(
        pool,
        &Responder {
            guid: Uuid::new_v4(),
            name: "Far Away".to_string(),
            email: "far@example.com".to_string(),
            address: None,
            lat: Some("10".to_string()),
            long: Some("10".to_string()),
            role: Role::Responder,
            push_token: None,
        },
    )
    .await
    .unwrap();

    (owner_id, near_id)
}

fn knife_detection() -> Detection {
    Detection {
        label: "knife".to_string(),
        confidence: 0.93,
        bounding_box: BoundingBox {
            x1: 100.0,
            y1: 80.0,
            x2: 160.0,
            y2: 200.0,
        },
    }
}

#[tokio::test]
async fn test_five_captures_produce_one_report_and_one_notification() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    let (owner_id, _near_id) = seed_database(&pool).await;

    let bus = Arc::new(EventBus::new(16));
    let subscription = bus.subscribe(ALERT_TOPIC, "alert-dispatch");

    let gateway = Arc::new(RecordingGateway {
        sent: Mutex::new(Vec::new()),
    });
    let dispatcher = NotificationDispatcher::new(pool.clone(), gateway.clone());
    let cancel = CancellationToken::new();
    let consumer = tokio::spawn(run_consumer(subscription, dispatcher, cancel.clone()));

    let factory = Arc::new(ReportFactory::new(
        pool.clone(),
        bus,
        ALERT_TOPIC.to_string(),
        20.0,
    ));
    let store = Arc::new(MemoryStore {
        uploads: AtomicUsize::new(0),
    });
    let accumulator = EvidenceAccumulator::new(
        store.clone(),
        factory,
        DetectionFilter::new(&DetectionConfig::default()),
        5,
    );

    let session_id = Uuid::new_v4();
    accumulator
        .start(session_id, owner_id, "Weapon detected on camera Gate A".to_string())
        .unwrap();

    let frame = Frame::new(vec![0xFF, 0xD8, 0x01]);
    let mut report_id = None;
    for capture in 1..=5 {
        let outcome = accumulator
            .submit(session_id, &frame, &[knife_detection()])
            .await
            .unwrap();
        match outcome {
            AccumulatorOutcome::Monitoring { evidence_count } => {
                assert_eq!(evidence_count, capture);
            }
            AccumulatorOutcome::Reported { report_id: id } => {
                assert_eq!(capture, 5);
                report_id = Some(id);
            }
            AccumulatorOutcome::SessionClosed => panic!("session closed prematurely"),
        }
    }
    let report_id = report_id.expect("fifth capture reports");
    assert_eq!(store.uploads.load(Ordering::SeqCst), 5);

    // Report, five ordered evidence rows, and a PENDING assignment
    let report = db::reports::get(&pool, report_id).await.unwrap().unwrap();
    assert_eq!(report.description, "Weapon detected on camera Gate A");

    let evidence = db::reports::evidence_for(&pool, report_id).await.unwrap();
    assert_eq!(evidence.len(), 5);
    assert!(evidence.iter().all(|e| e.uri.starts_with("mem://")));

    let assignment = db::assignments::get_for_report(&pool, report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Pending);

    // The consumer delivers exactly one push to the owner's device
    tokio::time::timeout(Duration::from_secs(2), async {
        while gateway.sent.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notification should arrive");

    {
        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (token, notification) = &sent[0];
        assert_eq!(token, "owner-device-token");
        assert_eq!(notification.title, "Threat detected!");
        assert_eq!(
            notification.data.get("report_id"),
            Some(&report_id.to_string())
        );
        assert_eq!(
            notification.data.get("owner_id"),
            Some(&owner_id.to_string())
        );
    }

    // A sixth capture on the reported session changes nothing
    let outcome = accumulator
        .submit(session_id, &frame, &[knife_detection()])
        .await
        .unwrap();
    assert!(matches!(outcome, AccumulatorOutcome::SessionClosed));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incident_reports")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), consumer)
        .await
        .expect("consumer should stop")
        .unwrap();
}

#[tokio::test]
async fn test_low_confidence_detections_never_report() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    let (owner_id, _) = seed_database(&pool).await;

    let bus = Arc::new(EventBus::new(16));
    let factory = Arc::new(ReportFactory::new(
        pool.clone(),
        bus,
        ALERT_TOPIC.to_string(),
        20.0,
    ));
    let store = Arc::new(MemoryStore {
        uploads: AtomicUsize::new(0),
    });
    let accumulator = EvidenceAccumulator::new(
        store.clone(),
        factory,
        DetectionFilter::new(&DetectionConfig::default()),
        5,
    );

    let session_id = Uuid::new_v4();
    accumulator
        .start(session_id, owner_id, "desc".to_string())
        .unwrap();

    let weak = Detection {
        confidence: 0.5,
        ..knife_detection()
    };
    let frame = Frame::new(vec![0xFF, 0xD8]);
    for _ in 0..10 {
        let outcome = accumulator.submit(session_id, &frame, &[weak.clone()]).await.unwrap();
        assert!(matches!(
            outcome,
            AccumulatorOutcome::Monitoring { evidence_count: 0 }
        ));
    }

    assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incident_reports")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
