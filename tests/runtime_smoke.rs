use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use bookings::{
    core::store::BookingStore,
    op::StoredOp,
    persist::{PersistResult, StoreSink},
    record::{
        booking::BookingDraft,
        client::ClientDraft,
        service::{ServiceDraft, ServicePatch},
        staff::StaffDraft,
    },
    runtime::{
        events::{Entity, StoreEvent},
        handle::{spawn_bookings, RuntimeConfig, RuntimeError},
    },
    types::{BookingStatus, OpSeq},
};

fn client_draft(name: &str, email: &str) -> ClientDraft {
    ClientDraft {
        name: name.to_string(),
        email: email.to_string(),
        phone: String::new(),
        notes: String::new(),
    }
}

struct SlowSink {
    seen: Arc<Mutex<Vec<OpSeq>>>,
    delay: Duration,
}

impl StoreSink for SlowSink {
    fn apply_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        std::thread::sleep(self.delay);
        let mut seen = self.seen.lock().expect("lock");
        for op in ops {
            seen.push(op.seq);
        }
        Ok(ops.last().map(|o| o.seq).unwrap_or(0))
    }
}

#[tokio::test]
async fn runtime_crud_and_events_are_ordered() {
    let handle = spawn_bookings(BookingStore::new(), None, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let service_id = handle
        .create_service(ServiceDraft {
            name: "Trim".to_string(),
            description: String::new(),
            duration_minutes: 20,
            price_cents: 2_500,
            active: true,
        })
        .await
        .expect("create service");
    handle
        .update_service(
            service_id,
            ServicePatch {
                price_cents: Some(3_000),
                ..ServicePatch::default()
            },
        )
        .await
        .expect("update service");

    let rec = handle
        .service(service_id)
        .await
        .expect("query")
        .expect("record");
    assert_eq!(rec.price_cents, 3_000);

    let mut seen = Vec::new();
    for _ in 0..6 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        if !matches!(evt, StoreEvent::DurableUpTo { .. }) {
            seen.push(evt);
        }
        if seen.len() == 2 {
            break;
        }
    }

    assert_eq!(
        seen[0],
        StoreEvent::Created {
            entity: Entity::Service,
            id: service_id,
        }
    );
    assert_eq!(
        seen[1],
        StoreEvent::Updated {
            entity: Entity::Service,
            id: service_id,
        }
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn client_cascade_surfaces_removed_bookings_and_event() {
    let handle = spawn_bookings(BookingStore::new(), None, RuntimeConfig::default());

    let service_id = handle
        .create_service(ServiceDraft {
            name: "Cut".to_string(),
            description: String::new(),
            duration_minutes: 30,
            price_cents: 4_000,
            active: true,
        })
        .await
        .expect("service");
    let staff_id = handle
        .create_staff(StaffDraft {
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            phone: String::new(),
            services: vec![service_id],
            active: true,
        })
        .await
        .expect("staff");
    let client_id = handle
        .create_client(client_draft("Sam", "sam@example.com"))
        .await
        .expect("client");
    let booking_id = handle
        .create_booking(BookingDraft {
            client_id,
            service_id,
            staff_id,
            start_time_ms: 1_000,
            end_time_ms: None,
            status: BookingStatus::Pending,
            notes: String::new(),
        })
        .await
        .expect("booking");

    let mut sub = handle.subscribe();
    let removed = handle.delete_client(client_id).await.expect("cascade");
    assert_eq!(removed, vec![booking_id]);

    let mut seen = Vec::new();
    for _ in 0..6 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        if !matches!(evt, StoreEvent::DurableUpTo { .. }) {
            seen.push(evt);
        }
        if seen.len() == 2 {
            break;
        }
    }
    assert_eq!(
        seen[0],
        StoreEvent::Deleted {
            entity: Entity::Client,
            id: client_id,
        }
    );
    assert_eq!(
        seen[1],
        StoreEvent::ClientCascade {
            client: client_id,
            bookings: vec![booking_id],
        }
    );

    assert!(handle.booking(booking_id).await.expect("query").is_none());
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn durable_event_advances_and_slow_sink_surfaces_queue_pressure() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = SlowSink {
        seen: Arc::clone(&seen),
        delay: Duration::from_millis(250),
    };

    let cfg = RuntimeConfig {
        flush_on_write: true,
        batch_max_ops: 16,
        batch_max_latency_ms: 500,
        persist_queue_bound: 1,
    };

    let handle = spawn_bookings(BookingStore::new(), Some(Box::new(sink)), cfg);
    let mut sub = handle.subscribe();

    let id = handle
        .create_client(client_draft("First", "first@example.com"))
        .await
        .expect("create");
    assert_eq!(id, 1);

    let mut durable_seen = false;
    for _ in 0..5 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("recv timeout")
            .expect("recv");
        if matches!(evt, StoreEvent::DurableUpTo { .. }) {
            durable_seen = true;
            break;
        }
    }
    assert!(durable_seen, "expected DurableUpTo event");

    let mut queue_error_seen = false;
    for i in 0..12u64 {
        let r = handle
            .create_client(client_draft(&format!("C{i}"), &format!("c{i}@example.com")))
            .await;
        if let Err(RuntimeError::Persist(_)) = r {
            queue_error_seen = true;
            break;
        }
    }
    assert!(queue_error_seen, "expected persistence queue pressure to surface as error");

    handle.shutdown().await.expect("shutdown");
    assert!(!seen.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn flush_returns_a_durable_watermark() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = SlowSink {
        seen: Arc::clone(&seen),
        delay: Duration::from_millis(0),
    };
    let cfg = RuntimeConfig {
        flush_on_write: false,
        batch_max_ops: 64,
        batch_max_latency_ms: 5_000,
        persist_queue_bound: 64,
    };

    let handle = spawn_bookings(BookingStore::new(), Some(Box::new(sink)), cfg);
    for i in 0..3u64 {
        handle
            .create_client(client_draft(&format!("C{i}"), &format!("c{i}@example.com")))
            .await
            .expect("create");
    }

    let watermark = handle.flush().await.expect("flush");
    assert_eq!(watermark, 3);
    assert_eq!(*seen.lock().expect("lock"), vec![1, 2, 3]);

    handle.shutdown().await.expect("shutdown");
}
