use bookings::{
    core::store::BookingStore,
    op::{Op, StoredOp},
    record::{client::ClientDraft, service::ServiceDraft},
    types::BookingStatus,
};

#[test]
fn booking_status_serializes_as_snake_case() {
    for status in BookingStatus::ALL {
        let json = serde_json::to_string(&status).expect("serialize");
        assert_eq!(json, format!("\"{}\"", status.as_str()));

        let back: BookingStatus = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, status);
    }
}

#[test]
fn booking_status_parse_matches_as_str() {
    for status in BookingStatus::ALL {
        assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(BookingStatus::parse("NO_SHOW"), None);
    assert_eq!(BookingStatus::parse(""), None);
}

#[test]
fn stored_ops_round_trip_through_json() {
    let mut store = BookingStore::new();
    store
        .create_service(ServiceDraft {
            name: "Cut".to_string(),
            description: String::new(),
            duration_minutes: 30,
            price_cents: 2_000,
            active: true,
        })
        .expect("service");
    let (client_id, _) = store
        .create_client(ClientDraft {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            phone: String::new(),
            notes: String::new(),
        })
        .expect("client");
    store.delete_client(client_id).expect("delete");

    let ops = store.drain_pending_ops();
    let json = serde_json::to_string(&ops).expect("serialize");
    let back: Vec<StoredOp> = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, ops);

    assert!(matches!(back[0].op, Op::UpsertService { .. }));
    assert!(matches!(back.last().map(|s| &s.op), Some(Op::DeleteClient { .. })));
}

#[test]
fn booking_detail_rows_expose_listing_fields() {
    use bookings::record::booking::BookingDetail;

    let row = BookingDetail {
        id: 7,
        client_name: "Sam".to_string(),
        client_email: "sam@example.com".to_string(),
        client_phone: String::new(),
        service_name: "Cut".to_string(),
        staff_name: "Dana".to_string(),
        start_time_ms: 1_000,
        end_time_ms: 2_000,
        status: BookingStatus::Confirmed,
        price_cents: 2_000,
        notes: String::new(),
        created_at_ms: 500,
    };

    let value = serde_json::to_value(&row).expect("serialize");
    assert_eq!(value["id"], 7);
    assert_eq!(value["status"], "confirmed");
    assert_eq!(value["client_name"], "Sam");
    assert_eq!(value["price_cents"], 2_000);
}
