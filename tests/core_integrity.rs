use bookings::{
    core::store::{BookingStore, StoreError},
    record::{
        booking::BookingDraft,
        client::ClientDraft,
        service::ServiceDraft,
        session::SessionDraft,
        staff::{StaffDraft, StaffPatch},
    },
    types::{BookingStatus, ClientId, ServiceId, StaffId, MINUTE_MS},
};

fn service_draft(name: &str, duration_minutes: u32) -> ServiceDraft {
    ServiceDraft {
        name: name.to_string(),
        description: String::new(),
        duration_minutes,
        price_cents: 5_000,
        active: true,
    }
}

fn staff_draft(name: &str, email: &str, services: Vec<ServiceId>) -> StaffDraft {
    StaffDraft {
        name: name.to_string(),
        email: email.to_string(),
        phone: String::new(),
        services,
        active: true,
    }
}

fn client_draft(name: &str, email: &str) -> ClientDraft {
    ClientDraft {
        name: name.to_string(),
        email: email.to_string(),
        phone: String::new(),
        notes: String::new(),
    }
}

fn booking_draft(
    client_id: ClientId,
    service_id: ServiceId,
    staff_id: StaffId,
    start_time_ms: u64,
) -> BookingDraft {
    BookingDraft {
        client_id,
        service_id,
        staff_id,
        start_time_ms,
        end_time_ms: None,
        status: BookingStatus::Pending,
        notes: String::new(),
    }
}

fn seeded() -> (BookingStore, ServiceId, StaffId, ClientId) {
    let mut store = BookingStore::new();
    let (service_id, _) = store.create_service(service_draft("Haircut", 30)).unwrap();
    let (staff_id, _) = store
        .create_staff(staff_draft("Dana", "dana@example.com", vec![service_id]))
        .unwrap();
    let (client_id, _) = store
        .create_client(client_draft("Sam", "sam@example.com"))
        .unwrap();
    (store, service_id, staff_id, client_id)
}

#[test]
fn creates_yield_monotonic_ids_and_op_seqs() {
    let mut store = BookingStore::new();
    let (id1, op1) = store.create_service(service_draft("Cut", 30)).unwrap();
    let (id2, op2) = store.create_service(service_draft("Color", 60)).unwrap();
    let (id3, op3) = store.create_service(service_draft("Shave", 15)).unwrap();

    assert_eq!((id1, id2, id3), (1, 2, 3));
    assert_eq!((op1.seq, op2.seq, op3.seq), (1, 2, 3));
}

#[test]
fn invalid_drafts_are_rejected_without_side_effects() {
    let mut store = BookingStore::new();

    let r = store.create_service(ServiceDraft {
        duration_minutes: 0,
        ..service_draft("Broken", 30)
    });
    assert!(matches!(r, Err(StoreError::Validation(_))));

    let r = store.create_service(ServiceDraft {
        price_cents: -1,
        ..service_draft("Broken", 30)
    });
    assert!(matches!(r, Err(StoreError::Validation(_))));

    let r = store.create_client(client_draft("NoAt", "not-an-email"));
    assert!(matches!(r, Err(StoreError::Validation(_))));

    assert!(store.services().is_empty());
    assert!(store.clients().is_empty());
    assert_eq!(store.latest_op_seq(), 0);
    assert!(store.drain_pending_ops().is_empty());
}

#[test]
fn staff_email_must_be_unique_on_create_and_update() {
    let mut store = BookingStore::new();
    let (_, _) = store
        .create_staff(staff_draft("Dana", "dana@example.com", vec![]))
        .unwrap();
    let (other, _) = store
        .create_staff(staff_draft("Lee", "lee@example.com", vec![]))
        .unwrap();

    let r = store.create_staff(staff_draft("Imposter", "dana@example.com", vec![]));
    assert!(matches!(r, Err(StoreError::DuplicateEmail(_))));
    assert_eq!(store.staff_members().len(), 2);

    let r = store.update_staff(
        other,
        StaffPatch {
            email: Some("dana@example.com".to_string()),
            ..StaffPatch::default()
        },
    );
    assert!(matches!(r, Err(StoreError::DuplicateEmail(_))));
    assert_eq!(store.staff_member(other).unwrap().email, "lee@example.com");

    // Re-saving a record with its own email is not a collision.
    store
        .update_staff(
            other,
            StaffPatch {
                email: Some("lee@example.com".to_string()),
                name: Some("Lee B".to_string()),
                ..StaffPatch::default()
            },
        )
        .unwrap();
    assert_eq!(store.find_staff_by_email("lee@example.com").unwrap().id, other);
}

#[test]
fn booking_end_time_is_derived_from_service_duration() {
    let (mut store, service_id, staff_id, client_id) = seeded();
    let start = 1_700_000_000_000u64;

    let (id, _) = store
        .create_booking(booking_draft(client_id, service_id, staff_id, start))
        .unwrap();
    let rec = store.booking(id).unwrap();
    assert_eq!(rec.end_time_ms, start + 30 * MINUTE_MS);

    // An explicit end time wins over derivation.
    let (id2, _) = store
        .create_booking(BookingDraft {
            end_time_ms: Some(start + 90 * MINUTE_MS),
            ..booking_draft(client_id, service_id, staff_id, start)
        })
        .unwrap();
    assert_eq!(store.booking(id2).unwrap().end_time_ms, start + 90 * MINUTE_MS);
}

#[test]
fn clearing_end_time_on_update_re_derives_it() {
    let (mut store, service_id, staff_id, client_id) = seeded();
    let start = 1_700_000_000_000u64;

    let (id, _) = store
        .create_booking(BookingDraft {
            end_time_ms: Some(start + 90 * MINUTE_MS),
            ..booking_draft(client_id, service_id, staff_id, start)
        })
        .unwrap();

    let new_start = start + 24 * 60 * MINUTE_MS;
    store
        .update_booking(
            id,
            bookings::record::booking::BookingPatch {
                start_time_ms: Some(new_start),
                end_time_ms: Some(None),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(store.booking(id).unwrap().end_time_ms, new_start + 30 * MINUTE_MS);
}

#[test]
fn referenced_service_and_staff_cannot_be_deleted() {
    let (mut store, service_id, staff_id, client_id) = seeded();
    let (booking_id, _) = store
        .create_booking(booking_draft(client_id, service_id, staff_id, 1_000))
        .unwrap();

    assert!(matches!(
        store.delete_service(service_id),
        Err(StoreError::ServiceInUse(_))
    ));
    assert!(matches!(
        store.delete_staff(staff_id),
        Err(StoreError::StaffInUse(_))
    ));
    assert!(store.service(service_id).is_some());
    assert!(store.staff_member(staff_id).is_some());

    store.delete_booking(booking_id).unwrap();
    store.delete_service(service_id).unwrap();
    store.delete_staff(staff_id).unwrap();
    assert!(store.service(service_id).is_none());
    assert!(store.staff_member(staff_id).is_none());
}

#[test]
fn deleting_a_service_strips_staff_memberships() {
    let mut store = BookingStore::new();
    let (s1, _) = store.create_service(service_draft("Cut", 30)).unwrap();
    let (s2, _) = store.create_service(service_draft("Color", 60)).unwrap();
    let (staff_id, _) = store
        .create_staff(staff_draft("Dana", "dana@example.com", vec![s1, s2]))
        .unwrap();

    store.delete_service(s1).unwrap();
    assert_eq!(store.staff_member(staff_id).unwrap().services, vec![s2]);
}

#[test]
fn deleting_a_client_cascades_bookings_and_enrollments() {
    let (mut store, service_id, staff_id, client_id) = seeded();
    let (keep_client, _) = store
        .create_client(client_draft("Pat", "pat@example.com"))
        .unwrap();

    let (b1, _) = store
        .create_booking(booking_draft(client_id, service_id, staff_id, 1_000))
        .unwrap();
    let (b2, _) = store
        .create_booking(booking_draft(client_id, service_id, staff_id, 2_000))
        .unwrap();
    let (b3, _) = store
        .create_booking(booking_draft(keep_client, service_id, staff_id, 3_000))
        .unwrap();

    let (session_id, _) = store
        .create_session(SessionDraft {
            title: "Group cut".to_string(),
            description: String::new(),
            service_id,
            staff_id,
            start_time_ms: 10_000,
            end_time_ms: 20_000,
            capacity: 5,
            active: true,
        })
        .unwrap();
    store.enroll(session_id, client_id).unwrap();
    store.enroll(session_id, keep_client).unwrap();

    let (mut removed, _) = store.delete_client(client_id).unwrap();
    removed.sort_unstable();
    assert_eq!(removed, vec![b1, b2]);

    assert!(store.client(client_id).is_none());
    assert!(store.booking(b1).is_none());
    assert!(store.booking(b2).is_none());
    assert!(store.booking(b3).is_some());
    assert_eq!(
        store.session(session_id).unwrap().enrolled_clients,
        vec![keep_client]
    );
}

#[test]
fn enrollment_is_idempotent_and_capacity_is_advisory() {
    let (mut store, service_id, staff_id, _) = seeded();
    let (session_id, _) = store
        .create_session(SessionDraft {
            title: "Yoga".to_string(),
            description: String::new(),
            service_id,
            staff_id,
            start_time_ms: 10_000,
            end_time_ms: 20_000,
            capacity: 2,
            active: true,
        })
        .unwrap();

    let mut clients = Vec::new();
    for i in 0..3 {
        let (id, _) = store
            .create_client(client_draft(&format!("C{i}"), &format!("c{i}@example.com")))
            .unwrap();
        clients.push(id);
    }

    let (changed, _) = store.enroll(session_id, clients[0]).unwrap();
    assert!(changed);
    let (changed, _) = store.enroll(session_id, clients[0]).unwrap();
    assert!(!changed);
    store.enroll(session_id, clients[1]).unwrap();

    let session = store.session(session_id).unwrap();
    assert!(session.is_full());
    assert_eq!(session.available_spots(), 0);

    // Over-capacity enrollment is recorded, not rejected.
    let (changed, _) = store.enroll(session_id, clients[2]).unwrap();
    assert!(changed);
    let session = store.session(session_id).unwrap();
    assert_eq!(session.enrollment_count(), 3);
    assert_eq!(session.available_spots(), 0);

    let (changed, _) = store.unenroll(session_id, clients[2]).unwrap();
    assert!(changed);
    let (changed, _) = store.unenroll(session_id, clients[2]).unwrap();
    assert!(!changed);
    assert!(!store.session(session_id).unwrap().is_enrolled(clients[2]));
}

#[test]
fn booking_details_join_live_records() {
    let (mut store, service_id, staff_id, client_id) = seeded();
    store
        .create_booking(booking_draft(client_id, service_id, staff_id, 5_000))
        .unwrap();

    let details = store.booking_details();
    assert_eq!(details.len(), 1);
    let row = &details[0];
    assert_eq!(row.client_name, "Sam");
    assert_eq!(row.client_email, "sam@example.com");
    assert_eq!(row.service_name, "Haircut");
    assert_eq!(row.staff_name, "Dana");
    assert_eq!(row.price_cents, 5_000);
    assert_eq!(row.end_time_ms, 5_000 + 30 * MINUTE_MS);
}

#[test]
fn recent_bookings_and_agenda_are_ordered() {
    let (mut store, service_id, staff_id, client_id) = seeded();
    for start in [3_000u64, 1_000, 2_000] {
        store
            .create_booking(booking_draft(client_id, service_id, staff_id, start))
            .unwrap();
    }

    let recent: Vec<u64> = store.recent_bookings(2).iter().map(|b| b.start_time_ms).collect();
    assert_eq!(recent, vec![3_000, 2_000]);

    let agenda: Vec<u64> = store
        .staff_agenda(staff_id, 1_000, 3_000)
        .iter()
        .map(|b| b.start_time_ms)
        .collect();
    assert_eq!(agenda, vec![1_000, 2_000]);
}
