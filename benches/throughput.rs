use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use bookings::{
    core::store::BookingStore,
    record::{
        booking::{BookingDraft, BookingPatch},
        client::ClientDraft,
        service::ServiceDraft,
        staff::StaffDraft,
    },
    types::{BookingStatus, ClientId, ServiceId, StaffId},
};

fn seeded() -> (BookingStore, ServiceId, StaffId, ClientId) {
    let mut store = BookingStore::new();
    let (service_id, _) = store
        .create_service(ServiceDraft {
            name: "Cut".to_string(),
            description: String::new(),
            duration_minutes: 30,
            price_cents: 2_000,
            active: true,
        })
        .expect("service");
    let (staff_id, _) = store
        .create_staff(StaffDraft {
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            phone: String::new(),
            services: vec![service_id],
            active: true,
        })
        .expect("staff");
    let (client_id, _) = store
        .create_client(ClientDraft {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            phone: String::new(),
            notes: String::new(),
        })
        .expect("client");
    (store, service_id, staff_id, client_id)
}

fn draft(client_id: ClientId, service_id: ServiceId, staff_id: StaffId, ts: u64) -> BookingDraft {
    BookingDraft {
        client_id,
        service_id,
        staff_id,
        start_time_ms: ts,
        end_time_ms: None,
        status: BookingStatus::Pending,
        notes: String::new(),
    }
}

fn bench_booking_creates(c: &mut Criterion) {
    c.bench_function("store_create_booking_50k", |b| {
        b.iter(|| {
            let (mut store, service_id, staff_id, client_id) = seeded();
            for i in 0..50_000u64 {
                let _ = store
                    .create_booking(draft(client_id, service_id, staff_id, i))
                    .expect("create");
            }
        });
    });
}

fn bench_status_updates(c: &mut Criterion) {
    c.bench_function("store_update_status_10k", |b| {
        b.iter(|| {
            let (mut store, service_id, staff_id, client_id) = seeded();
            let mut ids = Vec::with_capacity(10_000);
            for i in 0..10_000u64 {
                let (id, _) = store
                    .create_booking(draft(client_id, service_id, staff_id, i))
                    .expect("create");
                ids.push(id);
            }
            for id in ids {
                let _ = store
                    .update_booking(
                        id,
                        BookingPatch {
                            status: Some(BookingStatus::Confirmed),
                            ..BookingPatch::default()
                        },
                    )
                    .expect("update");
            }
        });
    });
}

fn bench_listing_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("recent_bookings");
    let (mut store, service_id, staff_id, client_id) = seeded();
    for i in 0..50_000u64 {
        let _ = store
            .create_booking(draft(client_id, service_id, staff_id, i))
            .expect("create");
    }

    for n in [10usize, 100usize, 1000usize] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let _ = store.recent_bookings(n);
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group("staff_agenda");
    for window in [1_000u64, 10_000u64] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| {
                let _ = store.staff_agenda(staff_id, 0, window);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_booking_creates,
    bench_status_updates,
    bench_listing_queries
);
criterion_main!(benches);
