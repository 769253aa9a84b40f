//! Authoritative in-memory appointment booking store with a SQLite mirror.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::BookingStore`]:
//! ```
//! use bookings::{
//!     core::store::BookingStore,
//!     record::{booking::BookingDraft, client::ClientDraft, service::ServiceDraft, staff::StaffDraft},
//!     types::{BookingStatus, MINUTE_MS},
//! };
//!
//! let mut store = BookingStore::new();
//! let (service_id, _op) = store.create_service(ServiceDraft {
//!     name: "Haircut".to_string(),
//!     description: String::new(),
//!     duration_minutes: 30,
//!     price_cents: 4_500,
//!     active: true,
//! }).expect("create service");
//! let (staff_id, _op) = store.create_staff(StaffDraft {
//!     name: "Dana".to_string(),
//!     email: "dana@example.com".to_string(),
//!     phone: String::new(),
//!     services: vec![service_id],
//!     active: true,
//! }).expect("create staff");
//! let (client_id, _op) = store.create_client(ClientDraft {
//!     name: "Sam".to_string(),
//!     email: "sam@example.com".to_string(),
//!     phone: String::new(),
//!     notes: String::new(),
//! }).expect("create client");
//!
//! let (booking_id, _op) = store.create_booking(BookingDraft {
//!     client_id,
//!     service_id,
//!     staff_id,
//!     start_time_ms: 1_700_000_000_000,
//!     end_time_ms: None,
//!     status: BookingStatus::Pending,
//!     notes: String::new(),
//! }).expect("create booking");
//!
//! let booking = store.booking(booking_id).expect("booking exists");
//! assert_eq!(booking.end_time_ms, 1_700_000_000_000 + 30 * MINUTE_MS);
//! ```
//!
//! Runtime usage with the SQLite mirror:
//! ```no_run
//! use bookings::{
//!     core::store::BookingStore,
//!     persist::sqlite::SqliteStore,
//!     record::client::ClientDraft,
//!     runtime::handle::{spawn_bookings, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mirror = SqliteStore::open("bookings.db").expect("open sqlite");
//! let store = mirror.load_store().expect("load store");
//! let handle = spawn_bookings(store, Some(Box::new(mirror)), RuntimeConfig::default());
//! let _id = handle.create_client(ClientDraft {
//!     name: "Sam".to_string(),
//!     email: "sam@example.com".to_string(),
//!     phone: String::new(),
//!     notes: String::new(),
//! }).await.expect("create client");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Core in-memory store and index helpers.
pub mod core;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite mirror implementation.
pub mod persist;
/// Domain records, drafts, and patches.
pub mod record;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
