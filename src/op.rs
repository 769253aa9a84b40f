//! Mutation operation model mirrored by the persistence layer.

use serde::{Deserialize, Serialize};

use crate::{
    record::{
        booking::BookingRecord, client::ClientRecord, service::ServiceRecord,
        session::SessionRecord, staff::StaffRecord,
    },
    types::{BookingId, ClientId, OpSeq, ServiceId, SessionId, StaffId},
};

/// Single mutation applied to the authoritative store.
///
/// Ops carry full row images: applying them to an empty mirror in sequence
/// order reproduces the store's current relational state. Upserts of staff
/// and sessions rewrite their join rows as part of the same op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Insert or replace a service row.
    UpsertService {
        /// Full service row image.
        service: ServiceRecord,
    },
    /// Delete a service row.
    DeleteService {
        /// Service id to delete.
        id: ServiceId,
    },
    /// Insert or replace a staff row and its service membership rows.
    UpsertStaff {
        /// Full staff row image including memberships.
        staff: StaffRecord,
    },
    /// Delete a staff row; membership rows drop with it.
    DeleteStaff {
        /// Staff id to delete.
        id: StaffId,
    },
    /// Insert or replace a client row.
    UpsertClient {
        /// Full client row image.
        client: ClientRecord,
    },
    /// Delete a client row; the mirror's foreign keys cascade to the
    /// client's bookings and session enrollments.
    DeleteClient {
        /// Client id to delete.
        id: ClientId,
    },
    /// Insert or replace a booking row.
    UpsertBooking {
        /// Full booking row image.
        booking: BookingRecord,
    },
    /// Delete a booking row.
    DeleteBooking {
        /// Booking id to delete.
        id: BookingId,
    },
    /// Insert or replace a session row and its enrollment rows.
    UpsertSession {
        /// Full session row image including enrollment.
        session: SessionRecord,
    },
    /// Delete a session row; enrollment rows drop with it.
    DeleteSession {
        /// Session id to delete.
        id: SessionId,
    },
}

/// Sequence metadata plus operation payload, as handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic mutation sequence.
    pub seq: OpSeq,
    /// Mutation timestamp in epoch milliseconds.
    pub ts_ms: u64,
    /// Mutation body.
    pub op: Op,
}
