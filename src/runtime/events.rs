//! Runtime event stream payloads.

use crate::types::{BookingId, ClientId, OpSeq, SessionId};

/// Record kind tag carried by store events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// Service catalog entry.
    Service,
    /// Staff member.
    Staff,
    /// Client.
    Client,
    /// Booking.
    Booking,
    /// Group session.
    Session,
}

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A record was created.
    Created {
        /// Kind of record.
        entity: Entity,
        /// New record id.
        id: u64,
    },
    /// A record was updated.
    Updated {
        /// Kind of record.
        entity: Entity,
        /// Updated record id.
        id: u64,
    },
    /// A record was deleted.
    Deleted {
        /// Kind of record.
        entity: Entity,
        /// Deleted record id.
        id: u64,
    },
    /// A client delete took its bookings with it.
    ClientCascade {
        /// Deleted client id.
        client: ClientId,
        /// Bookings removed by the cascade.
        bookings: Vec<BookingId>,
    },
    /// A session enrollment was added or removed.
    EnrollmentChanged {
        /// Affected session.
        session: SessionId,
        /// Affected client.
        client: ClientId,
        /// True after an enroll, false after an unenroll.
        enrolled: bool,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
