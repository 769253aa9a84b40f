//! Shared primitive IDs and the booking status enum.

use serde::{Deserialize, Serialize};

/// Monotonic service identifier.
pub type ServiceId = u64;
/// Monotonic staff identifier.
pub type StaffId = u64;
/// Monotonic client identifier.
pub type ClientId = u64;
/// Monotonic booking identifier.
pub type BookingId = u64;
/// Monotonic group-session identifier.
pub type SessionId = u64;
/// Monotonic mutation sequence number.
pub type OpSeq = u64;

/// Milliseconds per minute, used for end-time derivation.
pub const MINUTE_MS: u64 = 60_000;

/// Lifecycle tag on a booking.
///
/// The store never validates transitions: any status may be set at any
/// time. The snake_case serde form doubles as the persisted string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Awaiting confirmation.
    #[default]
    Pending,
    /// Confirmed by the business.
    Confirmed,
    /// The appointment took place.
    Completed,
    /// Cancelled before the start time.
    Cancelled,
    /// The client did not show up.
    NoShow,
}

impl BookingStatus {
    /// All statuses, in declaration order.
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    /// Stable string form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Parses the stable string form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}
