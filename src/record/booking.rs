//! Booking record, draft, patch, and end-time derivation.

use serde::{Deserialize, Serialize};

use crate::types::{BookingId, BookingStatus, ClientId, MINUTE_MS, ServiceId, StaffId};

/// Derives a booking end timestamp from its start and the service duration.
pub fn derived_end_ms(start_time_ms: u64, duration_minutes: u32) -> u64 {
    start_time_ms + u64::from(duration_minutes) * MINUTE_MS
}

/// A scheduled appointment linking one client, one service, and one staff
/// member.
///
/// `end_time_ms` is always populated after a successful save: either the
/// caller supplied it or the store derived it from the linked service's
/// duration. Overlapping bookings for the same staff member are permitted;
/// no conflict detection happens at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Stable booking identifier.
    pub id: BookingId,
    /// Owning client. Deleting the client deletes this booking.
    pub client_id: ClientId,
    /// Booked service. The service cannot be deleted while referenced.
    pub service_id: ServiceId,
    /// Assigned staff member. Cannot be deleted while referenced.
    pub staff_id: StaffId,
    /// Appointment start in epoch milliseconds.
    pub start_time_ms: u64,
    /// Appointment end in epoch milliseconds, always populated.
    pub end_time_ms: u64,
    /// Lifecycle tag, free to change at any time.
    pub status: BookingStatus,
    /// Free-text notes.
    pub notes: String,
    /// Creation time in epoch milliseconds, system-set.
    pub created_at_ms: u64,
    /// Last update time in epoch milliseconds, system-set.
    pub updated_at_ms: u64,
}

/// Insert payload used to create a new [`BookingRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    /// Owning client.
    pub client_id: ClientId,
    /// Booked service.
    pub service_id: ServiceId,
    /// Assigned staff member.
    pub staff_id: StaffId,
    /// Appointment start in epoch milliseconds.
    pub start_time_ms: u64,
    /// Explicit end time; `None` derives it from the service duration.
    pub end_time_ms: Option<u64>,
    /// Initial status.
    pub status: BookingStatus,
    /// Free-text notes.
    pub notes: String,
}

/// Sparse update where each `Some` field overwrites the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookingPatch {
    /// Optional replacement for the owning client.
    pub client_id: Option<ClientId>,
    /// Optional replacement for the service.
    pub service_id: Option<ServiceId>,
    /// Optional replacement for the staff member.
    pub staff_id: Option<StaffId>,
    /// Optional replacement for the start time.
    pub start_time_ms: Option<u64>,
    /// `Some(Some(t))` sets an explicit end time; `Some(None)` clears it,
    /// which makes the store re-derive it from the current start and
    /// service duration on save.
    pub end_time_ms: Option<Option<u64>>,
    /// Optional replacement for the status.
    pub status: Option<BookingStatus>,
    /// Optional replacement for the notes.
    pub notes: Option<String>,
}

impl BookingPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies every field except a cleared end time, which the store
    /// resolves against the linked service.
    pub fn apply_to(&self, rec: &mut BookingRecord) {
        if let Some(v) = self.client_id {
            rec.client_id = v;
        }
        if let Some(v) = self.service_id {
            rec.service_id = v;
        }
        if let Some(v) = self.staff_id {
            rec.staff_id = v;
        }
        if let Some(v) = self.start_time_ms {
            rec.start_time_ms = v;
        }
        if let Some(Some(v)) = self.end_time_ms {
            rec.end_time_ms = v;
        }
        if let Some(v) = self.status {
            rec.status = v;
        }
        if let Some(v) = &self.notes {
            rec.notes = v.clone();
        }
    }
}

/// Denormalized booking row for listing surfaces, joining the client,
/// service, and staff fields admin dashboards display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDetail {
    /// Booking identifier.
    pub id: BookingId,
    /// Client display name.
    pub client_name: String,
    /// Client contact email.
    pub client_email: String,
    /// Client contact phone.
    pub client_phone: String,
    /// Service display name.
    pub service_name: String,
    /// Staff display name.
    pub staff_name: String,
    /// Appointment start in epoch milliseconds.
    pub start_time_ms: u64,
    /// Appointment end in epoch milliseconds.
    pub end_time_ms: u64,
    /// Current status.
    pub status: BookingStatus,
    /// Service price in minor currency units.
    pub price_cents: i64,
    /// Booking notes.
    pub notes: String,
    /// Booking creation time in epoch milliseconds.
    pub created_at_ms: u64,
}
