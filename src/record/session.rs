//! Group-session record, draft, patch, and derived enrollment accessors.

use serde::{Deserialize, Serialize};

use crate::types::{ClientId, ServiceId, SessionId, StaffId};

use super::{ValidationError, require_text};

/// A capacity-limited group event.
///
/// Capacity is advisory: the store never blocks enrollment past it. The
/// derived accessors recompute from the current enrollment on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Stable session identifier.
    pub id: SessionId,
    /// Display title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Service being run. Cannot be deleted while referenced.
    pub service_id: ServiceId,
    /// Staff member running the session. Cannot be deleted while referenced.
    pub staff_id: StaffId,
    /// Session start in epoch milliseconds.
    pub start_time_ms: u64,
    /// Session end in epoch milliseconds, always explicit.
    pub end_time_ms: u64,
    /// Advertised capacity, at least 1.
    pub capacity: u32,
    /// Enrolled clients. Membership only, may be empty, may exceed capacity.
    pub enrolled_clients: Vec<ClientId>,
    /// Whether the session is open.
    pub active: bool,
    /// Creation time in epoch milliseconds, system-set.
    pub created_at_ms: u64,
    /// Last update time in epoch milliseconds, system-set.
    pub updated_at_ms: u64,
}

impl SessionRecord {
    /// Checks field invariants before the record is committed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if self.capacity < 1 {
            return Err(ValidationError::new("capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Number of currently enrolled clients.
    pub fn enrollment_count(&self) -> usize {
        self.enrolled_clients.len()
    }

    /// True when enrollment has reached or exceeded capacity.
    pub fn is_full(&self) -> bool {
        self.enrollment_count() >= self.capacity as usize
    }

    /// Remaining capacity, clamped at zero when over-enrolled.
    pub fn available_spots(&self) -> u32 {
        let enrolled = u32::try_from(self.enrollment_count()).unwrap_or(u32::MAX);
        self.capacity.saturating_sub(enrolled)
    }

    /// Returns true when `client` is enrolled.
    pub fn is_enrolled(&self, client: ClientId) -> bool {
        self.enrolled_clients.contains(&client)
    }
}

/// Insert payload used to create a new [`SessionRecord`].
///
/// Unlike bookings, both start and end are required; no derivation happens.
/// Sessions start with an empty enrollment; use the store's `enroll`
/// operation to add clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    /// Display title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Service being run.
    pub service_id: ServiceId,
    /// Staff member running the session.
    pub staff_id: StaffId,
    /// Session start in epoch milliseconds.
    pub start_time_ms: u64,
    /// Session end in epoch milliseconds.
    pub end_time_ms: u64,
    /// Advertised capacity.
    pub capacity: u32,
    /// Whether the session is open from the start.
    pub active: bool,
}

/// Sparse update where each `Some` field overwrites the stored value.
///
/// Enrollment is not patchable here; use the store's `enroll` / `unenroll`
/// operations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    /// Optional replacement for the title.
    pub title: Option<String>,
    /// Optional replacement for the description.
    pub description: Option<String>,
    /// Optional replacement for the service.
    pub service_id: Option<ServiceId>,
    /// Optional replacement for the staff member.
    pub staff_id: Option<StaffId>,
    /// Optional replacement for the start time.
    pub start_time_ms: Option<u64>,
    /// Optional replacement for the end time.
    pub end_time_ms: Option<u64>,
    /// Optional replacement for the capacity.
    pub capacity: Option<u32>,
    /// Optional replacement for the active flag.
    pub active: Option<bool>,
}

impl SessionPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut SessionRecord) {
        if let Some(v) = &self.title {
            rec.title = v.clone();
        }
        if let Some(v) = &self.description {
            rec.description = v.clone();
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
        if let Some(v) = self.end_time_ms {
            rec.end_time_ms = v;
        }
        if let Some(v) = self.capacity {
            rec.capacity = v;
        }
        if let Some(v) = self.active {
            rec.active = v;
        }
    }
}
