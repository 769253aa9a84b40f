//! Staff record, draft, and patch types.

use serde::{Deserialize, Serialize};

use crate::types::{ServiceId, StaffId};

use super::{ValidationError, require_email, require_text};

/// A provider who performs services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    /// Stable staff identifier.
    pub id: StaffId,
    /// Display name.
    pub name: String,
    /// Contact email, unique across staff.
    pub email: String,
    /// Contact phone, may be empty.
    pub phone: String,
    /// Services this staff member performs. Membership only, no payload.
    pub services: Vec<ServiceId>,
    /// Whether the staff member currently takes bookings.
    pub active: bool,
    /// Creation time in epoch milliseconds, system-set.
    pub created_at_ms: u64,
    /// Last update time in epoch milliseconds, system-set.
    pub updated_at_ms: u64,
}

impl StaffRecord {
    /// Checks field invariants before the record is committed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_email("email", &self.email)
    }

    /// Returns true when this staff member performs `service`.
    pub fn performs(&self, service: ServiceId) -> bool {
        self.services.contains(&service)
    }
}

/// Insert payload used to create a new [`StaffRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffDraft {
    /// Display name.
    pub name: String,
    /// Contact email, must be unique across staff.
    pub email: String,
    /// Contact phone, may be empty.
    pub phone: String,
    /// Initial service memberships.
    pub services: Vec<ServiceId>,
    /// Whether the staff member takes bookings from the start.
    pub active: bool,
}

/// Sparse update where each `Some` field overwrites the stored value.
///
/// Service membership is not patchable here; use the store's
/// `add_staff_service` / `remove_staff_service` operations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaffPatch {
    /// Optional replacement for the name.
    pub name: Option<String>,
    /// Optional replacement for the email.
    pub email: Option<String>,
    /// Optional replacement for the phone.
    pub phone: Option<String>,
    /// Optional replacement for the active flag.
    pub active: Option<bool>,
}

impl StaffPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut StaffRecord) {
        if let Some(v) = &self.name {
            rec.name = v.clone();
        }
        if let Some(v) = &self.email {
            rec.email = v.clone();
        }
        if let Some(v) = &self.phone {
            rec.phone = v.clone();
        }
        if let Some(v) = self.active {
            rec.active = v;
        }
    }
}
