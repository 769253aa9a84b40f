//! Service catalog record, draft, and patch types.

use serde::{Deserialize, Serialize};

use crate::types::ServiceId;

use super::{ValidationError, require_text};

/// Catalog entry for a bookable service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Stable service identifier.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// Free-text description, may be empty.
    pub description: String,
    /// Appointment length in minutes, at least 1.
    pub duration_minutes: u32,
    /// Price in minor currency units, never negative.
    pub price_cents: i64,
    /// Whether the service is currently offered.
    pub active: bool,
    /// Creation time in epoch milliseconds, system-set.
    pub created_at_ms: u64,
    /// Last update time in epoch milliseconds, system-set.
    pub updated_at_ms: u64,
}

impl ServiceRecord {
    /// Checks field invariants before the record is committed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.duration_minutes < 1 {
            return Err(ValidationError::new("duration_minutes", "must be at least 1"));
        }
        if self.price_cents < 0 {
            return Err(ValidationError::new("price_cents", "must not be negative"));
        }
        Ok(())
    }
}

/// Insert payload used to create a new [`ServiceRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDraft {
    /// Display name.
    pub name: String,
    /// Free-text description, may be empty.
    pub description: String,
    /// Appointment length in minutes.
    pub duration_minutes: u32,
    /// Price in minor currency units.
    pub price_cents: i64,
    /// Whether the service is offered from the start.
    pub active: bool,
}

/// Sparse update where each `Some` field overwrites the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServicePatch {
    /// Optional replacement for the name.
    pub name: Option<String>,
    /// Optional replacement for the description.
    pub description: Option<String>,
    /// Optional replacement for the duration.
    pub duration_minutes: Option<u32>,
    /// Optional replacement for the price.
    pub price_cents: Option<i64>,
    /// Optional replacement for the active flag.
    pub active: Option<bool>,
}

impl ServicePatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut ServiceRecord) {
        if let Some(v) = &self.name {
            rec.name = v.clone();
        }
        if let Some(v) = &self.description {
            rec.description = v.clone();
        }
        if let Some(v) = self.duration_minutes {
            rec.duration_minutes = v;
        }
        if let Some(v) = self.price_cents {
            rec.price_cents = v;
        }
        if let Some(v) = self.active {
            rec.active = v;
        }
    }
}
