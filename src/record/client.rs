//! Client record, draft, and patch types.

use serde::{Deserialize, Serialize};

use crate::types::ClientId;

use super::{ValidationError, require_email, require_text};

/// A customer who books appointments.
///
/// Client emails are validated for format but never for uniqueness;
/// duplicate client records are permitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Stable client identifier.
    pub id: ClientId,
    /// Display name.
    pub name: String,
    /// Contact email, not unique.
    pub email: String,
    /// Contact phone, may be empty.
    pub phone: String,
    /// Free-text intake notes.
    pub notes: String,
    /// Creation time in epoch milliseconds, system-set.
    pub created_at_ms: u64,
    /// Last update time in epoch milliseconds, system-set.
    pub updated_at_ms: u64,
}

impl ClientRecord {
    /// Checks field invariants before the record is committed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_email("email", &self.email)
    }
}

/// Insert payload used to create a new [`ClientRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDraft {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone, may be empty.
    pub phone: String,
    /// Free-text intake notes.
    pub notes: String,
}

/// Sparse update where each `Some` field overwrites the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientPatch {
    /// Optional replacement for the name.
    pub name: Option<String>,
    /// Optional replacement for the email.
    pub email: Option<String>,
    /// Optional replacement for the phone.
    pub phone: Option<String>,
    /// Optional replacement for the notes.
    pub notes: Option<String>,
}

impl ClientPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut ClientRecord) {
        if let Some(v) = &self.name {
            rec.name = v.clone();
        }
        if let Some(v) = &self.email {
            rec.email = v.clone();
        }
        if let Some(v) = &self.phone {
            rec.phone = v.clone();
        }
        if let Some(v) = &self.notes {
            rec.notes = v.clone();
        }
    }
}
