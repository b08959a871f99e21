// Entity Models - Accounts, Contacts, Opportunities
//
// Each entity has:
// - Stable identifier that is never reassigned
// - Lifecycle status (canonical or proposal)
// - Denormalized display fields kept in sync by hand (names, initials)
// - Per-kind field tables driving edits, merge and search

pub mod account;
pub mod contact;
pub mod opportunity;

pub use account::{Account, AccountContact, AccountOpportunity};
pub use contact::{Contact, ContactOpportunity};
pub use opportunity::{Opportunity, OpportunityStage};

use crate::error::{CrmError, CrmResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    Contact,
    Opportunity,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Account,
        EntityKind::Contact,
        EntityKind::Opportunity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::Contact => "Contact",
            EntityKind::Opportunity => "Opportunity",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Account => "Accounts",
            EntityKind::Contact => "Contacts",
            EntityKind::Opportunity => "Opportunities",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LIFECYCLE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Inactive,
    /// Proposed by the intake agent, awaiting review
    PendingApproval,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "Active",
            RecordStatus::Inactive => "Inactive",
            RecordStatus::PendingApproval => "Pending Approval",
        }
    }

    pub fn is_pending(&self) -> bool {
        *self == RecordStatus::PendingApproval
    }

    /// Active and Inactive records are the system of record
    pub fn is_canonical(&self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FIELD TABLES & PATCHES
// ============================================================================

/// A field eligible for conflict resolution, with its display label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
}

/// Partial field update keyed by field name (e.g. `"tax_number"`)
pub type FieldPatch = BTreeMap<String, String>;

/// Build a patch from `(field, value)` pairs
pub fn patch<I, K, V>(pairs: I) -> FieldPatch
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Initials from a display name: first letter of each whitespace-separated
/// token, uppercased, at most 2 characters.
///
/// Example: "Ayşe Demir" → "AD", "Acme" → "A"
pub fn derive_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

// ============================================================================
// RECORD TRAIT
// ============================================================================

/// Behaviour shared by every entity kind the reconciliation core handles
pub trait Record: Clone + fmt::Debug {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn status(&self) -> RecordStatus;
    fn set_status(&mut self, status: RecordStatus);

    /// Name shown in lists and copied into referencing records
    fn display_name(&self) -> String;

    fn initials(&self) -> &str;
    fn set_initials(&mut self, initials: String);

    /// Recompute the cached initials from the current display name
    fn refresh_initials(&mut self) {
        let initials = derive_initials(&self.display_name());
        self.set_initials(initials);
    }

    /// Values matched by the search box, in display order
    fn search_fields(&self) -> Vec<String>;

    /// Fields shown side by side in the merge view
    fn mergeable_fields() -> &'static [FieldSpec];

    /// Read a scalar field by key (`None` for unknown keys)
    fn field(&self, key: &str) -> Option<String>;

    /// Write an editable scalar field by key
    fn set_field(&mut self, key: &str, value: &str) -> CrmResult<()>;

    /// Number of entries across nested summary lists
    fn nested_len(&self) -> usize {
        0
    }

    /// Append the source's nested summary lists (no de-duplication)
    fn absorb_nested(&mut self, _source: &Self) {}

    /// Ids of other records this one points at
    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        Vec::new()
    }

    /// Mergeable fields a reviewer may edit on approval. Cached names of
    /// referenced records follow the reference and are left out.
    fn approval_fields() -> Vec<&'static FieldSpec> {
        Self::mergeable_fields()
            .iter()
            .filter(|spec| !CACHED_NAMES.contains(&spec.key))
            .collect()
    }

    fn is_pending(&self) -> bool {
        self.status().is_pending()
    }
}

/// Denormalized copies of a referenced record's display name
pub const CACHED_NAMES: &[&str] = &["account_name", "contact_name"];

/// A reference from one record to another by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey<'a> {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: &'a str,
}

/// Apply every entry of `patch` or none of them
pub fn apply_patch<T: Record>(record: &mut T, patch: &FieldPatch) -> CrmResult<()> {
    let mut staged = record.clone();
    for (key, value) in patch {
        staged.set_field(key, value)?;
    }
    *record = staged;
    Ok(())
}

pub(crate) fn is_mergeable<T: Record>(key: &str) -> bool {
    T::mergeable_fields().iter().any(|f| f.key == key)
}

pub(crate) fn unknown_field<T: Record>(key: &str) -> CrmError {
    CrmError::invalid_field(T::KIND, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_initials() {
        assert_eq!(derive_initials("Ayşe Demir"), "AD");
        assert_eq!(derive_initials("Acme"), "A");
        assert_eq!(derive_initials("Türk Traktör"), "TT");
        assert_eq!(derive_initials("JCB Latin America"), "JL");
        assert_eq!(derive_initials("  spaced   out  "), "SO");
        assert_eq!(derive_initials(""), "");
    }

    #[test]
    fn test_status_classification() {
        assert!(RecordStatus::PendingApproval.is_pending());
        assert!(RecordStatus::Active.is_canonical());
        assert!(RecordStatus::Inactive.is_canonical());
        assert_eq!(RecordStatus::PendingApproval.to_string(), "Pending Approval");
    }

    #[test]
    fn test_patch_builder() {
        let p = patch([("name", "Acme"), ("phone", "")]);
        assert_eq!(p.len(), 2);
        assert_eq!(p["name"], "Acme");
    }
}
