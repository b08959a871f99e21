// 🗄️ Record Store - In-memory collections of accounts, contacts, opportunities
//
// Insertion order is preserved for list display. No entity-specific business
// rules live here; approval and merge build on top of these primitives.

use crate::audit::Journal;
use crate::entities::{
    apply_patch, Account, Contact, EntityKind, FieldPatch, Opportunity, Record, RecordStatus,
};
use crate::error::{CrmError, CrmResult};
use crate::inbox::{EmailThread, Inbox};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// COLLECTION
// ============================================================================

/// Ordered records of one kind, unique by id
#[derive(Debug, Clone)]
pub struct Collection<T> {
    records: Vec<T>,
    /// Ids removed by reject or merge; never handed out again
    retired: HashSet<String>,
}

impl<T: Record> Collection<T> {
    pub fn new() -> Self {
        Collection {
            records: Vec::new(),
            retired: HashSet::new(),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn get(&self, id: &str) -> CrmResult<&T> {
        self.find(id).ok_or_else(|| CrmError::not_found(T::KIND, id))
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> CrmResult<&mut T> {
        self.records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| CrmError::not_found(T::KIND, id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    /// All records in insertion order
    pub fn list(&self) -> &[T] {
        &self.records
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a new record; its id must be neither live nor retired
    pub fn insert(&mut self, record: T) -> CrmResult<()> {
        let id = record.id();
        if self.contains(id) || self.is_retired(id) {
            return Err(CrmError::DuplicateId {
                kind: T::KIND,
                id: id.to_string(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Apply a partial field patch to the record at `id` (all or nothing)
    pub fn upsert(&mut self, id: &str, patch: &FieldPatch) -> CrmResult<&T> {
        let record = self.get_mut(id)?;
        apply_patch(record, patch)?;
        Ok(&*record)
    }

    /// Swap in a fully prepared replacement for an existing record
    pub(crate) fn replace(&mut self, record: T) -> CrmResult<()> {
        let slot = self.get_mut(record.id())?;
        *slot = record;
        Ok(())
    }

    /// Delete the record at `id`; removing an absent id is a no-op
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self.position(id)?;
        self.retired.insert(id.to_string());
        Some(self.records.remove(index))
    }
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SEED DATA
// ============================================================================

/// Plain collections used to build a store (fixtures, snapshots)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<EmailThread>,
}

// ============================================================================
// INTEGRITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Foreign key does not resolve to any live record
    DanglingReference {
        from: EntityKind,
        from_id: String,
        field: &'static str,
        target_id: String,
    },
    /// Canonical record points at a record still awaiting review
    ReferencesProposal {
        from: EntityKind,
        from_id: String,
        field: &'static str,
        target_id: String,
    },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::DanglingReference { from, from_id, field, target_id } => {
                write!(f, "{} {}.{} → {} does not exist", from, from_id, field, target_id)
            }
            IntegrityViolation::ReferencesProposal { from, from_id, field, target_id } => {
                write!(f, "{} {}.{} → {} is still pending approval", from, from_id, field, target_id)
            }
        }
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// The three collections, the read-only inbox and the review journal.
///
/// Passed explicitly (`&mut RecordStore`) to every operation that needs it.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    pub accounts: Collection<Account>,
    pub contacts: Collection<Contact>,
    pub opportunities: Collection<Opportunity>,
    pub inbox: Inbox,
    pub journal: Journal,
}

/// A live record holding a foreign key to some id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Referrer {
    pub kind: EntityKind,
    pub id: String,
    pub field: &'static str,
    pub status: RecordStatus,
}

/// Typed access from a record type to its collection in the store
pub trait Stored: Record {
    fn collection(store: &RecordStore) -> &Collection<Self>;
    fn collection_mut(store: &mut RecordStore) -> &mut Collection<Self>;
}

impl Stored for Account {
    fn collection(store: &RecordStore) -> &Collection<Self> {
        &store.accounts
    }
    fn collection_mut(store: &mut RecordStore) -> &mut Collection<Self> {
        &mut store.accounts
    }
}

impl Stored for Contact {
    fn collection(store: &RecordStore) -> &Collection<Self> {
        &store.contacts
    }
    fn collection_mut(store: &mut RecordStore) -> &mut Collection<Self> {
        &mut store.contacts
    }
}

impl Stored for Opportunity {
    fn collection(store: &RecordStore) -> &Collection<Self> {
        &store.opportunities
    }
    fn collection_mut(store: &mut RecordStore) -> &mut Collection<Self> {
        &mut store.opportunities
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed collections, rejecting duplicate ids
    pub fn from_seed(seed: SeedData) -> CrmResult<Self> {
        let mut store = RecordStore::new();
        for account in seed.accounts {
            store.accounts.insert(account)?;
        }
        for contact in seed.contacts {
            store.contacts.insert(contact)?;
        }
        for opportunity in seed.opportunities {
            store.opportunities.insert(opportunity)?;
        }
        store.inbox = Inbox::new(seed.emails);
        Ok(store)
    }

    /// Copy the live records and the inbox out (journal and retired ids are
    /// not included)
    pub fn snapshot(&self) -> SeedData {
        SeedData {
            accounts: self.accounts.list().to_vec(),
            contacts: self.contacts.list().to_vec(),
            opportunities: self.opportunities.list().to_vec(),
            emails: self.inbox.threads().to_vec(),
        }
    }

    pub fn get<T: Stored>(&self, id: &str) -> CrmResult<&T> {
        T::collection(self).get(id)
    }

    pub fn list<T: Stored>(&self) -> &[T] {
        T::collection(self).list()
    }

    pub fn insert<T: Stored>(&mut self, record: T) -> CrmResult<()> {
        T::collection_mut(self).insert(record)
    }

    pub fn upsert<T: Stored>(&mut self, id: &str, patch: &FieldPatch) -> CrmResult<&T> {
        T::collection_mut(self).upsert(id, patch)
    }

    pub fn remove<T: Stored>(&mut self, id: &str) -> Option<T> {
        T::collection_mut(self).remove(id)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Account => self.accounts.len(),
            EntityKind::Contact => self.contacts.len(),
            EntityKind::Opportunity => self.opportunities.len(),
        }
    }

    /// Number of records of `kind` awaiting review
    pub fn pending_count(&self, kind: EntityKind) -> usize {
        fn pending<T: Record>(records: &[T]) -> usize {
            records.iter().filter(|r| r.is_pending()).count()
        }
        match kind {
            EntityKind::Account => pending(self.accounts.list()),
            EntityKind::Contact => pending(self.contacts.list()),
            EntityKind::Opportunity => pending(self.opportunities.list()),
        }
    }

    /// Status of a live record of any kind
    pub fn status_of(&self, kind: EntityKind, id: &str) -> Option<RecordStatus> {
        match kind {
            EntityKind::Account => self.accounts.find(id).map(|r| r.status()),
            EntityKind::Contact => self.contacts.find(id).map(|r| r.status()),
            EntityKind::Opportunity => self.opportunities.find(id).map(|r| r.status()),
        }
    }

    /// Live records whose foreign keys name `kind` `id`, in list order
    pub fn referrers(&self, kind: EntityKind, id: &str) -> Vec<Referrer> {
        let mut found = Vec::new();
        collect_referrers(&mut found, self.contacts.list(), kind, id);
        collect_referrers(&mut found, self.opportunities.list(), kind, id);
        found
    }

    /// Remove a record when only its kind is known at runtime, returning
    /// its display name
    pub(crate) fn remove_kind(&mut self, kind: EntityKind, id: &str) -> Option<String> {
        match kind {
            EntityKind::Account => self.accounts.remove(id).map(|r| r.display_name()),
            EntityKind::Contact => self.contacts.remove(id).map(|r| r.display_name()),
            EntityKind::Opportunity => self.opportunities.remove(id).map(|r| r.display_name()),
        }
    }

    /// Every foreign key that is dangling or points from a canonical record
    /// into a proposal
    pub fn integrity_violations(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();
        self.check_references(&mut violations, self.contacts.list());
        self.check_references(&mut violations, self.opportunities.list());
        violations
    }

    fn check_references<F: Record>(&self, violations: &mut Vec<IntegrityViolation>, records: &[F]) {
        for from in records {
            for fk in from.foreign_keys() {
                match self.status_of(fk.kind, fk.id) {
                    None => violations.push(IntegrityViolation::DanglingReference {
                        from: F::KIND,
                        from_id: from.id().to_string(),
                        field: fk.field,
                        target_id: fk.id.to_string(),
                    }),
                    Some(target) if target.is_pending() && !from.is_pending() => {
                        violations.push(IntegrityViolation::ReferencesProposal {
                            from: F::KIND,
                            from_id: from.id().to_string(),
                            field: fk.field,
                            target_id: fk.id.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
    }
}

fn collect_referrers<F: Record>(found: &mut Vec<Referrer>, records: &[F], kind: EntityKind, id: &str) {
    for record in records {
        for fk in record.foreign_keys() {
            if fk.kind == kind && fk.id == id {
                found.push(Referrer {
                    kind: F::KIND,
                    id: record.id().to_string(),
                    field: fk.field,
                    status: record.status(),
                });
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
