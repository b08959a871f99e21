// 🔎 Search/Filter - Case-insensitive substring match over per-kind fields
//
// Pure reads: results borrow from the store and are recomputed on every call,
// so they always reflect the latest mutation.

use crate::entities::{EntityKind, Record};
use crate::store::{RecordStore, Stored};

/// Does `record` match `query`? An empty or blank query matches everything.
pub fn matches<T: Record>(record: &T, query: &str) -> bool {
    text_matches(&record.search_fields(), query)
}

/// Case-insensitive substring match over any of `values`
pub fn text_matches<S: AsRef<str>>(values: &[S], query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    values
        .iter()
        .any(|value| value.as_ref().to_lowercase().contains(&needle))
}

/// Records matching `query`, in their original order
pub fn filter<'a, T: Record>(records: &'a [T], query: &str) -> Vec<&'a T> {
    records.iter().filter(|r| matches(*r, query)).collect()
}

/// Filter one collection of the store
pub fn search<'a, T: Stored>(store: &'a RecordStore, query: &str) -> Vec<&'a T> {
    filter(store.list::<T>(), query)
}

/// Records awaiting review, in list order
pub fn pending<T: Stored>(store: &RecordStore) -> Vec<&T> {
    store.list::<T>().iter().filter(|r| r.is_pending()).collect()
}

/// Canonical records that `source_id` could be merged into.
///
/// Excludes the source itself and every other proposal.
pub fn merge_candidates<'a, T: Stored>(
    store: &'a RecordStore,
    source_id: &str,
    query: &str,
) -> Vec<&'a T> {
    store
        .list::<T>()
        .iter()
        .filter(|r| r.id() != source_id && !r.is_pending())
        .filter(|r| matches(*r, query))
        .collect()
}

// ============================================================================
// SEARCH STATE
// ============================================================================

/// Live query strings owned by the list views, one per entity kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    accounts: String,
    contacts: String,
    opportunities: String,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Account => &self.accounts,
            EntityKind::Contact => &self.contacts,
            EntityKind::Opportunity => &self.opportunities,
        }
    }

    pub fn query_mut(&mut self, kind: EntityKind) -> &mut String {
        match kind {
            EntityKind::Account => &mut self.accounts,
            EntityKind::Contact => &mut self.contacts,
            EntityKind::Opportunity => &mut self.opportunities,
        }
    }

    pub fn set_query(&mut self, kind: EntityKind, query: impl Into<String>) {
        *self.query_mut(kind) = query.into();
    }

    pub fn clear(&mut self, kind: EntityKind) {
        self.query_mut(kind).clear();
    }

    /// Filter the store with the current query of `T`'s view
    pub fn apply<'a, T: Stored>(&self, store: &'a RecordStore) -> Vec<&'a T> {
        search(store, self.query(T::KIND))
    }
}
