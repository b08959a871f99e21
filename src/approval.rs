// ✅ Approval State Machine - Lifecycle of agent-proposed records
//
//   PendingApproval ──approve──▶ Active   (edits applied, same id)
//   PendingApproval ──reject───▶ removed  (id retired, no trace)
//
// There is no way back to PendingApproval and no automatic expiry.
// Proposals arrive in groups (account, its contact, their opportunity):
// parents are approved before children, and rejecting a parent takes its
// pending children with it.

use crate::audit::ReviewAction;
use crate::entities::{apply_patch, EntityKind, FieldPatch, Record, RecordStatus};
use crate::error::{CrmError, CrmResult};
use crate::store::{RecordStore, Referrer, Stored};
use serde_json::json;
use tracing::{debug, info};

fn ensure_pending<T: Record>(record: &T) -> CrmResult<()> {
    if record.is_pending() {
        Ok(())
    } else {
        Err(CrmError::InvalidTransition {
            kind: T::KIND,
            id: record.id().to_string(),
            status: record.status(),
        })
    }
}

/// An approved record may not point at a record still awaiting review
fn ensure_references_settled<T: Record>(store: &RecordStore, record: &T) -> CrmResult<()> {
    for fk in record.foreign_keys() {
        if matches!(store.status_of(fk.kind, fk.id), Some(status) if status.is_pending()) {
            return Err(CrmError::PendingReference {
                kind: T::KIND,
                id: record.id().to_string(),
                target_kind: fk.kind,
                target_id: fk.id.to_string(),
            });
        }
    }
    Ok(())
}

/// Approve a proposal with the reviewer's edits.
///
/// The edits are applied, the status flips to `Active` and the initials are
/// recomputed from the (possibly edited) name. The id does not change, so no
/// cascade is needed. Nothing is modified when any edit is invalid or when
/// the record still points at another proposal.
pub fn approve<'a, T: Stored>(
    store: &'a mut RecordStore,
    id: &str,
    edits: &FieldPatch,
) -> CrmResult<&'a T> {
    let current = store.get::<T>(id)?;
    ensure_pending(current)?;

    let mut approved = current.clone();
    apply_patch(&mut approved, edits)?;
    ensure_references_settled(store, &approved)?;
    approved.set_status(RecordStatus::Active);
    approved.refresh_initials();

    let name = approved.display_name();
    T::collection_mut(store).replace(approved)?;
    store.journal.record(
        ReviewAction::Approved,
        T::KIND,
        id,
        json!({ "name": name, "edits": edits }),
    );
    info!(kind = %T::KIND, id, name = %name, "proposal approved");

    store.get::<T>(id)
}

/// A rejected proposal and the pending records removed along with it
#[derive(Debug, Clone)]
pub struct Rejection<T> {
    pub record: T,
    pub dependents: Vec<Referrer>,
}

/// Every pending record that reaches `kind` `id` through foreign keys.
///
/// Fails if any record on the way is canonical.
fn pending_dependents(store: &RecordStore, kind: EntityKind, id: &str) -> CrmResult<Vec<Referrer>> {
    let mut found: Vec<Referrer> = Vec::new();
    let mut queue = vec![(kind, id.to_string())];

    while let Some((kind, id)) = queue.pop() {
        for referrer in store.referrers(kind, &id) {
            if referrer.status.is_canonical() {
                return Err(CrmError::StillReferenced {
                    kind,
                    id,
                    by_kind: referrer.kind,
                    by_id: referrer.id,
                });
            }
            if found.iter().any(|r| r.kind == referrer.kind && r.id == referrer.id) {
                continue;
            }
            queue.push((referrer.kind, referrer.id.clone()));
            found.push(referrer);
        }
    }

    Ok(found)
}

/// Reject a proposal: the record is deleted outright and its id retired.
///
/// Pending records that reference it are rejected in the same step, so no
/// collection is left pointing at a removed id. Refused without changes if
/// a canonical record references it.
pub fn reject<T: Stored>(store: &mut RecordStore, id: &str) -> CrmResult<Rejection<T>> {
    ensure_pending(store.get::<T>(id)?)?;
    let dependents = pending_dependents(store, T::KIND, id)?;

    let record = T::collection_mut(store)
        .remove(id)
        .ok_or_else(|| CrmError::not_found(T::KIND, id))?;
    let linked: Vec<_> = dependents
        .iter()
        .map(|d| json!({ "kind": d.kind, "id": d.id }))
        .collect();
    store.journal.record(
        ReviewAction::Rejected,
        T::KIND,
        id,
        json!({ "name": record.display_name(), "dependents": linked }),
    );

    for dependent in &dependents {
        let Some(name) = store.remove_kind(dependent.kind, &dependent.id) else {
            continue;
        };
        store.journal.record(
            ReviewAction::Rejected,
            dependent.kind,
            &dependent.id,
            json!({ "name": name, "cascade_from": { "kind": T::KIND, "id": id } }),
        );
        debug!(kind = %dependent.kind, id = %dependent.id, "dependent proposal rejected");
    }
    info!(kind = %T::KIND, id, dependents = dependents.len(), "proposal rejected");

    Ok(Rejection { record, dependents })
}
