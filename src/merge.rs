// 🔀 Merge Engine - Fold a proposal into an existing canonical record
//
// 1. Classify each mergeable field: Same / OneEmpty / Conflict
// 2. Pre-fill a resolution (common value, non-empty side, or the proposal)
// 3. Let the reviewer override any field
// 4. Commit atomically: apply fields, union nested lists, retire the source id,
//    repoint every foreign key that named it
//
// Commit validates everything up front; once mutation starts nothing can fail,
// so a rejected merge leaves all three collections untouched.

use crate::audit::ReviewAction;
use crate::entities::{
    is_mergeable, unknown_field, Account, Contact, EntityKind, FieldPatch, Opportunity, Record,
};
use crate::error::{CrmError, CrmResult};
use crate::store::{RecordStore, Stored};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

// ============================================================================
// CONFLICT CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Trimmed values are equal (including both empty)
    Same,
    /// Exactly one side is empty after trimming
    OneEmpty,
    /// Both non-empty and different
    Conflict,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Same => "same",
            ConflictKind::OneEmpty => "one-empty",
            ConflictKind::Conflict => "conflict",
        }
    }
}

/// Classify an (existing, incoming) pair after trimming both sides
pub fn classify(existing: &str, incoming: &str) -> ConflictKind {
    let a = existing.trim();
    let b = incoming.trim();
    if a == b {
        ConflictKind::Same
    } else if a.is_empty() || b.is_empty() {
        ConflictKind::OneEmpty
    } else {
        ConflictKind::Conflict
    }
}

/// Pre-filled value for a field before the reviewer touches it.
///
/// On a real conflict the proposal wins, being the most recent signal.
pub fn default_resolution(existing: &str, incoming: &str) -> String {
    let a = existing.trim();
    let b = incoming.trim();
    let value = match classify(a, b) {
        ConflictKind::Same => a,
        ConflictKind::OneEmpty => {
            if a.is_empty() {
                b
            } else {
                a
            }
        }
        ConflictKind::Conflict => b,
    };
    value.to_string()
}

// ============================================================================
// MERGE PLAN (the merge view's form)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldResolution {
    pub key: &'static str,
    pub label: &'static str,
    /// Target's trimmed value
    pub existing: String,
    /// Proposal's trimmed value
    pub incoming: String,
    pub conflict: ConflictKind,
    /// Value that will be written on commit
    pub resolved: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    pub kind: EntityKind,
    pub source_id: String,
    pub target_id: String,
    pub target_name: String,
    pub fields: Vec<FieldResolution>,
    /// Nested entries the source will hand over to the target
    pub transferred_nested: usize,
}

impl MergePlan {
    /// Build the default plan for merging `source` into `target`
    pub fn build<T: Record>(source: &T, target: &T) -> Self {
        let fields = T::mergeable_fields()
            .iter()
            .map(|spec| {
                let existing = target.field(spec.key).unwrap_or_default().trim().to_string();
                let incoming = source.field(spec.key).unwrap_or_default().trim().to_string();
                FieldResolution {
                    key: spec.key,
                    label: spec.label,
                    conflict: classify(&existing, &incoming),
                    resolved: default_resolution(&existing, &incoming),
                    existing,
                    incoming,
                }
            })
            .collect();

        MergePlan {
            kind: T::KIND,
            source_id: source.id().to_string(),
            target_id: target.id().to_string(),
            target_name: target.display_name(),
            fields,
            transferred_nested: source.nested_len(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldResolution> {
        self.fields.iter().find(|f| f.key == key)
    }

    fn field_mut(&mut self, key: &str) -> CrmResult<&mut FieldResolution> {
        let kind = self.kind;
        self.fields
            .iter_mut()
            .find(|f| f.key == key)
            .ok_or_else(|| CrmError::invalid_field(kind, key))
    }

    /// Type a value into a field of the form
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> CrmResult<()> {
        self.field_mut(key)?.resolved = value.into();
        Ok(())
    }

    /// Select the target's original value verbatim
    pub fn take_target(&mut self, key: &str) -> CrmResult<()> {
        let field = self.field_mut(key)?;
        field.resolved = field.existing.clone();
        Ok(())
    }

    /// Select the proposal's original value verbatim
    pub fn take_source(&mut self, key: &str) -> CrmResult<()> {
        let field = self.field_mut(key)?;
        field.resolved = field.incoming.clone();
        Ok(())
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &FieldResolution> {
        self.fields
            .iter()
            .filter(|f| f.conflict == ConflictKind::Conflict)
    }

    /// The form as it stands, ready for `commit`
    pub fn resolved_fields(&self) -> FieldPatch {
        self.fields
            .iter()
            .map(|f| (f.key.to_string(), f.resolved.clone()))
            .collect()
    }
}

// ============================================================================
// CASCADE
// ============================================================================

/// Repoint one foreign key and its cached display name if it names the
/// retired id. Every cascade goes through here.
///
/// Keys already naming the survivor only get their cached name refreshed,
/// since the merge may have renamed it. Returns true for repointed keys.
pub fn repoint(
    foreign_key: &mut String,
    cached_name: &mut String,
    retired_id: &str,
    survivor_id: &str,
    survivor_name: &str,
) -> bool {
    if *foreign_key == survivor_id {
        if *cached_name != survivor_name {
            *cached_name = survivor_name.to_string();
        }
        return false;
    }
    if *foreign_key != retired_id {
        return false;
    }
    *foreign_key = survivor_id.to_string();
    *cached_name = survivor_name.to_string();
    true
}

/// Record kinds that can be merged, and how their retirement cascades
pub trait Mergeable: Stored {
    /// Rewrite every reference to `retired_id` in other collections.
    /// Returns the number of records rewritten.
    fn cascade(
        store: &mut RecordStore,
        retired_id: &str,
        survivor_id: &str,
        survivor_name: &str,
    ) -> usize;
}

impl Mergeable for Account {
    fn cascade(store: &mut RecordStore, retired_id: &str, survivor_id: &str, survivor_name: &str) -> usize {
        let mut rewritten = 0;
        for contact in store.contacts.iter_mut() {
            if repoint(
                &mut contact.account_id,
                &mut contact.account_name,
                retired_id,
                survivor_id,
                survivor_name,
            ) {
                rewritten += 1;
            }
        }
        for opportunity in store.opportunities.iter_mut() {
            if repoint(
                &mut opportunity.account_id,
                &mut opportunity.account_name,
                retired_id,
                survivor_id,
                survivor_name,
            ) {
                rewritten += 1;
            }
        }
        rewritten
    }
}

impl Mergeable for Contact {
    fn cascade(store: &mut RecordStore, retired_id: &str, survivor_id: &str, survivor_name: &str) -> usize {
        let mut rewritten = 0;
        for opportunity in store.opportunities.iter_mut() {
            if repoint(
                &mut opportunity.contact_id,
                &mut opportunity.contact_name,
                retired_id,
                survivor_id,
                survivor_name,
            ) {
                rewritten += 1;
            }
        }
        rewritten
    }
}

impl Mergeable for Opportunity {
    fn cascade(_: &mut RecordStore, _: &str, _: &str, _: &str) -> usize {
        0
    }
}

// ============================================================================
// PREPARE & COMMIT
// ============================================================================

/// Result of a committed merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub kind: EntityKind,
    pub retired_id: String,
    pub survivor_id: String,
    pub survivor_name: String,
    pub nested_transferred: usize,
    pub references_rewritten: usize,
}

fn check_preconditions<'a, T: Stored>(
    store: &'a RecordStore,
    source_id: &str,
    target_id: &str,
) -> CrmResult<(&'a T, &'a T)> {
    if source_id == target_id {
        return Err(CrmError::SameRecord {
            kind: T::KIND,
            id: source_id.to_string(),
        });
    }

    let source = store.get::<T>(source_id)?;
    let target = store.get::<T>(target_id)?;

    if !source.is_pending() {
        return Err(CrmError::InvalidTransition {
            kind: T::KIND,
            id: source_id.to_string(),
            status: source.status(),
        });
    }
    if !target.status().is_canonical() {
        return Err(CrmError::InvalidTransition {
            kind: T::KIND,
            id: target_id.to_string(),
            status: target.status(),
        });
    }

    Ok((source, target))
}

/// Open the merge view: check preconditions and pre-fill the form
pub fn prepare<T: Mergeable>(
    store: &RecordStore,
    source_id: &str,
    target_id: &str,
) -> CrmResult<MergePlan> {
    let (source, target) = check_preconditions::<T>(store, source_id, target_id)?;
    Ok(MergePlan::build(source, target))
}

/// Merge proposal `source_id` into canonical `target_id` using the reviewer's
/// `resolved` field values.
///
/// Keys missing from `resolved` keep the target's value; keys that are not
/// mergeable fields reject the whole merge.
pub fn commit<T: Mergeable>(
    store: &mut RecordStore,
    source_id: &str,
    target_id: &str,
    resolved: &FieldPatch,
) -> CrmResult<MergeOutcome> {
    let (source, target) = check_preconditions::<T>(store, source_id, target_id)?;

    if let Some(key) = resolved.keys().find(|k| !is_mergeable::<T>(k)) {
        return Err(unknown_field::<T>(key));
    }

    // Stage the survivor completely before touching the store
    let mut survivor = target.clone();
    for (key, value) in resolved {
        survivor.set_field(key, value)?;
    }
    survivor.refresh_initials();
    survivor.absorb_nested(source);

    let nested_transferred = source.nested_len();
    let survivor_name = survivor.display_name();

    // Infallible from here: both ids were just looked up
    T::collection_mut(store).replace(survivor)?;
    T::collection_mut(store).remove(source_id);
    let references_rewritten = T::cascade(store, source_id, target_id, &survivor_name);
    debug!(
        kind = %T::KIND,
        retired = source_id,
        survivor = target_id,
        references_rewritten,
        "cascade applied"
    );

    let outcome = MergeOutcome {
        kind: T::KIND,
        retired_id: source_id.to_string(),
        survivor_id: target_id.to_string(),
        survivor_name,
        nested_transferred,
        references_rewritten,
    };
    store.journal.record(
        ReviewAction::Merged,
        T::KIND,
        source_id,
        json!({ "outcome": &outcome, "resolved": resolved }),
    );
    info!(
        kind = %T::KIND,
        source = source_id,
        target = target_id,
        name = %outcome.survivor_name,
        "proposal merged"
    );

    Ok(outcome)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{patch, OpportunityStage, RecordStatus};
    use crate::fixtures::demo_store;
    use crate::store::IntegrityViolation;

    #[test]
    fn test_classify() {
        assert_eq!(classify("", ""), ConflictKind::Same);
        assert_eq!(classify(" acme.com ", "acme.com"), ConflictKind::Same);
        assert_eq!(classify("", "+90 212"), ConflictKind::OneEmpty);
        assert_eq!(classify("+1 555", "   "), ConflictKind::OneEmpty);
        assert_eq!(classify("Acme", "ACME"), ConflictKind::Conflict);
    }

    #[test]
    fn test_default_resolution() {
        assert_eq!(default_resolution(" x ", "x"), "x");
        assert_eq!(default_resolution("", " incoming "), "incoming");
        assert_eq!(default_resolution("existing", ""), "existing");
        assert_eq!(default_resolution("existing", "incoming"), "incoming");
    }

    #[test]
    fn test_prepare_builds_default_plan() {
        let store = demo_store().unwrap();
        let plan = prepare::<Account>(&store, "acc_tt", "acc_acme").unwrap();

        assert_eq!(plan.fields.len(), Account::mergeable_fields().len());
        let name = plan.field("name").unwrap();
        assert_eq!(name.conflict, ConflictKind::Conflict);
        assert_eq!(name.resolved, "Türk Traktör");

        let phone = plan.field("phone").unwrap();
        assert_eq!(phone.conflict, ConflictKind::OneEmpty);
        assert_eq!(phone.resolved, phone.existing);

        assert_eq!(plan.transferred_nested, 1);
        assert_eq!(plan.target_name, "Acme Corp");
    }

    #[test]
    fn test_plan_overrides() {
        let store = demo_store().unwrap();
        let mut plan = prepare::<Account>(&store, "acc_tt", "acc_acme").unwrap();

        plan.take_target("name").unwrap();
        assert_eq!(plan.field("name").unwrap().resolved, "Acme Corp");
        plan.take_source("name").unwrap();
        assert_eq!(plan.field("name").unwrap().resolved, "Türk Traktör");
        plan.set("employees", "5000").unwrap();
        assert_eq!(plan.resolved_fields()["employees"], "5000");

        assert!(plan.set("status", "Active").is_err());
        assert!(plan.take_target("id").is_err());
    }

    #[test]
    fn test_prepare_preconditions() {
        let store = demo_store().unwrap();

        let same = prepare::<Account>(&store, "acc_tt", "acc_tt").unwrap_err();
        assert!(matches!(same, CrmError::SameRecord { .. }));

        let canonical_source = prepare::<Account>(&store, "acc_acme", "acc_ts").unwrap_err();
        assert!(matches!(canonical_source, CrmError::InvalidTransition { .. }));

        let pending_target = prepare::<Account>(&store, "acc_tt", "acc_cat").unwrap_err();
        assert_eq!(
            pending_target,
            CrmError::InvalidTransition {
                kind: EntityKind::Account,
                id: "acc_cat".to_string(),
                status: RecordStatus::PendingApproval,
            }
        );

        let missing = prepare::<Account>(&store, "acc_tt", "acc_nope").unwrap_err();
        assert!(missing.is_not_found());
    }

    #[test]
    fn test_commit_account_cascades_to_contacts_and_opportunities() {
        let mut store = demo_store().unwrap();
        let target_before: Account = store.get::<Account>("acc_acme").unwrap().clone();
        let source_before: Account = store.get::<Account>("acc_tt").unwrap().clone();

        let mut plan = prepare::<Account>(&store, "acc_tt", "acc_acme").unwrap();
        plan.take_target("name").unwrap();
        let outcome = commit::<Account>(&mut store, "acc_tt", "acc_acme", &plan.resolved_fields()).unwrap();

        assert_eq!(outcome.survivor_name, "Acme Corp");
        assert_eq!(outcome.references_rewritten, 2);
        assert!(store.get::<Account>("acc_tt").unwrap_err().is_not_found());

        let survivor: &Account = store.get("acc_acme").unwrap();
        assert_eq!(survivor.website, "turktraktor.com.tr");
        assert_eq!(
            survivor.contacts.len(),
            target_before.contacts.len() + source_before.contacts.len()
        );
        assert_eq!(
            survivor.opportunities.len(),
            target_before.opportunities.len() + source_before.opportunities.len()
        );

        let ayse: &Contact = store.get("con_ad").unwrap();
        assert_eq!(ayse.account_id, "acc_acme");
        assert_eq!(ayse.account_name, "Acme Corp");
        let opp: &Opportunity = store.get("opp_1").unwrap();
        assert_eq!(opp.account_id, "acc_acme");
        assert_eq!(opp.account_name, "Acme Corp");
    }

    #[test]
    fn test_commit_contact_cascades_to_opportunities() {
        let mut store = demo_store().unwrap();
        let resolved = patch([("first_name", "Sarah"), ("last_name", "Johnson-Demir")]);
        let outcome = commit::<Contact>(&mut store, "con_ad", "con_sj", &resolved).unwrap();

        assert_eq!(outcome.survivor_name, "Sarah Johnson-Demir");
        assert_eq!(outcome.references_rewritten, 1);

        let sarah: &Contact = store.get("con_sj").unwrap();
        assert_eq!(sarah.initials, "SJ");
        let opp: &Opportunity = store.get("opp_1").unwrap();
        assert_eq!(opp.contact_id, "con_sj");
        assert_eq!(opp.contact_name, "Sarah Johnson-Demir");
        // Account reference untouched by a contact merge
        assert_eq!(opp.account_id, "acc_tt");
    }

    #[test]
    fn test_commit_opportunity_has_no_cascade() {
        let mut store = demo_store().unwrap();
        let mut plan = prepare::<Opportunity>(&store, "opp_2", "opp_6").unwrap();
        plan.set("stage", "Closed Won").unwrap();

        let outcome = commit::<Opportunity>(&mut store, "opp_2", "opp_6", &plan.resolved_fields()).unwrap();
        assert_eq!(outcome.references_rewritten, 0);
        assert_eq!(outcome.nested_transferred, 0);

        let merged: &Opportunity = store.get("opp_6").unwrap();
        assert_eq!(merged.stage, OpportunityStage::ClosedWon);
        assert_eq!(merged.name, "Caterpillar TR - Parts Portal");
        assert_eq!(merged.initials, "CT");
    }

    #[test]
    fn test_commit_rejects_non_mergeable_key_atomically() {
        let mut store = demo_store().unwrap();
        let before = store.snapshot();

        let resolved = patch([("name", "Merged"), ("total_revenue", "$1")]);
        let err = commit::<Account>(&mut store, "acc_tt", "acc_acme", &resolved).unwrap_err();
        assert_eq!(err, CrmError::invalid_field(EntityKind::Account, "total_revenue"));

        let after = store.snapshot();
        assert_eq!(before.accounts, after.accounts);
        assert_eq!(before.contacts, after.contacts);
        assert_eq!(before.opportunities, after.opportunities);
        assert!(store.journal.is_empty());
    }

    #[test]
    fn test_commit_rejects_invalid_stage_atomically() {
        let mut store = demo_store().unwrap();
        let err = commit::<Opportunity>(&mut store, "opp_1", "opp_4", &patch([("stage", "Won-ish")])).unwrap_err();
        assert!(matches!(err, CrmError::InvalidValue { .. }));
        assert!(store.get::<Opportunity>("opp_1").is_ok());
    }

    #[test]
    fn test_commit_leaves_no_reference_to_source() {
        let mut store = demo_store().unwrap();
        commit::<Account>(&mut store, "acc_cat", "acc_ts", &FieldPatch::new()).unwrap();

        assert!(store.contacts.list().iter().all(|c| c.account_id != "acc_cat"));
        assert!(store.opportunities.list().iter().all(|o| o.account_id != "acc_cat"));
        assert!(!store
            .integrity_violations()
            .iter()
            .any(|v| matches!(v, IntegrityViolation::DanglingReference { target_id, .. } if target_id == "acc_cat")));
    }

    #[test]
    fn test_merge_journal_entry() {
        let mut store = demo_store().unwrap();
        store.journal.set_actor("mehmet");
        commit::<Account>(&mut store, "acc_jcb", "acc_ne", &patch([("phone", "+52 55 0000")])).unwrap();

        let events = store.journal.events_for(EntityKind::Account, "acc_jcb");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ReviewAction::Merged);
        assert_eq!(events[0].actor, "mehmet");
        assert_eq!(events[0].data["outcome"]["survivor_id"], "acc_ne");
        assert_eq!(events[0].data["resolved"]["phone"], "+52 55 0000");
    }

    #[test]
    fn test_repoint() {
        let mut fk = "acc_tt".to_string();
        let mut name = "Türk Traktör".to_string();
        assert!(!repoint(&mut fk, &mut name, "acc_other", "acc_x", "X"));
        assert_eq!(fk, "acc_tt");
        assert!(repoint(&mut fk, &mut name, "acc_tt", "acc_x", "X"));
        assert_eq!((fk.as_str(), name.as_str()), ("acc_x", "X"));

        // Already pointing at the survivor: name refreshed, not counted
        assert!(!repoint(&mut fk, &mut name, "acc_other", "acc_x", "X Renamed"));
        assert_eq!((fk.as_str(), name.as_str()), ("acc_x", "X Renamed"));
    }

    #[test]
    fn test_commit_rename_refreshes_survivor_references() {
        let mut store = demo_store().unwrap();
        let outcome = commit::<Account>(
            &mut store,
            "acc_cat",
            "acc_acme",
            &patch([("name", "Acme Caterpillar")]),
        )
        .unwrap();
        assert_eq!(outcome.survivor_name, "Acme Caterpillar");
        // Only the proposal's references count as rewritten
        assert_eq!(outcome.references_rewritten, 2);

        for id in ["con_sj", "con_my"] {
            let contact: &Contact = store.get(id).unwrap();
            assert_eq!(contact.account_id, "acc_acme");
            assert_eq!(contact.account_name, "Acme Caterpillar", "{}", id);
        }
        for id in ["opp_4", "opp_5", "opp_2"] {
            let opp: &Opportunity = store.get(id).unwrap();
            assert_eq!(opp.account_name, "Acme Caterpillar", "{}", id);
        }
        // Other accounts' references untouched
        let mc: &Contact = store.get("con_mc").unwrap();
        assert_eq!(mc.account_name, "TechStart");
    }

    #[test]
    fn test_commit_contact_rename_refreshes_opportunity_contact_names() {
        let mut store = demo_store().unwrap();
        let before: Vec<String> = store
            .opportunities
            .list()
            .iter()
            .filter(|o| o.contact_id == "con_sj")
            .map(|o| o.id.clone())
            .collect();
        assert_eq!(before.len(), 2);

        commit::<Contact>(&mut store, "con_my", "con_sj", &patch([("last_name", "Johnson-Yılmaz")])).unwrap();

        for id in before {
            let opp: &Opportunity = store.get(&id).unwrap();
            assert_eq!(opp.contact_name, "Sarah Johnson-Yılmaz");
        }
    }
}
