// End-to-end review flows over the public API, plus property checks for the
// merge engine.

use crm_reconcile::{
    approve, classify, commit, default_resolution, demo_store, patch, prepare, reject, search,
    Account, AccountContact, AccountOpportunity, AnalysisStatus, ConflictKind, Contact, CrmError,
    EntityKind, FieldPatch, Opportunity, OpportunityStage, Record, RecordStatus, RecordStore,
};
use proptest::prelude::*;

fn account(id: &str, name: &str, status: RecordStatus) -> Account {
    let mut account = Account::new(id, name, status);
    account.refresh_initials();
    account
}

fn snapshot_json(store: &RecordStore) -> serde_json::Value {
    serde_json::to_value(store.snapshot()).unwrap()
}

/// One proposal (acc_tt) with a contact and an opportunity, and one
/// canonical target (acc_x) with a phone number the proposal lacks.
fn review_store() -> RecordStore {
    let mut store = RecordStore::new();

    let mut tt = account("acc_tt", "Türk Traktör", RecordStatus::PendingApproval);
    tt.website = "turktraktor.com.tr".to_string();
    tt.contacts.push(AccountContact {
        name: "Ayşe Demir".to_string(),
        email: "ayse.demir@turktraktor.com.tr".to_string(),
        phone: String::new(),
    });
    store.insert(tt).unwrap();

    let mut x = account("acc_x", "Türk Traktör A.Ş.", RecordStatus::Active);
    x.phone = "+1 555-0000".to_string();
    x.opportunities.push(AccountOpportunity {
        name: "Spare Parts".to_string(),
        amount: "$20,000".to_string(),
        stage: "Prospecting".to_string(),
        close_date: "Jun 1, 2024".to_string(),
    });
    store.insert(x).unwrap();

    store
        .insert(Contact::new(
            "con_ad",
            "Ayşe",
            "Demir",
            "acc_tt",
            "Türk Traktör",
            RecordStatus::PendingApproval,
        ))
        .unwrap();
    store
        .insert(Opportunity::new(
            "opp_1",
            "Fleet Management System",
            OpportunityStage::Qualification,
            "acc_tt",
            "con_ad",
            RecordStatus::PendingApproval,
        ))
        .unwrap();

    store
}

#[test]
fn merge_proposal_into_canonical_account() {
    let mut store = review_store();

    let mut plan = prepare::<Account>(&store, "acc_tt", "acc_x").unwrap();
    assert_eq!(plan.field("phone").unwrap().conflict, ConflictKind::OneEmpty);
    assert_eq!(plan.field("phone").unwrap().resolved, "+1 555-0000");
    assert_eq!(plan.field("name").unwrap().conflict, ConflictKind::Conflict);
    plan.take_target("name").unwrap();

    let outcome = commit::<Account>(&mut store, "acc_tt", "acc_x", &plan.resolved_fields()).unwrap();
    assert_eq!(outcome.survivor_name, "Türk Traktör A.Ş.");
    assert_eq!(outcome.references_rewritten, 2);

    // Proposal gone, survivor enriched
    assert!(store.get::<Account>("acc_tt").is_err());
    let x: &Account = store.get("acc_x").unwrap();
    assert_eq!(x.phone, "+1 555-0000");
    assert_eq!(x.website, "turktraktor.com.tr");
    assert_eq!(x.status, RecordStatus::Active);
    assert_eq!(x.contacts.len(), 1);
    assert_eq!(x.opportunities.len(), 1);

    // Everything that pointed at the proposal now points at the survivor
    let ayse: &Contact = store.get("con_ad").unwrap();
    assert_eq!(ayse.account_id, "acc_x");
    assert_eq!(ayse.account_name, "Türk Traktör A.Ş.");
    let fleet: &Opportunity = store.get("opp_1").unwrap();
    assert_eq!(fleet.account_id, "acc_x");
    assert_eq!(fleet.account_name, "Türk Traktör A.Ş.");

    // The retired id stays retired
    let err = store
        .insert(account("acc_tt", "Again", RecordStatus::PendingApproval))
        .unwrap_err();
    assert!(matches!(err, CrmError::DuplicateId { .. }));

    assert_eq!(store.journal.len(), 1);
}

#[test]
fn review_queue_drains() {
    let mut store = demo_store().unwrap();
    let edits = patch([("phone", "+90 212 555 0101")]);

    let approved = approve::<Account>(&mut store, "acc_tt", &edits).unwrap();
    assert_eq!(approved.phone, "+90 212 555 0101");

    let rejection = reject::<Account>(&mut store, "acc_jcb").unwrap();
    assert_eq!(rejection.dependents.len(), 2);

    let resolved = prepare::<Account>(&store, "acc_cat", "acc_acme")
        .unwrap()
        .resolved_fields();
    commit::<Account>(&mut store, "acc_cat", "acc_acme", &resolved).unwrap();

    assert_eq!(store.pending_count(EntityKind::Account), 0);
    // approve + reject (with its contact and opportunity) + merge
    assert_eq!(store.journal.len(), 5);

    // Nothing points at a removed id, and cached names follow the survivor
    assert!(store.integrity_violations().is_empty());
    let acme: &Account = store.get("acc_acme").unwrap();
    assert!(store
        .contacts
        .list()
        .iter()
        .filter(|c| c.account_id == "acc_acme")
        .all(|c| c.account_name == acme.name));

    // Children of the approved account can now go through, parents first
    approve::<Contact>(&mut store, "con_ad", &FieldPatch::new()).unwrap();
    approve::<Opportunity>(&mut store, "opp_1", &FieldPatch::new()).unwrap();
    assert!(store.integrity_violations().is_empty());
}

#[test]
fn approving_a_child_first_is_refused() {
    let mut store = review_store();
    let before = snapshot_json(&store);

    let err = approve::<Opportunity>(&mut store, "opp_1", &patch([("amount", "$1")])).unwrap_err();
    assert!(matches!(err, CrmError::PendingReference { .. }));
    assert_eq!(snapshot_json(&store), before);
    assert!(store.integrity_violations().is_empty());
}

#[test]
fn proposals_trace_back_to_their_email() {
    let store = demo_store().unwrap();
    let counts = store.inbox.counts();
    assert_eq!((counts.unread, counts.quotes, counts.processed), (3, 6, 3));

    for (kind, id) in [
        (EntityKind::Account, "acc_cat"),
        (EntityKind::Contact, "con_my"),
        (EntityKind::Opportunity, "opp_2"),
    ] {
        let thread = store.inbox.source_of(kind, id).unwrap();
        assert_eq!(thread.from.name, "Mehmet Yılmaz");
        assert_eq!(thread.analysis_status, AnalysisStatus::Processed);
    }

    // Seed round trip keeps the inbox
    let copy = RecordStore::from_seed(store.snapshot()).unwrap();
    assert_eq!(copy.inbox.len(), store.inbox.len());
}

#[test]
fn failed_commit_leaves_store_untouched() {
    let mut store = review_store();
    let before = snapshot_json(&store);

    let bogus = patch([("phone", "+1"), ("status", "Active")]);
    assert!(commit::<Account>(&mut store, "acc_tt", "acc_x", &bogus).is_err());
    assert!(commit::<Account>(&mut store, "acc_x", "acc_tt", &bogus).is_err());
    assert!(commit::<Account>(&mut store, "acc_tt", "acc_tt", &bogus).is_err());

    assert_eq!(snapshot_json(&store), before);
    assert!(store.journal.is_empty());
}

// ============================================================================
// Properties
// ============================================================================

fn field_value() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "[a-zA-Z0-9 +.-]{0,12}",
    ]
}

proptest! {
    #[test]
    fn classification_is_total(existing in field_value(), incoming in field_value()) {
        let kind = classify(&existing, &incoming);
        let same = existing.trim() == incoming.trim();
        prop_assert_eq!(kind == ConflictKind::Same, same);
        if !same {
            let one_empty = existing.trim().is_empty() || incoming.trim().is_empty();
            prop_assert_eq!(kind == ConflictKind::OneEmpty, one_empty);
        }
    }

    #[test]
    fn default_resolution_prefers_information(existing in field_value(), incoming in field_value()) {
        let resolved = default_resolution(&existing, &incoming);
        match classify(&existing, &incoming) {
            ConflictKind::Same => prop_assert_eq!(resolved, existing.trim()),
            ConflictKind::OneEmpty => {
                prop_assert!(!resolved.is_empty());
                prop_assert!(resolved == existing.trim() || resolved == incoming.trim());
            }
            ConflictKind::Conflict => prop_assert_eq!(resolved, incoming.trim()),
        }
    }

    #[test]
    fn merge_keeps_references_sound(
        extra_contacts in 0usize..4,
        target_contacts in 0usize..3,
        phone in field_value(),
    ) {
        let mut store = review_store();
        for i in 0..extra_contacts {
            let id = format!("con_extra_{}", i);
            store.insert(Contact::new(&id, "Extra", "Person", "acc_tt", "Türk Traktör", RecordStatus::Active)).unwrap();
        }
        let mut x: Account = store.get::<Account>("acc_x").unwrap().clone();
        for i in 0..target_contacts {
            x.contacts.push(AccountContact {
                name: format!("Target {}", i),
                email: String::new(),
                phone: String::new(),
            });
        }
        store.remove::<Account>("acc_x");
        let expected_nested = x.nested_len() + store.get::<Account>("acc_tt").unwrap().nested_len();
        // Re-insert under a fresh id; removed ids cannot come back
        x.id = "acc_y".to_string();
        store.insert(x).unwrap();

        let mut plan = prepare::<Account>(&store, "acc_tt", "acc_y").unwrap();
        plan.set("phone", phone.as_str()).unwrap();
        commit::<Account>(&mut store, "acc_tt", "acc_y", &plan.resolved_fields()).unwrap();

        prop_assert!(store.integrity_violations().iter().all(|v| !v.to_string().contains("acc_tt")));
        prop_assert!(store.contacts.list().iter().all(|c| c.account_id != "acc_tt"));
        prop_assert!(store.opportunities.list().iter().all(|o| o.account_id != "acc_tt"));
        let y: &Account = store.get("acc_y").unwrap();
        prop_assert_eq!(y.nested_len(), expected_nested);
        prop_assert_eq!(&y.phone, &phone);
    }

    #[test]
    fn search_never_mutates(query in "[a-zA-Zş ]{0,6}") {
        let store = demo_store().unwrap();
        let before = snapshot_json(&store);
        let hits = search::<Account>(&store, &query);
        prop_assert!(hits.len() <= store.accounts.len());
        prop_assert_eq!(snapshot_json(&store), before);
    }
}
