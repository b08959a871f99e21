// 📜 Review Journal - Audit trail of reviewer actions
// "Every change is an event": approve, reject and merge each leave one entry.
//
// In-memory only; the journal lives as long as the store that owns it.

use crate::entities::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REVIEWER: &str = "reviewer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewAction {
    Approved,
    Rejected,
    Merged,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approved => "approved",
            ReviewAction::Rejected => "rejected",
            ReviewAction::Merged => "merged",
        }
    }
}

/// One reviewer action against one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: ReviewAction,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl ReviewEvent {
    pub fn new(
        action: ReviewAction,
        entity_kind: EntityKind,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action,
            entity_kind,
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} {} {} by {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.entity_kind,
            self.entity_id,
            self.action.as_str(),
            self.actor
        )
    }
}

/// Append-only list of review events
#[derive(Debug, Clone)]
pub struct Journal {
    actor: String,
    events: Vec<ReviewEvent>,
}

impl Journal {
    pub fn new(actor: impl Into<String>) -> Self {
        Journal {
            actor: actor.into(),
            events: Vec::new(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn set_actor(&mut self, actor: impl Into<String>) {
        self.actor = actor.into();
    }

    pub fn record(
        &mut self,
        action: ReviewAction,
        kind: EntityKind,
        entity_id: &str,
        data: serde_json::Value,
    ) -> &ReviewEvent {
        let event = ReviewEvent::new(action, kind, entity_id, data, &self.actor);
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[ReviewEvent] {
        &self.events
    }

    /// Events for a single record, oldest first
    pub fn events_for(&self, kind: EntityKind, entity_id: &str) -> Vec<&ReviewEvent> {
        self.events
            .iter()
            .filter(|e| e.entity_kind == kind && e.entity_id == entity_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(DEFAULT_REVIEWER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_journal_records_actor_and_payload() {
        let mut journal = Journal::new("ayse");
        let event = journal.record(
            ReviewAction::Rejected,
            EntityKind::Account,
            "acc_cat",
            json!({"name": "Caterpillar Turkey"}),
        );

        assert_eq!(event.actor, "ayse");
        assert_eq!(event.action, ReviewAction::Rejected);
        assert!(!event.event_id.is_empty());
        assert_eq!(event.data["name"], "Caterpillar Turkey");
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_events_for_filters_by_kind_and_id() {
        let mut journal = Journal::default();
        journal.record(ReviewAction::Approved, EntityKind::Account, "acc_tt", json!({}));
        journal.record(ReviewAction::Approved, EntityKind::Contact, "acc_tt", json!({}));
        journal.set_actor("second");
        journal.record(ReviewAction::Merged, EntityKind::Account, "acc_tt", json!({}));

        let events = journal.events_for(EntityKind::Account, "acc_tt");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].actor, DEFAULT_REVIEWER);
        assert_eq!(events[1].actor, "second");
        assert!(events[1].summary().contains("Account acc_tt merged by second"));
    }
}
