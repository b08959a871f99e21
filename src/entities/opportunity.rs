// 💼 Opportunity Entity - Deal in the sales pipeline
//
// Relationships: account_id → Account, contact_id → Contact.
// Nothing references an opportunity, so merging one never cascades.

use super::{unknown_field, EntityKind, FieldSpec, ForeignKey, Record, RecordStatus};
use crate::error::{CrmError, CrmResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PIPELINE STAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpportunityStage {
    Prospecting,
    Qualification,
    #[serde(rename = "Needs Analysis")]
    NeedsAnalysis,
    #[serde(rename = "Value Proposition")]
    ValueProposition,
    #[serde(rename = "Id. Decision Makers")]
    IdDecisionMakers,
    #[serde(rename = "Perception Analysis")]
    PerceptionAnalysis,
    #[serde(rename = "Proposal/Price Quote")]
    ProposalPriceQuote,
    #[serde(rename = "Negotiation/Review")]
    NegotiationReview,
    #[serde(rename = "Closed Won")]
    ClosedWon,
    #[serde(rename = "Closed Lost")]
    ClosedLost,
}

impl OpportunityStage {
    pub const ALL: [OpportunityStage; 10] = [
        OpportunityStage::Prospecting,
        OpportunityStage::Qualification,
        OpportunityStage::NeedsAnalysis,
        OpportunityStage::ValueProposition,
        OpportunityStage::IdDecisionMakers,
        OpportunityStage::PerceptionAnalysis,
        OpportunityStage::ProposalPriceQuote,
        OpportunityStage::NegotiationReview,
        OpportunityStage::ClosedWon,
        OpportunityStage::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStage::Prospecting => "Prospecting",
            OpportunityStage::Qualification => "Qualification",
            OpportunityStage::NeedsAnalysis => "Needs Analysis",
            OpportunityStage::ValueProposition => "Value Proposition",
            OpportunityStage::IdDecisionMakers => "Id. Decision Makers",
            OpportunityStage::PerceptionAnalysis => "Perception Analysis",
            OpportunityStage::ProposalPriceQuote => "Proposal/Price Quote",
            OpportunityStage::NegotiationReview => "Negotiation/Review",
            OpportunityStage::ClosedWon => "Closed Won",
            OpportunityStage::ClosedLost => "Closed Lost",
        }
    }

    /// Parse a display label (surrounding whitespace ignored)
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.iter().copied().find(|stage| stage.as_str() == label)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, OpportunityStage::ClosedWon | OpportunityStage::ClosedLost)
    }
}

impl fmt::Display for OpportunityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OPPORTUNITY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub amount: String,
    pub stage: OpportunityStage,
    #[serde(default)]
    pub close_date: String,
    #[serde(default)]
    pub probability: String,

    /// Foreign key to Account, with its cached name
    pub account_id: String,
    #[serde(default)]
    pub account_name: String,

    /// Foreign key to Contact, with its cached name
    pub contact_id: String,
    #[serde(default)]
    pub contact_name: String,

    pub status: RecordStatus,
    #[serde(default)]
    pub last_activity_date: String,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub created_date: String,
}

const MERGEABLE: &[FieldSpec] = &[
    FieldSpec { key: "name", label: "Opportunity Name" },
    FieldSpec { key: "amount", label: "Amount" },
    FieldSpec { key: "stage", label: "Stage" },
    FieldSpec { key: "probability", label: "Probability" },
    FieldSpec { key: "close_date", label: "Close Date" },
    FieldSpec { key: "account_name", label: "Account Name" },
    FieldSpec { key: "contact_name", label: "Contact Name" },
];

impl Opportunity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        stage: OpportunityStage,
        account_id: impl Into<String>,
        contact_id: impl Into<String>,
        status: RecordStatus,
    ) -> Self {
        let mut opportunity = Opportunity {
            id: id.into(),
            name: name.into(),
            amount: String::new(),
            stage,
            close_date: String::new(),
            probability: String::new(),
            account_id: account_id.into(),
            account_name: String::new(),
            contact_id: contact_id.into(),
            contact_name: String::new(),
            status,
            last_activity_date: String::new(),
            initials: String::new(),
            description: Vec::new(),
            created_date: String::new(),
        };
        opportunity.refresh_initials();
        opportunity
    }
}

impl Record for Opportunity {
    const KIND: EntityKind = EntityKind::Opportunity;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> RecordStatus {
        self.status
    }

    fn set_status(&mut self, status: RecordStatus) {
        self.status = status;
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn initials(&self) -> &str {
        &self.initials
    }

    fn set_initials(&mut self, initials: String) {
        self.initials = initials;
    }

    fn search_fields(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.account_name.clone(),
            self.contact_name.clone(),
        ]
    }

    fn mergeable_fields() -> &'static [FieldSpec] {
        MERGEABLE
    }

    fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "stage" => return Some(self.stage.as_str().to_string()),
            "name" => &self.name,
            "amount" => &self.amount,
            "close_date" => &self.close_date,
            "probability" => &self.probability,
            "account_name" => &self.account_name,
            "contact_name" => &self.contact_name,
            "last_activity_date" => &self.last_activity_date,
            "created_date" => &self.created_date,
            _ => return None,
        };
        Some(value.clone())
    }

    fn set_field(&mut self, key: &str, value: &str) -> CrmResult<()> {
        let slot = match key {
            "stage" => {
                self.stage = OpportunityStage::parse(value).ok_or_else(|| {
                    CrmError::InvalidValue {
                        kind: Self::KIND,
                        field: key.to_string(),
                        value: value.to_string(),
                    }
                })?;
                return Ok(());
            }
            "name" => &mut self.name,
            "amount" => &mut self.amount,
            "close_date" => &mut self.close_date,
            "probability" => &mut self.probability,
            "account_name" => &mut self.account_name,
            "contact_name" => &mut self.contact_name,
            "last_activity_date" => &mut self.last_activity_date,
            "created_date" => &mut self.created_date,
            _ => return Err(unknown_field::<Self>(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![
            ForeignKey {
                field: "account_id",
                kind: EntityKind::Account,
                id: &self.account_id,
            },
            ForeignKey {
                field: "contact_id",
                kind: EntityKind::Contact,
                id: &self.contact_id,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_opportunity() -> Opportunity {
        Opportunity::new(
            "opp_1",
            "Türk Traktör - Fleet Management System",
            OpportunityStage::Prospecting,
            "acc_tt",
            "con_ad",
            RecordStatus::PendingApproval,
        )
    }

    #[test]
    fn test_stage_labels_round_trip_through_parse() {
        for stage in OpportunityStage::ALL {
            assert_eq!(OpportunityStage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(OpportunityStage::parse("  Closed Won "), Some(OpportunityStage::ClosedWon));
        assert_eq!(OpportunityStage::parse("closed won"), None);
    }

    #[test]
    fn test_stage_serde_uses_display_labels() {
        let json = serde_json::to_string(&OpportunityStage::ProposalPriceQuote).unwrap();
        assert_eq!(json, "\"Proposal/Price Quote\"");
        let stage: OpportunityStage = serde_json::from_str("\"Id. Decision Makers\"").unwrap();
        assert_eq!(stage, OpportunityStage::IdDecisionMakers);
    }

    #[test]
    fn test_initials_truncate_to_two() {
        let opp = create_test_opportunity();
        assert_eq!(opp.initials, "TT");
    }

    #[test]
    fn test_set_stage_field() {
        let mut opp = create_test_opportunity();
        opp.set_field("stage", "Negotiation/Review").unwrap();
        assert_eq!(opp.stage, OpportunityStage::NegotiationReview);
        assert_eq!(opp.field("stage").as_deref(), Some("Negotiation/Review"));

        let err = opp.set_field("stage", "Signed").unwrap_err();
        assert!(matches!(err, CrmError::InvalidValue { .. }));
        assert_eq!(opp.stage, OpportunityStage::NegotiationReview);
    }

    #[test]
    fn test_foreign_keys_are_not_editable() {
        let mut opp = create_test_opportunity();
        assert!(opp.set_field("account_id", "acc_x").is_err());
        assert!(opp.set_field("contact_id", "con_x").is_err());
        assert_eq!(opp.account_id, "acc_tt");
        assert_eq!(opp.contact_id, "con_ad");
    }

    #[test]
    fn test_foreign_keys_and_approval_fields() {
        let opp = create_test_opportunity();
        let targets: Vec<(EntityKind, &str)> = opp.foreign_keys().iter().map(|fk| (fk.kind, fk.id)).collect();
        assert_eq!(
            targets,
            vec![(EntityKind::Account, "acc_tt"), (EntityKind::Contact, "con_ad")]
        );

        let keys: Vec<&str> = Opportunity::approval_fields().iter().map(|f| f.key).collect();
        assert_eq!(keys, vec!["name", "amount", "stage", "probability", "close_date"]);
    }

    #[test]
    fn test_closed_stages() {
        assert!(OpportunityStage::ClosedLost.is_closed());
        assert!(!OpportunityStage::Qualification.is_closed());
    }
}
