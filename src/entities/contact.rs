// 👤 Contact Entity - Person at an account
//
// Relationship: account_id → Account entity (foreign key), with account_name
// cached alongside it for display.

use super::{
    unknown_field, EntityKind, FieldSpec, ForeignKey, OpportunityStage, Record, RecordStatus,
};
use crate::error::CrmResult;
use serde::{Deserialize, Serialize};

/// Lightweight copy of an opportunity shown on the contact page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactOpportunity {
    pub name: String,
    pub amount: String,
    pub stage: OpportunityStage,
    pub close_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,

    /// Foreign key to Account
    pub account_id: String,
    /// Denormalized Account.name
    #[serde(default)]
    pub account_name: String,

    pub status: RecordStatus,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub last_activity_date: String,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub mailing_address: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub opportunities: Vec<ContactOpportunity>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub created_date: String,
}

const MERGEABLE: &[FieldSpec] = &[
    FieldSpec { key: "first_name", label: "First Name" },
    FieldSpec { key: "last_name", label: "Last Name" },
    FieldSpec { key: "email", label: "Email" },
    FieldSpec { key: "phone", label: "Phone" },
    FieldSpec { key: "account_name", label: "Account Name" },
    FieldSpec { key: "industry", label: "Industry" },
    FieldSpec { key: "website", label: "Website" },
];

impl Contact {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        account_id: impl Into<String>,
        account_name: impl Into<String>,
        status: RecordStatus,
    ) -> Self {
        let mut contact = Contact {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: String::new(),
            account_id: account_id.into(),
            account_name: account_name.into(),
            status,
            amount: String::new(),
            last_activity_date: String::new(),
            initials: String::new(),
            phone: String::new(),
            mailing_address: String::new(),
            website: String::new(),
            industry: String::new(),
            opportunities: Vec::new(),
            description: Vec::new(),
            created_date: String::new(),
        };
        contact.refresh_initials();
        contact
    }

    /// "First Last", trimmed when either half is empty
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

impl Record for Contact {
    const KIND: EntityKind = EntityKind::Contact;

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
        self.full_name()
    }

    fn initials(&self) -> &str {
        &self.initials
    }

    fn set_initials(&mut self, initials: String) {
        self.initials = initials;
    }

    fn search_fields(&self) -> Vec<String> {
        vec![
            format!("{} {}", self.first_name, self.last_name),
            self.account_name.clone(),
            self.email.clone(),
        ]
    }

    fn mergeable_fields() -> &'static [FieldSpec] {
        MERGEABLE
    }

    fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "first_name" => &self.first_name,
            "last_name" => &self.last_name,
            "email" => &self.email,
            "account_name" => &self.account_name,
            "amount" => &self.amount,
            "last_activity_date" => &self.last_activity_date,
            "phone" => &self.phone,
            "mailing_address" => &self.mailing_address,
            "website" => &self.website,
            "industry" => &self.industry,
            "created_date" => &self.created_date,
            _ => return None,
        };
        Some(value.clone())
    }

    fn set_field(&mut self, key: &str, value: &str) -> CrmResult<()> {
        let slot = match key {
            "first_name" => &mut self.first_name,
            "last_name" => &mut self.last_name,
            "email" => &mut self.email,
            "account_name" => &mut self.account_name,
            "amount" => &mut self.amount,
            "last_activity_date" => &mut self.last_activity_date,
            "phone" => &mut self.phone,
            "mailing_address" => &mut self.mailing_address,
            "website" => &mut self.website,
            "industry" => &mut self.industry,
            "created_date" => &mut self.created_date,
            _ => return Err(unknown_field::<Self>(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn nested_len(&self) -> usize {
        self.opportunities.len()
    }

    fn absorb_nested(&mut self, source: &Self) {
        self.opportunities.extend(source.opportunities.iter().cloned());
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey {
            field: "account_id",
            kind: EntityKind::Account,
            id: &self.account_id,
        }]
    }
}
