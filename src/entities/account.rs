// 🏢 Account Entity - Company record with denormalized contact/deal summaries
//
// "The id is identity, the name is a value": merges retire an id and rewrite
// every reference to the survivor, names are copied along with it.

use super::{is_mergeable, unknown_field, EntityKind, FieldSpec, Record, RecordStatus};
use crate::error::CrmResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// NESTED SUMMARIES
// ============================================================================

/// Lightweight copy of a contact shown on the account page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Lightweight copy of an opportunity shown on the account page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpportunity {
    pub name: String,
    pub amount: String,
    pub stage: String,
    pub close_date: String,
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub employees: String,
    #[serde(default)]
    pub tax_number: String,
    #[serde(default)]
    pub tax_office: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub total_revenue: String,
    #[serde(default)]
    pub last_activity_date: String,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub contacts: Vec<AccountContact>,
    #[serde(default)]
    pub opportunities: Vec<AccountOpportunity>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub created_date: String,
}

const MERGEABLE: &[FieldSpec] = &[
    FieldSpec { key: "name", label: "Account Name" },
    FieldSpec { key: "website", label: "Website" },
    FieldSpec { key: "phone", label: "Phone" },
    FieldSpec { key: "employees", label: "Employees" },
    FieldSpec { key: "tax_number", label: "Tax Number" },
    FieldSpec { key: "tax_office", label: "Tax Office" },
];

impl Account {
    /// Create an account with empty optional fields and derived initials
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: RecordStatus) -> Self {
        let mut account = Account {
            id: id.into(),
            name: name.into(),
            website: String::new(),
            phone: String::new(),
            employees: String::new(),
            tax_number: String::new(),
            tax_office: String::new(),
            status,
            total_revenue: String::new(),
            last_activity_date: String::new(),
            initials: String::new(),
            contacts: Vec::new(),
            opportunities: Vec::new(),
            description: Vec::new(),
            created_date: String::new(),
        };
        account.refresh_initials();
        account
    }
}

impl Record for Account {
    const KIND: EntityKind = EntityKind::Account;

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
            self.website.clone(),
            self.tax_number.clone(),
        ]
    }

    fn mergeable_fields() -> &'static [FieldSpec] {
        MERGEABLE
    }

    fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "name" => &self.name,
            "website" => &self.website,
            "phone" => &self.phone,
            "employees" => &self.employees,
            "tax_number" => &self.tax_number,
            "tax_office" => &self.tax_office,
            "total_revenue" => &self.total_revenue,
            "last_activity_date" => &self.last_activity_date,
            "created_date" => &self.created_date,
            _ => return None,
        };
        Some(value.clone())
    }

    fn set_field(&mut self, key: &str, value: &str) -> CrmResult<()> {
        let slot = match key {
            "name" => &mut self.name,
            "website" => &mut self.website,
            "phone" => &mut self.phone,
            "employees" => &mut self.employees,
            "tax_number" => &mut self.tax_number,
            "tax_office" => &mut self.tax_office,
            "total_revenue" => &mut self.total_revenue,
            "last_activity_date" => &mut self.last_activity_date,
            "created_date" => &mut self.created_date,
            _ => return Err(unknown_field::<Self>(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn nested_len(&self) -> usize {
        self.contacts.len() + self.opportunities.len()
    }

    fn absorb_nested(&mut self, source: &Self) {
        self.contacts.extend(source.contacts.iter().cloned());
        self.opportunities.extend(source.opportunities.iter().cloned());
    }
}
