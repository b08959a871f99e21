// ⚠️ Errors - Local, recoverable conditions raised by the reconciliation core
//
// None of these are fatal: views treat them as "decline the action".

use crate::entities::{EntityKind, RecordStatus};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} cannot transition from {status}")]
    InvalidTransition {
        kind: EntityKind,
        id: String,
        status: RecordStatus,
    },

    #[error("cannot merge {kind} {id} into itself")]
    SameRecord { kind: EntityKind, id: String },

    #[error("{kind} has no editable field '{field}'")]
    InvalidField { kind: EntityKind, field: String },

    #[error("invalid value for {kind}.{field}: '{value}'")]
    InvalidValue {
        kind: EntityKind,
        field: String,
        value: String,
    },

    #[error("{kind} id {id} is already in use or retired")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("{kind} {id} is still referenced by {by_kind} {by_id}")]
    StillReferenced {
        kind: EntityKind,
        id: String,
        by_kind: EntityKind,
        by_id: String,
    },

    #[error("{kind} {id} references {target_kind} {target_id}, which is still pending approval")]
    PendingReference {
        kind: EntityKind,
        id: String,
        target_kind: EntityKind,
        target_id: String,
    },
}

impl CrmError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        CrmError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_field(kind: EntityKind, field: &str) -> Self {
        CrmError::InvalidField {
            kind,
            field: field.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CrmError::NotFound { .. })
    }
}

pub type CrmResult<T> = Result<T, CrmError>;

/// Guard-and-return helper: a missing record becomes `Ok(None)`,
/// every other error is passed through.
pub fn ignore_missing<T>(result: CrmResult<T>) -> CrmResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_missing_swallows_not_found_only() {
        let missing: CrmResult<()> = Err(CrmError::not_found(EntityKind::Account, "acc_x"));
        assert_eq!(ignore_missing(missing), Ok(None));

        let same: CrmResult<()> = Err(CrmError::SameRecord {
            kind: EntityKind::Contact,
            id: "con_ad".to_string(),
        });
        assert!(ignore_missing(same).is_err());

        assert_eq!(ignore_missing(Ok(7)), Ok(Some(7)));
    }

    #[test]
    fn test_error_messages() {
        let err = CrmError::InvalidTransition {
            kind: EntityKind::Opportunity,
            id: "opp_4".to_string(),
            status: RecordStatus::Active,
        };
        assert_eq!(err.to_string(), "Opportunity opp_4 cannot transition from Active");

        let err = CrmError::invalid_field(EntityKind::Account, "account_id");
        assert_eq!(err.to_string(), "Account has no editable field 'account_id'");

        let err = CrmError::PendingReference {
            kind: EntityKind::Contact,
            id: "con_ad".to_string(),
            target_kind: EntityKind::Account,
            target_id: "acc_tt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Contact con_ad references Account acc_tt, which is still pending approval"
        );
    }
}
