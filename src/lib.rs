// CRM Reconciliation Core - Library
// Review queue for agent-proposed accounts, contacts and opportunities:
// approve, reject, or merge into an existing record with cascades. The
// inbox the proposals were extracted from rides along read-only.

pub mod entities;
pub mod error;
pub mod store;
pub mod search;
pub mod approval;
pub mod merge;
pub mod inbox;
pub mod audit;
pub mod fixtures;
pub mod config;

// Re-export commonly used types
pub use entities::{
    derive_initials, patch, Account, AccountContact, AccountOpportunity, Contact,
    ContactOpportunity, EntityKind, FieldPatch, FieldSpec, ForeignKey, Opportunity,
    OpportunityStage, Record, RecordStatus,
};
pub use error::{ignore_missing, CrmError, CrmResult};
pub use store::{Collection, IntegrityViolation, RecordStore, Referrer, SeedData, Stored};
pub use search::{filter, merge_candidates, pending, search, SearchState};
pub use approval::{approve, reject, Rejection};
pub use merge::{
    classify, commit, default_resolution, prepare, ConflictKind, FieldResolution, MergeOutcome,
    MergePlan, Mergeable,
};
pub use inbox::{AnalysisStatus, EmailThread, Inbox, InboxCounts, ProposalLink};
pub use audit::{Journal, ReviewAction, ReviewEvent};
pub use fixtures::{demo_store, load_seed};
pub use config::{init_logging, ReviewConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
