// 📬 Inbox - Inbound email threads the intake agent reads proposals from
//
// Read-only: threads arrive with the seed and are never edited here. Each
// processed thread links to the proposals extracted from it.

use crate::entities::EntityKind;
use crate::search::text_matches;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ANALYSIS STATUS
// ============================================================================

/// Where the intake agent is with a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisStatus {
    New,
    Analyzing,
    #[serde(rename = "Not Relevant")]
    NotRelevant,
    #[serde(rename = "Quote Requested")]
    QuoteRequested,
    Extracting,
    Processed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::New => "New",
            AnalysisStatus::Analyzing => "Analyzing",
            AnalysisStatus::NotRelevant => "Not Relevant",
            AnalysisStatus::QuoteRequested => "Quote Requested",
            AnalysisStatus::Extracting => "Extracting",
            AnalysisStatus::Processed => "Processed",
        }
    }

    /// Triage classified the thread as a request for quotation
    pub fn is_quote(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::QuoteRequested | AnalysisStatus::Extracting | AnalysisStatus::Processed
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// THREAD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triage {
    pub summary: String,
    pub is_quote_request: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub name: String,
    pub quantity: u32,
    pub unit: String,
}

/// What the agent pulled out of a quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub account_name: String,
    pub contact_name: String,
    pub contact_email: String,
    #[serde(default)]
    pub products: Vec<ExtractedProduct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<String>,
}

/// A proposal record created from a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalLink {
    pub kind: EntityKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailThread {
    pub id: String,
    pub thread_id: String,
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub snippet: String,
    pub body: String,
    pub received_date: String,
    pub is_read: bool,
    pub analysis_status: AnalysisStatus,
    pub thread_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triage: Option<Triage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<Extraction>,
    #[serde(default)]
    pub proposals: Vec<ProposalLink>,
}

impl EmailThread {
    /// Sender name, subject and snippet, matched case-insensitively
    pub fn matches(&self, query: &str) -> bool {
        text_matches(&[&self.from.name, &self.subject, &self.snippet], query)
    }

    pub fn proposed(&self, kind: EntityKind, id: &str) -> bool {
        self.proposals.iter().any(|p| p.kind == kind && p.id == id)
    }
}

// ============================================================================
// INBOX
// ============================================================================

/// Header counters shown above the thread list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InboxCounts {
    pub unread: usize,
    pub quotes: usize,
    pub processed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Inbox {
    threads: Vec<EmailThread>,
}

impl Inbox {
    pub fn new(threads: Vec<EmailThread>) -> Self {
        Inbox { threads }
    }

    pub fn threads(&self) -> &[EmailThread] {
        &self.threads
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EmailThread> {
        self.threads.iter().find(|t| t.id == id)
    }

    /// Threads matching `query`, in stored order
    pub fn search(&self, query: &str) -> Vec<&EmailThread> {
        self.threads.iter().filter(|t| t.matches(query)).collect()
    }

    pub fn counts(&self) -> InboxCounts {
        let mut counts = InboxCounts::default();
        for thread in &self.threads {
            if !thread.is_read {
                counts.unread += 1;
            }
            if thread.analysis_status.is_quote() {
                counts.quotes += 1;
            }
            if thread.analysis_status == AnalysisStatus::Processed {
                counts.processed += 1;
            }
        }
        counts
    }

    /// The thread a proposal was extracted from
    pub fn source_of(&self, kind: EntityKind, id: &str) -> Option<&EmailThread> {
        self.threads.iter().find(|t| t.proposed(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::demo_store;

    #[test]
    fn test_demo_inbox_counts() {
        let store = demo_store().unwrap();
        assert_eq!(store.inbox.len(), 13);
        assert_eq!(
            store.inbox.counts(),
            InboxCounts {
                unread: 3,
                quotes: 6,
                processed: 3,
            }
        );
    }

    #[test]
    fn test_search_matches_sender_subject_and_snippet() {
        let store = demo_store().unwrap();
        let inbox = &store.inbox;

        let by_sender: Vec<&str> = inbox.search("carlos").into_iter().map(|t| t.id.as_str()).collect();
        assert_eq!(by_sender, vec!["em_9"]);

        let by_subject = inbox.search("RFQ-2024");
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].from.name, "Kenji Tanaka");

        assert_eq!(inbox.search("   ").len(), 13);
        assert!(inbox.search("no such thread").is_empty());
    }

    #[test]
    fn test_source_of_links_proposals_to_threads() {
        let store = demo_store().unwrap();
        let inbox = &store.inbox;

        let thread = inbox.source_of(EntityKind::Account, "acc_tt").unwrap();
        assert_eq!(thread.id, "em_1");
        assert_eq!(thread.analysis_status, AnalysisStatus::Processed);
        let extraction = thread.extraction.as_ref().unwrap();
        assert_eq!(extraction.account_name, "Türk Traktör");
        assert_eq!(extraction.products.len(), 3);

        let jcb = inbox.source_of(EntityKind::Opportunity, "opp_3").unwrap();
        assert_eq!(Some(jcb), inbox.get("em_9"));
        assert!(inbox.get("em_99").is_none());
        assert!(inbox.source_of(EntityKind::Account, "acc_acme").is_none());
        // Kind must match as well as id
        assert!(inbox.source_of(EntityKind::Contact, "acc_tt").is_none());
    }

    #[test]
    fn test_every_link_names_a_demo_proposal() {
        let store = demo_store().unwrap();
        for thread in store.inbox.threads() {
            for link in &thread.proposals {
                assert_eq!(store.status_of(link.kind, &link.id).map(|s| s.is_pending()), Some(true), "{}", link.id);
            }
        }
    }

    #[test]
    fn test_status_labels() {
        let status: AnalysisStatus = serde_json::from_str("\"Quote Requested\"").unwrap();
        assert_eq!(status, AnalysisStatus::QuoteRequested);
        assert!(status.is_quote());
        assert!(!AnalysisStatus::NotRelevant.is_quote());
        assert_eq!(AnalysisStatus::NotRelevant.to_string(), "Not Relevant");
    }
}
