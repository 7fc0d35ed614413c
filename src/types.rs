use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::phase::JobPhase;

/// Snapshot of a ledger-owned job. The ledger is the source of truth; the
/// client only ever holds a read-through cache copy of this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub phase: JobPhase,
    pub counterparty: Address,
    #[serde(default)]
    pub memos: Vec<Memo>,
    #[serde(default)]
    pub deliverable: Option<Deliverable>,
}

impl Job {
    pub fn memo(&self, memo_id: u64) -> Option<&Memo> {
        self.memos.iter().find(|m| m.id == memo_id)
    }

    /// Next free memo id, used when the ledger acknowledgment does not carry one.
    pub fn next_memo_id(&self) -> u64 {
        self.memos.iter().map(|m| m.id).max().unwrap_or(0) + 1
    }
}

/// Append-only message attached to a job. Immutable once recorded on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memo {
    pub id: u64,
    pub author: Address,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DeliverablePayload {
    Uri(String),
    Text(String),
}

impl DeliverablePayload {
    pub fn as_str(&self) -> &str {
        match self {
            DeliverablePayload::Uri(s) => s,
            DeliverablePayload::Text(s) => s,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

/// Final work product for a job. Write-once: at most one accepted deliverable
/// finalizes a job, resubmission after acceptance is rejected ledger-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub job_id: u64,
    pub payload: DeliverablePayload,
    pub submitted_at: DateTime<Utc>,
}
