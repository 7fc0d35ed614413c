//! Ledger gateway contract.
//!
//! The ledger (contract + indexer API) is an external collaborator; the
//! client only consumes this narrow surface: submit a signed operation, fetch
//! a job snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, Signature};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::phase::JobPhase;
use crate::types::{Deliverable, Job, Memo};

pub mod http;

pub use http::HttpLedgerGateway;

/// State-changing operation as signed by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationPayload {
    Respond {
        job_id: u64,
        accept: bool,
        memo_id: u64,
        reason: String,
    },
    Deliver {
        job_id: u64,
        deliverable: Deliverable,
    },
}

impl OperationPayload {
    pub fn job_id(&self) -> u64 {
        match self {
            OperationPayload::Respond { job_id, .. } => *job_id,
            OperationPayload::Deliver { job_id, .. } => *job_id,
        }
    }

    /// Canonical JSON bytes, the exact bytes the signature covers.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedOperation {
    pub payload: OperationPayload,
    pub signer: Address,
    pub session_entity_id: u64,
    /// Client-generated nonce; lets the ledger reject duplicate submissions.
    pub nonce: Uuid,
    pub signature: Signature,
}

/// Ledger acknowledgment for an accepted operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: u64,
    pub new_phase: JobPhase,
    pub memo_id: Option<u64>,
}

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("rejected by contract: {0}")]
    RejectedByContract(String),

    #[error("unauthorized signer")]
    Unauthorized,

    #[error("stale nonce")]
    StaleNonce,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Transient failures leave the operation outcome unknown; the ledger
    /// itself never refused them.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Transport(_))
    }
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn submit_operation(&self, op: &SignedOperation) -> Result<SubmitReceipt, GatewayError>;

    /// Fetch a job snapshot; `Ok(None)` when the ledger has no such job.
    async fn fetch_job(&self, job_id: u64) -> Result<Option<Job>, GatewayError>;
}

// In-memory gateway for testing
pub struct MockLedgerGateway {
    jobs: Arc<RwLock<HashMap<u64, Job>>>,
    submissions: Arc<RwLock<Vec<SignedOperation>>>,
    fetch_count: Arc<RwLock<usize>>,
    fail_submit: Arc<RwLock<Option<(GatewayError, usize)>>>,
    fail_next_fetch: Arc<RwLock<Option<GatewayError>>>,
}

impl MockLedgerGateway {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            submissions: Arc::new(RwLock::new(Vec::new())),
            fetch_count: Arc::new(RwLock::new(0)),
            fail_submit: Arc::new(RwLock::new(None)),
            fail_next_fetch: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn insert_job(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn job(&self, job_id: u64) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    pub async fn submissions(&self) -> Vec<SignedOperation> {
        self.submissions.read().await.clone()
    }

    pub async fn fetch_count(&self) -> usize {
        *self.fetch_count.read().await
    }

    /// Fail the next submit_operation call with the given error (one-shot).
    pub async fn inject_submit_failure(&self, err: GatewayError) {
        self.inject_submit_failures(err, 1).await;
    }

    /// Fail the next `count` submit_operation calls with the given error.
    pub async fn inject_submit_failures(&self, err: GatewayError, count: usize) {
        *self.fail_submit.write().await = Some((err, count));
    }

    /// Fail the next fetch_job call with the given error (one-shot).
    pub async fn inject_fetch_failure(&self, err: GatewayError) {
        *self.fail_next_fetch.write().await = Some(err);
    }
}

impl Default for MockLedgerGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedgerGateway {
    async fn submit_operation(&self, op: &SignedOperation) -> Result<SubmitReceipt, GatewayError> {
        {
            let mut fail = self.fail_submit.write().await;
            if let Some((err, remaining)) = fail.take() {
                if remaining > 1 {
                    *fail = Some((err.clone(), remaining - 1));
                }
                return Err(err);
            }
        }

        let mut jobs = self.jobs.write().await;
        let receipt = match &op.payload {
            OperationPayload::Respond {
                job_id,
                accept,
                reason,
                ..
            } => {
                let job = jobs
                    .get_mut(job_id)
                    .ok_or_else(|| GatewayError::RejectedByContract("unknown job".to_string()))?;
                job.phase = if *accept {
                    JobPhase::Accepted
                } else {
                    JobPhase::Rejected
                };
                let memo_id = job.next_memo_id();
                job.memos.push(Memo {
                    id: memo_id,
                    author: op.signer,
                    content: reason.clone(),
                    created_at: chrono::Utc::now(),
                });
                SubmitReceipt {
                    job_id: *job_id,
                    new_phase: job.phase,
                    memo_id: Some(memo_id),
                }
            }
            OperationPayload::Deliver {
                job_id,
                deliverable,
            } => {
                let job = jobs
                    .get_mut(job_id)
                    .ok_or_else(|| GatewayError::RejectedByContract("unknown job".to_string()))?;
                job.phase = JobPhase::Delivered;
                job.deliverable = Some(deliverable.clone());
                SubmitReceipt {
                    job_id: *job_id,
                    new_phase: JobPhase::Delivered,
                    memo_id: None,
                }
            }
        };

        self.submissions.write().await.push(op.clone());
        Ok(receipt)
    }

    async fn fetch_job(&self, job_id: u64) -> Result<Option<Job>, GatewayError> {
        if let Some(err) = self.fail_next_fetch.write().await.take() {
            return Err(err);
        }
        *self.fetch_count.write().await += 1;
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }
}
