use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::gateway::{GatewayError, LedgerGateway, OperationPayload, SignedOperation, SubmitReceipt};
use crate::identity::{Identity, IdentityError};
use crate::phase::{self, JobPhase, TransitionError};
use crate::types::{Deliverable, DeliverablePayload, Job, Memo};

#[derive(Debug, Clone)]
pub enum LifecycleError {
    IllegalTransition { from: JobPhase, requested: JobPhase },
    UnknownMemo(u64),
    EmptyDeliverable,
    JobNotFound(u64),
    GatewayUnavailable(String),
    GatewayRejected(String),
    SigningFailed(String),
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::IllegalTransition { from, requested } => {
                write!(f, "illegal transition from {:?} to {:?}", from, requested)
            }
            LifecycleError::UnknownMemo(id) => write!(f, "memo {} not found on job", id),
            LifecycleError::EmptyDeliverable => write!(f, "deliverable payload is empty"),
            LifecycleError::JobNotFound(id) => write!(f, "job {} not found", id),
            LifecycleError::GatewayUnavailable(e) => write!(f, "gateway unavailable: {}", e),
            LifecycleError::GatewayRejected(e) => write!(f, "gateway rejected operation: {}", e),
            LifecycleError::SigningFailed(e) => write!(f, "signing failed: {}", e),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<TransitionError> for LifecycleError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::IllegalTransition { from, requested } => {
                LifecycleError::IllegalTransition { from, requested }
            }
            TransitionError::UnknownMemo(id) => LifecycleError::UnknownMemo(id),
            TransitionError::EmptyDeliverable => LifecycleError::EmptyDeliverable,
        }
    }
}

impl From<GatewayError> for LifecycleError {
    fn from(err: GatewayError) -> Self {
        if err.is_transient() {
            LifecycleError::GatewayUnavailable(err.to_string())
        } else {
            LifecycleError::GatewayRejected(err.to_string())
        }
    }
}

impl From<IdentityError> for LifecycleError {
    fn from(err: IdentityError) -> Self {
        LifecycleError::SigningFailed(err.to_string())
    }
}

pub type LifecycleResult = Result<Job, LifecycleError>;

struct CachedJob {
    job: Job,
    fetched_at: Instant,
}

/// Orchestrates the job lifecycle: read-through job cache, phase-machine
/// validation, signed submission through the ledger gateway, and
/// reconciliation of acknowledgments into local state.
///
/// Construct one per process and share it via `Arc`; mutating operations
/// against the same job id are serialized internally, different job ids
/// proceed in parallel.
pub struct JobLifecycleClient {
    config: ClientConfig,
    identity: Arc<Identity>,
    gateway: Arc<dyn LedgerGateway>,
    jobs: Arc<RwLock<HashMap<u64, CachedJob>>>,
    job_locks: Arc<RwLock<HashMap<u64, Arc<Mutex<()>>>>>,
}

impl JobLifecycleClient {
    pub fn new(config: ClientConfig, identity: Identity, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            config,
            identity: Arc::new(identity),
            gateway,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            job_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Accept or reject a job offer identified by `memo_id`.
    ///
    /// `reason` is recorded as the response memo content. Submitting the same
    /// response twice is a no-op returning the current snapshot.
    pub async fn respond_job(
        &self,
        job_id: u64,
        accept: bool,
        memo_id: u64,
        reason: &str,
    ) -> LifecycleResult {
        let lock = self.job_lock(job_id).await;
        let _guard = lock.lock().await;

        let job = self.fetch_current(job_id).await?;

        let requested = if accept {
            JobPhase::Accepted
        } else {
            JobPhase::Rejected
        };
        if job.phase == requested {
            debug!(job_id, phase = ?job.phase, "response already recorded, skipping submission");
            return Ok(job);
        }

        phase::validate_respond(&job, accept, memo_id)?;

        let payload = OperationPayload::Respond {
            job_id,
            accept,
            memo_id,
            reason: reason.to_string(),
        };
        let receipt = self.submit(payload).await?;

        let memo = Memo {
            id: receipt.memo_id.unwrap_or_else(|| job.next_memo_id()),
            author: self.identity.address(),
            content: reason.to_string(),
            created_at: Utc::now(),
        };
        let updated = self.reconcile(job, receipt.new_phase, Some(memo), None).await;
        info!(job_id, accept, phase = ?updated.phase, "job response recorded");
        Ok(updated)
    }

    /// Submit the deliverable for a job with an accepted agreement.
    ///
    /// Resubmitting against a job already at `Delivered` is a no-op returning
    /// the current snapshot.
    pub async fn deliver_job(&self, job_id: u64, payload: DeliverablePayload) -> LifecycleResult {
        // Purely local check; an empty payload never reaches the network,
        // whatever state the job is in.
        if payload.is_blank() {
            return Err(LifecycleError::EmptyDeliverable);
        }

        let lock = self.job_lock(job_id).await;
        let _guard = lock.lock().await;

        let job = self.fetch_current(job_id).await?;

        if job.phase == JobPhase::Delivered {
            debug!(job_id, "deliverable already recorded, skipping submission");
            return Ok(job);
        }

        phase::validate_deliver(&job, &payload)?;

        let deliverable = Deliverable {
            job_id,
            payload,
            submitted_at: Utc::now(),
        };
        let operation = OperationPayload::Deliver {
            job_id,
            deliverable: deliverable.clone(),
        };
        let receipt = self.submit(operation).await?;

        let updated = self
            .reconcile(job, receipt.new_phase, None, Some(deliverable))
            .await;
        info!(job_id, phase = ?updated.phase, "deliverable recorded");
        Ok(updated)
    }

    /// Read path: cached snapshot if fresh, otherwise fetched from the ledger.
    pub async fn get_job(&self, job_id: u64) -> LifecycleResult {
        self.fetch_current(job_id).await
    }

    /// Like [`respond_job`](Self::respond_job) but retries transient gateway
    /// failures. Validation errors and ledger rejections are never retried,
    /// and every retry re-validates against freshly fetched state.
    pub async fn respond_job_with_retry(
        &self,
        job_id: u64,
        accept: bool,
        memo_id: u64,
        reason: &str,
    ) -> LifecycleResult {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.config.submit_retry_attempts {
            match self.respond_job(job_id, accept, memo_id, reason).await {
                Ok(job) => return Ok(job),
                Err(e) => {
                    match &e {
                        LifecycleError::GatewayUnavailable(_) => {}
                        _ => return Err(e),
                    }
                    warn!(job_id, attempt = attempts + 1, error = %e, "respond_job attempt failed");
                    last_error = Some(e);
                    attempts += 1;
                    if attempts < self.config.submit_retry_attempts {
                        sleep(self.config.submit_retry_delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LifecycleError::GatewayUnavailable("retries exhausted".to_string())))
    }

    /// Retry wrapper around [`deliver_job`](Self::deliver_job), same policy as
    /// [`respond_job_with_retry`](Self::respond_job_with_retry).
    pub async fn deliver_job_with_retry(
        &self,
        job_id: u64,
        payload: DeliverablePayload,
    ) -> LifecycleResult {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.config.submit_retry_attempts {
            match self.deliver_job(job_id, payload.clone()).await {
                Ok(job) => return Ok(job),
                Err(e) => {
                    match &e {
                        LifecycleError::GatewayUnavailable(_) => {}
                        _ => return Err(e),
                    }
                    warn!(job_id, attempt = attempts + 1, error = %e, "deliver_job attempt failed");
                    last_error = Some(e);
                    attempts += 1;
                    if attempts < self.config.submit_retry_attempts {
                        sleep(self.config.submit_retry_delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LifecycleError::GatewayUnavailable("retries exhausted".to_string())))
    }

    async fn job_lock(&self, job_id: u64) -> Arc<Mutex<()>> {
        if let Some(lock) = self.job_locks.read().await.get(&job_id) {
            return lock.clone();
        }
        self.job_locks
            .write()
            .await
            .entry(job_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn fetch_current(&self, job_id: u64) -> LifecycleResult {
        {
            let jobs = self.jobs.read().await;
            if let Some(cached) = jobs.get(&job_id) {
                if cached.fetched_at.elapsed() < self.config.cache_staleness {
                    return Ok(cached.job.clone());
                }
            }
        }

        let job = self
            .gateway
            .fetch_job(job_id)
            .await
            .map_err(LifecycleError::from)?
            .ok_or(LifecycleError::JobNotFound(job_id))?;

        self.jobs.write().await.insert(
            job_id,
            CachedJob {
                job: job.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(job)
    }

    /// Sign and submit one operation. On a transient failure the outcome is
    /// unknown, so the cache entry is evicted to force a fresh `get_job`
    /// before any retry.
    async fn submit(&self, payload: OperationPayload) -> Result<SubmitReceipt, LifecycleError> {
        let job_id = payload.job_id();
        let bytes = payload
            .canonical_bytes()
            .map_err(|e| LifecycleError::SigningFailed(format!("failed to encode operation: {}", e)))?;
        let signature = self.identity.sign(&bytes).await?;

        let operation = SignedOperation {
            payload,
            signer: self.identity.address(),
            session_entity_id: self.identity.session_entity_id(),
            nonce: Uuid::new_v4(),
            signature,
        };

        match self.gateway.submit_operation(&operation).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                if err.is_transient() {
                    self.jobs.write().await.remove(&job_id);
                    warn!(job_id, error = %err, "submission outcome indeterminate, cache entry evicted");
                }
                Err(err.into())
            }
        }
    }

    /// Fold a ledger acknowledgment into the local cache. Only called after a
    /// confirmed submission; failures never reach this point.
    async fn reconcile(
        &self,
        mut job: Job,
        new_phase: JobPhase,
        memo: Option<Memo>,
        deliverable: Option<Deliverable>,
    ) -> Job {
        job.phase = new_phase;
        if let Some(memo) = memo {
            job.memos.push(memo);
        }
        if let Some(deliverable) = deliverable {
            job.deliverable = Some(deliverable);
        }

        self.jobs.write().await.insert(
            job.id,
            CachedJob {
                job: job.clone(),
                fetched_at: Instant::now(),
            },
        );
        job
    }
}
