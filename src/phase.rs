//! Job phase machine.
//!
//! Pure validation of phase transitions: given a job snapshot and a requested
//! action, either the target phase or a [`TransitionError`]. No I/O happens
//! here, which keeps the transition logic testable without network mocks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DeliverablePayload, Job};

/// Authoritative lifecycle phase of a job as recorded by the ledger.
///
/// `Request → Negotiation → Accepted → InProgress → Delivered → Completed`,
/// with `Rejected` reachable from the two pre-agreement phases and
/// `Expired`/`Disputed` reachable from any non-terminal phase per ledger-side
/// rules. The client treats all terminal phases as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Request,
    Negotiation,
    Accepted,
    InProgress,
    Delivered,
    Completed,
    Rejected,
    Expired,
    Disputed,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Completed | JobPhase::Rejected | JobPhase::Expired | JobPhase::Disputed
        )
    }

    /// Phases from which an accept/reject response is still legal.
    pub fn can_respond(&self) -> bool {
        matches!(self, JobPhase::Request | JobPhase::Negotiation)
    }

    /// Phases from which a deliverable submission is legal.
    pub fn can_deliver(&self) -> bool {
        matches!(self, JobPhase::Accepted | JobPhase::InProgress)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal transition: job in phase {from:?} cannot move to {requested:?}")]
    IllegalTransition { from: JobPhase, requested: JobPhase },

    #[error("memo {0} not found on job")]
    UnknownMemo(u64),

    #[error("deliverable payload is empty")]
    EmptyDeliverable,
}

/// Validate an accept/reject response against the job's current phase.
///
/// Legal only while the job is still in `Request` or `Negotiation`; `memo_id`
/// must reference the offer memo being answered.
pub fn validate_respond(job: &Job, accept: bool, memo_id: u64) -> Result<JobPhase, TransitionError> {
    let requested = if accept {
        JobPhase::Accepted
    } else {
        JobPhase::Rejected
    };

    if !job.phase.can_respond() {
        return Err(TransitionError::IllegalTransition {
            from: job.phase,
            requested,
        });
    }

    if job.memo(memo_id).is_none() {
        return Err(TransitionError::UnknownMemo(memo_id));
    }

    Ok(requested)
}

/// Validate a deliverable submission against the job's current phase.
///
/// The payload check runs first so an empty deliverable fails the same way in
/// every phase.
pub fn validate_deliver(
    job: &Job,
    payload: &DeliverablePayload,
) -> Result<JobPhase, TransitionError> {
    if payload.is_blank() {
        return Err(TransitionError::EmptyDeliverable);
    }

    if !job.phase.can_deliver() {
        return Err(TransitionError::IllegalTransition {
            from: job.phase,
            requested: JobPhase::Delivered,
        });
    }

    Ok(JobPhase::Delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Memo;
    use chrono::Utc;
    use ethers::types::Address;

    const ALL_PHASES: [JobPhase; 9] = [
        JobPhase::Request,
        JobPhase::Negotiation,
        JobPhase::Accepted,
        JobPhase::InProgress,
        JobPhase::Delivered,
        JobPhase::Completed,
        JobPhase::Rejected,
        JobPhase::Expired,
        JobPhase::Disputed,
    ];

    fn job_in_phase(phase: JobPhase) -> Job {
        Job {
            id: 42,
            phase,
            counterparty: Address::zero(),
            memos: vec![Memo {
                id: 101,
                author: Address::zero(),
                content: "offer".to_string(),
                created_at: Utc::now(),
            }],
            deliverable: None,
        }
    }

    #[test]
    fn test_respond_legal_phases() {
        for phase in [JobPhase::Request, JobPhase::Negotiation] {
            let job = job_in_phase(phase);
            assert_eq!(validate_respond(&job, true, 101), Ok(JobPhase::Accepted));
            assert_eq!(validate_respond(&job, false, 101), Ok(JobPhase::Rejected));
        }
    }

    #[test]
    fn test_respond_illegal_past_negotiation() {
        for phase in ALL_PHASES {
            if phase.can_respond() {
                continue;
            }
            let job = job_in_phase(phase);
            let err = validate_respond(&job, true, 101).unwrap_err();
            assert!(matches!(err, TransitionError::IllegalTransition { .. }));
        }
    }

    #[test]
    fn test_respond_unknown_memo() {
        let job = job_in_phase(JobPhase::Request);
        assert_eq!(
            validate_respond(&job, true, 999),
            Err(TransitionError::UnknownMemo(999))
        );
    }

    #[test]
    fn test_deliver_legal_phases() {
        let payload = DeliverablePayload::Uri("https://ipfs.io/ipfs/xyz".to_string());
        for phase in [JobPhase::Accepted, JobPhase::InProgress] {
            let job = job_in_phase(phase);
            assert_eq!(validate_deliver(&job, &payload), Ok(JobPhase::Delivered));
        }
    }

    #[test]
    fn test_deliver_illegal_without_agreement() {
        let payload = DeliverablePayload::Text("done".to_string());
        for phase in ALL_PHASES {
            if phase.can_deliver() {
                continue;
            }
            let job = job_in_phase(phase);
            let err = validate_deliver(&job, &payload).unwrap_err();
            assert!(matches!(err, TransitionError::IllegalTransition { .. }));
        }
    }

    #[test]
    fn test_deliver_empty_payload_any_phase() {
        let payload = DeliverablePayload::Text("   ".to_string());
        for phase in ALL_PHASES {
            let job = job_in_phase(phase);
            assert_eq!(
                validate_deliver(&job, &payload),
                Err(TransitionError::EmptyDeliverable)
            );
        }
    }

    #[test]
    fn test_terminal_phase_set() {
        for phase in ALL_PHASES {
            let terminal = matches!(
                phase,
                JobPhase::Completed | JobPhase::Rejected | JobPhase::Expired | JobPhase::Disputed
            );
            assert_eq!(phase.is_terminal(), terminal);
        }
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&JobPhase::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let phase: JobPhase = serde_json::from_str("\"NEGOTIATION\"").unwrap();
        assert_eq!(phase, JobPhase::Negotiation);
    }
}
