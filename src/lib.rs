// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod config;
pub mod deliverable;
pub mod gateway;
pub mod identity;
pub mod lifecycle;
pub mod phase;
pub mod types;

// Re-export main types
pub use config::ClientConfig;
pub use deliverable::{normalize_payload, DeliverableSubmitter};
pub use gateway::{
    GatewayError, HttpLedgerGateway, LedgerGateway, MockLedgerGateway, OperationPayload,
    SignedOperation, SubmitReceipt,
};
pub use identity::{Identity, IdentityError};
pub use lifecycle::{JobLifecycleClient, LifecycleError, LifecycleResult};
pub use phase::{validate_deliver, validate_respond, JobPhase, TransitionError};
pub use types::{Deliverable, DeliverablePayload, Job, Memo};
