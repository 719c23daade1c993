//! # MintFund Multi-Sig Module
//!
//! Two-manager approval workflow for privileged treasury operations:
//! token creation, minting, burning, and interest-rate changes.
//!
//! ## Guarantees
//! - Exactly `required_signatures` (2) distinct registered managers must
//!   sign before execution; a manager cannot self-approve twice
//! - 24h expiry, checked lazily on access (no timers)
//! - At-most-once execution: the ledger call happens only on the
//!   transition into `approved`, via an idempotent step keyed by request id
//! - Concurrent approvals on one request serialize through an optimistic
//!   version check; approvals on different requests are independent

mod request;
mod store;
mod workflow;

pub use request::{MultiSigRequest, RecordedSignature, RequestStatus, RequestType};
pub use store::{RequestStore, StoreError};
pub use workflow::{
    ExecError, ExecuteRequest, ExecutionOutcome, MultiSigWorkflow, WorkflowConfig,
    WorkflowError, WorkflowStats,
};
