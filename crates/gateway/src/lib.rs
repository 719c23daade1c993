//! MintFund Ledger Gateway - External collaborator contract
//!
//! The distributed ledger (token create/mint/burn/transfer/associate/query)
//! is an opaque remote service. This crate defines the call contract the
//! core depends on, and a mock implementation for tests.
//!
//! Every operation is remote and may fail transiently or permanently.
//! Callers treat any failure as terminal for the current workflow step:
//! no automatic retry, local state rolls to a failed/rejected marker.

pub mod error;
pub mod mock;
pub mod types;

pub use error::GatewayError;
pub use mock::MockLedger;
pub use types::{
    LedgerGateway, LedgerReceipt, SignerKey, TokenCreation, TokenInfo, TokenSpec,
};
