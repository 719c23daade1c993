//! Gateway errors

use thiserror::Error;

/// Failures surfaced by the external ledger.
///
/// `Rejected` wraps the underlying network/business status code verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Ledger rejected {operation}: {status}")]
    Rejected { operation: String, status: String },

    #[error("Ledger transport failure: {0}")]
    Transport(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Account {account} is not associated with token {token_id}")]
    NotAssociated { account: String, token_id: String },

    #[error("Insufficient balance in {account}: available {available}, required {required}")]
    InsufficientBalance {
        account: String,
        available: i64,
        required: i64,
    },
}
