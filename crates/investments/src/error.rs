//! Investment ledger errors

use crate::records::InvestmentStatus;
use crate::store::StoreError;
use mintfund_core::UnitsError;
use mintfund_gateway::GatewayError;
use mintfund_interest::InterestError;
use thiserror::Error;

/// Errors from investment orchestration
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Interest calculation error: {0}")]
    Interest(#[from] InterestError),

    #[error("Token conversion error: {0}")]
    Units(#[from] UnitsError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Investment not found: {0}")]
    NotFound(String),

    #[error("Investment {id} is {status} and cannot be redeemed", status = .status.as_str())]
    InvalidState { id: String, status: InvestmentStatus },

    #[error("The fund token has not been created yet")]
    TokenNotCreated,
}
