//! # MintFund Investments
//!
//! The investment ledger ties the interest engine and the multi-sig
//! workflow to token movements on the external ledger:
//!
//! - `InvestmentLedger`: open (deposit -> 1:1 token transfer), redeem
//!   (token return -> principal + accrued interest payout), portfolio
//!   valuation. Request-scoped orchestration, no background schedulers.
//! - `TreasuryExecutor`: carries out approved multi-sig requests (token
//!   creation/mint/burn against the gateway, rate changes against the
//!   interest engine).
//! - `InvestmentStore`: SQLite persistence for investments, audit
//!   transactions, the token singleton and the current rate.

mod error;
mod executor;
mod ledger;
mod records;
mod store;

pub use error::LedgerError;
pub use executor::{TreasuryConfig, TreasuryExecutor};
pub use ledger::{InvestmentLedger, Redemption};
pub use records::{
    Investment, InvestmentStatus, TokenRecord, Transaction, TransactionKind, TransactionStatus,
};
pub use store::{InvestmentStore, StoreError};
