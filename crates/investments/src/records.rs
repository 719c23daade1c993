//! Investment, transaction and token records

use chrono::{DateTime, Utc};
use mintfund_core::{Amount, TokenUnits};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of an investment position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestmentStatus {
    /// Recorded, token transfer not yet confirmed
    Pending,
    /// Tokens delivered; accruing interest
    Active,
    /// Tokens returned, payout recorded
    Redeemed,
    /// Token transfer failed; diagnostics on the audit transaction
    Failed,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "pending",
            InvestmentStatus::Active => "active",
            InvestmentStatus::Redeemed => "redeemed",
            InvestmentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvestmentStatus::Pending),
            "active" => Some(InvestmentStatus::Active),
            "redeemed" => Some(InvestmentStatus::Redeemed),
            "failed" => Some(InvestmentStatus::Failed),
            _ => None,
        }
    }
}

/// An investor's position: principal held 1:1 against delivered tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    /// Unique identifier ("INV-XXXXXXXX")
    pub id: String,

    /// Investor's ledger account
    pub owner: String,

    pub principal: Amount,

    /// Tokens delivered at the 1:1 peg
    pub token_amount: TokenUnits,

    pub invested_at: DateTime<Utc>,

    /// Annual rate (percent) at open. Audit snapshot only: accrual is
    /// always valued at the pool's current rate.
    pub rate_at_open: Decimal,

    pub status: InvestmentStatus,

    pub redeemed_at: Option<DateTime<Utc>>,
    pub redemption_amount: Option<Amount>,

    /// Ledger reference for the token delivery
    pub mint_tx_ref: Option<String>,
    /// Ledger reference for the token return
    pub redeem_tx_ref: Option<String>,
}

impl Investment {
    pub fn new(owner: &str, principal: Amount, token_amount: TokenUnits, rate_pct: Decimal) -> Self {
        Self {
            id: format!(
                "INV-{}",
                uuid::Uuid::new_v4().to_string()[..8].to_uppercase()
            ),
            owner: owner.to_string(),
            principal,
            token_amount,
            invested_at: Utc::now(),
            rate_at_open: rate_pct,
            status: InvestmentStatus::Pending,
            redeemed_at: None,
            redemption_amount: None,
            mint_tx_ref: None,
            redeem_tx_ref: None,
        }
    }
}

/// Kind of audit transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    InterestPayment,
    Fee,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::InterestPayment => "interest_payment",
            TransactionKind::Fee => "fee",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            "interest_payment" => Some(TransactionKind::InterestPayment),
            "fee" => Some(TransactionKind::Fee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Immutable audit record of a money or token movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier ("TXN-XXXXXXXX")
    pub id: String,

    pub kind: TransactionKind,

    pub amount_fiat: Amount,
    pub token_amount: TokenUnits,

    pub status: TransactionStatus,

    pub investment_id: String,

    /// Ledger transaction reference, once committed
    pub ledger_ref: Option<String>,

    /// Failure diagnostics and other structured context
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount_fiat: Amount,
        token_amount: TokenUnits,
        investment_id: &str,
    ) -> Self {
        Self {
            id: format!(
                "TXN-{}",
                uuid::Uuid::new_v4().to_string()[..8].to_uppercase()
            ),
            kind,
            amount_fiat,
            token_amount,
            status: TransactionStatus::Pending,
            investment_id: investment_id.to_string(),
            ledger_ref: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }
}

/// The fund token singleton, created exactly once through multi-sig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_id: String,
    pub treasury_account: String,
    pub decimals: u32,
    /// The two administrative accounts whose keys gate treasury operations
    pub manager_accounts: Vec<String>,
    /// Ledger reference for the creation transaction
    pub creation_ref: String,
    pub is_active: bool,
    /// Tracked supply in smallest units, adjusted by mint/burn executions
    pub total_supply: TokenUnits,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_investment_is_pending() {
        let inv = Investment::new(
            "0.0.200",
            Amount::new(dec!(1000)).unwrap(),
            TokenUnits::new(100_000),
            dec!(8.5),
        );

        assert!(inv.id.starts_with("INV-"));
        assert_eq!(inv.status, InvestmentStatus::Pending);
        assert_eq!(inv.rate_at_open, dec!(8.5));
        assert!(inv.mint_tx_ref.is_none());
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let txn = Transaction::new(
            TransactionKind::Deposit,
            Amount::new(dec!(1000)).unwrap(),
            TokenUnits::new(100_000),
            "INV-AAAA1111",
        );

        assert!(txn.id.starts_with("TXN-"));
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert_eq!(txn.metadata, serde_json::Value::Null);
    }

    #[test]
    fn test_status_string_mappings() {
        for status in [
            InvestmentStatus::Pending,
            InvestmentStatus::Active,
            InvestmentStatus::Redeemed,
            InvestmentStatus::Failed,
        ] {
            assert_eq!(InvestmentStatus::parse(status.as_str()), Some(status));
        }
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Withdrawal,
            TransactionKind::InterestPayment,
            TransactionKind::Fee,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionStatus::parse("bogus"), None);
    }
}
