//! Gateway types and the LedgerGateway trait

use crate::error::GatewayError;
use async_trait::async_trait;
use mintfund_core::TokenUnits;
use serde::{Deserialize, Serialize};

/// Opaque reference to a signing key held by the ledger integration.
///
/// Key material never enters the core; privileged operations name the keys
/// that must co-sign and the integration layer resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerKey(pub String);

impl SignerKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Parameters for token creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    /// Initial supply in smallest units, credited to the treasury
    pub initial_supply: TokenUnits,
    pub treasury_account: String,
}

/// Result of a successful token creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCreation {
    pub token_id: String,
    pub treasury_account: String,
    pub tx_ref: String,
}

/// Receipt for a committed ledger operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub tx_ref: String,
    pub status: String,
}

/// Read-only token state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub total_supply: TokenUnits,
    pub treasury_account: String,
}

/// Contract for the external distributed-ledger token service.
///
/// `create_token`, `mint` and `burn` require both administrative keys to
/// co-sign before submission. `transfer` is signed by the sender unless the
/// sender is the treasury. `associate` is required once per recipient
/// account before it can hold balance.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn create_token(
        &self,
        spec: &TokenSpec,
        signers: &[SignerKey; 2],
    ) -> Result<TokenCreation, GatewayError>;

    async fn mint(
        &self,
        token_id: &str,
        amount: TokenUnits,
        signers: &[SignerKey; 2],
    ) -> Result<LedgerReceipt, GatewayError>;

    async fn burn(
        &self,
        token_id: &str,
        amount: TokenUnits,
        signers: &[SignerKey; 2],
    ) -> Result<LedgerReceipt, GatewayError>;

    async fn transfer(
        &self,
        token_id: &str,
        from: &str,
        to: &str,
        amount: TokenUnits,
        signer: Option<&SignerKey>,
    ) -> Result<LedgerReceipt, GatewayError>;

    async fn associate(
        &self,
        account_id: &str,
        token_id: &str,
        signer: &SignerKey,
    ) -> Result<LedgerReceipt, GatewayError>;

    async fn query_balance(
        &self,
        account_id: &str,
        token_id: &str,
    ) -> Result<TokenUnits, GatewayError>;

    async fn query_token_info(&self, token_id: &str) -> Result<TokenInfo, GatewayError>;
}
