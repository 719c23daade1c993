//! Mock ledger for testing
//!
//! In-memory token registry with balances, associations, scriptable
//! one-shot failures and per-operation call counters. The counters let
//! tests assert at-most-once execution of irreversible operations.

use async_trait::async_trait;
use mintfund_core::TokenUnits;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::GatewayError;
use crate::types::{
    LedgerGateway, LedgerReceipt, SignerKey, TokenCreation, TokenInfo, TokenSpec,
};

#[derive(Default)]
struct MockState {
    tokens: HashMap<String, TokenInfo>,
    /// (token_id, account_id) -> balance in smallest units
    balances: HashMap<(String, String), i64>,
    associations: HashSet<(String, String)>,
    /// One-shot scripted failures keyed by operation name
    failures: HashMap<&'static str, GatewayError>,
    calls: HashMap<&'static str, usize>,
    next_token: u64,
}

/// Mock ledger gateway for tests
pub struct MockLedger {
    state: RwLock<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState::default()),
        }
    }

    /// Script the next call to `operation` ("create_token", "mint", "burn",
    /// "transfer", "associate") to fail with the given error.
    pub fn fail_next(&self, operation: &'static str, error: GatewayError) {
        self.state.write().unwrap().failures.insert(operation, error);
    }

    /// Number of times `operation` has been invoked (including failures)
    pub fn call_count(&self, operation: &str) -> usize {
        *self.state.read().unwrap().calls.get(operation).unwrap_or(&0)
    }

    /// Register an existing token with its treasury balance.
    ///
    /// Used to rehydrate the in-memory ledger from persisted records when
    /// the mock stands in for the external service across process restarts.
    pub fn seed_token(&self, info: TokenInfo) {
        let mut state = self.state.write().unwrap();
        state
            .associations
            .insert((info.token_id.clone(), info.treasury_account.clone()));
        state.balances.insert(
            (info.token_id.clone(), info.treasury_account.clone()),
            info.total_supply.raw(),
        );
        state.tokens.insert(info.token_id.clone(), info);
    }

    /// Current balance without going through the async trait (test helper)
    pub fn balance_of(&self, token_id: &str, account_id: &str) -> i64 {
        *self
            .state
            .read()
            .unwrap()
            .balances
            .get(&(token_id.to_string(), account_id.to_string()))
            .unwrap_or(&0)
    }

    fn begin(state: &mut MockState, operation: &'static str) -> Result<(), GatewayError> {
        *state.calls.entry(operation).or_insert(0) += 1;
        if let Some(error) = state.failures.remove(operation) {
            return Err(error);
        }
        Ok(())
    }

    fn tx_ref() -> String {
        format!("tx-{}", uuid::Uuid::new_v4())
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn create_token(
        &self,
        spec: &TokenSpec,
        _signers: &[SignerKey; 2],
    ) -> Result<TokenCreation, GatewayError> {
        let mut state = self.state.write().unwrap();
        Self::begin(&mut state, "create_token")?;

        state.next_token += 1;
        let token_id = format!("0.0.{}", 1000 + state.next_token);

        state.tokens.insert(
            token_id.clone(),
            TokenInfo {
                token_id: token_id.clone(),
                name: spec.name.clone(),
                symbol: spec.symbol.clone(),
                decimals: spec.decimals,
                total_supply: spec.initial_supply,
                treasury_account: spec.treasury_account.clone(),
            },
        );
        state.associations.insert((token_id.clone(), spec.treasury_account.clone()));
        state.balances.insert(
            (token_id.clone(), spec.treasury_account.clone()),
            spec.initial_supply.raw(),
        );

        Ok(TokenCreation {
            token_id,
            treasury_account: spec.treasury_account.clone(),
            tx_ref: Self::tx_ref(),
        })
    }

    async fn mint(
        &self,
        token_id: &str,
        amount: TokenUnits,
        _signers: &[SignerKey; 2],
    ) -> Result<LedgerReceipt, GatewayError> {
        let mut state = self.state.write().unwrap();
        Self::begin(&mut state, "mint")?;

        let treasury = {
            let token = state
                .tokens
                .get_mut(token_id)
                .ok_or_else(|| GatewayError::UnknownToken(token_id.to_string()))?;
            token.total_supply = token
                .total_supply
                .checked_add(amount)
                .ok_or_else(|| GatewayError::Rejected {
                    operation: "mint".to_string(),
                    status: "SUPPLY_OVERFLOW".to_string(),
                })?;
            token.treasury_account.clone()
        };

        *state
            .balances
            .entry((token_id.to_string(), treasury))
            .or_insert(0) += amount.raw();

        Ok(LedgerReceipt {
            tx_ref: Self::tx_ref(),
            status: "SUCCESS".to_string(),
        })
    }

    async fn burn(
        &self,
        token_id: &str,
        amount: TokenUnits,
        _signers: &[SignerKey; 2],
    ) -> Result<LedgerReceipt, GatewayError> {
        let mut state = self.state.write().unwrap();
        Self::begin(&mut state, "burn")?;

        let treasury = state
            .tokens
            .get(token_id)
            .ok_or_else(|| GatewayError::UnknownToken(token_id.to_string()))?
            .treasury_account
            .clone();

        let key = (token_id.to_string(), treasury.clone());
        let available = *state.balances.get(&key).unwrap_or(&0);
        if available < amount.raw() {
            return Err(GatewayError::InsufficientBalance {
                account: treasury,
                available,
                required: amount.raw(),
            });
        }

        *state.balances.entry(key).or_insert(0) -= amount.raw();
        if let Some(token) = state.tokens.get_mut(token_id) {
            token.total_supply = token
                .total_supply
                .checked_sub(amount)
                .unwrap_or(TokenUnits::ZERO);
        }

        Ok(LedgerReceipt {
            tx_ref: Self::tx_ref(),
            status: "SUCCESS".to_string(),
        })
    }

    async fn transfer(
        &self,
        token_id: &str,
        from: &str,
        to: &str,
        amount: TokenUnits,
        _signer: Option<&SignerKey>,
    ) -> Result<LedgerReceipt, GatewayError> {
        let mut state = self.state.write().unwrap();
        Self::begin(&mut state, "transfer")?;

        if !state.tokens.contains_key(token_id) {
            return Err(GatewayError::UnknownToken(token_id.to_string()));
        }

        let to_key = (token_id.to_string(), to.to_string());
        if !state.associations.contains(&to_key) {
            return Err(GatewayError::NotAssociated {
                account: to.to_string(),
                token_id: token_id.to_string(),
            });
        }

        let from_key = (token_id.to_string(), from.to_string());
        let available = *state.balances.get(&from_key).unwrap_or(&0);
        if available < amount.raw() {
            return Err(GatewayError::InsufficientBalance {
                account: from.to_string(),
                available,
                required: amount.raw(),
            });
        }

        *state.balances.entry(from_key).or_insert(0) -= amount.raw();
        *state.balances.entry(to_key).or_insert(0) += amount.raw();

        Ok(LedgerReceipt {
            tx_ref: Self::tx_ref(),
            status: "SUCCESS".to_string(),
        })
    }

    async fn associate(
        &self,
        account_id: &str,
        token_id: &str,
        _signer: &SignerKey,
    ) -> Result<LedgerReceipt, GatewayError> {
        let mut state = self.state.write().unwrap();
        Self::begin(&mut state, "associate")?;

        if !state.tokens.contains_key(token_id) {
            return Err(GatewayError::UnknownToken(token_id.to_string()));
        }

        let fresh = state
            .associations
            .insert((token_id.to_string(), account_id.to_string()));

        Ok(LedgerReceipt {
            tx_ref: Self::tx_ref(),
            status: if fresh { "SUCCESS" } else { "ALREADY_ASSOCIATED" }.to_string(),
        })
    }

    async fn query_balance(
        &self,
        account_id: &str,
        token_id: &str,
    ) -> Result<TokenUnits, GatewayError> {
        let state = self.state.read().unwrap();
        if !state.tokens.contains_key(token_id) {
            return Err(GatewayError::UnknownToken(token_id.to_string()));
        }
        Ok(TokenUnits::new(
            *state
                .balances
                .get(&(token_id.to_string(), account_id.to_string()))
                .unwrap_or(&0),
        ))
    }

    async fn query_token_info(&self, token_id: &str) -> Result<TokenInfo, GatewayError> {
        let state = self.state.read().unwrap();
        state
            .tokens
            .get(token_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownToken(token_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signers() -> [SignerKey; 2] {
        [SignerKey::new("manager1-key"), SignerKey::new("manager2-key")]
    }

    fn spec() -> TokenSpec {
        TokenSpec {
            name: "MintFund Token".to_string(),
            symbol: "MMF".to_string(),
            decimals: 2,
            initial_supply: TokenUnits::new(1_000_000),
            treasury_account: "0.0.100".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_query() {
        let ledger = MockLedger::new();

        let created = ledger.create_token(&spec(), &signers()).await.unwrap();
        let info = ledger.query_token_info(&created.token_id).await.unwrap();

        assert_eq!(info.symbol, "MMF");
        assert_eq!(info.total_supply, TokenUnits::new(1_000_000));
        assert_eq!(ledger.balance_of(&created.token_id, "0.0.100"), 1_000_000);
    }

    #[tokio::test]
    async fn test_mint_and_burn_adjust_supply() {
        let ledger = MockLedger::new();
        let created = ledger.create_token(&spec(), &signers()).await.unwrap();

        ledger
            .mint(&created.token_id, TokenUnits::new(500), &signers())
            .await
            .unwrap();
        ledger
            .burn(&created.token_id, TokenUnits::new(200), &signers())
            .await
            .unwrap();

        let info = ledger.query_token_info(&created.token_id).await.unwrap();
        assert_eq!(info.total_supply, TokenUnits::new(1_000_300));
    }

    #[tokio::test]
    async fn test_burn_more_than_treasury_rejected() {
        let ledger = MockLedger::new();
        let created = ledger.create_token(&spec(), &signers()).await.unwrap();

        let result = ledger
            .burn(&created.token_id, TokenUnits::new(2_000_000), &signers())
            .await;
        assert!(matches!(result, Err(GatewayError::InsufficientBalance { .. })));
    }

    #[tokio::test]
    async fn test_transfer_requires_association() {
        let ledger = MockLedger::new();
        let created = ledger.create_token(&spec(), &signers()).await.unwrap();

        let result = ledger
            .transfer(&created.token_id, "0.0.100", "0.0.200", TokenUnits::new(100), None)
            .await;
        assert!(matches!(result, Err(GatewayError::NotAssociated { .. })));

        ledger
            .associate("0.0.200", &created.token_id, &SignerKey::new("user-key"))
            .await
            .unwrap();
        ledger
            .transfer(&created.token_id, "0.0.100", "0.0.200", TokenUnits::new(100), None)
            .await
            .unwrap();

        assert_eq!(ledger.balance_of(&created.token_id, "0.0.200"), 100);
    }

    #[tokio::test]
    async fn test_scripted_failure_consumed_once() {
        let ledger = MockLedger::new();
        let created = ledger.create_token(&spec(), &signers()).await.unwrap();

        ledger.fail_next(
            "mint",
            GatewayError::Rejected {
                operation: "mint".to_string(),
                status: "TIMEOUT".to_string(),
            },
        );

        let first = ledger
            .mint(&created.token_id, TokenUnits::new(10), &signers())
            .await;
        assert!(matches!(first, Err(GatewayError::Rejected { .. })));

        let second = ledger
            .mint(&created.token_id, TokenUnits::new(10), &signers())
            .await;
        assert!(second.is_ok());
        assert_eq!(ledger.call_count("mint"), 2);
    }
}
