//! Treasury executor: carries out approved multi-sig requests
//!
//! Dispatch per request type: token_creation/mint/burn go to the ledger
//! gateway under the two administrative keys; rate_change applies to the
//! interest engine and persists the new rate. interest_distribution is a
//! reserved type with no executor wired.

use crate::records::TokenRecord;
use crate::store::{InvestmentStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use mintfund_core::{Amount, TokenUnits};
use mintfund_gateway::{LedgerGateway, SignerKey, TokenSpec};
use mintfund_interest::InterestEngine;
use mintfund_multisig::{ExecError, ExecuteRequest, ExecutionOutcome, MultiSigRequest, RequestType};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Static treasury configuration: the administrative key pair and the
/// manager accounts recorded on the token.
#[derive(Debug, Clone)]
pub struct TreasuryConfig {
    pub manager_accounts: Vec<String>,
    pub signer_keys: [SignerKey; 2],
}

/// Payload of a token_creation request
#[derive(Debug, Deserialize)]
struct TokenCreationPayload {
    name: String,
    symbol: String,
    decimals: u32,
    /// Initial supply as a fiat-equivalent amount (1:1 peg)
    initial_supply: Decimal,
    treasury_account: String,
}

/// Payload of a token_mint / token_burn request
#[derive(Debug, Deserialize)]
struct SupplyChangePayload {
    /// Fiat-equivalent amount (1:1 peg)
    amount: Decimal,
}

/// Payload of a rate_change request
#[derive(Debug, Deserialize)]
struct RateChangePayload {
    rate_pct: Decimal,
}

/// Executes approved treasury requests against the gateway and engine
pub struct TreasuryExecutor {
    store: Arc<InvestmentStore>,
    engine: Arc<InterestEngine>,
    gateway: Arc<dyn LedgerGateway>,
    config: TreasuryConfig,
}

impl TreasuryExecutor {
    pub fn new(
        store: Arc<InvestmentStore>,
        engine: Arc<InterestEngine>,
        gateway: Arc<dyn LedgerGateway>,
        config: TreasuryConfig,
    ) -> Self {
        Self {
            store,
            engine,
            gateway,
            config,
        }
    }

    fn parse_payload<T: serde::de::DeserializeOwned>(
        request: &MultiSigRequest,
    ) -> Result<T, ExecError> {
        serde_json::from_value(request.payload.clone())
            .map_err(|e| ExecError::Failed(format!("malformed payload: {e}")))
    }

    fn require_token(&self) -> Result<TokenRecord, ExecError> {
        self.store
            .token()
            .map_err(store_failed)?
            .ok_or_else(|| ExecError::Failed("the fund token has not been created yet".to_string()))
    }

    /// Fiat amount -> smallest units at the token's precision
    fn to_units(amount: Decimal, decimals: u32) -> Result<TokenUnits, ExecError> {
        let amount = Amount::new(amount)
            .map_err(|e| ExecError::Failed(format!("invalid amount: {e}")))?;
        if amount.is_zero() {
            return Err(ExecError::Failed("amount must be positive".to_string()));
        }
        TokenUnits::from_amount(amount, decimals)
            .map_err(|e| ExecError::Failed(e.to_string()))
    }

    async fn create_token(&self, request: &MultiSigRequest) -> Result<ExecutionOutcome, ExecError> {
        let payload: TokenCreationPayload = Self::parse_payload(request)?;

        if self.store.token().map_err(store_failed)?.is_some() {
            return Err(ExecError::Conflict(
                "the fund token has already been created".to_string(),
            ));
        }

        let initial_units = Self::to_units(payload.initial_supply, payload.decimals)?;
        let spec = TokenSpec {
            name: payload.name,
            symbol: payload.symbol,
            decimals: payload.decimals,
            initial_supply: initial_units,
            treasury_account: payload.treasury_account,
        };

        let created = self
            .gateway
            .create_token(&spec, &self.config.signer_keys)
            .await
            .map_err(gateway_failed)?;

        let record = TokenRecord {
            token_id: created.token_id.clone(),
            treasury_account: created.treasury_account,
            decimals: spec.decimals,
            manager_accounts: self.config.manager_accounts.clone(),
            creation_ref: created.tx_ref.clone(),
            is_active: true,
            total_supply: initial_units,
            created_at: Utc::now(),
        };
        match self.store.insert_token(&record) {
            Ok(()) => {}
            Err(StoreError::TokenExists) => {
                return Err(ExecError::Conflict(
                    "the fund token has already been created".to_string(),
                ))
            }
            Err(e) => return Err(store_failed(e)),
        }

        tracing::info!(token_id = %created.token_id, "fund token created");

        Ok(ExecutionOutcome {
            reference: Some(created.tx_ref),
            detail: json!({ "token_id": created.token_id }),
        })
    }

    async fn mint(&self, request: &MultiSigRequest) -> Result<ExecutionOutcome, ExecError> {
        let payload: SupplyChangePayload = Self::parse_payload(request)?;
        let token = self.require_token()?;
        let units = Self::to_units(payload.amount, token.decimals)?;

        let receipt = self
            .gateway
            .mint(&token.token_id, units, &self.config.signer_keys)
            .await
            .map_err(gateway_failed)?;

        let supply = token
            .total_supply
            .checked_add(units)
            .ok_or_else(|| ExecError::Failed("tracked supply overflow".to_string()))?;
        self.store.set_total_supply(supply).map_err(store_failed)?;

        tracing::info!(
            token_id = %token.token_id,
            minted = units.raw(),
            supply = supply.raw(),
            "supply minted"
        );

        Ok(ExecutionOutcome {
            reference: Some(receipt.tx_ref),
            detail: json!({ "minted_units": units.raw(), "total_supply": supply.raw() }),
        })
    }

    async fn burn(&self, request: &MultiSigRequest) -> Result<ExecutionOutcome, ExecError> {
        let payload: SupplyChangePayload = Self::parse_payload(request)?;
        let token = self.require_token()?;
        let units = Self::to_units(payload.amount, token.decimals)?;

        if units.raw() > token.total_supply.raw() {
            return Err(ExecError::Failed(format!(
                "burn of {} units exceeds tracked supply {}",
                units.raw(),
                token.total_supply.raw()
            )));
        }

        let receipt = self
            .gateway
            .burn(&token.token_id, units, &self.config.signer_keys)
            .await
            .map_err(gateway_failed)?;

        let supply = token
            .total_supply
            .checked_sub(units)
            .unwrap_or(TokenUnits::ZERO);
        self.store.set_total_supply(supply).map_err(store_failed)?;

        tracing::info!(
            token_id = %token.token_id,
            burned = units.raw(),
            supply = supply.raw(),
            "supply burned"
        );

        Ok(ExecutionOutcome {
            reference: Some(receipt.tx_ref),
            detail: json!({ "burned_units": units.raw(), "total_supply": supply.raw() }),
        })
    }

    fn change_rate(&self, request: &MultiSigRequest) -> Result<ExecutionOutcome, ExecError> {
        let payload: RateChangePayload = Self::parse_payload(request)?;

        self.engine
            .update_rate(payload.rate_pct)
            .map_err(|e| ExecError::Failed(e.to_string()))?;
        self.store.save_rate(payload.rate_pct).map_err(store_failed)?;

        Ok(ExecutionOutcome {
            reference: None,
            detail: json!({ "rate_pct": payload.rate_pct.to_string() }),
        })
    }
}

fn gateway_failed(e: mintfund_gateway::GatewayError) -> ExecError {
    ExecError::Failed(e.to_string())
}

fn store_failed(e: StoreError) -> ExecError {
    ExecError::Failed(e.to_string())
}

#[async_trait]
impl ExecuteRequest for TreasuryExecutor {
    async fn validate(&self, request: &MultiSigRequest) -> Result<(), ExecError> {
        match request.request_type {
            RequestType::TokenCreation => {
                Self::parse_payload::<TokenCreationPayload>(request)?;
                if self.store.token().map_err(store_failed)?.is_some() {
                    return Err(ExecError::Conflict(
                        "the fund token has already been created".to_string(),
                    ));
                }
                Ok(())
            }
            RequestType::TokenMint | RequestType::TokenBurn => {
                Self::parse_payload::<SupplyChangePayload>(request).map(|_| ())
            }
            RequestType::RateChange => {
                Self::parse_payload::<RateChangePayload>(request).map(|_| ())
            }
            // Accepted at initiation; fails at execution
            RequestType::InterestDistribution => Ok(()),
        }
    }

    async fn execute(&self, request: &MultiSigRequest) -> Result<ExecutionOutcome, ExecError> {
        match request.request_type {
            RequestType::TokenCreation => self.create_token(request).await,
            RequestType::TokenMint => self.mint(request).await,
            RequestType::TokenBurn => self.burn(request).await,
            RequestType::RateChange => self.change_rate(request),
            RequestType::InterestDistribution => Err(ExecError::NoExecutor(
                "interest_distribution".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mintfund_gateway::MockLedger;
    use rust_decimal_macros::dec;

    fn config() -> TreasuryConfig {
        TreasuryConfig {
            manager_accounts: vec!["0.0.10".to_string(), "0.0.11".to_string()],
            signer_keys: [SignerKey::new("key-m1"), SignerKey::new("key-m2")],
        }
    }

    fn executor() -> (TreasuryExecutor, Arc<InvestmentStore>, Arc<MockLedger>, Arc<InterestEngine>) {
        let store = Arc::new(InvestmentStore::in_memory().unwrap());
        let engine = Arc::new(InterestEngine::default());
        let gateway = Arc::new(MockLedger::new());
        let exec = TreasuryExecutor::new(store.clone(), engine.clone(), gateway.clone(), config());
        (exec, store, gateway, engine)
    }

    fn creation_request() -> MultiSigRequest {
        MultiSigRequest::new(
            RequestType::TokenCreation,
            json!({
                "name": "MintFund Token",
                "symbol": "MMF",
                "decimals": 2,
                "initial_supply": "1000000",
                "treasury_account": "0.0.100"
            }),
            "manager1",
            2,
            24,
        )
    }

    #[tokio::test]
    async fn test_token_creation_records_singleton() {
        let (exec, store, _, _) = executor();

        let outcome = exec.execute(&creation_request()).await.unwrap();
        assert!(outcome.reference.is_some());

        let token = store.token().unwrap().unwrap();
        assert_eq!(token.decimals, 2);
        assert_eq!(token.total_supply.raw(), 100_000_000);
        assert_eq!(token.manager_accounts, vec!["0.0.10", "0.0.11"]);
        assert!(token.is_active);
    }

    #[tokio::test]
    async fn test_creation_with_oversized_decimals_fails_before_gateway() {
        let (exec, store, gateway, _) = executor();

        // A scale of 10^19 cannot be represented in smallest units
        let request = MultiSigRequest::new(
            RequestType::TokenCreation,
            json!({
                "name": "MintFund Token",
                "symbol": "MMF",
                "decimals": 19,
                "initial_supply": "1000000",
                "treasury_account": "0.0.100"
            }),
            "manager1",
            2,
            24,
        );
        let result = exec.execute(&request).await;

        assert!(matches!(result, Err(ExecError::Failed(_))));
        assert_eq!(gateway.call_count("create_token"), 0);
        assert!(store.token().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_creation_conflicts() {
        let (exec, _, _, _) = executor();
        exec.execute(&creation_request()).await.unwrap();

        let result = exec.validate(&creation_request()).await;
        assert!(matches!(result, Err(ExecError::Conflict(_))));

        let result = exec.execute(&creation_request()).await;
        assert!(matches!(result, Err(ExecError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_mint_adjusts_tracked_supply() {
        let (exec, store, gateway, _) = executor();
        exec.execute(&creation_request()).await.unwrap();

        let request = MultiSigRequest::new(
            RequestType::TokenMint,
            json!({"amount": "5000"}),
            "manager1",
            2,
            24,
        );
        exec.execute(&request).await.unwrap();

        let token = store.token().unwrap().unwrap();
        assert_eq!(token.total_supply.raw(), 100_500_000);
        assert_eq!(gateway.call_count("mint"), 1);
    }

    #[tokio::test]
    async fn test_burn_exceeding_supply_fails_before_gateway() {
        let (exec, _, gateway, _) = executor();
        exec.execute(&creation_request()).await.unwrap();

        let request = MultiSigRequest::new(
            RequestType::TokenBurn,
            json!({"amount": "2000000"}),
            "manager1",
            2,
            24,
        );
        let result = exec.execute(&request).await;

        assert!(matches!(result, Err(ExecError::Failed(_))));
        assert_eq!(gateway.call_count("burn"), 0);
    }

    #[tokio::test]
    async fn test_mint_without_token_fails() {
        let (exec, _, gateway, _) = executor();

        let request = MultiSigRequest::new(
            RequestType::TokenMint,
            json!({"amount": "100"}),
            "manager1",
            2,
            24,
        );
        let result = exec.execute(&request).await;

        assert!(matches!(result, Err(ExecError::Failed(_))));
        assert_eq!(gateway.call_count("mint"), 0);
    }

    #[tokio::test]
    async fn test_rate_change_applies_and_persists() {
        let (exec, store, _, engine) = executor();

        let request = MultiSigRequest::new(
            RequestType::RateChange,
            json!({"rate_pct": "9.25"}),
            "manager1",
            2,
            24,
        );
        let outcome = exec.execute(&request).await.unwrap();

        assert!(outcome.reference.is_none());
        assert_eq!(engine.annual_rate_percent(), dec!(9.25));
        assert_eq!(store.load_rate().unwrap(), Some(dec!(9.25)));
    }

    #[tokio::test]
    async fn test_out_of_bounds_rate_leaves_state_untouched() {
        let (exec, store, _, engine) = executor();
        let before = engine.annual_rate_percent();

        let request = MultiSigRequest::new(
            RequestType::RateChange,
            json!({"rate_pct": "150"}),
            "manager1",
            2,
            24,
        );
        let result = exec.execute(&request).await;

        assert!(matches!(result, Err(ExecError::Failed(_))));
        assert_eq!(engine.annual_rate_percent(), before);
        assert!(store.load_rate().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interest_distribution_has_no_executor() {
        let (exec, _, _, _) = executor();

        let request = MultiSigRequest::new(
            RequestType::InterestDistribution,
            json!({}),
            "manager1",
            2,
            24,
        );

        assert!(exec.validate(&request).await.is_ok());
        let result = exec.execute(&request).await;
        assert!(matches!(result, Err(ExecError::NoExecutor(_))));
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected_at_validate() {
        let (exec, _, _, _) = executor();

        let request = MultiSigRequest::new(
            RequestType::TokenMint,
            json!({"amont": "100"}),
            "manager1",
            2,
            24,
        );
        let result = exec.validate(&request).await;
        assert!(matches!(result, Err(ExecError::Failed(_))));
    }
}
