//! Investment orchestration
//!
//! Request-scoped flows tying fiat deposits to token movements at the 1:1
//! peg. Every gateway failure is terminal for the current flow: the
//! investment and its audit transaction are marked failed with the captured
//! error, then the error is re-raised.

use crate::error::LedgerError;
use crate::records::{
    Investment, InvestmentStatus, TokenRecord, Transaction, TransactionKind, TransactionStatus,
};
use crate::store::InvestmentStore;
use chrono::Utc;
use mintfund_core::{Amount, TokenUnits};
use mintfund_gateway::{GatewayError, LedgerGateway, SignerKey};
use mintfund_interest::{InterestEngine, Portfolio, PortfolioEntry, Valuation};
use serde_json::json;
use std::sync::Arc;

/// Result of a completed redemption
#[derive(Debug, Clone)]
pub struct Redemption {
    pub investment: Investment,
    pub valuation: Valuation,
    /// Principal plus accrued interest, 2dp
    pub payout: Amount,
}

/// Orchestrates deposits, redemptions and portfolio valuation
pub struct InvestmentLedger {
    store: Arc<InvestmentStore>,
    engine: Arc<InterestEngine>,
    gateway: Arc<dyn LedgerGateway>,
    /// Custodial operator key used for associations and customer-side
    /// transfers (the backend holds custody of customer accounts)
    operator_key: SignerKey,
}

impl InvestmentLedger {
    pub fn new(
        store: Arc<InvestmentStore>,
        engine: Arc<InterestEngine>,
        gateway: Arc<dyn LedgerGateway>,
        operator_key: SignerKey,
    ) -> Self {
        Self {
            store,
            engine,
            gateway,
            operator_key,
        }
    }

    fn require_token(&self) -> Result<TokenRecord, LedgerError> {
        self.store.token()?.ok_or(LedgerError::TokenNotCreated)
    }

    /// Record a deposit and deliver pegged tokens from the treasury.
    ///
    /// The investment accrues from `invested_at`; the rate at open is
    /// recorded as an audit snapshot only.
    pub async fn open_investment(
        &self,
        owner: &str,
        principal: Amount,
    ) -> Result<Investment, LedgerError> {
        if principal.is_zero() {
            return Err(LedgerError::InvalidInput(
                "principal must be positive".to_string(),
            ));
        }

        let token = self.require_token()?;
        let units = TokenUnits::from_amount(principal, token.decimals)?;
        let rate_pct = self.engine.annual_rate_percent();

        let mut investment = Investment::new(owner, principal, units, rate_pct);
        self.store.insert_investment(&investment)?;

        let mut deposit = Transaction::new(TransactionKind::Deposit, principal, units, &investment.id);
        self.store.insert_transaction(&deposit)?;

        // Idempotent on the ledger side: re-associating an already
        // associated account succeeds.
        if let Err(e) = self
            .gateway
            .associate(owner, &token.token_id, &self.operator_key)
            .await
        {
            return Err(self.fail_open(investment, deposit, "associate", e)?);
        }

        let receipt = match self
            .gateway
            .transfer(&token.token_id, &token.treasury_account, owner, units, None)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail_open(investment, deposit, "transfer", e)?),
        };

        investment.status = InvestmentStatus::Active;
        investment.mint_tx_ref = Some(receipt.tx_ref.clone());
        self.store.update_investment(&investment)?;

        deposit.status = TransactionStatus::Completed;
        deposit.ledger_ref = Some(receipt.tx_ref);
        self.store.update_transaction(&deposit)?;

        tracing::info!(
            investment_id = %investment.id,
            owner,
            principal = %principal,
            units = units.raw(),
            "investment opened"
        );

        Ok(investment)
    }

    /// Return tokens and pay out principal plus accrued interest.
    ///
    /// Valued at the pool's current rate as of now.
    pub async fn redeem(&self, investment_id: &str) -> Result<Redemption, LedgerError> {
        let mut investment = self
            .store
            .get_investment(investment_id)
            .map_err(|e| match e {
                crate::store::StoreError::NotFound(id) => LedgerError::NotFound(id),
                other => LedgerError::Store(other),
            })?;

        if investment.status != InvestmentStatus::Active {
            return Err(LedgerError::InvalidState {
                id: investment.id,
                status: investment.status,
            });
        }

        let token = self.require_token()?;
        let now = Utc::now();
        let valuation =
            self.engine
                .compute_value(investment.principal.value(), investment.invested_at, now)?;
        let payout = Amount::new(valuation.total_value)
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;
        let interest = Amount::new(valuation.interest)
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;

        let mut withdrawal = Transaction::new(
            TransactionKind::Withdrawal,
            investment.principal,
            investment.token_amount,
            &investment.id,
        );
        self.store.insert_transaction(&withdrawal)?;

        let receipt = match self
            .gateway
            .transfer(
                &token.token_id,
                &investment.owner,
                &token.treasury_account,
                investment.token_amount,
                Some(&self.operator_key),
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                withdrawal.status = TransactionStatus::Failed;
                withdrawal.metadata = json!({ "error": e.to_string(), "stage": "transfer" });
                self.store.update_transaction(&withdrawal)?;
                tracing::warn!(
                    investment_id = %investment.id,
                    error = %e,
                    "redemption transfer failed"
                );
                return Err(LedgerError::Gateway(e));
            }
        };

        withdrawal.status = TransactionStatus::Completed;
        withdrawal.ledger_ref = Some(receipt.tx_ref.clone());
        self.store.update_transaction(&withdrawal)?;

        let mut interest_payment = Transaction::new(
            TransactionKind::InterestPayment,
            interest,
            TokenUnits::ZERO,
            &investment.id,
        );
        interest_payment.status = TransactionStatus::Completed;
        interest_payment.metadata = json!({
            "days_elapsed": valuation.days_elapsed,
            "annual_rate_pct": valuation.annual_rate_pct.to_string(),
        });
        self.store.insert_transaction(&interest_payment)?;

        investment.status = InvestmentStatus::Redeemed;
        investment.redeemed_at = Some(now);
        investment.redemption_amount = Some(payout);
        investment.redeem_tx_ref = Some(receipt.tx_ref);
        self.store.update_investment(&investment)?;

        tracing::info!(
            investment_id = %investment.id,
            payout = %payout,
            interest = %interest,
            days = valuation.days_elapsed,
            "investment redeemed"
        );

        Ok(Redemption {
            investment,
            valuation,
            payout,
        })
    }

    /// Current value of all of an owner's active investments
    pub fn portfolio(&self, owner: &str) -> Result<Portfolio, LedgerError> {
        let entries: Vec<PortfolioEntry> = self
            .store
            .list_investments(owner)?
            .into_iter()
            .filter(|inv| inv.status == InvestmentStatus::Active)
            .map(|inv| PortfolioEntry {
                id: inv.id,
                amount: inv.principal.value(),
                start: inv.invested_at,
            })
            .collect();

        Ok(self.engine.compute_portfolio(&entries, Utc::now())?)
    }

    pub fn get_investment(&self, investment_id: &str) -> Result<Investment, LedgerError> {
        self.store
            .get_investment(investment_id)
            .map_err(|e| match e {
                crate::store::StoreError::NotFound(id) => LedgerError::NotFound(id),
                other => LedgerError::Store(other),
            })
    }

    pub fn list_investments(&self, owner: &str) -> Result<Vec<Investment>, LedgerError> {
        Ok(self.store.list_investments(owner)?)
    }

    pub fn list_transactions(&self, investment_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.store.list_transactions(investment_id)?)
    }

    pub fn token(&self) -> Result<Option<TokenRecord>, LedgerError> {
        Ok(self.store.token()?)
    }

    /// Mark the open flow failed and hand back the gateway error.
    ///
    /// Returns `Ok(error)` so the caller can `return Err(...)` while store
    /// failures during the markdown still propagate.
    fn fail_open(
        &self,
        mut investment: Investment,
        mut deposit: Transaction,
        stage: &str,
        error: GatewayError,
    ) -> Result<LedgerError, LedgerError> {
        investment.status = InvestmentStatus::Failed;
        self.store.update_investment(&investment)?;

        deposit.status = TransactionStatus::Failed;
        deposit.metadata = json!({ "error": error.to_string(), "stage": stage });
        self.store.update_transaction(&deposit)?;

        tracing::warn!(
            investment_id = %investment.id,
            stage,
            error = %error,
            "investment open failed"
        );

        Ok(LedgerError::Gateway(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mintfund_gateway::{MockLedger, TokenSpec};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        ledger: InvestmentLedger,
        store: Arc<InvestmentStore>,
        gateway: Arc<MockLedger>,
        engine: Arc<InterestEngine>,
    }

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InvestmentStore::in_memory().unwrap());
        let engine = Arc::new(InterestEngine::default());
        let gateway = Arc::new(MockLedger::new());

        let signers = [SignerKey::new("key-m1"), SignerKey::new("key-m2")];
        let created = gateway
            .create_token(
                &TokenSpec {
                    name: "MintFund Token".to_string(),
                    symbol: "MMF".to_string(),
                    decimals: 2,
                    initial_supply: TokenUnits::new(100_000_000),
                    treasury_account: "0.0.100".to_string(),
                },
                &signers,
            )
            .await
            .unwrap();
        store
            .insert_token(&TokenRecord {
                token_id: created.token_id,
                treasury_account: "0.0.100".to_string(),
                decimals: 2,
                manager_accounts: vec!["0.0.10".to_string(), "0.0.11".to_string()],
                creation_ref: created.tx_ref,
                is_active: true,
                total_supply: TokenUnits::new(100_000_000),
                created_at: Utc::now(),
            })
            .unwrap();

        let ledger = InvestmentLedger::new(
            store.clone(),
            engine.clone(),
            gateway.clone(),
            SignerKey::new("operator-key"),
        );
        Fixture {
            ledger,
            store,
            gateway,
            engine,
        }
    }

    #[tokio::test]
    async fn test_open_investment_delivers_tokens() {
        let fx = fixture().await;

        let investment = fx
            .ledger
            .open_investment("0.0.200", amount(dec!(1000)))
            .await
            .unwrap();

        assert_eq!(investment.status, InvestmentStatus::Active);
        assert_eq!(investment.token_amount.raw(), 100_000);
        assert_eq!(investment.rate_at_open, dec!(8.50));
        assert!(investment.mint_tx_ref.is_some());

        let token = fx.store.token().unwrap().unwrap();
        assert_eq!(fx.gateway.balance_of(&token.token_id, "0.0.200"), 100_000);

        let transactions = fx.ledger.list_transactions(&investment.id).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Deposit);
        assert_eq!(transactions[0].status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_open_rejects_zero_principal() {
        let fx = fixture().await;

        let result = fx.ledger.open_investment("0.0.200", Amount::ZERO).await;
        assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
        assert_eq!(fx.gateway.call_count("transfer"), 0);
    }

    #[tokio::test]
    async fn test_open_rejects_excess_precision() {
        let fx = fixture().await;

        // 2-decimal token cannot represent a 3dp deposit
        let result = fx.ledger.open_investment("0.0.200", amount(dec!(10.005))).await;
        assert!(matches!(result, Err(LedgerError::Units(_))));
    }

    #[tokio::test]
    async fn test_open_without_token() {
        let store = Arc::new(InvestmentStore::in_memory().unwrap());
        let ledger = InvestmentLedger::new(
            store,
            Arc::new(InterestEngine::default()),
            Arc::new(MockLedger::new()),
            SignerKey::new("operator-key"),
        );

        let result = ledger.open_investment("0.0.200", amount(dec!(100))).await;
        assert!(matches!(result, Err(LedgerError::TokenNotCreated)));
    }

    #[tokio::test]
    async fn test_open_failure_marks_records_and_reraises() {
        let fx = fixture().await;
        fx.gateway.fail_next(
            "transfer",
            GatewayError::Rejected {
                operation: "transfer".to_string(),
                status: "INSUFFICIENT_TREASURY_BALANCE".to_string(),
            },
        );

        let result = fx.ledger.open_investment("0.0.200", amount(dec!(1000))).await;
        assert!(matches!(result, Err(LedgerError::Gateway(_))));

        // Both the record and the audit transaction carry the failure
        let investments = fx.ledger.list_investments("0.0.200").unwrap();
        assert_eq!(investments.len(), 1);
        assert_eq!(investments[0].status, InvestmentStatus::Failed);

        let transactions = fx.ledger.list_transactions(&investments[0].id).unwrap();
        assert_eq!(transactions[0].status, TransactionStatus::Failed);
        assert_eq!(transactions[0].metadata["stage"], "transfer");
    }

    #[tokio::test]
    async fn test_redeem_pays_principal_plus_interest() {
        let fx = fixture().await;
        let token = fx.store.token().unwrap().unwrap();
        let units = TokenUnits::new(10_000_000);

        // Seed a 90-day-old active position with matching token funding
        fx.gateway
            .associate("0.0.200", &token.token_id, &SignerKey::new("operator-key"))
            .await
            .unwrap();
        fx.gateway
            .transfer(&token.token_id, &token.treasury_account, "0.0.200", units, None)
            .await
            .unwrap();
        let mut investment = Investment::new("0.0.200", amount(dec!(100000)), units, dec!(8.5));
        investment.invested_at = Utc::now() - chrono::Duration::days(90);
        investment.status = InvestmentStatus::Active;
        fx.store.insert_investment(&investment).unwrap();

        let redemption = fx.ledger.redeem(&investment.id).await.unwrap();

        assert_eq!(redemption.valuation.days_elapsed, 90);
        assert!((redemption.payout.value() - dec!(102117.76)).abs() <= dec!(0.01));
        assert_eq!(redemption.investment.status, InvestmentStatus::Redeemed);
        assert!(redemption.investment.redeem_tx_ref.is_some());

        // Tokens are back with the treasury
        assert_eq!(fx.gateway.balance_of(&token.token_id, "0.0.200"), 0);

        let transactions = fx
            .ledger
            .list_transactions(&redemption.investment.id)
            .unwrap();
        let kinds: Vec<_> = transactions.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TransactionKind::Withdrawal));
        assert!(kinds.contains(&TransactionKind::InterestPayment));
    }

    #[tokio::test]
    async fn test_redeem_twice_rejected() {
        let fx = fixture().await;

        let investment = fx
            .ledger
            .open_investment("0.0.200", amount(dec!(500)))
            .await
            .unwrap();
        fx.ledger.redeem(&investment.id).await.unwrap();

        let result = fx.ledger.redeem(&investment.id).await;
        assert!(matches!(result, Err(LedgerError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_redeem_unknown_investment() {
        let fx = fixture().await;

        let result = fx.ledger.redeem("INV-MISSING").await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_redeem_failure_leaves_investment_active() {
        let fx = fixture().await;

        let investment = fx
            .ledger
            .open_investment("0.0.200", amount(dec!(500)))
            .await
            .unwrap();

        fx.gateway.fail_next(
            "transfer",
            GatewayError::Transport("connection reset".to_string()),
        );
        let result = fx.ledger.redeem(&investment.id).await;
        assert!(matches!(result, Err(LedgerError::Gateway(_))));

        let loaded = fx.ledger.get_investment(&investment.id).unwrap();
        assert_eq!(loaded.status, InvestmentStatus::Active);

        // Failed withdrawal captured in the audit trail; retry succeeds
        let transactions = fx.ledger.list_transactions(&investment.id).unwrap();
        assert!(transactions
            .iter()
            .any(|t| t.kind == TransactionKind::Withdrawal
                && t.status == TransactionStatus::Failed));

        fx.ledger.redeem(&investment.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_portfolio_covers_active_positions_only() {
        let fx = fixture().await;

        let first = fx
            .ledger
            .open_investment("0.0.200", amount(dec!(1000)))
            .await
            .unwrap();
        fx.ledger
            .open_investment("0.0.200", amount(dec!(2000)))
            .await
            .unwrap();
        fx.ledger.redeem(&first.id).await.unwrap();

        let portfolio = fx.ledger.portfolio("0.0.200").unwrap();
        assert_eq!(portfolio.count, 1);
        assert_eq!(portfolio.total_principal, dec!(2000.00));
    }

    #[tokio::test]
    async fn test_rate_change_applies_to_open_positions() {
        let fx = fixture().await;

        fx.ledger
            .open_investment("0.0.200", amount(dec!(1000)))
            .await
            .unwrap();
        fx.engine.update_rate(dec!(10)).unwrap();

        // Accrual is valued at the live rate, not the opening snapshot
        let portfolio = fx.ledger.portfolio("0.0.200").unwrap();
        assert_eq!(portfolio.annual_rate_pct, dec!(10.00));

        let investments = fx.ledger.list_investments("0.0.200").unwrap();
        assert_eq!(investments[0].rate_at_open, dec!(8.50));
    }
}
