//! Application context - wires everything together

use mintfund_gateway::{LedgerGateway, MockLedger, SignerKey, TokenInfo};
use mintfund_interest::InterestEngine;
use mintfund_investments::{InvestmentLedger, InvestmentStore, TreasuryConfig, TreasuryExecutor};
use mintfund_multisig::{MultiSigWorkflow, RequestStore, WorkflowConfig};
use std::path::Path;
use std::sync::Arc;

/// Application context - wires together all components.
///
/// Everything is constructed explicitly here; no component reaches for
/// process-global state. The gateway is the in-memory mock standing in
/// for the external distributed-ledger service, rehydrated from the
/// persisted token record on startup.
pub struct AppContext {
    pub engine: Arc<InterestEngine>,
    pub gateway: Arc<MockLedger>,
    pub workflow: Arc<MultiSigWorkflow>,
    pub ledger: Arc<InvestmentLedger>,
    pub investments: Arc<InvestmentStore>,
}

impl AppContext {
    /// Create a new application context rooted at the given data directory
    pub fn new(data_path: impl AsRef<Path>, managers: Vec<String>) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref();
        std::fs::create_dir_all(data_path)?;

        let requests = RequestStore::new(data_path.join("requests.db"))?;
        let investments = Arc::new(InvestmentStore::new(data_path.join("investments.db"))?);

        // The engine starts at the last rate an executed rate_change
        // persisted, or the default when none has run yet.
        let engine = Arc::new(match investments.load_rate()? {
            Some(rate_pct) => InterestEngine::from_percent(rate_pct)?,
            None => InterestEngine::default(),
        });

        let gateway = Arc::new(MockLedger::new());
        if let Some(token) = investments.token()? {
            gateway.seed_token(TokenInfo {
                token_id: token.token_id,
                name: String::new(),
                symbol: String::new(),
                decimals: token.decimals,
                total_supply: token.total_supply,
                treasury_account: token.treasury_account,
            });
        }

        let signer_keys = [
            SignerKey::new(format!("{}-key", manager_at(&managers, 0))),
            SignerKey::new(format!("{}-key", manager_at(&managers, 1))),
        ];
        let gateway_dyn: Arc<dyn LedgerGateway> = gateway.clone();
        let executor = Arc::new(TreasuryExecutor::new(
            investments.clone(),
            engine.clone(),
            gateway_dyn.clone(),
            TreasuryConfig {
                manager_accounts: managers.clone(),
                signer_keys,
            },
        ));

        let workflow = Arc::new(MultiSigWorkflow::new(
            requests,
            WorkflowConfig::two_of(managers),
            executor,
        ));

        let ledger = Arc::new(InvestmentLedger::new(
            investments.clone(),
            engine.clone(),
            gateway_dyn,
            SignerKey::new("operator-key"),
        ));

        Ok(Self {
            engine,
            gateway,
            workflow,
            ledger,
            investments,
        })
    }
}

fn manager_at(managers: &[String], index: usize) -> &str {
    managers.get(index).map(String::as_str).unwrap_or("manager")
}
