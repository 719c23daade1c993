//! SQLite storage for investments, transactions and the token singleton
//!
//! The token row lives in a single-slot table (`slot = 1` primary key), so
//! a second creation attempt hits a constraint violation even if the
//! workflow-level conflict check is bypassed.

use crate::records::{
    Investment, InvestmentStatus, TokenRecord, Transaction, TransactionKind, TransactionStatus,
};
use chrono::{DateTime, Utc};
use mintfund_core::{Amount, TokenUnits};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

/// Errors from the investment store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("The fund token has already been created")]
    TokenExists,

    #[error("Corrupt row for {id}: {field}")]
    CorruptRow { id: String, field: &'static str },
}

/// SQLite storage for the investment ledger
pub struct InvestmentStore {
    conn: Mutex<Connection>,
}

impl InvestmentStore {
    /// Open (or create) a store at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS investments (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                principal TEXT NOT NULL,
                token_amount INTEGER NOT NULL,
                invested_at TEXT NOT NULL,
                rate_at_open TEXT NOT NULL,
                status TEXT NOT NULL,
                redeemed_at TEXT,
                redemption_amount TEXT,
                mint_tx_ref TEXT,
                redeem_tx_ref TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_investments_owner
                ON investments(owner);

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                amount_fiat TEXT NOT NULL,
                token_amount INTEGER NOT NULL,
                status TEXT NOT NULL,
                investment_id TEXT NOT NULL,
                ledger_ref TEXT,
                metadata_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_investment
                ON transactions(investment_id);

            CREATE TABLE IF NOT EXISTS fund_token (
                slot INTEGER PRIMARY KEY CHECK (slot = 1),
                token_id TEXT NOT NULL,
                treasury_account TEXT NOT NULL,
                decimals INTEGER NOT NULL,
                manager_accounts_json TEXT NOT NULL,
                creation_ref TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                total_supply INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    // --- investments ---

    pub fn insert_investment(&self, investment: &Investment) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO investments
             (id, owner, principal, token_amount, invested_at, rate_at_open,
              status, redeemed_at, redemption_amount, mint_tx_ref, redeem_tx_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                investment.id,
                investment.owner,
                investment.principal.value().to_string(),
                investment.token_amount.raw(),
                investment.invested_at.to_rfc3339(),
                investment.rate_at_open.to_string(),
                investment.status.as_str(),
                investment.redeemed_at.map(|t| t.to_rfc3339()),
                investment.redemption_amount.map(|a| a.value().to_string()),
                investment.mint_tx_ref,
                investment.redeem_tx_ref,
            ],
        )?;
        Ok(())
    }

    pub fn update_investment(&self, investment: &Investment) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE investments
             SET status = ?1, redeemed_at = ?2, redemption_amount = ?3,
                 mint_tx_ref = ?4, redeem_tx_ref = ?5
             WHERE id = ?6",
            params![
                investment.status.as_str(),
                investment.redeemed_at.map(|t| t.to_rfc3339()),
                investment.redemption_amount.map(|a| a.value().to_string()),
                investment.mint_tx_ref,
                investment.redeem_tx_ref,
                investment.id,
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(investment.id.clone()));
        }
        Ok(())
    }

    pub fn get_investment(&self, id: &str) -> Result<Investment, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner, principal, token_amount, invested_at, rate_at_open,
                    status, redeemed_at, redemption_amount, mint_tx_ref, redeem_tx_ref
             FROM investments WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], Self::investment_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(id.to_string()),
                other => StoreError::Database(other),
            })?;
        row.into_investment()
    }

    /// All investments for an owner, newest first
    pub fn list_investments(&self, owner: &str) -> Result<Vec<Investment>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner, principal, token_amount, invested_at, rate_at_open,
                    status, redeemed_at, redemption_amount, mint_tx_ref, redeem_tx_ref
             FROM investments WHERE owner = ?1 ORDER BY invested_at DESC",
        )?;
        let rows = stmt.query_map(params![owner], Self::investment_row)?;

        let mut investments = Vec::new();
        for row in rows {
            investments.push(row?.into_investment()?);
        }
        Ok(investments)
    }

    fn investment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInvestment> {
        Ok(RawInvestment {
            id: row.get(0)?,
            owner: row.get(1)?,
            principal: row.get(2)?,
            token_amount: row.get(3)?,
            invested_at: row.get(4)?,
            rate_at_open: row.get(5)?,
            status: row.get(6)?,
            redeemed_at: row.get(7)?,
            redemption_amount: row.get(8)?,
            mint_tx_ref: row.get(9)?,
            redeem_tx_ref: row.get(10)?,
        })
    }

    // --- transactions ---

    pub fn insert_transaction(&self, txn: &Transaction) -> Result<(), StoreError> {
        let metadata_json = txn.metadata.to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO transactions
             (id, kind, amount_fiat, token_amount, status, investment_id,
              ledger_ref, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                txn.id,
                txn.kind.as_str(),
                txn.amount_fiat.value().to_string(),
                txn.token_amount.raw(),
                txn.status.as_str(),
                txn.investment_id,
                txn.ledger_ref,
                metadata_json,
                txn.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn update_transaction(&self, txn: &Transaction) -> Result<(), StoreError> {
        let metadata_json = txn.metadata.to_string();
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE transactions
             SET status = ?1, ledger_ref = ?2, metadata_json = ?3
             WHERE id = ?4",
            params![txn.status.as_str(), txn.ledger_ref, metadata_json, txn.id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(txn.id.clone()));
        }
        Ok(())
    }

    /// Audit trail for one investment, oldest first
    pub fn list_transactions(&self, investment_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, kind, amount_fiat, token_amount, status, investment_id,
                    ledger_ref, metadata_json, created_at
             FROM transactions WHERE investment_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![investment_id], |row| {
            Ok(RawTransaction {
                id: row.get(0)?,
                kind: row.get(1)?,
                amount_fiat: row.get(2)?,
                token_amount: row.get(3)?,
                status: row.get(4)?,
                investment_id: row.get(5)?,
                ledger_ref: row.get(6)?,
                metadata_json: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row?.into_transaction()?);
        }
        Ok(transactions)
    }

    // --- token singleton ---

    /// Record the fund token. Fails with `TokenExists` if one is present.
    pub fn insert_token(&self, token: &TokenRecord) -> Result<(), StoreError> {
        let managers_json = serde_json::to_string(&token.manager_accounts)?;
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO fund_token
             (slot, token_id, treasury_account, decimals, manager_accounts_json,
              creation_ref, is_active, total_supply, created_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                token.token_id,
                token.treasury_account,
                token.decimals,
                managers_json,
                token.creation_ref,
                token.is_active,
                token.total_supply.raw(),
                token.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::TokenExists)
            }
            Err(other) => Err(StoreError::Database(other)),
        }
    }

    pub fn token(&self) -> Result<Option<TokenRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT token_id, treasury_account, decimals, manager_accounts_json,
                        creation_ref, is_active, total_supply, created_at
                 FROM fund_token WHERE slot = 1",
                [],
                |row| {
                    Ok(RawToken {
                        token_id: row.get(0)?,
                        treasury_account: row.get(1)?,
                        decimals: row.get(2)?,
                        manager_accounts_json: row.get(3)?,
                        creation_ref: row.get(4)?,
                        is_active: row.get(5)?,
                        total_supply: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?;

        row.map(RawToken::into_token).transpose()
    }

    pub fn set_total_supply(&self, supply: TokenUnits) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE fund_token SET total_supply = ?1 WHERE slot = 1",
            params![supply.raw()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound("fund_token".to_string()));
        }
        Ok(())
    }

    // --- rate persistence ---

    /// Annual rate (percent) persisted by the last executed rate change
    pub fn load_rate(&self) -> Result<Option<Decimal>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = 'annual_rate_pct'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(s) => Decimal::from_str(&s)
                .map(Some)
                .map_err(|_| StoreError::CorruptRow {
                    id: "annual_rate_pct".to_string(),
                    field: "value",
                }),
            None => Ok(None),
        }
    }

    pub fn save_rate(&self, rate_pct: Decimal) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES ('annual_rate_pct', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![rate_pct.to_string()],
        )?;
        Ok(())
    }
}

struct RawInvestment {
    id: String,
    owner: String,
    principal: String,
    token_amount: i64,
    invested_at: String,
    rate_at_open: String,
    status: String,
    redeemed_at: Option<String>,
    redemption_amount: Option<String>,
    mint_tx_ref: Option<String>,
    redeem_tx_ref: Option<String>,
}

impl RawInvestment {
    fn into_investment(self) -> Result<Investment, StoreError> {
        let corrupt = |field: &'static str| StoreError::CorruptRow {
            id: self.id.clone(),
            field,
        };

        let principal = parse_amount(&self.principal).ok_or_else(|| corrupt("principal"))?;
        let rate_at_open =
            Decimal::from_str(&self.rate_at_open).map_err(|_| corrupt("rate_at_open"))?;
        let status = InvestmentStatus::parse(&self.status).ok_or_else(|| corrupt("status"))?;
        let invested_at = parse_ts(&self.invested_at).ok_or_else(|| corrupt("invested_at"))?;
        let redeemed_at = match &self.redeemed_at {
            Some(s) => Some(parse_ts(s).ok_or_else(|| corrupt("redeemed_at"))?),
            None => None,
        };
        let redemption_amount = match &self.redemption_amount {
            Some(s) => Some(parse_amount(s).ok_or_else(|| corrupt("redemption_amount"))?),
            None => None,
        };

        Ok(Investment {
            id: self.id,
            owner: self.owner,
            principal,
            token_amount: TokenUnits::new(self.token_amount),
            invested_at,
            rate_at_open,
            status,
            redeemed_at,
            redemption_amount,
            mint_tx_ref: self.mint_tx_ref,
            redeem_tx_ref: self.redeem_tx_ref,
        })
    }
}

struct RawTransaction {
    id: String,
    kind: String,
    amount_fiat: String,
    token_amount: i64,
    status: String,
    investment_id: String,
    ledger_ref: Option<String>,
    metadata_json: String,
    created_at: String,
}

impl RawTransaction {
    fn into_transaction(self) -> Result<Transaction, StoreError> {
        let corrupt = |field: &'static str| StoreError::CorruptRow {
            id: self.id.clone(),
            field,
        };

        let kind = TransactionKind::parse(&self.kind).ok_or_else(|| corrupt("kind"))?;
        let status = TransactionStatus::parse(&self.status).ok_or_else(|| corrupt("status"))?;
        let amount_fiat = parse_amount(&self.amount_fiat).ok_or_else(|| corrupt("amount_fiat"))?;
        let created_at = parse_ts(&self.created_at).ok_or_else(|| corrupt("created_at"))?;
        let metadata = serde_json::from_str(&self.metadata_json)?;

        Ok(Transaction {
            id: self.id,
            kind,
            amount_fiat,
            token_amount: TokenUnits::new(self.token_amount),
            status,
            investment_id: self.investment_id,
            ledger_ref: self.ledger_ref,
            metadata,
            created_at,
        })
    }
}

struct RawToken {
    token_id: String,
    treasury_account: String,
    decimals: u32,
    manager_accounts_json: String,
    creation_ref: String,
    is_active: bool,
    total_supply: i64,
    created_at: String,
}

impl RawToken {
    fn into_token(self) -> Result<TokenRecord, StoreError> {
        let corrupt = |field: &'static str| StoreError::CorruptRow {
            id: self.token_id.clone(),
            field,
        };

        let manager_accounts = serde_json::from_str(&self.manager_accounts_json)?;
        let created_at = parse_ts(&self.created_at).ok_or_else(|| corrupt("created_at"))?;

        Ok(TokenRecord {
            token_id: self.token_id,
            treasury_account: self.treasury_account,
            decimals: self.decimals,
            manager_accounts,
            creation_ref: self.creation_ref,
            is_active: self.is_active,
            total_supply: TokenUnits::new(self.total_supply),
            created_at,
        })
    }
}

fn parse_amount(s: &str) -> Option<Amount> {
    Decimal::from_str(s).ok().and_then(|d| Amount::new(d).ok())
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}
