//! TokenUnits - Integer smallest-unit token quantity
//!
//! The ledger token carries a fixed number of decimals; on-ledger balances
//! are integers in the smallest unit. Conversion to and from fiat `Amount`
//! (1:1 peg) must be exact - a deposit that does not fit the token's
//! precision is rejected rather than silently truncated.

use crate::amount::Amount;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur converting between amounts and token units
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Amount {amount} has more precision than the token supports ({decimals} decimals)")]
    PrecisionLoss { amount: Decimal, decimals: u32 },

    #[error("Amount {0} overflows the token unit range")]
    Overflow(Decimal),

    #[error("{0} decimal places exceed the supported token precision")]
    UnsupportedDecimals(u32),
}

/// A quantity of tokens in the smallest on-ledger unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenUnits(i64);

impl TokenUnits {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert a fiat amount to token units at the 1:1 peg.
    ///
    /// Fails if the amount carries precision the token cannot represent,
    /// or if `decimals` exceeds what an i64 unit count can scale by.
    pub fn from_amount(amount: Amount, decimals: u32) -> Result<Self, UnitsError> {
        let value = amount.value();
        let scale = 10i64
            .checked_pow(decimals)
            .ok_or(UnitsError::UnsupportedDecimals(decimals))?;
        let scaled = value
            .checked_mul(Decimal::from(scale))
            .ok_or(UnitsError::Overflow(value))?;

        if scaled.fract() != Decimal::ZERO {
            return Err(UnitsError::PrecisionLoss {
                amount: value,
                decimals,
            });
        }

        let raw = scaled
            .trunc()
            .to_i64()
            .ok_or(UnitsError::Overflow(value))?;

        Ok(Self(raw))
    }

    /// Convert token units back to a fiat amount at the 1:1 peg.
    pub fn to_amount(&self, decimals: u32) -> Amount {
        let value = Decimal::new(self.0, decimals);
        // Units are non-negative by construction in all MintFund flows,
        // but normalize defensively through the checked constructor.
        Amount::new(value.abs()).unwrap_or(Amount::ZERO)
    }

    pub fn checked_add(&self, other: TokenUnits) -> Option<TokenUnits> {
        self.0.checked_add(other.0).map(TokenUnits)
    }

    pub fn checked_sub(&self, other: TokenUnits) -> Option<TokenUnits> {
        self.0.checked_sub(other.0).map(TokenUnits)
    }
}

impl fmt::Display for TokenUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TokenUnits> for i64 {
    fn from(units: TokenUnits) -> Self {
        units.0
    }
}
