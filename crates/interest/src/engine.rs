//! Interest engine implementation
//!
//! Daily compounding: total = principal * (1 + daily_rate)^days.
//! All monetary outputs are rounded to 2 decimal places for display;
//! compounding itself always runs on unrounded intermediates.

use crate::error::InterestError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Compounding periods per year (daily)
pub const PERIODS_PER_YEAR: i64 = 365;

/// Default annual rate: 8.5% (as a fraction)
pub const DEFAULT_ANNUAL_RATE: Decimal = Decimal::from_parts(85, 0, 0, false, 3); // 0.085

/// Result of a compound-interest valuation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub principal: Decimal,
    pub interest: Decimal,
    pub total_value: Decimal,
    pub days_elapsed: i64,
    /// Annual rate in percent, 2dp
    pub annual_rate_pct: Decimal,
    /// Daily rate in percent, 4dp
    pub daily_rate_pct: Decimal,
    /// Annualized realized rate in percent, 2dp.
    /// None when no days have elapsed (the figure is undefined at zero days).
    pub effective_rate_pct: Option<Decimal>,
}

/// Simple (non-compounded) "what you'd earn" display figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBreakdown {
    pub daily_interest: Decimal,
    /// Linear extrapolation over 30 days, not the compounded total
    pub monthly_interest: Decimal,
    /// Linear extrapolation over 365 days, not the compounded total
    pub yearly_interest: Decimal,
}

/// One position in a portfolio valuation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub id: String,
    pub amount: Decimal,
    pub start: DateTime<Utc>,
}

/// Per-position valuation detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioLine {
    pub id: String,
    pub valuation: Valuation,
}

/// Aggregated portfolio valuation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub total_principal: Decimal,
    pub total_interest: Decimal,
    pub total_value: Decimal,
    pub count: usize,
    pub annual_rate_pct: Decimal,
    pub entries: Vec<PortfolioLine>,
}

/// Days needed for compounded interest to cover a flat fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakEven {
    pub principal: Decimal,
    pub fee: Decimal,
    pub days: i64,
}

/// Interest engine with daily compounding.
///
/// The annual rate is shared mutable state: `update_rate` is visible to all
/// subsequent calculations immediately (last-writer-wins, no versioning).
pub struct InterestEngine {
    /// Annual rate as a fraction (e.g. 0.085 for 8.5%)
    annual_rate: RwLock<Decimal>,
}

impl InterestEngine {
    /// Create an engine with the given annual rate (fraction, 0..=1).
    pub fn new(annual_rate: Decimal) -> Result<Self, InterestError> {
        if annual_rate < Decimal::ZERO || annual_rate > Decimal::ONE {
            return Err(InterestError::InvalidRate(annual_rate * Decimal::ONE_HUNDRED));
        }
        Ok(Self {
            annual_rate: RwLock::new(annual_rate),
        })
    }

    /// Create an engine from a percentage figure (0..=100).
    pub fn from_percent(annual_rate_pct: Decimal) -> Result<Self, InterestError> {
        if annual_rate_pct < Decimal::ZERO || annual_rate_pct > Decimal::ONE_HUNDRED {
            return Err(InterestError::InvalidRate(annual_rate_pct));
        }
        Self::new(annual_rate_pct / Decimal::ONE_HUNDRED)
    }

    /// Current annual rate as a fraction
    pub fn annual_rate(&self) -> Decimal {
        *self.annual_rate.read().unwrap()
    }

    /// Current annual rate in percent
    pub fn annual_rate_percent(&self) -> Decimal {
        self.annual_rate() * Decimal::ONE_HUNDRED
    }

    /// Current daily rate as a fraction
    pub fn daily_rate(&self) -> Decimal {
        self.annual_rate() / Decimal::from(PERIODS_PER_YEAR)
    }

    /// Update the annual rate from a percentage figure.
    ///
    /// Validates 0 <= pct <= 100; on failure the previous rate is untouched.
    /// Takes effect for all subsequent calculations immediately.
    pub fn update_rate(&self, new_rate_pct: Decimal) -> Result<(), InterestError> {
        if new_rate_pct < Decimal::ZERO || new_rate_pct > Decimal::ONE_HUNDRED {
            return Err(InterestError::InvalidRate(new_rate_pct));
        }

        let mut rate = self.annual_rate.write().unwrap();
        let previous = *rate;
        *rate = new_rate_pct / Decimal::ONE_HUNDRED;

        tracing::info!(
            previous_pct = %(previous * Decimal::ONE_HUNDRED),
            new_pct = %new_rate_pct,
            "interest rate updated"
        );

        Ok(())
    }

    /// Value a principal over a date range with daily compounding.
    ///
    /// `days_elapsed` is the whole number of days between the timestamps
    /// (floor). Fails if `end` precedes `start`. A non-positive principal
    /// short-circuits to a zeroed result without consulting the dates.
    pub fn compute_value(
        &self,
        principal: Decimal,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Valuation, InterestError> {
        if principal <= Decimal::ZERO {
            return Ok(self.zeroed_valuation());
        }

        if end < start {
            return Err(InterestError::InvalidRange { start, end });
        }

        let days = (end - start).num_days();
        Ok(self.compound(principal, days))
    }

    /// Value a principal over a fixed day count (no date-range validation).
    pub fn compute_for_fixed_period(&self, principal: Decimal, days: u32) -> Valuation {
        if principal <= Decimal::ZERO {
            return self.zeroed_valuation();
        }
        self.compound(principal, i64::from(days))
    }

    /// Simple per-day earning figures (linear extrapolation, not compounded).
    pub fn compute_daily_breakdown(&self, principal: Decimal) -> DailyBreakdown {
        if principal <= Decimal::ZERO {
            return DailyBreakdown {
                daily_interest: Decimal::ZERO,
                monthly_interest: Decimal::ZERO,
                yearly_interest: Decimal::ZERO,
            };
        }

        let daily = principal * self.daily_rate();
        DailyBreakdown {
            daily_interest: round_money(daily),
            monthly_interest: round_money(daily * Decimal::from(30)),
            yearly_interest: round_money(daily * Decimal::from(PERIODS_PER_YEAR)),
        }
    }

    /// Aggregate valuation across a set of positions, valued as of `now`.
    pub fn compute_portfolio(
        &self,
        entries: &[PortfolioEntry],
        now: DateTime<Utc>,
    ) -> Result<Portfolio, InterestError> {
        let mut total_principal = Decimal::ZERO;
        let mut total_interest = Decimal::ZERO;
        let mut total_value = Decimal::ZERO;
        let mut lines = Vec::with_capacity(entries.len());

        for entry in entries {
            let valuation = self.compute_value(entry.amount, entry.start, now)?;
            total_principal += valuation.principal;
            total_interest += valuation.interest;
            total_value += valuation.total_value;
            lines.push(PortfolioLine {
                id: entry.id.clone(),
                valuation,
            });
        }

        Ok(Portfolio {
            total_principal,
            total_interest,
            total_value,
            count: lines.len(),
            annual_rate_pct: round_money(self.annual_rate_percent()),
            entries: lines,
        })
    }

    /// Annual percentage yield: (1 + daily)^365 - 1, in percent.
    ///
    /// Informational only - daily compounding yields above the nominal rate.
    pub fn compute_apy(&self) -> Decimal {
        let factor = (Decimal::ONE + self.daily_rate()).powi(PERIODS_PER_YEAR);
        round_money((factor - Decimal::ONE) * Decimal::ONE_HUNDRED)
    }

    /// Days required for compounded interest to equal a flat fee:
    /// ceil(ln(1 + fee/principal) / ln(1 + daily_rate)).
    pub fn compute_break_even(
        &self,
        principal: Decimal,
        fee: Decimal,
    ) -> Result<BreakEven, InterestError> {
        if fee <= Decimal::ZERO {
            return Ok(BreakEven {
                principal,
                fee,
                days: 0,
            });
        }

        if principal <= Decimal::ZERO {
            return Err(InterestError::InvalidInput(format!(
                "principal must be positive, got {principal}"
            )));
        }

        let daily = self.daily_rate();
        if daily.is_zero() {
            return Err(InterestError::InvalidInput(
                "break-even is unreachable at a zero rate".to_string(),
            ));
        }

        // Both logarithm arguments are > 1 here, so ln() is defined.
        let numerator = (Decimal::ONE + fee / principal).ln();
        let denominator = (Decimal::ONE + daily).ln();
        let days = (numerator / denominator)
            .ceil()
            .to_i64()
            .ok_or_else(|| InterestError::InvalidInput("break-even day count overflow".to_string()))?;

        Ok(BreakEven {
            principal,
            fee,
            days,
        })
    }

    fn compound(&self, principal: Decimal, days: i64) -> Valuation {
        let daily = self.daily_rate();
        let factor = (Decimal::ONE + daily).powi(days);
        let total_raw = principal * factor;
        let interest_raw = total_raw - principal;

        // Undefined at zero days: report None rather than dividing by zero.
        let effective_rate_pct = if days == 0 {
            None
        } else {
            let fraction_of_year = Decimal::from(days) / Decimal::from(PERIODS_PER_YEAR);
            Some(round_money(
                interest_raw / principal / fraction_of_year * Decimal::ONE_HUNDRED,
            ))
        };

        Valuation {
            principal: round_money(principal),
            interest: round_money(interest_raw),
            total_value: round_money(total_raw),
            days_elapsed: days,
            annual_rate_pct: round_money(self.annual_rate_percent()),
            daily_rate_pct: round_rate(daily * Decimal::ONE_HUNDRED),
            effective_rate_pct,
        }
    }

    fn zeroed_valuation(&self) -> Valuation {
        Valuation {
            principal: Decimal::ZERO,
            interest: Decimal::ZERO,
            total_value: Decimal::ZERO,
            days_elapsed: 0,
            annual_rate_pct: round_money(self.annual_rate_percent()),
            daily_rate_pct: round_rate(self.daily_rate() * Decimal::ONE_HUNDRED),
            effective_rate_pct: None,
        }
    }
}

impl Default for InterestEngine {
    fn default() -> Self {
        Self {
            annual_rate: RwLock::new(DEFAULT_ANNUAL_RATE),
        }
    }
}

/// Round a monetary or percentage figure to 2dp, half-up
fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a daily-rate percentage figure to 4dp, half-up
fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}
