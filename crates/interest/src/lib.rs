//! MintFund Interest Engine - Daily-compounded accrual
//!
//! Pure calculator: principal + elapsed time -> accrued value.
//! The engine owns the current rate configuration; rate changes go through
//! the multi-sig workflow and take effect for all subsequent calculations.

pub mod engine;
pub mod error;

pub use engine::{
    BreakEven, DailyBreakdown, InterestEngine, Portfolio, PortfolioEntry, PortfolioLine,
    Valuation, DEFAULT_ANNUAL_RATE, PERIODS_PER_YEAR,
};
pub use error::InterestError;
