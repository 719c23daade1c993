//! Interest engine errors

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterestError {
    #[error("End time {end} precedes start time {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Rate must be between 0 and 100 percent, got {0}")]
    InvalidRate(Decimal),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
