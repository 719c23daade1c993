//! MintFund Core - Domain types
//!
//! This crate contains the fundamental types used across MintFund:
//! - `Amount`: Non-negative decimal wrapper for fiat-denominated values
//! - `TokenUnits`: Integer smallest-unit token quantity

pub mod amount;
pub mod units;

pub use amount::{Amount, AmountError};
pub use units::{TokenUnits, UnitsError};
