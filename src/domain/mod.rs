//! Ledger engine: pure transformations over the canonical transaction list.

pub mod config_validation;
pub mod currency;
pub mod deposits;
pub mod dividend;
pub mod dividend_yield;
pub mod error;
pub mod filter;
pub mod holdings;
pub mod ledger;
pub mod normalize;
pub mod position;
pub mod reconcile;
pub mod trade_parser;
pub mod transaction;
