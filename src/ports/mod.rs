//! Port traits at the boundary of the ledger engine.

pub mod config_port;
pub mod report_port;
pub mod transaction_port;
