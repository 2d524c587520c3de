//! Configuration validation.
//!
//! Every key is optional; only values that are present are checked.

use crate::domain::currency::is_currency_code;
use crate::domain::error::LedgerError;
use crate::domain::ledger::{AccountingMethod, OversellPolicy};
use crate::ports::config_port::ConfigPort;

pub fn validate_ledger_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_method(config)?;
    validate_oversell(config)?;
    Ok(())
}

pub fn validate_dividend_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_base_currency(config)?;
    Ok(())
}

fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_method(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(value) = present(config, "ledger", "method") {
        value
            .parse::<AccountingMethod>()
            .map_err(|reason| LedgerError::ConfigInvalid {
                section: "ledger".to_string(),
                key: "method".to_string(),
                reason,
            })?;
    }
    Ok(())
}

fn validate_oversell(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(value) = present(config, "ledger", "oversell") {
        value
            .parse::<OversellPolicy>()
            .map_err(|reason| LedgerError::ConfigInvalid {
                section: "ledger".to_string(),
                key: "oversell".to_string(),
                reason,
            })?;
    }
    Ok(())
}

fn validate_base_currency(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(value) = present(config, "dividends", "base_currency") {
        if !is_currency_code(&value) {
            return Err(LedgerError::ConfigInvalid {
                section: "dividends".to_string(),
                key: "base_currency".to_string(),
                reason: format!("'{value}' is not a three-letter currency code"),
            });
        }
    }
    Ok(())
}
