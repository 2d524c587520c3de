//! Domain error types.
//!
//! The engine itself is best-effort and never fails on ledger data; these errors
//! come from configuration, input adapters and the what-if sale query.

/// Rejection reasons for a what-if sale.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("no shares held for {key}")]
    NoShares { key: String },

    #[error("invalid quantity to sell: {quantity}")]
    InvalidQuantity { quantity: f64 },

    #[error("not enough shares to sell: requested {requested}, held {held}")]
    InsufficientShares { requested: f64, held: f64 },

    #[error("invalid sale price: {price}")]
    InvalidPrice { price: f64 },
}

/// Top-level error type for brokerledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("input error: {reason}")]
    Input { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no position for instrument {key}")]
    UnknownInstrument { key: String },

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Input { .. } => 3,
            LedgerError::UnknownInstrument { .. } | LedgerError::Simulation(_) => 4,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_message_names_section_and_key() {
        let err = LedgerError::ConfigInvalid {
            section: "ledger".into(),
            key: "method".into(),
            reason: "expected fifo or average".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [ledger] method: expected fifo or average"
        );
    }

    #[test]
    fn simulation_error_converts_transparently() {
        let err: LedgerError = SimulationError::InvalidPrice { price: -1.0 }.into();
        assert_eq!(err.to_string(), "invalid sale price: -1");
    }

    #[test]
    fn insufficient_shares_message() {
        let err = SimulationError::InsufficientShares {
            requested: 12.0,
            held: 10.0,
        };
        assert_eq!(
            err.to_string(),
            "not enough shares to sell: requested 12, held 10"
        );
    }
}
