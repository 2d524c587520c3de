//! Source of the canonical transaction list.

use crate::domain::error::LedgerError;
use crate::domain::transaction::Transaction;

pub trait TransactionPort {
    /// Every ledger line in input order; `Transaction::index` is the position in
    /// the returned vector.
    fn load_transactions(&self) -> Result<Vec<Transaction>, LedgerError>;
}
