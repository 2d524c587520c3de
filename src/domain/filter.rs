//! Row selection for reports. Derived views are always built from the full list.

use super::normalize::normalize_date_key;
use super::transaction::Transaction;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Case-insensitive substring of product or description.
    pub search: Option<String>,
    /// Description keyword, e.g. `compra` or `venta`.
    pub kind: Option<String>,
    /// `YYYY-MM` on the trade date.
    pub month: Option<String>,
}

fn non_empty_lower(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

impl TransactionFilter {
    pub fn is_empty(&self) -> bool {
        non_empty_lower(&self.search).is_none()
            && non_empty_lower(&self.kind).is_none()
            && non_empty_lower(&self.month).is_none()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        let description = tx.description_lower();

        if let Some(term) = non_empty_lower(&self.search) {
            if !tx.product.to_lowercase().contains(&term) && !description.contains(&term) {
                return false;
            }
        }
        if let Some(kind) = non_empty_lower(&self.kind) {
            if !description.contains(&kind) {
                return false;
            }
        }
        if let Some(month) = non_empty_lower(&self.month) {
            if !normalize_date_key(&tx.date).starts_with(&month) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions.iter().filter(|tx| self.matches(tx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(date: &str, product: &str, description: &str) -> Transaction {
        Transaction {
            date: date.into(),
            product: product.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let txs = vec![tx("2024-01-01", "A", "x"), tx("2024-02-01", "B", "y")];
        let filter = TransactionFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&txs).len(), 2);
    }

    #[test]
    fn search_kind_and_month() {
        let txs = vec![
            tx("2024-01-05", "Apple Inc", "Compra 1 Apple@1 USD"),
            tx("2024-02-05", "Apple Inc", "Venta 1 Apple@2 USD"),
            tx("2024-02-07", "Tesco", "Compra 3 Tesco@2 GBP"),
        ];

        let by_search = TransactionFilter {
            search: Some("APPLE".into()),
            ..Default::default()
        };
        assert_eq!(by_search.apply(&txs).len(), 2);

        let by_kind = TransactionFilter {
            kind: Some("compra".into()),
            ..Default::default()
        };
        assert_eq!(by_kind.apply(&txs).len(), 2);

        let combined = TransactionFilter {
            search: Some("apple".into()),
            kind: Some("venta".into()),
            month: Some("2024-02".into()),
        };
        let hits = combined.apply(&txs);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].date, "2024-02-05");
    }

    #[test]
    fn month_accepts_day_first_dates() {
        let txs = vec![tx("05-02-2024", "A", "x")];
        let filter = TransactionFilter {
            month: Some("2024-02".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&txs).len(), 1);
    }
}
