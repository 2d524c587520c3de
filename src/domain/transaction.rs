//! Canonical transaction record ingested from a broker ledger export.

use chrono::{NaiveDate, NaiveDateTime};

use super::currency::{DEFAULT_CURRENCY, normalize_currency_amount};
use super::normalize::{
    CellValue, parse_amount, parse_calendar_date, parse_date_to_iso, parse_time, trade_sort_key,
};

/// Number of positional fields in a ledger row.
pub const FIELD_COUNT: usize = 12;

/// One ledger line. Immutable once ingested; `index` is its position in the input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transaction {
    pub index: usize,
    pub date: String,
    pub time: String,
    pub value_date: String,
    pub product: String,
    pub isin: String,
    pub description: String,
    pub kind: String,
    pub currency: String,
    pub amount: f64,
    pub balance_currency: String,
    pub balance: f64,
    pub order_id: String,
}

impl Transaction {
    /// Build a transaction from positional cells
    /// `[date, time, valueDate, product, isin, description, type, currency1, amount1, currency2, balance, orderId]`.
    ///
    /// Missing trailing cells are treated as empty. Minor-unit currencies are
    /// rescaled on both the primary and balance pairs.
    pub fn from_cells(index: usize, cells: &[CellValue]) -> Self {
        let empty = CellValue::Empty;
        let cell = |i: usize| cells.get(i).unwrap_or(&empty);

        let (currency, amount) = normalize_currency_amount(&cell(7).as_text(), parse_amount(cell(8)));
        let (balance_currency, balance) =
            normalize_currency_amount(&cell(9).as_text(), parse_amount(cell(10)));

        Transaction {
            index,
            date: parse_date_to_iso(cell(0)),
            time: parse_time(cell(1)),
            value_date: parse_date_to_iso(cell(2)),
            product: cell(3).as_text(),
            isin: cell(4).as_text(),
            description: cell(5).as_text(),
            kind: cell(6).as_text(),
            currency,
            amount,
            balance_currency,
            balance,
            order_id: cell(11).as_text(),
        }
    }

    /// Instrument key: ISIN when present, else the product name (or `fallback_product`).
    pub fn instrument_key(&self, fallback_product: &str) -> Option<String> {
        let isin = self.isin.trim();
        if !isin.is_empty() {
            return Some(isin.to_string());
        }
        let product = if self.product.trim().is_empty() {
            fallback_product.trim()
        } else {
            self.product.trim()
        };
        if product.is_empty() {
            None
        } else {
            Some(product.to_string())
        }
    }

    pub fn description_lower(&self) -> String {
        self.description.to_lowercase()
    }

    /// Cash currency of the line: primary currency, then balance currency.
    pub fn cash_currency(&self) -> Option<&str> {
        [self.currency.as_str(), self.balance_currency.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|c| !c.is_empty())
    }

    pub fn sort_key(&self) -> NaiveDateTime {
        trade_sort_key(&self.date, &self.time)
    }

    pub fn calendar_date(&self) -> Option<NaiveDate> {
        parse_calendar_date(&self.date)
    }

    pub fn order_id(&self) -> Option<&str> {
        let id = self.order_id.trim();
        if id.is_empty() { None } else { Some(id) }
    }
}

/// Currency for a trade: the parsed price currency, then the cash currencies,
/// then the default.
pub fn trade_currency(parsed_currency: Option<&str>, tx: &Transaction) -> String {
    parsed_currency
        .filter(|c| !c.is_empty())
        .or_else(|| tx.cash_currency())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_string()
}

/// Indices of `transactions` in chronological replay order; ties keep input order.
pub fn chronological_order(transactions: &[Transaction]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..transactions.len()).collect();
    order.sort_by_key(|&i| transactions[i].sort_key());
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    #[test]
    fn from_cells_maps_positional_fields() {
        let cells = text_row(&[
            "05-03-2024",
            "10:15",
            "06-03-2024",
            "APPLE INC",
            "US0378331005",
            "Compra 10 Apple Inc@170,5 USD (US0378331005)",
            "",
            "USD",
            "-1.705,00",
            "EUR",
            "2.000,00",
            "abc-123",
        ]);
        let tx = Transaction::from_cells(3, &cells);

        assert_eq!(tx.index, 3);
        assert_eq!(tx.date, "2024-03-05");
        assert_eq!(tx.time, "10:15");
        assert_eq!(tx.value_date, "2024-03-06");
        assert_eq!(tx.product, "APPLE INC");
        assert_eq!(tx.isin, "US0378331005");
        assert_eq!(tx.currency, "USD");
        assert!((tx.amount + 1705.0).abs() < 1e-9);
        assert_eq!(tx.balance_currency, "EUR");
        assert!((tx.balance - 2000.0).abs() < 1e-9);
        assert_eq!(tx.order_id(), Some("abc-123"));
    }

    #[test]
    fn from_cells_rescales_gbx_amounts() {
        let cells = text_row(&[
            "01-01-2024", "", "", "TESCO", "GB0008847096", "Dividendo", "", "GBX", "12345", "GBX",
            "50000", "",
        ]);
        let tx = Transaction::from_cells(0, &cells);
        assert_eq!(tx.currency, "GBP");
        assert!((tx.amount - 123.45).abs() < 1e-9);
        assert_eq!(tx.balance_currency, "GBP");
        assert!((tx.balance - 500.0).abs() < 1e-9);
    }

    #[test]
    fn from_cells_accepts_typed_cells() {
        let cells = vec![
            CellValue::Number(45000.0),
            CellValue::Number(0.5),
            CellValue::Date(NaiveDate::from_ymd_opt(2023, 3, 16).unwrap()),
            CellValue::from("X"),
            CellValue::Empty,
            CellValue::from("Ingreso"),
            CellValue::Empty,
            CellValue::from("EUR"),
            CellValue::Number(250.0),
        ];
        let tx = Transaction::from_cells(0, &cells);
        assert_eq!(tx.date, "2023-03-15");
        assert_eq!(tx.time, "12:00:00");
        assert_eq!(tx.value_date, "2023-03-16");
        assert_eq!(tx.amount, 250.0);
        assert_eq!(tx.order_id(), None);
    }

    #[test]
    fn instrument_key_prefers_isin() {
        let tx = Transaction {
            isin: " US0378331005 ".into(),
            product: "APPLE".into(),
            ..Default::default()
        };
        assert_eq!(tx.instrument_key("x").as_deref(), Some("US0378331005"));

        let tx = Transaction {
            product: "APPLE".into(),
            ..Default::default()
        };
        assert_eq!(tx.instrument_key("x").as_deref(), Some("APPLE"));

        let tx = Transaction::default();
        assert_eq!(tx.instrument_key("Parsed Name").as_deref(), Some("Parsed Name"));
        assert_eq!(tx.instrument_key(""), None);
    }

    #[test]
    fn trade_currency_fallbacks() {
        let tx = Transaction {
            balance_currency: "EUR".into(),
            ..Default::default()
        };
        assert_eq!(trade_currency(Some("USD"), &tx), "USD");
        assert_eq!(trade_currency(None, &tx), "EUR");
        assert_eq!(trade_currency(None, &Transaction::default()), "EUR");
    }

    #[test]
    fn chronological_order_is_stable() {
        let mk = |date: &str, time: &str| Transaction {
            date: date.into(),
            time: time.into(),
            ..Default::default()
        };
        let txs = vec![
            mk("2024-01-02", "10:00"),
            mk("2024-01-01", ""),
            mk("2024-01-02", "10:00"),
            mk("2024-01-02", "09:00"),
        ];
        assert_eq!(chronological_order(&txs), vec![1, 3, 0, 2]);
    }
}
