//! Dividend event grouping and summaries.
//!
//! A payment usually arrives as a gross "Dividendo" line plus a
//! "Retención del dividendo" line sharing value date, instrument and order id.

use std::collections::HashMap;

use super::currency::DEFAULT_CURRENCY;
use super::normalize::normalize_date_key;
use super::transaction::Transaction;

const DIVIDEND_WORD: &str = "dividendo";
const WITHHOLDING_PHRASES: &[&str] = &["retención del dividendo", "retencion del dividendo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DividendLine {
    Dividend,
    Withholding,
}

/// Classify a ledger line by its description; `None` for unrelated lines.
pub fn classify_dividend_line(description: &str) -> Option<DividendLine> {
    let lower = description.to_lowercase();
    if WITHHOLDING_PHRASES.iter().any(|p| lower.contains(p)) {
        Some(DividendLine::Withholding)
    } else if lower.contains(DIVIDEND_WORD) {
        Some(DividendLine::Dividend)
    } else {
        None
    }
}

/// Identity of one payment event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DividendKey {
    /// `YYYY-MM-DD` when the value date was recognized.
    pub value_date: String,
    /// Uppercased ISIN, or product name when the line has no ISIN.
    pub instrument: String,
    pub order_id: String,
}

impl DividendKey {
    pub fn for_transaction(tx: &Transaction) -> Self {
        let date = if tx.value_date.trim().is_empty() {
            &tx.date
        } else {
            &tx.value_date
        };
        let isin = tx.isin.trim().to_uppercase();
        DividendKey {
            value_date: normalize_date_key(date),
            instrument: if isin.is_empty() {
                tx.product.trim().to_uppercase()
            } else {
                isin
            },
            order_id: tx.order_id.trim().to_uppercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrencyAmounts {
    pub gross: f64,
    pub withholding: f64,
}

impl CurrencyAmounts {
    pub fn net(&self) -> f64 {
        self.gross - self.withholding
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DividendGroup {
    pub key: DividendKey,
    pub date: String,
    pub value_date: String,
    pub product: String,
    pub isin: String,
    pub order_id: String,
    /// Indices of the member transactions, in input order.
    pub lines: Vec<usize>,
    /// Per-currency totals in first-seen order.
    pub per_currency: Vec<(String, CurrencyAmounts)>,
    pub gross: f64,
    pub withholding: f64,
    pub net: f64,
    pub net_base_approx: f64,
}

impl DividendGroup {
    fn new(key: DividendKey, tx: &Transaction) -> Self {
        DividendGroup {
            key,
            date: tx.date.clone(),
            value_date: tx.value_date.clone(),
            product: tx.product.clone(),
            isin: tx.isin.clone(),
            order_id: tx.order_id.trim().to_string(),
            lines: Vec::new(),
            per_currency: Vec::new(),
            gross: 0.0,
            withholding: 0.0,
            net: 0.0,
            net_base_approx: 0.0,
        }
    }

    pub fn currency_amounts(&self, currency: &str) -> Option<&CurrencyAmounts> {
        self.per_currency
            .iter()
            .find(|(c, _)| c == currency)
            .map(|(_, amounts)| amounts)
    }

    fn currency_amounts_mut(&mut self, currency: &str) -> &mut CurrencyAmounts {
        let i = match self.per_currency.iter().position(|(c, _)| c == currency) {
            Some(i) => i,
            None => {
                self.per_currency
                    .push((currency.to_string(), CurrencyAmounts::default()));
                self.per_currency.len() - 1
            }
        };
        &mut self.per_currency[i].1
    }

    /// First currency seen in the event.
    pub fn main_currency(&self) -> Option<&str> {
        self.per_currency.first().map(|(c, _)| c.as_str())
    }

    /// Date used for ordering and month filters.
    pub fn effective_date(&self) -> &str {
        if self.value_date.trim().is_empty() {
            &self.date
        } else {
            &self.value_date
        }
    }
}

fn line_currency(tx: &Transaction) -> String {
    tx.cash_currency().unwrap_or(DEFAULT_CURRENCY).to_uppercase()
}

/// Group dividend and withholding lines into payment events, newest first.
pub fn build_dividend_groups(transactions: &[Transaction], base_currency: &str) -> Vec<DividendGroup> {
    let base = base_currency.trim().to_uppercase();
    let mut groups: Vec<DividendGroup> = Vec::new();
    let mut index: HashMap<DividendKey, usize> = HashMap::new();

    for (i, tx) in transactions.iter().enumerate() {
        let Some(kind) = classify_dividend_line(&tx.description) else {
            continue;
        };
        let key = DividendKey::for_transaction(tx);
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                groups.push(DividendGroup::new(key.clone(), tx));
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };

        let group = &mut groups[slot];
        group.lines.push(i);
        let currency = line_currency(tx);
        match kind {
            DividendLine::Dividend => {
                let gross = tx.amount.max(0.0);
                group.gross += gross;
                group.currency_amounts_mut(&currency).gross += gross;
            }
            DividendLine::Withholding => {
                let withheld = tx.amount.abs();
                group.withholding += withheld;
                group.currency_amounts_mut(&currency).withholding += withheld;
            }
        }
    }

    for group in groups.iter_mut() {
        group.net = event_net(group, transactions);
        group.net_base_approx = base_approximation(group, transactions, &base);
    }

    groups.sort_by(|a, b| b.key.value_date.cmp(&a.key.value_date));
    log::debug!("grouped dividend lines into {} events", groups.len());
    groups
}

fn event_net(group: &DividendGroup, transactions: &[Transaction]) -> f64 {
    if group.gross != 0.0 {
        return group.gross - group.withholding;
    }
    // Already net of tax: take the first positive line mentioning a dividend.
    group
        .lines
        .iter()
        .map(|&i| &transactions[i])
        .find(|tx| tx.description_lower().contains(DIVIDEND_WORD) && tx.amount > 0.0)
        .map_or(group.gross - group.withholding, |tx| tx.amount - group.withholding)
}

fn base_approximation(group: &DividendGroup, transactions: &[Transaction], base: &str) -> f64 {
    let in_base: f64 = group
        .lines
        .iter()
        .map(|&i| &transactions[i])
        .filter(|tx| line_currency(tx) == base)
        .map(|tx| tx.amount)
        .sum();
    if in_base != 0.0 {
        return in_base;
    }
    match group.per_currency.as_slice() {
        [(only, _)] if only == base => group.net,
        _ => 0.0,
    }
}

/// Most frequent balance currency (primary currency when absent); first seen wins ties.
pub fn detect_base_currency(transactions: &[Transaction]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for tx in transactions {
        let code = [tx.balance_currency.trim(), tx.currency.trim()]
            .into_iter()
            .find(|c| !c.is_empty())
            .map(str::to_uppercase);
        let Some(code) = code else { continue };
        match counts.iter_mut().find(|(c, _)| *c == code) {
            Some((_, n)) => *n += 1,
            None => counts.push((code, 1)),
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (code, n) in counts {
        if best.as_ref().is_none_or(|(_, max)| n > *max) {
            best = Some((code, n));
        }
    }
    best.map(|(code, _)| code)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencySummary {
    pub currency: String,
    pub gross: f64,
    pub withholding: f64,
    pub net: f64,
}

/// Totals per currency across all events, sorted by currency code.
pub fn currency_summary(groups: &[DividendGroup]) -> Vec<CurrencySummary> {
    let mut totals: Vec<(String, CurrencyAmounts)> = Vec::new();
    for group in groups {
        for (currency, amounts) in &group.per_currency {
            match totals.iter_mut().find(|(c, _)| c == currency) {
                Some((_, acc)) => {
                    acc.gross += amounts.gross;
                    acc.withholding += amounts.withholding;
                }
                None => totals.push((currency.clone(), *amounts)),
            }
        }
    }
    totals.sort_by(|a, b| a.0.cmp(&b.0));
    totals
        .into_iter()
        .map(|(currency, a)| CurrencySummary {
            currency,
            gross: a.gross,
            withholding: a.withholding,
            net: a.net(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub product: String,
    pub isin: String,
    pub events: usize,
    pub currency: Option<String>,
    pub gross: f64,
    pub withholding: f64,
    pub net: f64,
}

/// Totals per (ISIN, product) in the product's first currency, highest net first.
pub fn product_summary(groups: &[DividendGroup]) -> Vec<ProductSummary> {
    let mut rows: Vec<ProductSummary> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for group in groups {
        let key = (group.isin.to_uppercase(), group.product.to_uppercase());
        let slot = *index.entry(key).or_insert_with(|| {
            rows.push(ProductSummary {
                product: group.product.clone(),
                isin: group.isin.clone(),
                events: 0,
                currency: None,
                gross: 0.0,
                withholding: 0.0,
                net: 0.0,
            });
            rows.len() - 1
        });

        let row = &mut rows[slot];
        row.events += 1;
        if row.currency.is_none() {
            row.currency = group.main_currency().map(str::to_string);
        }
        match &row.currency {
            Some(currency) => {
                let amounts = group.currency_amounts(currency).copied().unwrap_or_default();
                row.gross += amounts.gross;
                row.withholding += amounts.withholding;
                row.net += amounts.net();
            }
            None => row.net += group.net,
        }
    }

    rows.sort_by(|a, b| b.net.total_cmp(&a.net));
    rows
}

/// Selects which groups are reported; grouping itself always sees every line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DividendFilter {
    pub search: Option<String>,
    /// `YYYY-MM`.
    pub month: Option<String>,
}

impl DividendFilter {
    pub fn matches(&self, group: &DividendGroup) -> bool {
        let term_ok = match self.search.as_deref().map(str::to_lowercase) {
            Some(term) if !term.is_empty() => {
                group.product.to_lowercase().contains(&term)
                    || group.isin.to_lowercase().contains(&term)
            }
            _ => true,
        };
        let month_ok = match self.month.as_deref().filter(|m| !m.is_empty()) {
            Some(month) => {
                let date = group.effective_date();
                !date.is_empty() && normalize_date_key(date).starts_with(month)
            }
            None => true,
        };
        term_ok && month_ok
    }

    pub fn apply<'a>(&self, groups: &'a [DividendGroup]) -> Vec<&'a DividendGroup> {
        groups.iter().filter(|g| self.matches(g)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(value_date: &str, isin: &str, description: &str, currency: &str, amount: f64) -> Transaction {
        Transaction {
            date: value_date.into(),
            value_date: value_date.into(),
            product: "ACME".into(),
            isin: isin.into(),
            description: description.into(),
            currency: currency.into(),
            amount,
            balance_currency: currency.into(),
            ..Default::default()
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify_dividend_line("Dividendo"), Some(DividendLine::Dividend));
        assert_eq!(
            classify_dividend_line("Retención del dividendo"),
            Some(DividendLine::Withholding)
        );
        assert_eq!(
            classify_dividend_line("RETENCION DEL DIVIDENDO"),
            Some(DividendLine::Withholding)
        );
        assert_eq!(classify_dividend_line("Compra 1 X@1 EUR"), None);
    }

    #[test]
    fn gross_and_withholding_combine() {
        let txs = vec![
            line("2024-03-15", "US1", "Dividendo", "USD", 100.0),
            line("2024-03-15", "US1", "Retención del dividendo", "USD", -15.0),
        ];
        let groups = build_dividend_groups(&txs, "EUR");
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.gross, 100.0);
        assert_eq!(g.withholding, 15.0);
        assert_eq!(g.net, 85.0);
        assert_eq!(g.lines, vec![0, 1]);
        assert_eq!(
            g.currency_amounts("USD"),
            Some(&CurrencyAmounts {
                gross: 100.0,
                withholding: 15.0
            })
        );
        assert_eq!(g.net_base_approx, 0.0);
    }

    #[test]
    fn net_only_event_uses_positive_line() {
        let txs = vec![
            line("2024-03-15", "US1", "Dividendo", "EUR", -2.0),
            line("2024-03-15", "US1", "Retención del dividendo", "EUR", 5.0),
        ];
        let groups = build_dividend_groups(&txs, "EUR");
        let g = &groups[0];
        assert_eq!(g.gross, 0.0);
        assert_eq!(g.withholding, 5.0);
        assert_eq!(g.net, 0.0);
    }

    #[test]
    fn base_approximation_sums_base_lines() {
        let txs = vec![
            line("2024-03-15", "ES1", "Dividendo", "EUR", 40.0),
            line("2024-03-15", "ES1", "Retención del dividendo", "EUR", -7.6),
        ];
        let groups = build_dividend_groups(&txs, "eur");
        assert!((groups[0].net_base_approx - 32.4).abs() < 1e-9);
    }

    #[test]
    fn groups_split_by_key_and_sort_descending() {
        let mut other_order = line("2024-03-15", "US1", "Dividendo", "USD", 5.0);
        other_order.order_id = "abc".into();
        let txs = vec![
            line("2024-01-10", "US1", "Dividendo", "USD", 10.0),
            line("2024-03-15", "US1", "Dividendo", "USD", 20.0),
            other_order,
            line("15-02-2024", "US2", "Dividendo", "USD", 30.0),
        ];
        let groups = build_dividend_groups(&txs, "EUR");
        assert_eq!(groups.len(), 4);
        let dates: Vec<&str> = groups.iter().map(|g| g.key.value_date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-15", "2024-03-15", "2024-02-15", "2024-01-10"]);
        assert_eq!(groups[1].key.order_id, "ABC");
    }

    #[test]
    fn product_fallback_key_is_uppercased() {
        let key = DividendKey::for_transaction(&Transaction {
            date: "2024-01-01".into(),
            product: "Acme Corp".into(),
            ..Default::default()
        });
        assert_eq!(key.instrument, "ACME CORP");
        assert_eq!(key.value_date, "2024-01-01");
    }

    #[test]
    fn detect_base_currency_counts_balance_first() {
        let txs = vec![
            line("2024-01-01", "", "x", "USD", 0.0),
            Transaction {
                currency: "USD".into(),
                balance_currency: "EUR".into(),
                ..Default::default()
            },
            Transaction {
                currency: "EUR".into(),
                ..Default::default()
            },
        ];
        assert_eq!(detect_base_currency(&txs).as_deref(), Some("EUR"));
        assert_eq!(detect_base_currency(&[]), None);
    }

    #[test]
    fn detect_base_currency_first_seen_wins_ties() {
        let txs = vec![
            line("2024-01-01", "", "x", "USD", 0.0),
            line("2024-01-01", "", "x", "EUR", 0.0),
        ];
        assert_eq!(detect_base_currency(&txs).as_deref(), Some("USD"));
    }

    #[test]
    fn summaries() {
        let txs = vec![
            line("2024-03-15", "US1", "Dividendo", "USD", 100.0),
            line("2024-03-15", "US1", "Retención del dividendo", "USD", -15.0),
            line("2024-06-15", "US1", "Dividendo", "USD", 50.0),
            line("2024-04-01", "ES1", "Dividendo", "EUR", 200.0),
        ];
        let groups = build_dividend_groups(&txs, "EUR");

        let by_ccy = currency_summary(&groups);
        assert_eq!(by_ccy.len(), 2);
        assert_eq!(by_ccy[0].currency, "EUR");
        assert_eq!(by_ccy[1].net, 135.0);

        let by_product = product_summary(&groups);
        assert_eq!(by_product[0].isin, "ES1");
        assert_eq!(by_product[1].events, 2);
        assert_eq!(by_product[1].currency.as_deref(), Some("USD"));
        assert_eq!(by_product[1].net, 135.0);
    }

    #[test]
    fn filter_by_search_and_month() {
        let txs = vec![
            line("2024-03-15", "US1", "Dividendo", "USD", 100.0),
            line("2024-04-15", "US2", "Dividendo", "USD", 100.0),
        ];
        let groups = build_dividend_groups(&txs, "EUR");

        let filter = DividendFilter {
            search: Some("us2".into()),
            month: None,
        };
        assert_eq!(filter.apply(&groups).len(), 1);

        let filter = DividendFilter {
            search: Some("acme".into()),
            month: Some("2024-03".into()),
        };
        let hits = filter.apply(&groups);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].isin, "US1");

        assert_eq!(DividendFilter::default().apply(&groups).len(), 2);
    }
}
