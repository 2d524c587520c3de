//! Cumulative cash deposits.

use super::transaction::{Transaction, chronological_order};

const DEPOSIT_WORDS: &[&str] = &["deposit", "depósito", "deposito"];

#[derive(Debug, Clone, PartialEq)]
pub struct DepositPoint {
    pub date: String,
    pub amount: f64,
    pub cumulative: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepositSeries {
    pub points: Vec<DepositPoint>,
    pub total: f64,
}

pub fn is_deposit(tx: &Transaction) -> bool {
    let lower = tx.description_lower();
    DEPOSIT_WORDS.iter().any(|w| lower.contains(w))
}

pub fn deposit_series(transactions: &[Transaction]) -> DepositSeries {
    let mut series = DepositSeries::default();
    for i in chronological_order(transactions) {
        let tx = &transactions[i];
        if !is_deposit(tx) {
            continue;
        }
        series.total += tx.amount;
        series.points.push(DepositPoint {
            date: tx.date.clone(),
            amount: tx.amount,
            cumulative: series.total,
        });
    }
    series
}
