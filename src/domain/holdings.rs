//! Point-in-time holdings per instrument.
//!
//! The timeline replays the same trade stream as the ledger but always reduces
//! cost FIFO-proportionally, whatever accounting method the ledger uses.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::trade_parser::{TradeAction, parse_trade};
use super::transaction::{Transaction, chronological_order, trade_currency};

/// Timeline lots below this many shares are pruned.
pub const TIMELINE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSnapshot {
    pub date: NaiveDate,
    pub shares: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct CostLot {
    shares: f64,
    cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentTimeline {
    pub key: String,
    pub product_name: String,
    pub isin: String,
    pub currency: String,
    /// Ordered by date, non-decreasing.
    pub snapshots: Vec<TimelineSnapshot>,
}

impl InstrumentTimeline {
    /// Last snapshot dated on or before `date`.
    pub fn snapshot_on(&self, date: NaiveDate) -> Option<&TimelineSnapshot> {
        let n = self.snapshots.partition_point(|s| s.date <= date);
        if n == 0 { None } else { self.snapshots.get(n - 1) }
    }

    pub fn shares_on(&self, date: NaiveDate) -> f64 {
        self.snapshot_on(date).map_or(0.0, |s| s.shares)
    }

    pub fn cost_on(&self, date: NaiveDate) -> f64 {
        self.snapshot_on(date).map_or(0.0, |s| s.cost)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.snapshots.first().map(|s| s.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.snapshots.last().map(|s| s.date)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingsTimeline {
    instruments: Vec<InstrumentTimeline>,
    index: HashMap<String, usize>,
}

impl HoldingsTimeline {
    pub fn get(&self, key: &str) -> Option<&InstrumentTimeline> {
        self.index.get(key).map(|&i| &self.instruments[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentTimeline> {
        self.instruments.iter()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Shares held for `key` at the end of `date`; zero when unknown.
    pub fn shares_on(&self, key: &str, date: NaiveDate) -> f64 {
        self.get(key).map_or(0.0, |t| t.shares_on(date))
    }

    pub fn cost_on(&self, key: &str, date: NaiveDate) -> f64 {
        self.get(key).map_or(0.0, |t| t.cost_on(date))
    }
}

pub fn build_holdings_timeline(transactions: &[Transaction]) -> HoldingsTimeline {
    let mut timeline = HoldingsTimeline::default();
    let mut lots: Vec<Vec<CostLot>> = Vec::new();

    for i in chronological_order(transactions) {
        let tx = &transactions[i];
        let Some(trade) = parse_trade(&tx.description).into_trade() else {
            continue;
        };
        let Some(price) = trade.usable_price() else {
            continue;
        };
        let Some(key) = tx.instrument_key(&trade.product) else {
            continue;
        };
        let Some(date) = tx.calendar_date() else {
            log::warn!(
                "line {}: trade date '{}' not understood, left out of the timeline",
                tx.index,
                tx.date
            );
            continue;
        };

        let slot = match timeline.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let product = if tx.product.trim().is_empty() {
                    trade.product.trim()
                } else {
                    tx.product.trim()
                };
                timeline.instruments.push(InstrumentTimeline {
                    key: key.clone(),
                    product_name: product.to_string(),
                    isin: tx.isin.trim().to_string(),
                    currency: trade_currency(trade.currency.as_deref(), tx),
                    snapshots: Vec::new(),
                });
                lots.push(Vec::new());
                timeline.index.insert(key, timeline.instruments.len() - 1);
                timeline.instruments.len() - 1
            }
        };

        let open = &mut lots[slot];
        let quantity = trade.quantity as f64;
        match trade.action {
            TradeAction::Buy => open.push(CostLot {
                shares: quantity,
                cost: quantity * price,
            }),
            TradeAction::Sell => consume_proportionally(open, quantity),
        }

        timeline.instruments[slot].snapshots.push(TimelineSnapshot {
            date,
            shares: open.iter().map(|l| l.shares).sum(),
            cost: open.iter().map(|l| l.cost).sum(),
        });
    }

    timeline
}

fn consume_proportionally(lots: &mut Vec<CostLot>, quantity: f64) {
    let mut remaining = quantity;
    for lot in lots.iter_mut() {
        if remaining <= 0.0 {
            break;
        }
        let consume = remaining.min(lot.shares);
        if lot.shares > 0.0 {
            lot.cost -= lot.cost * (consume / lot.shares);
        }
        lot.shares -= consume;
        remaining -= consume;
    }
    lots.retain(|lot| lot.shares >= TIMELINE_EPSILON);
}
