//! Matches raw trade lines back to ledger history entries for reporting.

use super::ledger::Ledger;
use super::position::{LedgerEntry, Position};
use super::trade_parser::{ParsedTrade, TradeAction, parse_trade};
use super::transaction::{Transaction, trade_currency};

const SALE_PRICE_TOLERANCE: f64 = 1e-6;
const BUY_PRICE_TOLERANCE: f64 = 0.01;

/// One reporting pass over a position's history.
///
/// Each history entry can be claimed once per session; the ledger itself is
/// never marked.
pub struct ReconciliationSession<'a> {
    position: &'a Position,
    used: Vec<bool>,
}

impl<'a> ReconciliationSession<'a> {
    pub fn new(position: &'a Position) -> Self {
        ReconciliationSession {
            position,
            used: vec![false; position.history.len()],
        }
    }

    fn claim(&mut self, found: Option<usize>) -> Option<&'a LedgerEntry> {
        let i = found?;
        self.used[i] = true;
        self.position.history.get(i)
    }

    fn find_unused(&self, pred: impl Fn(&LedgerEntry) -> bool) -> Option<usize> {
        self.position
            .history
            .iter()
            .enumerate()
            .find(|(i, entry)| !self.used[*i] && pred(*entry))
            .map(|(i, _)| i)
    }

    /// Sell entry for `tx`: by order id, then by date/time/quantity/price, then
    /// the first unused sell.
    pub fn match_sale(&mut self, tx: &Transaction, trade: &ParsedTrade) -> Option<&'a LedgerEntry> {
        let is_sell = |e: &LedgerEntry| e.action == TradeAction::Sell;

        if let Some(id) = tx.order_id() {
            let found = self.find_unused(|e| is_sell(e) && e.order_id.as_deref() == Some(id));
            if found.is_some() {
                return self.claim(found);
            }
        }

        if !tx.date.is_empty() {
            let time = tx.time.trim();
            let requested = trade.quantity as f64;
            let price = trade.price.unwrap_or(0.0);
            let found = self.find_unused(|e| {
                is_sell(e)
                    && e.date == tx.date
                    && (time.is_empty() || e.time.as_deref().is_none_or(|t| t == time))
                    && e.requested_quantity == requested
                    && (e.price - price).abs() < SALE_PRICE_TOLERANCE
            });
            if found.is_some() {
                return self.claim(found);
            }
        }

        let found = self.find_unused(is_sell);
        self.claim(found)
    }

    /// Buy entry with the same date and quantity and a price within a cent.
    pub fn match_buy(&mut self, date: &str, quantity: f64, price: f64) -> Option<&'a LedgerEntry> {
        let found = self.find_unused(|e| {
            e.action == TradeAction::Buy
                && e.date == date
                && e.quantity == quantity
                && (e.price - price).abs() < BUY_PRICE_TOLERANCE
        });
        self.claim(found)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub index: usize,
    pub date: String,
    pub time: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub currency: String,
    pub total: f64,
    pub avg_sale: Option<f64>,
    pub avg_position: Option<f64>,
    pub profit_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeSummary {
    pub operations: usize,
    pub current_shares: f64,
    pub avg_position: f64,
    pub total_cost: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductTradeReport {
    pub key: String,
    pub product: String,
    pub isin: String,
    pub summary: TradeSummary,
    /// Chronological.
    pub rows: Vec<TradeRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeReport {
    pub products: Vec<ProductTradeReport>,
    pub operations: usize,
}

struct PendingTrade<'t> {
    tx: &'t Transaction,
    trade: ParsedTrade,
    price: f64,
}

struct PendingGroup<'t> {
    key: String,
    product: String,
    isin: String,
    trades: Vec<PendingTrade<'t>>,
}

/// Trade report for the selected lines, reconciled against a ledger built
/// from the full transaction list.
///
/// Only instruments with at least one sale among `selected` are reported.
pub fn build_trade_report(selected: &[&Transaction], ledger: &Ledger) -> TradeReport {
    let mut groups: Vec<PendingGroup> = Vec::new();

    for &tx in selected {
        let Some(trade) = parse_trade(&tx.description).into_trade() else {
            continue;
        };
        let Some(price) = trade.usable_price() else {
            continue;
        };
        let Some(key) = tx.instrument_key(&trade.product) else {
            continue;
        };
        let pending = PendingTrade { tx, trade, price };
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.trades.push(pending),
            None => groups.push(PendingGroup {
                product: first_non_empty(&[
                    tx.product.as_str(),
                    pending.trade.product.as_str(),
                    key.as_str(),
                ]),
                isin: tx.isin.trim().to_string(),
                key,
                trades: vec![pending],
            }),
        }
    }

    let mut report = TradeReport::default();
    for mut group in groups {
        if !group.trades.iter().any(|t| t.trade.action == TradeAction::Sell) {
            continue;
        }
        group.trades.sort_by_key(|t| t.tx.sort_key());

        let position = ledger.get(&group.key);
        let mut session = position.map(ReconciliationSession::new);
        let currency = position.map_or_else(
            || trade_currency(group.trades[0].trade.currency.as_deref(), group.trades[0].tx),
            |p| p.currency.clone(),
        );

        let rows: Vec<TradeRow> = group
            .trades
            .iter()
            .map(|pending| trade_row(pending, session.as_mut()))
            .collect();

        let summary = TradeSummary {
            operations: rows.len(),
            current_shares: position.map_or(0.0, |p| p.shares),
            avg_position: position.map_or(0.0, Position::avg_position),
            total_cost: position.map_or(0.0, |p| p.total_cost),
            currency,
        };
        report.operations += rows.len();
        report.products.push(ProductTradeReport {
            product: position
                .map(|p| p.label().to_string())
                .unwrap_or(group.product),
            isin: position
                .map(|p| p.isin.clone())
                .filter(|isin| !isin.is_empty())
                .unwrap_or(group.isin),
            key: group.key,
            summary,
            rows,
        });
    }
    report
}

fn trade_row(pending: &PendingTrade, session: Option<&mut ReconciliationSession>) -> TradeRow {
    let PendingTrade { tx, trade, price } = pending;
    let currency = trade_currency(trade.currency.as_deref(), tx);
    let requested = trade.quantity as f64;

    let mut row = TradeRow {
        index: tx.index,
        date: tx.date.clone(),
        time: tx.time.clone(),
        action: trade.action,
        quantity: requested,
        price: *price,
        currency,
        total: price * requested,
        avg_sale: None,
        avg_position: None,
        profit_loss: None,
    };

    let Some(session) = session else {
        return row;
    };
    match trade.action {
        TradeAction::Buy => {
            if let Some(entry) = session.match_buy(&tx.date, requested, *price) {
                row.avg_position = Some(entry.avg_position).filter(|avg| *avg > 0.0);
            }
        }
        TradeAction::Sell => {
            if let Some(entry) = session.match_sale(tx, trade) {
                if entry.quantity > 0.0 {
                    row.quantity = entry.quantity;
                    row.total = price * entry.quantity;
                }
                row.currency = entry.currency.clone();
                row.avg_sale = entry.avg_sale;
                row.avg_position = Some(entry.avg_position);
                row.profit_loss = entry.profit_loss;
            }
        }
    }
    row
}

fn first_non_empty(candidates: &[&str]) -> String {
    candidates
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}
