//! Cost-basis ledger: replays parsed trades per instrument in chronological order.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::SimulationError;
use super::position::{LOT_EPSILON, LedgerEntry, Lot, Position, SaleFill};
use super::trade_parser::{TradeAction, TradeParse, parse_trade};
use super::transaction::{Transaction, chronological_order, trade_currency};

/// Tolerance when checking a what-if sale against held shares.
pub const SIMULATION_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountingMethod {
    /// Strict oldest-lot-first consumption.
    #[default]
    Fifo,
    /// Single blended cost over all held shares.
    Average,
}

impl FromStr for AccountingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fifo" => Ok(AccountingMethod::Fifo),
            "average" | "avg" | "weighted-average" => Ok(AccountingMethod::Average),
            other => Err(format!("unknown accounting method '{other}' (expected fifo or average)")),
        }
    }
}

impl fmt::Display for AccountingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountingMethod::Fifo => write!(f, "fifo"),
            AccountingMethod::Average => write!(f, "average"),
        }
    }
}

/// What to do when a sell asks for more shares than are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversellPolicy {
    /// Sell what is available.
    #[default]
    Clamp,
    /// Leave the position untouched and record a zero fill.
    Reject,
}

impl FromStr for OversellPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clamp" => Ok(OversellPolicy::Clamp),
            "reject" => Ok(OversellPolicy::Reject),
            other => Err(format!("unknown oversell policy '{other}' (expected clamp or reject)")),
        }
    }
}

impl fmt::Display for OversellPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OversellPolicy::Clamp => write!(f, "clamp"),
            OversellPolicy::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerConfig {
    pub method: AccountingMethod,
    pub oversell: OversellPolicy,
}

/// Positions keyed by instrument, iterated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    positions: Vec<Position>,
    index: HashMap<String, usize>,
}

impl Ledger {
    pub fn get(&self, key: &str) -> Option<&Position> {
        self.index.get(key).map(|&i| &self.positions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions still holding shares, sorted by product name (case-insensitive).
    pub fn open_positions(&self) -> Vec<&Position> {
        let mut open: Vec<&Position> = self.positions.iter().filter(|p| p.is_open()).collect();
        open.sort_by_key(|p| p.label().to_lowercase());
        open
    }

    fn entry(&mut self, key: &str, currency: &str) -> &mut Position {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.positions.push(Position::new(key, currency));
                self.index.insert(key.to_string(), self.positions.len() - 1);
                self.positions.len() - 1
            }
        };
        &mut self.positions[i]
    }
}

/// Replay every parseable trade in `transactions` into a fresh ledger.
///
/// Trades are ordered by `(date, time)` with input order breaking ties. Lines
/// that do not parse as trades, or lack a price, are skipped.
pub fn build_ledger(transactions: &[Transaction], config: &LedgerConfig) -> Ledger {
    let mut ledger = Ledger::default();

    for i in chronological_order(transactions) {
        let tx = &transactions[i];
        let trade = match parse_trade(&tx.description) {
            TradeParse::Parsed(trade) => trade,
            TradeParse::Unparseable(reason) => {
                log::trace!("line {}: not a trade ({reason})", tx.index);
                continue;
            }
        };
        let Some(price) = trade.usable_price() else {
            log::debug!("line {}: trade without price skipped", tx.index);
            continue;
        };
        let Some(key) = tx.instrument_key(&trade.product) else {
            log::debug!("line {}: trade without instrument skipped", tx.index);
            continue;
        };

        let currency = trade_currency(trade.currency.as_deref(), tx);
        let product_name = [tx.product.trim(), trade.product.trim(), key.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string();

        let pos = ledger.entry(&key, &currency);
        pos.currency = currency.clone();
        pos.product_name = product_name;
        if !tx.isin.trim().is_empty() {
            pos.isin = tx.isin.trim().to_string();
        }

        let quantity = trade.quantity as f64;
        let entry = match trade.action {
            TradeAction::Buy => {
                pos.buy(quantity, price);
                LedgerEntry {
                    order_id: tx.order_id().map(str::to_string),
                    date: tx.date.clone(),
                    time: non_empty(&tx.time),
                    action: TradeAction::Buy,
                    price,
                    currency,
                    quantity,
                    requested_quantity: quantity,
                    unfilled_quantity: 0.0,
                    avg_sale: None,
                    avg_position: pos.avg_position(),
                    profit_loss: None,
                    index: tx.index,
                }
            }
            TradeAction::Sell => {
                let fill = apply_sell(pos, quantity, config);
                let avg_sale = fill.avg_sale();
                LedgerEntry {
                    order_id: tx.order_id().map(str::to_string),
                    date: tx.date.clone(),
                    time: non_empty(&tx.time),
                    action: TradeAction::Sell,
                    price,
                    currency,
                    quantity: fill.sold_shares,
                    requested_quantity: quantity,
                    unfilled_quantity: (quantity - fill.sold_shares).max(0.0),
                    avg_sale,
                    avg_position: pos.avg_position(),
                    profit_loss: avg_sale.map(|avg| (price - avg) * fill.sold_shares),
                    index: tx.index,
                }
            }
        };
        pos.history.push(entry);
    }

    ledger
}

fn apply_sell(pos: &mut Position, quantity: f64, config: &LedgerConfig) -> SaleFill {
    if pos.shares <= 0.0 {
        log::warn!("{}: sell of {} shares from an empty position", pos.key, quantity);
        return SaleFill::EMPTY;
    }
    if quantity > pos.shares + LOT_EPSILON {
        match config.oversell {
            OversellPolicy::Clamp => log::warn!(
                "{}: sell of {} shares clamped to {} held",
                pos.key,
                quantity,
                pos.shares
            ),
            OversellPolicy::Reject => {
                log::warn!(
                    "{}: sell of {} shares rejected, only {} held",
                    pos.key,
                    quantity,
                    pos.shares
                );
                return SaleFill::EMPTY;
            }
        }
    }
    let to_sell = quantity.min(pos.shares);
    match config.method {
        AccountingMethod::Fifo => pos.sell_fifo(to_sell),
        AccountingMethod::Average => pos.sell_average(to_sell),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedLot {
    pub shares: f64,
    pub price: f64,
    pub cost: f64,
}

/// Estimated outcome of selling part of a position at a hypothetical price.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleSimulation {
    pub key: String,
    pub currency: String,
    pub sold_shares: f64,
    pub cost_basis: f64,
    pub cost_amount: f64,
    pub proceeds: f64,
    pub profit_loss: f64,
    pub remaining_shares: f64,
    pub remaining_avg: f64,
    pub consumed: Vec<ConsumedLot>,
}

/// What-if exit against the position's current lots. Never mutates the ledger.
pub fn simulate_sale(
    position: &Position,
    quantity: f64,
    price: f64,
) -> Result<SaleSimulation, SimulationError> {
    if position.shares <= 0.0 {
        return Err(SimulationError::NoShares {
            key: position.key.clone(),
        });
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(SimulationError::InvalidQuantity { quantity });
    }
    if quantity - position.shares > SIMULATION_TOLERANCE {
        return Err(SimulationError::InsufficientShares {
            requested: quantity,
            held: position.shares,
        });
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(SimulationError::InvalidPrice { price });
    }

    let mut lots: Vec<Lot> = position.lots.clone();
    let mut remaining = quantity;
    let mut consumed = Vec::new();

    for lot in lots.iter_mut() {
        if remaining <= 0.0 {
            break;
        }
        let take = remaining.min(lot.shares);
        if take > 0.0 {
            consumed.push(ConsumedLot {
                shares: take,
                price: lot.price,
                cost: take * lot.price,
            });
        }
        lot.shares -= take;
        remaining -= take;
    }

    let sold_shares: f64 = consumed.iter().map(|c| c.shares).sum();
    if sold_shares + SIMULATION_TOLERANCE < quantity {
        return Err(SimulationError::InsufficientShares {
            requested: quantity,
            held: sold_shares,
        });
    }

    let cost_amount: f64 = consumed.iter().map(|c| c.cost).sum();
    let cost_basis = if sold_shares > 0.0 {
        cost_amount / sold_shares
    } else {
        0.0
    };
    let remaining_shares: f64 = lots.iter().map(|l| l.shares).sum();
    let remaining_cost: f64 = lots.iter().map(Lot::cost).sum();

    Ok(SaleSimulation {
        key: position.key.clone(),
        currency: position.currency.clone(),
        sold_shares,
        cost_basis,
        cost_amount,
        proceeds: price * sold_shares,
        profit_loss: (price - cost_basis) * sold_shares,
        remaining_shares,
        remaining_avg: if remaining_shares > 0.0 {
            remaining_cost / remaining_shares
        } else {
            0.0
        },
        consumed,
    })
}
