//! Per-instrument position state: open lots and ledger history.

use super::trade_parser::TradeAction;

/// Lots at or below this many shares are purged after a FIFO sale.
pub const LOT_EPSILON: f64 = 1e-12;

/// An open acquisition tranche.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub shares: f64,
    pub price: f64,
}

impl Lot {
    pub fn cost(&self) -> f64 {
        self.shares * self.price
    }
}

/// One replayed trade with the position figures right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub order_id: Option<String>,
    pub date: String,
    pub time: Option<String>,
    pub action: TradeAction,
    pub price: f64,
    pub currency: String,
    /// Shares actually bought or sold.
    pub quantity: f64,
    /// Shares asked for by the trade description.
    pub requested_quantity: f64,
    /// Sell only: shares that could not be filled from the position.
    pub unfilled_quantity: f64,
    pub avg_sale: Option<f64>,
    pub avg_position: f64,
    pub profit_loss: Option<f64>,
    /// Index of the originating transaction.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub key: String,
    pub product_name: String,
    pub isin: String,
    pub currency: String,
    pub shares: f64,
    pub total_cost: f64,
    pub lots: Vec<Lot>,
    pub history: Vec<LedgerEntry>,
}

/// Result of removing shares from a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleFill {
    pub sold_shares: f64,
    pub cost_of_sold: f64,
}

impl SaleFill {
    pub const EMPTY: SaleFill = SaleFill {
        sold_shares: 0.0,
        cost_of_sold: 0.0,
    };

    pub fn avg_sale(&self) -> Option<f64> {
        if self.sold_shares > 0.0 {
            Some(self.cost_of_sold / self.sold_shares)
        } else {
            None
        }
    }
}

impl Position {
    pub fn new(key: impl Into<String>, currency: impl Into<String>) -> Self {
        Position {
            key: key.into(),
            product_name: String::new(),
            isin: String::new(),
            currency: currency.into(),
            shares: 0.0,
            total_cost: 0.0,
            lots: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.shares > 0.0
    }

    pub fn avg_position(&self) -> f64 {
        if self.shares > 0.0 {
            self.total_cost / self.shares
        } else {
            0.0
        }
    }

    pub fn label(&self) -> &str {
        if self.product_name.is_empty() {
            &self.key
        } else {
            &self.product_name
        }
    }

    pub fn buy(&mut self, quantity: f64, price: f64) {
        self.lots.push(Lot {
            shares: quantity,
            price,
        });
        self.shares += quantity;
        self.total_cost += price * quantity;
    }

    /// Consume lots oldest-first. Totals are recomputed from the remaining lots.
    pub fn sell_fifo(&mut self, quantity: f64) -> SaleFill {
        let mut remaining = quantity;
        let mut fill = SaleFill::EMPTY;

        for (i, lot) in self.lots.iter_mut().enumerate() {
            if remaining <= 0.0 {
                break;
            }
            let consume = remaining.min(lot.shares);
            log::debug!(
                "{}: consuming {} shares from lot {} (price {}, available {})",
                self.key,
                consume,
                i,
                lot.price,
                lot.shares
            );
            fill.sold_shares += consume;
            fill.cost_of_sold += consume * lot.price;
            lot.shares -= consume;
            remaining -= consume;
        }

        self.lots.retain(|lot| lot.shares > LOT_EPSILON);
        self.recompute_from_lots();
        fill
    }

    /// Sell at the blended average cost; remaining shares collapse into one lot.
    pub fn sell_average(&mut self, quantity: f64) -> SaleFill {
        if self.shares <= 0.0 {
            return SaleFill::EMPTY;
        }
        let avg = self.total_cost / self.shares;
        let sold = quantity.min(self.shares);

        self.shares -= sold;
        self.total_cost -= avg * sold;
        if self.shares <= LOT_EPSILON {
            self.shares = 0.0;
            self.total_cost = 0.0;
            self.lots.clear();
        } else {
            self.lots = vec![Lot {
                shares: self.shares,
                price: self.total_cost / self.shares,
            }];
        }

        SaleFill {
            sold_shares: sold,
            cost_of_sold: avg * sold,
        }
    }

    fn recompute_from_lots(&mut self) {
        self.shares = self.lots.iter().map(|lot| lot.shares).sum();
        self.total_cost = self.lots.iter().map(Lot::cost).sum();
        if self.shares <= LOT_EPSILON {
            self.shares = 0.0;
            self.total_cost = 0.0;
        }
    }

    pub fn entries(&self, action: TradeAction) -> impl Iterator<Item = &LedgerEntry> {
        self.history.iter().filter(move |e| e.action == action)
    }

    /// Realized profit/loss over all sells.
    pub fn realized_profit_loss(&self) -> f64 {
        self.history.iter().filter_map(|e| e.profit_loss).sum()
    }
}
