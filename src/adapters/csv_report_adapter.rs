//! CSV output for derived views.

use std::io::Write;

use crate::domain::deposits::DepositSeries;
use crate::domain::dividend::{CurrencySummary, DividendGroup, ProductSummary};
use crate::domain::dividend_yield::ProductYield;
use crate::domain::error::LedgerError;
use crate::domain::holdings::InstrumentTimeline;
use crate::domain::ledger::{Ledger, SaleSimulation};
use crate::domain::reconcile::TradeReport;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_DECIMALS: usize = 4;

pub struct CsvReportAdapter {
    decimals: usize,
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMALS)
    }
}

impl CsvReportAdapter {
    pub fn new(decimals: usize) -> Self {
        Self { decimals }
    }

    /// Reads `[report] decimals`; negative values fall back to the default.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let decimals = config.get_int("report", "decimals", DEFAULT_DECIMALS as i64);
        Self::new(usize::try_from(decimals).unwrap_or(DEFAULT_DECIMALS))
    }

    fn num(&self, value: f64) -> String {
        format!("{:.*}", self.decimals, value)
    }

    fn opt(&self, value: Option<f64>) -> String {
        value.map(|v| self.num(v)).unwrap_or_default()
    }
}

fn write_table(
    out: &mut dyn Write,
    header: &[&str],
    rows: Vec<Vec<String>>,
) -> Result<(), LedgerError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header).map_err(std::io::Error::from)?;
    for row in rows {
        wtr.write_record(&row).map_err(std::io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write_positions(&self, ledger: &Ledger, out: &mut dyn Write) -> Result<(), LedgerError> {
        let mut rows = Vec::new();
        for pos in ledger.iter() {
            for entry in &pos.history {
                rows.push(vec![
                    pos.key.clone(),
                    pos.label().to_string(),
                    pos.isin.clone(),
                    entry.date.clone(),
                    entry.time.clone().unwrap_or_default(),
                    entry.action.to_string(),
                    self.num(entry.quantity),
                    self.num(entry.requested_quantity),
                    self.num(entry.unfilled_quantity),
                    self.num(entry.price),
                    entry.currency.clone(),
                    self.opt(entry.avg_sale),
                    self.num(entry.avg_position),
                    self.opt(entry.profit_loss),
                    entry.order_id.clone().unwrap_or_default(),
                ]);
            }
        }
        write_table(
            out,
            &[
                "key",
                "product",
                "isin",
                "date",
                "time",
                "action",
                "quantity",
                "requested",
                "unfilled",
                "price",
                "currency",
                "avg_sale",
                "avg_position",
                "profit_loss",
                "order_id",
            ],
            rows,
        )
    }

    fn write_trades(&self, report: &TradeReport, out: &mut dyn Write) -> Result<(), LedgerError> {
        let mut rows = Vec::new();
        for product in &report.products {
            for row in &product.rows {
                rows.push(vec![
                    product.product.clone(),
                    product.isin.clone(),
                    row.date.clone(),
                    row.time.clone(),
                    row.action.to_string(),
                    self.num(row.quantity),
                    self.num(row.price),
                    row.currency.clone(),
                    self.num(row.total),
                    self.opt(row.avg_sale),
                    self.opt(row.avg_position),
                    self.opt(row.profit_loss),
                ]);
            }
        }
        write_table(
            out,
            &[
                "product",
                "isin",
                "date",
                "time",
                "action",
                "quantity",
                "price",
                "currency",
                "total",
                "avg_sale",
                "avg_position",
                "profit_loss",
            ],
            rows,
        )
    }

    fn write_dividends(
        &self,
        groups: &[&DividendGroup],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let mut rows = Vec::new();
        for group in groups {
            let currencies: Vec<&str> =
                group.per_currency.iter().map(|(c, _)| c.as_str()).collect();
            rows.push(vec![
                group.effective_date().to_string(),
                group.product.clone(),
                group.isin.clone(),
                group.order_id.clone(),
                currencies.join(" "),
                self.num(group.gross),
                self.num(group.withholding),
                self.num(group.net),
                self.num(group.net_base_approx),
            ]);
        }
        write_table(
            out,
            &[
                "value_date",
                "product",
                "isin",
                "order_id",
                "currencies",
                "gross",
                "withholding",
                "net",
                "net_base_approx",
            ],
            rows,
        )
    }

    fn write_currency_summary(
        &self,
        rows: &[CurrencySummary],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let rows = rows
            .iter()
            .map(|r| {
                vec![
                    r.currency.clone(),
                    self.num(r.gross),
                    self.num(r.withholding),
                    self.num(r.net),
                ]
            })
            .collect();
        write_table(out, &["currency", "gross", "withholding", "net"], rows)
    }

    fn write_product_summary(
        &self,
        rows: &[ProductSummary],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let rows = rows
            .iter()
            .map(|r| {
                vec![
                    r.product.clone(),
                    r.isin.clone(),
                    r.events.to_string(),
                    r.currency.clone().unwrap_or_default(),
                    self.num(r.gross),
                    self.num(r.withholding),
                    self.num(r.net),
                ]
            })
            .collect();
        write_table(
            out,
            &["product", "isin", "events", "currency", "gross", "withholding", "net"],
            rows,
        )
    }

    fn write_yields(
        &self,
        yields: &[ProductYield],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let mut rows = Vec::new();
        for product in yields {
            for year in &product.years {
                let last = year.samples.last();
                rows.push(vec![
                    product.product.clone(),
                    product.isin.clone(),
                    product.currency.clone().unwrap_or_default(),
                    year.year.to_string(),
                    year.events.to_string(),
                    self.num(year.gross),
                    self.num(year.withholding),
                    self.num(year.net),
                    self.num(last.map_or(0.0, |s| s.shares)),
                    self.num(year.dividend_per_share),
                    self.num(year.average_cost),
                    self.num(year.yield_pct),
                ]);
            }
        }
        write_table(
            out,
            &[
                "product",
                "isin",
                "currency",
                "year",
                "events",
                "gross",
                "withholding",
                "net",
                "shares",
                "dividend_per_share",
                "average_cost",
                "yield_pct",
            ],
            rows,
        )
    }

    fn write_timeline(
        &self,
        instruments: &[&InstrumentTimeline],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let mut rows = Vec::new();
        for instrument in instruments {
            for snap in &instrument.snapshots {
                rows.push(vec![
                    instrument.key.clone(),
                    instrument.product_name.clone(),
                    instrument.currency.clone(),
                    snap.date.format("%Y-%m-%d").to_string(),
                    self.num(snap.shares),
                    self.num(snap.cost),
                ]);
            }
        }
        write_table(
            out,
            &["key", "product", "currency", "date", "shares", "cost"],
            rows,
        )
    }

    fn write_simulation(
        &self,
        simulation: &SaleSimulation,
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let rows = simulation
            .consumed
            .iter()
            .enumerate()
            .map(|(i, lot)| {
                vec![
                    (i + 1).to_string(),
                    self.num(lot.shares),
                    self.num(lot.price),
                    self.num(lot.cost),
                ]
            })
            .collect();
        write_table(out, &["lot", "shares", "price", "cost"], rows)
    }

    fn write_deposits(
        &self,
        series: &DepositSeries,
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let rows = series
            .points
            .iter()
            .map(|p| vec![p.date.clone(), self.num(p.amount), self.num(p.cumulative)])
            .collect();
        write_table(out, &["date", "amount", "cumulative"], rows)
    }
}
