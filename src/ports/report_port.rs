//! Report output port trait.

use std::io::Write;

use crate::domain::deposits::DepositSeries;
use crate::domain::dividend::{CurrencySummary, DividendGroup, ProductSummary};
use crate::domain::dividend_yield::ProductYield;
use crate::domain::error::LedgerError;
use crate::domain::holdings::InstrumentTimeline;
use crate::domain::ledger::{Ledger, SaleSimulation};
use crate::domain::reconcile::TradeReport;

/// Port for writing derived views.
pub trait ReportPort {
    /// Ledger history, one row per replayed trade.
    fn write_positions(&self, ledger: &Ledger, out: &mut dyn Write) -> Result<(), LedgerError>;

    fn write_trades(&self, report: &TradeReport, out: &mut dyn Write) -> Result<(), LedgerError>;

    fn write_dividends(
        &self,
        groups: &[&DividendGroup],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError>;

    fn write_currency_summary(
        &self,
        rows: &[CurrencySummary],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError>;

    fn write_product_summary(
        &self,
        rows: &[ProductSummary],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError>;

    fn write_yields(&self, yields: &[ProductYield], out: &mut dyn Write)
    -> Result<(), LedgerError>;

    fn write_timeline(
        &self,
        instruments: &[&InstrumentTimeline],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError>;

    fn write_simulation(
        &self,
        simulation: &SaleSimulation,
        out: &mut dyn Write,
    ) -> Result<(), LedgerError>;

    fn write_deposits(&self, series: &DepositSeries, out: &mut dyn Write)
    -> Result<(), LedgerError>;
}
