//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvTransactionAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{validate_dividend_config, validate_ledger_config};
use crate::domain::currency::{DEFAULT_CURRENCY, is_currency_code};
use crate::domain::deposits::deposit_series;
use crate::domain::dividend::{
    DividendFilter, build_dividend_groups, currency_summary, detect_base_currency,
    product_summary,
};
use crate::domain::dividend_yield::dividend_yield_by_year;
use crate::domain::error::LedgerError;
use crate::domain::filter::TransactionFilter;
use crate::domain::holdings::build_holdings_timeline;
use crate::domain::ledger::{
    AccountingMethod, Ledger, LedgerConfig, OversellPolicy, build_ledger, simulate_sale,
};
use crate::domain::position::Position;
use crate::domain::reconcile::build_trade_report;
use crate::domain::transaction::Transaction;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::transaction_port::TransactionPort;

#[derive(Parser, Debug)]
#[command(
    name = "brokerledger",
    about = "Cost basis, dividends and holdings from a broker ledger export"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Broker transaction export (CSV)
    #[arg(short, long)]
    pub input: PathBuf,
    /// INI configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DividendView {
    #[default]
    Events,
    Currency,
    Product,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ledger history per instrument
    Positions {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        method: Option<AccountingMethod>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Buy/sell lines reconciled with the ledger
    Trades {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        month: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Grouped dividend events
    Dividends {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        base_currency: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        month: Option<String>,
        #[arg(long, value_enum, default_value_t = DividendView::Events)]
        view: DividendView,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Dividend yield by product and year
    Yield {
        #[command(flatten)]
        input: InputArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Holdings snapshots per instrument
    Timeline {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        key: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// What-if sale against the current lots
    Simulate {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        key: String,
        #[arg(long)]
        quantity: f64,
        #[arg(long)]
        price: f64,
    },
    /// Cumulative deposits
    Deposits {
        #[command(flatten)]
        input: InputArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Positions {
            input,
            method,
            output,
        } => run_positions(&input, method, output.as_ref()),
        Command::Trades {
            input,
            search,
            kind,
            month,
            output,
        } => {
            let filter = TransactionFilter {
                search,
                kind,
                month,
            };
            run_trades(&input, &filter, output.as_ref())
        }
        Command::Dividends {
            input,
            base_currency,
            search,
            month,
            view,
            output,
        } => {
            let filter = DividendFilter { search, month };
            run_dividends(
                &input,
                base_currency.as_deref(),
                &filter,
                view,
                output.as_ref(),
            )
        }
        Command::Yield { input, output } => run_yield(&input, output.as_ref()),
        Command::Timeline { input, key, output } => {
            run_timeline(&input, key.as_deref(), output.as_ref())
        }
        Command::Simulate {
            input,
            key,
            quantity,
            price,
        } => run_simulate(&input, &key, quantity, price),
        Command::Deposits { input, output } => run_deposits(&input, output.as_ref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, LedgerError> {
    FileConfigAdapter::from_file(path).map_err(|e| LedgerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Transactions and configuration for one command.
struct Workspace {
    transactions: Vec<Transaction>,
    config: FileConfigAdapter,
}

fn open(input: &InputArgs) -> Result<Workspace, LedgerError> {
    let config = match &input.config {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            load_config(path)?
        }
        None => FileConfigAdapter::empty(),
    };

    eprintln!("Loading transactions from {}", input.input.display());
    let transactions = CsvTransactionAdapter::new(input.input.clone()).load_transactions()?;
    eprintln!("  {} ledger lines", transactions.len());

    Ok(Workspace {
        transactions,
        config,
    })
}

pub fn build_ledger_config(config: &dyn ConfigPort) -> Result<LedgerConfig, LedgerError> {
    validate_ledger_config(config)?;

    let method = match config.get_string("ledger", "method") {
        Some(s) if !s.trim().is_empty() => {
            s.parse::<AccountingMethod>()
                .map_err(|reason| LedgerError::ConfigInvalid {
                    section: "ledger".into(),
                    key: "method".into(),
                    reason,
                })?
        }
        _ => AccountingMethod::default(),
    };
    let oversell = match config.get_string("ledger", "oversell") {
        Some(s) if !s.trim().is_empty() => {
            s.parse::<OversellPolicy>()
                .map_err(|reason| LedgerError::ConfigInvalid {
                    section: "ledger".into(),
                    key: "oversell".into(),
                    reason,
                })?
        }
        _ => OversellPolicy::default(),
    };

    Ok(LedgerConfig { method, oversell })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DividendConfig {
    pub base_currency: String,
}

/// Base currency from the flag, then `[dividends] base_currency`, then the
/// most frequent balance currency in the ledger.
pub fn build_dividend_config(
    config: &dyn ConfigPort,
    base_override: Option<&str>,
    transactions: &[Transaction],
) -> Result<DividendConfig, LedgerError> {
    validate_dividend_config(config)?;

    let base_currency = match base_override.map(str::trim).filter(|s| !s.is_empty()) {
        Some(code) if !is_currency_code(code) => {
            return Err(LedgerError::ConfigInvalid {
                section: "cli".into(),
                key: "base-currency".into(),
                reason: format!("'{code}' is not a three-letter currency code"),
            });
        }
        Some(code) => code.to_uppercase(),
        None => match config.get_string("dividends", "base_currency") {
            Some(s) if !s.trim().is_empty() => s.trim().to_uppercase(),
            _ => detect_base_currency(transactions).unwrap_or_else(|| DEFAULT_CURRENCY.into()),
        },
    };

    Ok(DividendConfig { base_currency })
}

fn with_output(
    path: Option<&PathBuf>,
    write: impl FnOnce(&mut dyn Write) -> Result<(), LedgerError>,
) -> Result<(), LedgerError> {
    match path {
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            write(&mut file)?;
            file.flush()?;
            eprintln!("Report written to: {}", path.display());
            Ok(())
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write(&mut lock)
        }
    }
}

fn run_positions(
    input: &InputArgs,
    method: Option<AccountingMethod>,
    output: Option<&PathBuf>,
) -> Result<(), LedgerError> {
    let ws = open(input)?;
    let mut ledger_config = build_ledger_config(&ws.config)?;
    if let Some(method) = method {
        ledger_config.method = method;
    }

    eprintln!(
        "Building ledger ({}, oversell {})",
        ledger_config.method, ledger_config.oversell
    );
    let ledger = build_ledger(&ws.transactions, &ledger_config);
    print_open_positions(&ledger);

    let report = CsvReportAdapter::from_config(&ws.config);
    with_output(output, |out| report.write_positions(&ledger, out))
}

fn print_open_positions(ledger: &Ledger) {
    let open = ledger.open_positions();
    eprintln!("\n=== Open Positions ({}) ===", open.len());
    for pos in open {
        eprintln!(
            "  {}:  {} shares, avg {:.4} {}, cost {:.2}",
            pos.label(),
            pos.shares,
            pos.avg_position(),
            pos.currency,
            pos.total_cost,
        );
    }
    let realized: f64 = ledger.iter().map(Position::realized_profit_loss).sum();
    eprintln!("Realized P/L (all currencies): {realized:.2}");
}

fn run_trades(
    input: &InputArgs,
    filter: &TransactionFilter,
    output: Option<&PathBuf>,
) -> Result<(), LedgerError> {
    let ws = open(input)?;
    let ledger = build_ledger(&ws.transactions, &build_ledger_config(&ws.config)?);
    let selected = filter.apply(&ws.transactions);
    let report = build_trade_report(&selected, &ledger);

    eprintln!("\n=== Trades ===");
    for product in &report.products {
        let s = &product.summary;
        eprintln!(
            "  {}:  {} operations, {} shares held, avg {:.4} {}",
            product.product, s.operations, s.current_shares, s.avg_position, s.currency
        );
    }
    eprintln!("{} operations", report.operations);

    let adapter = CsvReportAdapter::from_config(&ws.config);
    with_output(output, |out| adapter.write_trades(&report, out))
}

fn run_dividends(
    input: &InputArgs,
    base_override: Option<&str>,
    filter: &DividendFilter,
    view: DividendView,
    output: Option<&PathBuf>,
) -> Result<(), LedgerError> {
    let ws = open(input)?;
    let dividend_config = build_dividend_config(&ws.config, base_override, &ws.transactions)?;
    eprintln!("Base currency: {}", dividend_config.base_currency);

    let groups = build_dividend_groups(&ws.transactions, &dividend_config.base_currency);
    let selected = filter.apply(&groups);
    eprintln!("{} dividend events ({} selected)", groups.len(), selected.len());

    let adapter = CsvReportAdapter::from_config(&ws.config);
    match view {
        DividendView::Events => with_output(output, |out| adapter.write_dividends(&selected, out)),
        DividendView::Currency => {
            let owned: Vec<_> = selected.into_iter().cloned().collect();
            let rows = currency_summary(&owned);
            with_output(output, |out| adapter.write_currency_summary(&rows, out))
        }
        DividendView::Product => {
            let owned: Vec<_> = selected.into_iter().cloned().collect();
            let rows = product_summary(&owned);
            with_output(output, |out| adapter.write_product_summary(&rows, out))
        }
    }
}

fn run_yield(input: &InputArgs, output: Option<&PathBuf>) -> Result<(), LedgerError> {
    let ws = open(input)?;
    let base = build_dividend_config(&ws.config, None, &ws.transactions)?.base_currency;
    let groups = build_dividend_groups(&ws.transactions, &base);
    let timeline = build_holdings_timeline(&ws.transactions);
    let yields = dividend_yield_by_year(&groups, &timeline);
    eprintln!(
        "{} products with dividends, {} instruments in the timeline",
        yields.len(),
        timeline.len()
    );

    let adapter = CsvReportAdapter::from_config(&ws.config);
    with_output(output, |out| adapter.write_yields(&yields, out))
}

fn run_timeline(
    input: &InputArgs,
    key: Option<&str>,
    output: Option<&PathBuf>,
) -> Result<(), LedgerError> {
    let ws = open(input)?;
    let timeline = build_holdings_timeline(&ws.transactions);
    let instruments = match key {
        Some(key) => vec![timeline.get(key).ok_or_else(|| LedgerError::UnknownInstrument {
            key: key.to_string(),
        })?],
        None => timeline.iter().collect(),
    };

    let adapter = CsvReportAdapter::from_config(&ws.config);
    with_output(output, |out| adapter.write_timeline(&instruments, out))
}

/// Position by key, falling back to a case-insensitive product name match.
fn find_position<'a>(ledger: &'a Ledger, key: &str) -> Option<&'a Position> {
    ledger
        .get(key)
        .or_else(|| ledger.iter().find(|p| p.label().eq_ignore_ascii_case(key)))
}

fn run_simulate(input: &InputArgs, key: &str, quantity: f64, price: f64) -> Result<(), LedgerError> {
    let ws = open(input)?;
    // What-if exits always consume FIFO lots.
    let ledger_config = LedgerConfig {
        method: AccountingMethod::Fifo,
        ..build_ledger_config(&ws.config)?
    };
    let ledger = build_ledger(&ws.transactions, &ledger_config);
    let position = find_position(&ledger, key).ok_or_else(|| LedgerError::UnknownInstrument {
        key: key.to_string(),
    })?;

    let sim = simulate_sale(position, quantity, price)?;
    let ccy = &sim.currency;
    eprintln!("\n=== Simulated Sale: {} ===", position.label());
    eprintln!("Shares sold:      {}", sim.sold_shares);
    eprintln!("Cost basis:       {:.4} {ccy}", sim.cost_basis);
    eprintln!("Cost amount:      {:.2} {ccy}", sim.cost_amount);
    eprintln!("Proceeds:         {:.2} {ccy}", sim.proceeds);
    eprintln!("Profit/Loss:      {:+.2} {ccy}", sim.profit_loss);
    eprintln!(
        "Remaining:        {} shares, avg {:.4} {ccy}",
        sim.remaining_shares, sim.remaining_avg
    );

    let adapter = CsvReportAdapter::from_config(&ws.config);
    with_output(None, |out| adapter.write_simulation(&sim, out))
}

fn run_deposits(input: &InputArgs, output: Option<&PathBuf>) -> Result<(), LedgerError> {
    let ws = open(input)?;
    let series = deposit_series(&ws.transactions);
    eprintln!(
        "{} deposits, total {:.2}",
        series.points.len(),
        series.total
    );

    let adapter = CsvReportAdapter::from_config(&ws.config);
    with_output(output, |out| adapter.write_deposits(&series, out))
}
