//! Per-product, per-year dividend yield against historical cost basis.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};

use super::dividend::{CurrencyAmounts, DividendGroup};
use super::holdings::{HoldingsTimeline, InstrumentTimeline};
use super::normalize::parse_calendar_date;

/// Holdings sampled from the timeline for one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldingSample {
    pub date: NaiveDate,
    pub shares: f64,
    pub cost: f64,
    /// True for the Dec 31 sample of a year without dividend events.
    pub year_end_fill: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearYield {
    pub year: i32,
    pub events: usize,
    pub gross: f64,
    pub withholding: f64,
    pub net: f64,
    pub samples: Vec<HoldingSample>,
    pub dividend_per_share: f64,
    pub average_cost: f64,
    /// Percentage of the average cost basis.
    pub yield_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductYield {
    pub product: String,
    pub isin: String,
    pub currency: Option<String>,
    /// Ascending by year.
    pub years: Vec<YearYield>,
}

struct EventSample {
    date: NaiveDate,
    amounts: CurrencyAmounts,
    net: f64,
}

struct ProductAccumulator {
    product: String,
    isin: String,
    timeline_key: String,
    currency: Option<String>,
    events: Vec<EventSample>,
}

pub fn dividend_yield_by_year(
    groups: &[DividendGroup],
    timeline: &HoldingsTimeline,
) -> Vec<ProductYield> {
    let mut products: Vec<ProductAccumulator> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for group in groups {
        let Some(date) = parse_calendar_date(group.effective_date()) else {
            log::warn!(
                "dividend for '{}' has no usable date ({}), left out of yields",
                group.product,
                group.effective_date()
            );
            continue;
        };
        let key = (group.isin.to_uppercase(), group.product.to_uppercase());
        let slot = *index.entry(key).or_insert_with(|| {
            let isin = group.isin.trim();
            products.push(ProductAccumulator {
                product: group.product.clone(),
                isin: group.isin.clone(),
                timeline_key: if isin.is_empty() {
                    group.product.trim().to_string()
                } else {
                    isin.to_string()
                },
                currency: None,
                events: Vec::new(),
            });
            products.len() - 1
        });

        let product = &mut products[slot];
        if product.currency.is_none() {
            product.currency = group.main_currency().map(str::to_string);
        }
        let (amounts, net) = match &product.currency {
            Some(currency) => {
                let amounts = group.currency_amounts(currency).copied().unwrap_or_default();
                (amounts, amounts.net())
            }
            None => (CurrencyAmounts::default(), group.net),
        };
        product.events.push(EventSample { date, amounts, net });
    }

    products
        .into_iter()
        .map(|p| {
            let holdings = timeline.get(&p.timeline_key);
            ProductYield {
                years: yearly(&p.events, holdings),
                product: p.product,
                isin: p.isin,
                currency: p.currency,
            }
        })
        .collect()
}

fn yearly(events: &[EventSample], holdings: Option<&InstrumentTimeline>) -> Vec<YearYield> {
    let mut by_year: BTreeMap<i32, Vec<&EventSample>> = BTreeMap::new();
    for event in events {
        by_year.entry(event.date.year()).or_default().push(event);
    }

    if let Some(timeline) = holdings {
        for year in held_years(timeline, events) {
            by_year.entry(year).or_default();
        }
    }

    by_year
        .into_iter()
        .map(|(year, events)| year_yield(year, &events, holdings))
        .collect()
}

/// Calendar years in which the instrument was held at some point.
fn held_years(timeline: &InstrumentTimeline, events: &[EventSample]) -> Vec<i32> {
    let (Some(first), Some(last)) = (timeline.first_date(), timeline.last_date()) else {
        return Vec::new();
    };
    let last_dividend = events.iter().map(|e| e.date.year()).max().unwrap_or(last.year());
    let end = last.year().max(last_dividend);

    (first.year()..=end)
        .filter(|&year| {
            let held_at_year_end = year_end(year).is_some_and(|d| timeline.shares_on(d) > 0.0);
            held_at_year_end
                || timeline
                    .snapshots
                    .iter()
                    .any(|s| s.date.year() == year && s.shares > 0.0)
        })
        .collect()
}

fn year_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

fn sample(holdings: Option<&InstrumentTimeline>, date: NaiveDate, year_end_fill: bool) -> HoldingSample {
    HoldingSample {
        date,
        shares: holdings.map_or(0.0, |t| t.shares_on(date)),
        cost: holdings.map_or(0.0, |t| t.cost_on(date)),
        year_end_fill,
    }
}

fn year_yield(year: i32, events: &[&EventSample], holdings: Option<&InstrumentTimeline>) -> YearYield {
    let mut out = YearYield {
        year,
        events: events.len(),
        gross: 0.0,
        withholding: 0.0,
        net: 0.0,
        samples: Vec::new(),
        dividend_per_share: 0.0,
        average_cost: 0.0,
        yield_pct: 0.0,
    };

    for event in events {
        out.gross += event.amounts.gross;
        out.withholding += event.amounts.withholding;
        out.net += event.net;
        let s = sample(holdings, event.date, false);
        if s.shares > 0.0 {
            out.dividend_per_share += event.net / s.shares;
        }
        out.samples.push(s);
    }

    if events.is_empty() {
        if let Some(dec31) = year_end(year) {
            out.samples.push(sample(holdings, dec31, true));
        }
    }

    if !out.samples.is_empty() {
        out.average_cost =
            out.samples.iter().map(|s| s.cost).sum::<f64>() / out.samples.len() as f64;
    }
    if out.average_cost != 0.0 {
        out.yield_pct = out.net / out.average_cost * 100.0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dividend::build_dividend_groups;
    use crate::domain::holdings::build_holdings_timeline;
    use crate::domain::transaction::Transaction;

    fn tx(date: &str, description: &str, currency: &str, amount: f64) -> Transaction {
        Transaction {
            date: date.into(),
            value_date: date.into(),
            product: "ACME".into(),
            isin: "US1".into(),
            description: description.into(),
            currency: currency.into(),
            amount,
            ..Default::default()
        }
    }

    #[test]
    fn yield_against_cost_at_event() {
        let txs = vec![
            tx("2022-01-10", "Compra 10 Acme@100 USD", "USD", -1000.0),
            tx("2022-06-01", "Dividendo", "USD", 20.0),
            tx("2022-06-01", "Retención del dividendo", "USD", -3.0),
            tx("2022-12-01", "Dividendo", "USD", 20.0),
        ];
        let timeline = build_holdings_timeline(&txs);
        let groups = build_dividend_groups(&txs, "EUR");
        let yields = dividend_yield_by_year(&groups, &timeline);

        assert_eq!(yields.len(), 1);
        let acme = &yields[0];
        assert_eq!(acme.currency.as_deref(), Some("USD"));
        assert_eq!(acme.years.len(), 1);
        let y = &acme.years[0];
        assert_eq!(y.year, 2022);
        assert_eq!(y.events, 2);
        assert!((y.net - 37.0).abs() < 1e-9);
        assert!((y.dividend_per_share - 3.7).abs() < 1e-9);
        assert!((y.average_cost - 1000.0).abs() < 1e-9);
        assert!((y.yield_pct - 3.7).abs() < 1e-9);
    }

    #[test]
    fn years_without_dividends_are_back_filled() {
        let txs = vec![
            tx("2021-03-01", "Compra 5 Acme@40 USD", "USD", -200.0),
            tx("2023-05-01", "Dividendo", "USD", 10.0),
        ];
        let timeline = build_holdings_timeline(&txs);
        let groups = build_dividend_groups(&txs, "USD");
        let yields = dividend_yield_by_year(&groups, &timeline);

        let years: Vec<i32> = yields[0].years.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2021, 2022, 2023]);
        let filled = &yields[0].years[1];
        assert_eq!(filled.events, 0);
        assert_eq!(filled.samples.len(), 1);
        assert!(filled.samples[0].year_end_fill);
        assert_eq!(filled.samples[0].shares, 5.0);
        assert_eq!(filled.yield_pct, 0.0);
        assert!((yields[0].years[2].yield_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn sold_out_years_are_not_filled() {
        let txs = vec![
            tx("2020-03-01", "Compra 5 Acme@40 USD", "USD", -200.0),
            tx("2020-09-01", "Venta 5 Acme@50 USD", "USD", 250.0),
            tx("2022-05-01", "Dividendo", "USD", 1.0),
        ];
        let timeline = build_holdings_timeline(&txs);
        let groups = build_dividend_groups(&txs, "USD");
        let yields = dividend_yield_by_year(&groups, &timeline);

        let years: Vec<i32> = yields[0].years.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2020, 2022]);
        assert_eq!(yields[0].years[1].average_cost, 0.0);
        assert_eq!(yields[0].years[1].yield_pct, 0.0);
        assert_eq!(yields[0].years[1].dividend_per_share, 0.0);
    }

    #[test]
    fn unknown_instrument_yields_zero() {
        let txs = vec![tx("2024-02-01", "Dividendo", "EUR", 12.0)];
        let groups = build_dividend_groups(&txs, "EUR");
        let yields = dividend_yield_by_year(&groups, &HoldingsTimeline::default());
        let y = &yields[0].years[0];
        assert_eq!(y.net, 12.0);
        assert_eq!(y.samples[0].shares, 0.0);
        assert_eq!(y.yield_pct, 0.0);
    }
}
