//! Summary command - yearly gains, cost basis and holdings

use super::{format_fiat, format_quantity, InputArgs};
use clap::Args;
use pnlc::core::{PnlReport, PriceOracle};
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    fiat: String,
    years: Vec<YearSummary>,
    total_gain: Decimal,
    cost_basis: Decimal,
    unallocated_cost: Decimal,
    holdings: Vec<Holding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    market_value: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct YearSummary {
    year: i32,
    disposals: usize,
    gain: Decimal,
}

#[derive(Debug, Serialize)]
struct Holding {
    asset: String,
    quantity: Decimal,
    cost: Decimal,
}

#[derive(Tabled)]
struct YearRow {
    #[tabled(rename = "Year")]
    year: i32,
    #[tabled(rename = "Disposals")]
    disposals: usize,
    #[tabled(rename = "Gain")]
    gain: String,
}

#[derive(Tabled)]
struct HoldingRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl SummaryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (report, prices) = self.input.run()?;
        let market_value = match report.last_time {
            Some(time) if !prices.is_empty() => value_holdings(&report, &prices, time),
            _ => None,
        };
        let output = summarize(&report, self.input.fiat(), market_value);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_summary(&output);
        }
        Ok(())
    }
}

fn value_holdings(
    report: &PnlReport,
    prices: &dyn PriceOracle,
    time: chrono::DateTime<chrono::Utc>,
) -> Option<Decimal> {
    match report.ledger.market_value(prices, time) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Holdings not valued: {}", err);
            None
        }
    }
}

fn summarize(report: &PnlReport, fiat: String, market_value: Option<Decimal>) -> SummaryOutput {
    let years = report
        .gains
        .summary()
        .into_iter()
        .map(|(year, gain)| YearSummary {
            year,
            disposals: report.gains.gains(year).len(),
            gain,
        })
        .collect();

    let holdings = report
        .ledger
        .assets()
        .filter(|(_, lots)| !lots.amount_held().is_zero())
        .map(|(asset, lots)| Holding {
            asset: asset.to_string(),
            quantity: lots.amount_held(),
            cost: lots.cost(),
        })
        .collect();

    SummaryOutput {
        fiat,
        years,
        total_gain: report.gains.total(),
        cost_basis: report.cost_basis.get(),
        unallocated_cost: report.unallocated_cost(),
        holdings,
        market_value,
    }
}

fn print_summary(output: &SummaryOutput) {
    println!();
    println!("REALISED GAINS ({})", output.fiat);
    println!();

    if output.years.is_empty() {
        println!("  (no disposals)");
    } else {
        let rows: Vec<YearRow> = output
            .years
            .iter()
            .map(|y| YearRow {
                year: y.year,
                disposals: y.disposals,
                gain: format_fiat(y.gain),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
    }
    println!();
    println!("Total gain:       {}", format_fiat(output.total_gain));
    println!("Cost basis:       {}", format_fiat(output.cost_basis));
    if !output.unallocated_cost.is_zero() {
        println!("Unallocated cost: {}", format_fiat(output.unallocated_cost));
    }
    if let Some(value) = output.market_value {
        println!("Market value:     {}", format_fiat(value));
    }

    println!();
    println!("HOLDINGS");
    println!();
    if output.holdings.is_empty() {
        println!("  (none)");
        return;
    }
    let rows: Vec<HoldingRow> = output
        .holdings
        .iter()
        .map(|h| HoldingRow {
            asset: h.asset.clone(),
            quantity: format_quantity(h.quantity),
            cost: format_fiat(h.cost),
        })
        .collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}
