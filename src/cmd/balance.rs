//! Balance command - reconcile computed holdings with the exchange ledger

use super::{format_quantity, InputArgs};
use clap::Args;
use pnlc::core::{reconcile, BalanceMismatch};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct BalanceCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Largest difference accepted as a match
    #[arg(long, default_value = "0")]
    tolerance: Decimal,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct BalanceOutput {
    /// Ledger entries that do not add up to the reported balance
    ledger: Vec<BalanceMismatch>,
    /// Holdings that differ from the ledger's closing balances
    holdings: Vec<BalanceMismatch>,
}

#[derive(Tabled)]
struct MismatchRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Difference")]
    difference: String,
}

impl BalanceCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let Some(ledger) = self.input.read_ledger()? else {
            anyhow::bail!("The balance check needs a ledger export (--ledger)");
        };
        let (report, _) = self.input.run()?;

        // fiat is not held in lots
        let fiat = self.input.fiat();
        let expected: BTreeMap<String, Decimal> = ledger
            .closing_balances()
            .into_iter()
            .filter(|(asset, _)| *asset != fiat)
            .collect();

        let output = BalanceOutput {
            ledger: ledger.balance_check(),
            holdings: reconcile(&report.ledger, &expected, self.tolerance),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_section("LEDGER CONSISTENCY", &output.ledger);
            print_section("HOLDINGS VS LEDGER", &output.holdings);
        }

        if !output.ledger.is_empty() || !output.holdings.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_section(title: &str, mismatches: &[BalanceMismatch]) {
    println!();
    println!("{}", title);
    println!();
    if mismatches.is_empty() {
        println!("  OK");
        return;
    }

    let rows: Vec<MismatchRow> = mismatches
        .iter()
        .map(|m| MismatchRow {
            asset: m.asset.clone(),
            expected: format_quantity(m.expected),
            actual: format_quantity(m.actual),
            difference: format_quantity(m.difference()),
        })
        .collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}
