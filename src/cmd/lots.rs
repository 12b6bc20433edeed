//! Lots command - remaining lots per asset

use super::{format_fiat, format_quantity, InputArgs};
use clap::Args;
use pnlc::core::Lot;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct LotsCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Filter by asset (e.g., XBT, ETH)
    #[arg(short, long)]
    asset: Option<String>,

    /// Include lots that have been fully consumed
    #[arg(long)]
    all: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct AssetLotsView<'a> {
    asset: &'a str,
    amount_held: rust_decimal::Decimal,
    lots: Vec<&'a Lot>,
}

#[derive(Tabled)]
struct LotRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Acquired")]
    original_volume: String,
    #[tabled(rename = "Remaining")]
    volume: String,
    #[tabled(rename = "Unit Price")]
    unit_price: String,
    #[tabled(rename = "Fee Basis")]
    fee_basis: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl LotsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (report, _) = self.input.run()?;
        let views: Vec<AssetLotsView> = report
            .ledger
            .assets()
            .filter(|(asset, _)| {
                self.asset
                    .as_deref()
                    .is_none_or(|a| asset.eq_ignore_ascii_case(a))
            })
            .map(|(asset, lots)| AssetLotsView {
                asset,
                amount_held: lots.amount_held(),
                lots: lots
                    .lots()
                    .iter()
                    .filter(|lot| self.all || !lot.is_exhausted())
                    .collect(),
            })
            .filter(|view| !view.lots.is_empty())
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&views)?);
            return Ok(());
        }

        if views.is_empty() {
            println!("No lots found matching filters");
            return Ok(());
        }

        let rows: Vec<LotRow> = views
            .iter()
            .flat_map(|view| {
                view.lots.iter().enumerate().map(|(i, lot)| LotRow {
                    asset: view.asset.to_string(),
                    index: i + 1,
                    original_volume: format_quantity(lot.original_volume),
                    volume: format_quantity(lot.volume),
                    unit_price: lot.unit_price.round_dp(8).normalize().to_string(),
                    fee_basis: format_fiat(lot.fee_basis),
                    cost: format_fiat(lot.cost()),
                })
            })
            .collect();

        println!();
        println!("LOTS ({})", self.input.fiat());
        println!();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        Ok(())
    }
}
