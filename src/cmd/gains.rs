//! Gains command - one row per disposal

use super::{format_fiat, format_quantity, InputArgs};
use clap::Args;
use pnlc::core::RealizedGain;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct GainsCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Calendar year to report
    #[arg(short, long)]
    year: Option<i32>,

    /// Filter by asset (e.g., XBT, ETH)
    #[arg(short, long)]
    asset: Option<String>,

    /// Output as CSV instead of a table
    #[arg(long)]
    csv: bool,
}

#[derive(Tabled, Serialize)]
struct GainRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Volume")]
    volume: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Basis")]
    basis: String,
    #[tabled(rename = "Gain")]
    gain: String,
}

impl GainRow {
    fn new(gain: &RealizedGain) -> Self {
        GainRow {
            date: gain.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            id: gain.id.clone(),
            asset: gain.asset.clone(),
            volume: format_quantity(gain.volume),
            proceeds: gain.proceeds.normalize().to_string(),
            basis: gain.basis.normalize().to_string(),
            gain: gain.gain.normalize().to_string(),
        }
    }
}

impl GainsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (report, _) = self.input.run()?;
        let gains: Vec<&RealizedGain> = report
            .gains
            .iter()
            .filter(|g| self.year.is_none_or(|y| g.year() == y))
            .filter(|g| {
                self.asset
                    .as_deref()
                    .is_none_or(|a| g.asset.eq_ignore_ascii_case(a))
            })
            .collect();

        if self.csv {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            for gain in &gains {
                wtr.serialize(GainRow::new(gain))?;
            }
            wtr.flush()?;
            return Ok(());
        }

        if gains.is_empty() {
            println!("No disposals found matching filters");
            return Ok(());
        }

        let total: rust_decimal::Decimal = gains.iter().map(|g| g.gain).sum();
        let rows: Vec<GainRow> = gains.iter().map(|g| GainRow::new(g)).collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();

        println!();
        println!("DISPOSALS ({})", self.input.fiat());
        println!();
        println!("{}", table);
        println!();
        println!("{} disposals, total gain {}", gains.len(), format_fiat(total));
        Ok(())
    }
}
