pub mod balance;
pub mod gains;
pub mod lots;
pub mod schema;
pub mod summary;

use anyhow::Context;
use clap::{Args, ValueEnum};
use pnlc::core::{self, CrossTradePolicy, Options, PnlReport, Transaction};
use pnlc::kraken::{self, ClassifyOptions, Ledger};
use pnlc::prices::PriceTable;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Input files and accounting options shared by every report
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Kraken trades export (CSV)
    #[arg(short, long, required_unless_present = "transactions")]
    pub trades: Option<PathBuf>,

    /// Kraken ledger export (CSV). Trade fees are then read from the ledger
    #[arg(short, long)]
    pub ledger: Option<PathBuf>,

    /// Classified transactions (JSON) instead of a trades export. Use "-" for stdin
    #[arg(long, conflicts_with = "trades")]
    pub transactions: Option<PathBuf>,

    /// Reference fiat currency
    #[arg(long, default_value = "EUR")]
    pub fiat: String,

    /// How trades of one asset for another are accounted for
    #[arg(long, value_enum, default_value_t = CrossTradeArg::CarryBasis)]
    pub cross_trade: CrossTradeArg,

    /// Price file (asset,time,price) for market-value trades and valuations
    #[arg(short, long)]
    pub prices: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum CrossTradeArg {
    /// Carry the basis of the asset given up over to the asset received
    #[default]
    CarryBasis,
    /// Realise a gain at the market price of the asset given up
    MarketValue,
}

impl From<CrossTradeArg> for CrossTradePolicy {
    fn from(arg: CrossTradeArg) -> Self {
        match arg {
            CrossTradeArg::CarryBasis => CrossTradePolicy::CarryBasis,
            CrossTradeArg::MarketValue => CrossTradePolicy::MarketValue,
        }
    }
}

impl InputArgs {
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions::new(&self.fiat)
    }

    pub fn fiat(&self) -> String {
        self.classify_options().fiat()
    }

    /// Read and classify the input, oldest first
    pub fn read_transactions(&self) -> anyhow::Result<Vec<Transaction>> {
        if let Some(path) = &self.transactions {
            return read_transactions_json(path);
        }
        let Some(path) = &self.trades else {
            anyhow::bail!("Provide a trades export with --trades or a JSON file with --transactions");
        };

        let trades = kraken::read_trades_csv(open(path)?)?;
        let options = self.classify_options();
        let transactions = match self.read_ledger()? {
            Some(ledger) => kraken::classify_trades_with_ledger(&trades, &ledger, &options)?,
            None => kraken::classify_trades(&trades, &options)?,
        };
        Ok(transactions)
    }

    pub fn read_ledger(&self) -> anyhow::Result<Option<Ledger>> {
        match &self.ledger {
            Some(path) => Ok(Some(kraken::read_ledger_csv(open(path)?)?)),
            None => Ok(None),
        }
    }

    pub fn read_prices(&self) -> anyhow::Result<PriceTable> {
        match &self.prices {
            Some(path) => PriceTable::read_csv(open(path)?),
            None => Ok(PriceTable::new()),
        }
    }

    /// Run the FIFO engine over the whole input
    pub fn run(&self) -> anyhow::Result<(PnlReport, PriceTable)> {
        let transactions = self.read_transactions()?;
        let prices = self.read_prices()?;
        let options = Options {
            cross_trade: self.cross_trade.into(),
        };
        log::info!(
            "Calculating FIFO P&L over {} transactions ({:?})",
            transactions.len(),
            options.cross_trade
        );
        let report = core::calculate_pnl(&transactions, &prices, options)?;
        Ok((report, prices))
    }
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn read_transactions_json(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    if path.as_os_str() != "-" {
        return core::read_transactions_json(open(path)?);
    }

    let mut buffer = Vec::new();
    io::stdin().lock().read_to_end(&mut buffer)?;
    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }
    core::read_transactions_json(buffer.as_slice())
}

fn format_fiat(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn format_quantity(qty: Decimal) -> String {
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantities_drop_trailing_zeros() {
        assert_eq!(format_quantity(dec!(0.03998)), "0.03998");
        assert_eq!(format_quantity(dec!(2.50000000)), "2.5");
        assert_eq!(format_quantity(dec!(10)), "10");
    }

    #[test]
    fn fiat_rounds_to_cents() {
        assert_eq!(format_fiat(dec!(149.0996)), "149.10");
        assert_eq!(format_fiat(dec!(-28515.5)), "-28515.50");
    }
}
