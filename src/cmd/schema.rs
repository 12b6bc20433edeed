//! Schema command - print expected input formats

use clap::Args;
use pnlc::core::TransactionInput;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Format to describe
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for classified transactions
    JsonSchema,
    /// Columns read from a Kraken trades export
    Trades,
    /// Columns read from a Kraken ledger export
    Ledger,
    /// Columns of a price file
    Prices,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(TransactionInput);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::Trades => print_fields("Kraken trades export", TRADE_FIELDS),
            SchemaFormat::Ledger => print_fields("Kraken ledger export", LEDGER_FIELDS),
            SchemaFormat::Prices => print_fields("Price file", PRICE_FIELDS),
        }
        Ok(())
    }
}

fn print_fields(title: &str, fields: &[(&str, bool, &str)]) {
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
    println!();
    for (name, required, description) in fields {
        let req = if *required { "required" } else { "optional" };
        println!("{:10} ({:8})  {}", name, req, description);
    }
    println!();
    println!("Other columns are ignored. Decimals are read exactly.");
}

const TRADE_FIELDS: &[(&str, bool, &str)] = &[
    ("txid", true, "Trade id"),
    ("ordertxid", false, "Order id"),
    ("pair", true, "Traded pair (XXBTZEUR, XBT/EUR, DOTEUR, ...)"),
    ("time", true, "Trade time (YYYY-MM-DD hh:mm:ss[.ffff], UTC)"),
    ("type", true, "buy or sell, from the point of view of the base asset"),
    ("ordertype", false, "Order type"),
    ("price", true, "Price of the base asset in the quote asset"),
    ("cost", true, "Quote volume, excluding fee"),
    ("fee", true, "Fee, in the quote asset"),
    ("vol", true, "Base volume"),
    ("ledgers", false, "Comma separated ledger ids (required with --ledger)"),
];

const LEDGER_FIELDS: &[(&str, bool, &str)] = &[
    ("txid", false, "Ledger id; rows without one are not settled and are skipped"),
    ("refid", false, "Id of the trade or transfer"),
    ("time", true, "Entry time"),
    ("type", true, "trade, deposit, withdrawal, ..."),
    ("asset", true, "Asset code (XXBT, ZEUR, DOT, ...)"),
    ("amount", true, "Signed balance change, before fee"),
    ("fee", true, "Fee charged on this entry"),
    ("balance", true, "Balance after the entry"),
];

const PRICE_FIELDS: &[(&str, bool, &str)] = &[
    ("asset", true, "Asset symbol, normalized (XBT, ETH, ...)"),
    ("time", true, "Time the price applies from"),
    ("price", true, "Price in the reference fiat"),
];
