//! File-backed price table used as the price oracle for market-value runs

use crate::core::{parse_datetime, PnlError, PriceOracle};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

#[derive(Debug, Deserialize)]
struct Record {
    asset: String,
    time: String,
    price: Decimal,
}

/// Fiat prices per asset, ordered by time
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<String, BTreeMap<DateTime<Utc>, Decimal>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: &str, time: DateTime<Utc>, price: Decimal) {
        self.prices
            .entry(asset.to_string())
            .or_default()
            .insert(time, price);
    }

    /// Read a CSV with `asset,time,price` columns
    pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<PriceTable> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut table = PriceTable::new();
        for result in rdr.deserialize::<Record>() {
            let record = result?;
            let time = parse_datetime(&record.time)
                .ok_or_else(|| anyhow::anyhow!("invalid price time: {}", record.time))?;
            table.insert(&record.asset, time, record.price);
        }
        log::debug!("Loaded prices for {} assets", table.prices.len());
        Ok(table)
    }

    /// Most recent price at or before `time`
    pub fn get(&self, asset: &str, time: DateTime<Utc>) -> Option<Decimal> {
        self.prices
            .get(asset)
            .and_then(|series| series.range(..=time).next_back())
            .map(|(_, price)| *price)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceOracle for PriceTable {
    fn price(&self, asset: &str, time: DateTime<Utc>) -> Result<Decimal, PnlError> {
        self.get(asset, time).ok_or_else(|| PnlError::MissingPrice {
            asset: asset.to_string(),
            time,
        })
    }
}
