use super::error::PnlError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Source of fiat prices for an asset at a point in time.
pub trait PriceOracle {
    fn price(&self, asset: &str, time: DateTime<Utc>) -> Result<Decimal, PnlError>;
}

/// Oracle with no data, for runs that never need a market price.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrices;

impl PriceOracle for NoPrices {
    fn price(&self, asset: &str, time: DateTime<Utc>) -> Result<Decimal, PnlError> {
        Err(PnlError::MissingPrice {
            asset: asset.to_string(),
            time,
        })
    }
}
