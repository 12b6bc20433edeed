use super::error::PnlError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

/// Input root for transaction JSON
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransactionInput {
    pub transactions: Vec<Transaction>,
}

/// A classified trade, ready to be applied to the lot ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    /// Unique identifier, usually the exchange trade id
    pub id: String,
    /// When the trade happened (RFC3339; naive timestamps are taken as UTC)
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum TransactionKind {
    /// Fiat spent to acquire an asset
    Fiat2Asset {
        asset: String,
        /// Volume bought, before any fee charged in the asset
        #[schemars(with = "f64")]
        volume: Decimal,
        /// Fiat price per unit
        #[schemars(with = "f64")]
        unit_price: Decimal,
        /// Fiat spent, excluding fees
        #[schemars(with = "f64")]
        cost: Decimal,
        #[serde(default)]
        #[schemars(with = "f64")]
        fee_in_asset: Decimal,
        #[serde(default)]
        #[schemars(with = "f64")]
        fee_in_fiat: Decimal,
    },

    /// Asset sold for fiat
    Asset2Fiat {
        asset: String,
        #[schemars(with = "f64")]
        volume: Decimal,
        /// Fiat received before fees
        #[schemars(with = "f64")]
        proceeds: Decimal,
        #[serde(default)]
        #[schemars(with = "f64")]
        fee_in_fiat: Decimal,
    },

    /// One asset exchanged for another
    Asset2Asset {
        /// Asset received
        asset_in: String,
        /// Asset given up
        asset_out: String,
        /// Volume received, before any fee charged in `asset_in`
        #[schemars(with = "f64")]
        volume_in: Decimal,
        /// Volume given up, excluding any fee charged in `asset_out`
        #[schemars(with = "f64")]
        volume_out: Decimal,
        #[serde(default)]
        #[schemars(with = "f64")]
        fee_in_asset_in: Decimal,
        #[serde(default)]
        #[schemars(with = "f64")]
        fee_in_asset_out: Decimal,
    },
}

impl TransactionKind {
    pub fn display(&self) -> &'static str {
        match self {
            TransactionKind::Fiat2Asset { .. } => "Fiat2Asset",
            TransactionKind::Asset2Fiat { .. } => "Asset2Fiat",
            TransactionKind::Asset2Asset { .. } => "Asset2Asset",
        }
    }
}

impl Transaction {
    /// Reject transactions that cannot be applied without corrupting the
    /// ledger. Nothing is mutated for a transaction that fails here.
    pub fn validate(&self) -> Result<(), PnlError> {
        let id = self.id.as_str();
        let positive = |name: &str, value: Decimal| {
            if value > Decimal::ZERO {
                Ok(())
            } else {
                Err(PnlError::malformed(id, format!("{name} must be positive, got {value}")))
            }
        };
        let not_negative = |name: &str, value: Decimal| {
            if value.is_sign_negative() && !value.is_zero() {
                Err(PnlError::malformed(id, format!("{name} is negative: {value}")))
            } else {
                Ok(())
            }
        };
        let symbol = |name: &str, value: &str| {
            if value.trim().is_empty() {
                Err(PnlError::malformed(id, format!("{name} is empty")))
            } else {
                Ok(())
            }
        };

        match &self.kind {
            TransactionKind::Fiat2Asset {
                asset,
                volume,
                unit_price,
                cost,
                fee_in_asset,
                fee_in_fiat,
            } => {
                symbol("asset", asset)?;
                positive("volume", *volume)?;
                not_negative("unit_price", *unit_price)?;
                not_negative("cost", *cost)?;
                not_negative("fee_in_asset", *fee_in_asset)?;
                not_negative("fee_in_fiat", *fee_in_fiat)
            }
            TransactionKind::Asset2Fiat {
                asset,
                volume,
                proceeds,
                fee_in_fiat,
            } => {
                symbol("asset", asset)?;
                positive("volume", *volume)?;
                not_negative("proceeds", *proceeds)?;
                not_negative("fee_in_fiat", *fee_in_fiat)
            }
            TransactionKind::Asset2Asset {
                asset_in,
                asset_out,
                volume_in,
                volume_out,
                fee_in_asset_in,
                fee_in_asset_out,
            } => {
                symbol("asset_in", asset_in)?;
                symbol("asset_out", asset_out)?;
                if asset_in == asset_out {
                    return Err(PnlError::malformed(
                        id,
                        format!("cannot exchange {asset_in} for itself"),
                    ));
                }
                positive("volume_out", *volume_out)?;
                not_negative("fee_in_asset_in", *fee_in_asset_in)?;
                not_negative("fee_in_asset_out", *fee_in_asset_out)?;
                positive("volume_in net of fee", *volume_in - *fee_in_asset_in)
            }
        }
    }
}

/// Read classified transactions from JSON, sorted chronologically
pub fn read_transactions_json<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let input: TransactionInput = serde_json::from_reader(reader)?;
    let mut transactions = input.transactions;
    transactions.sort_by_key(|t| t.time);
    Ok(transactions)
}

/// Parse the timestamp formats found in exchange exports
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_datetime(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {s}")))
}
