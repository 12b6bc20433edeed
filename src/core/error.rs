use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Failures raised by the lot ledger and the trade processor.
///
/// None of these are retried: consuming lots is not idempotent, so the
/// caller decides whether to abort the batch.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PnlError {
    #[error("asset not found in ledger: {0}")]
    AssetNotFound(String),
    #[error("insufficient {asset} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        asset: String,
        requested: Decimal,
        available: Decimal,
    },
    #[error("malformed transaction {id}: {reason}")]
    MalformedTransaction { id: String, reason: String },
    #[error("volume must be positive for {asset}: {volume}")]
    NonPositiveVolume { asset: String, volume: Decimal },
    #[error("no price for {asset} at {time}")]
    MissingPrice { asset: String, time: DateTime<Utc> },
    #[error("transaction {id} failed: {source}")]
    Failed {
        id: String,
        #[source]
        source: Box<PnlError>,
    },
}

impl PnlError {
    pub fn malformed(id: &str, reason: impl Into<String>) -> Self {
        PnlError::MalformedTransaction {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// The underlying ledger error, looking through batch context.
    pub fn root(&self) -> &PnlError {
        match self {
            PnlError::Failed { source, .. } => source.root(),
            other => other,
        }
    }
}
