pub mod cost;
pub mod error;
pub mod fifo;
pub mod gains;
pub mod lots;
pub mod price;
pub mod reconcile;
pub mod transaction;

// Flat public surface for domain types and functions.
pub use cost::CostBasis;
pub use error::PnlError;
pub use fifo::{calculate_pnl, CrossTradePolicy, Options, PnlReport, Processor};
pub use gains::{GainAggregator, RealizedGain};
pub use lots::{AssetLots, Lot, LotLedger};
pub use price::{NoPrices, PriceOracle};
pub use reconcile::{reconcile, BalanceMismatch};
pub use transaction::{
    parse_datetime, read_transactions_json, Transaction, TransactionInput, TransactionKind,
};
