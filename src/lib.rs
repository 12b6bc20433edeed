//! FIFO cost-basis profit and loss for crypto trading histories.
//!
//! [`core`] holds the lot ledger and the trade processor, [`kraken`] turns
//! exchange exports into classified transactions and [`prices`] supplies
//! market prices from a file.

pub mod core;
pub mod kraken;
pub mod prices;
