//! Kraken trade and ledger exports.
//!
//! Rows are classified into [`Transaction`](crate::core::Transaction)s once,
//! here, so the processor never looks at pair names or order types.

pub mod ledger;
pub mod trades;

pub use ledger::{classify_trades_with_ledger, read_ledger_csv, Ledger, LedgerRow};
pub use trades::{classify_trades, read_trades_csv, TradeRow};

use crate::core::PnlError;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid datetime in row {id}: {value}")]
    InvalidDatetime { id: String, value: String },
    #[error(transparent)]
    Classify(#[from] PnlError),
}

/// Classification settings shared by both import paths
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    /// Reference currency; trades quoted in it are fiat trades
    pub fiat: String,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        ClassifyOptions {
            fiat: "EUR".to_string(),
        }
    }
}

impl ClassifyOptions {
    pub fn new(fiat: &str) -> Self {
        ClassifyOptions {
            fiat: normalize_asset(fiat),
        }
    }

    /// The configured fiat symbol, normalized
    pub fn fiat(&self) -> String {
        normalize_asset(&self.fiat)
    }

    pub fn is_fiat(&self, asset: &str) -> bool {
        normalize_asset(asset) == self.fiat()
    }
}

/// Legacy four letter codes still used in older exports
const LEGACY_CODES: &[(&str, &str)] = &[
    ("XXBT", "XBT"),
    ("XETH", "ETH"),
    ("XLTC", "LTC"),
    ("XXRP", "XRP"),
    ("XXLM", "XLM"),
    ("XXMR", "XMR"),
    ("XZEC", "ZEC"),
    ("XETC", "ETC"),
    ("XREP", "REP"),
    ("XMLN", "MLN"),
    ("XXDG", "XDG"),
    ("ZEUR", "EUR"),
    ("ZUSD", "USD"),
    ("ZGBP", "GBP"),
    ("ZCAD", "CAD"),
    ("ZJPY", "JPY"),
    ("ZAUD", "AUD"),
];

/// Quote assets recognised at the end of a pair that has no separator
const QUOTE_SUFFIXES: &[&str] = &[
    "XXBT", "XETH", "ZEUR", "ZUSD", "XBT", "ETH", "USDT", "USDC", "DAI",
];

fn legacy(code: &str) -> Option<&'static str> {
    LEGACY_CODES
        .iter()
        .find(|(legacy, _)| *legacy == code)
        .map(|(_, modern)| *modern)
}

/// Map a Kraken asset code onto its common symbol, e.g. `XXBT` to `XBT`
pub fn normalize_asset(code: &str) -> String {
    let code = code.trim().to_uppercase();
    legacy(&code).map(str::to_string).unwrap_or(code)
}

/// Split a pair name into normalized `(base, quote)` symbols.
///
/// Handles `XBT/EUR`, legacy pairs such as `XETHZEUR`, pairs ending in the
/// fiat symbol and pairs ending in a common crypto quote. Returns `None`
/// when the split is ambiguous.
pub fn split_pair(pair: &str, fiat: &str) -> Option<(String, String)> {
    let pair = pair.trim().to_uppercase();
    let non_empty = |base: &str, quote: &str| {
        (!base.is_empty() && !quote.is_empty())
            .then(|| (normalize_asset(base), normalize_asset(quote)))
    };

    if let Some((base, quote)) = pair.split_once('/') {
        return non_empty(base, quote);
    }

    if pair.len() == 8 && pair.is_ascii() {
        let (base, quote) = pair.split_at(4);
        if legacy(base).is_some() && legacy(quote).is_some() {
            return non_empty(base, quote);
        }
    }

    let fiat = normalize_asset(fiat);
    for suffix in [format!("Z{fiat}"), fiat.clone()] {
        if let Some(base) = pair.strip_suffix(suffix.as_str()) {
            if !base.is_empty() {
                return non_empty(base, &fiat);
            }
        }
    }

    QUOTE_SUFFIXES.iter().find_map(|quote| {
        pair.strip_suffix(*quote)
            .filter(|base| !base.is_empty())
            .and_then(|base| non_empty(base, *quote))
    })
}
