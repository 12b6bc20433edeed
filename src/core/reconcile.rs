use super::lots::LotLedger;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// A held amount that disagrees with an authoritative balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub asset: String,
    /// Balance reported by the exchange or wallet
    pub expected: Decimal,
    /// Balance computed from the lots
    pub actual: Decimal,
}

impl BalanceMismatch {
    pub fn difference(&self) -> Decimal {
        self.actual - self.expected
    }
}

/// Compare the ledger's held amounts with `expected` balances.
///
/// Assets present on only one side are compared against zero. Differences
/// no larger than `tolerance` are accepted.
pub fn reconcile(
    ledger: &LotLedger,
    expected: &BTreeMap<String, Decimal>,
    tolerance: Decimal,
) -> Vec<BalanceMismatch> {
    let mut assets: Vec<&str> = expected.keys().map(String::as_str).collect();
    for (asset, _) in ledger.assets() {
        if !expected.contains_key(asset) {
            assets.push(asset);
        }
    }
    assets.sort_unstable();

    assets
        .into_iter()
        .filter_map(|asset| {
            let expected = expected.get(asset).copied().unwrap_or(Decimal::ZERO);
            let actual = ledger.amount_held(asset);
            if (actual - expected).abs() > tolerance {
                log::warn!(
                    "Balance mismatch for {}: expected {}, computed {}",
                    asset,
                    expected,
                    actual
                );
                Some(BalanceMismatch {
                    asset: asset.to_string(),
                    expected,
                    actual,
                })
            } else {
                None
            }
        })
        .collect()
}
