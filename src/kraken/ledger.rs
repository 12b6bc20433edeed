use super::trades::TradeRow;
use super::{normalize_asset, ClassifyOptions, ImportError};
use crate::core::{BalanceMismatch, PnlError, Transaction, TransactionKind};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

/// One row of a Kraken ledger export
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerRow {
    /// Ledger entry id, empty for entries that are not settled
    pub txid: Option<String>,
    /// Id of the trade, deposit or withdrawal the entry belongs to
    #[serde(default)]
    pub refid: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub asset: String,
    /// Signed change in the asset balance, before the fee
    pub amount: Decimal,
    pub fee: Decimal,
    /// Balance after the entry, as reported by the exchange
    pub balance: Decimal,
}

impl LedgerRow {
    fn is_settled(&self) -> bool {
        self.txid.as_deref().is_some_and(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
    by_txid: HashMap<String, usize>,
}

impl Ledger {
    pub fn new(rows: Vec<LedgerRow>) -> Self {
        let by_txid = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.txid.as_ref().map(|id| (id.trim().to_string(), i)))
            .collect();
        Ledger { rows, by_txid }
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn get(&self, txid: &str) -> Option<&LedgerRow> {
        self.by_txid.get(txid).map(|i| &self.rows[*i])
    }

    /// Last reported balance of every asset
    pub fn closing_balances(&self) -> BTreeMap<String, Decimal> {
        self.rows
            .iter()
            .filter(|row| row.is_settled())
            .map(|row| (normalize_asset(&row.asset), row.balance))
            .collect()
    }

    /// Re-add `amount - fee` per asset and compare the running total with the
    /// last balance the exchange reported. Returns the assets that disagree.
    pub fn balance_check(&self) -> Vec<BalanceMismatch> {
        let mut computed: BTreeMap<String, Decimal> = BTreeMap::new();
        for row in self.rows.iter().filter(|row| row.is_settled()) {
            *computed.entry(normalize_asset(&row.asset)).or_default() += row.amount - row.fee;
        }

        self.closing_balances()
            .into_iter()
            .filter_map(|(asset, reported)| {
                let actual = computed.get(&asset).copied().unwrap_or_default();
                (actual != reported).then(|| {
                    log::warn!(
                        "Ledger balance for {} is {} but entries add up to {}",
                        asset,
                        reported,
                        actual
                    );
                    BalanceMismatch {
                        asset,
                        expected: reported,
                        actual,
                    }
                })
            })
            .collect()
    }

    /// The received and the spent entry of a trade, in that order
    fn legs(&self, trade: &TradeRow) -> Result<(&LedgerRow, &LedgerRow), PnlError> {
        let ids = trade.ledger_ids();
        let [first, second] = ids.as_slice() else {
            return Err(PnlError::malformed(
                &trade.txid,
                format!("expected two ledger entries, found '{}'", trade.ledgers),
            ));
        };
        let lookup = |id: &str| {
            self.get(id).ok_or_else(|| {
                PnlError::malformed(&trade.txid, format!("ledger entry {id} not found"))
            })
        };
        let (a, b) = (lookup(*first)?, lookup(*second)?);

        match (a.amount > Decimal::ZERO, b.amount > Decimal::ZERO) {
            (true, false) => Ok((a, b)),
            (false, true) => Ok((b, a)),
            _ => Err(PnlError::malformed(
                &trade.txid,
                "ledger entries must be one credit and one debit",
            )),
        }
    }
}

pub fn read_ledger_csv<R: Read>(reader: R) -> Result<Ledger, ImportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let rows = rdr
        .deserialize::<LedgerRow>()
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("Read {} ledger entries", rows.len());
    Ok(Ledger::new(rows))
}

/// Classify trades using the two ledger entries of each trade, which carry
/// the fee charged on each side.
pub fn classify_trades_with_ledger(
    trades: &[TradeRow],
    ledger: &Ledger,
    options: &ClassifyOptions,
) -> Result<Vec<Transaction>, ImportError> {
    let mut transactions = trades
        .iter()
        .map(|trade| classify_trade(trade, ledger, options))
        .collect::<Result<Vec<_>, _>>()?;
    transactions.sort_by_key(|t| t.time);
    Ok(transactions)
}

fn classify_trade(
    trade: &TradeRow,
    ledger: &Ledger,
    options: &ClassifyOptions,
) -> Result<Transaction, ImportError> {
    let time = trade.datetime()?;
    let (received, spent) = ledger.legs(trade)?;
    let asset_in = normalize_asset(&received.asset);
    let asset_out = normalize_asset(&spent.asset);

    let kind = match (options.is_fiat(&asset_in), options.is_fiat(&asset_out)) {
        (true, true) => {
            return Err(PnlError::malformed(&trade.txid, "both sides of the trade are fiat").into())
        }
        (false, true) => {
            warn_volume_mismatch(trade, received.amount);
            TransactionKind::Fiat2Asset {
                asset: asset_in,
                volume: received.amount,
                unit_price: -spent.amount / received.amount,
                cost: -spent.amount,
                fee_in_asset: received.fee,
                fee_in_fiat: spent.fee,
            }
        }
        (true, false) => {
            warn_volume_mismatch(trade, -spent.amount);
            TransactionKind::Asset2Fiat {
                asset: asset_out,
                volume: -spent.amount + spent.fee,
                proceeds: received.amount,
                fee_in_fiat: received.fee,
            }
        }
        (false, false) => TransactionKind::Asset2Asset {
            asset_in,
            asset_out,
            volume_in: received.amount,
            volume_out: -spent.amount,
            fee_in_asset_in: received.fee,
            fee_in_asset_out: spent.fee,
        },
    };

    Ok(Transaction {
        id: trade.txid.clone(),
        time,
        kind,
    })
}

fn warn_volume_mismatch(trade: &TradeRow, ledger_volume: Decimal) {
    if trade.vol != ledger_volume {
        log::warn!(
            "Trade {} volume {} differs from its ledger entry {}",
            trade.txid,
            trade.vol,
            ledger_volume
        );
    }
}
