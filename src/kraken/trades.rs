use super::{split_pair, ClassifyOptions, ImportError};
use crate::core::{parse_datetime, PnlError, Transaction, TransactionKind};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a Kraken trades export. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TradeRow {
    pub txid: String,
    #[serde(default)]
    pub ordertxid: String,
    pub pair: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub ordertype: String,
    pub price: Decimal,
    /// Quote volume exchanged, excluding the fee
    pub cost: Decimal,
    /// Fee charged in the quote asset
    pub fee: Decimal,
    /// Base volume exchanged
    pub vol: Decimal,
    /// Comma separated ids of the two ledger entries of the trade
    #[serde(default)]
    pub ledgers: String,
}

impl TradeRow {
    pub fn datetime(&self) -> Result<chrono::DateTime<chrono::Utc>, ImportError> {
        parse_datetime(&self.time).ok_or_else(|| ImportError::InvalidDatetime {
            id: self.txid.clone(),
            value: self.time.clone(),
        })
    }

    pub fn ledger_ids(&self) -> Vec<&str> {
        self.ledgers
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    }

    pub(super) fn is_buy(&self) -> Result<bool, PnlError> {
        match self.kind.trim() {
            "buy" => Ok(true),
            "sell" => Ok(false),
            other => Err(PnlError::malformed(
                &self.txid,
                format!("unknown trade type '{other}'"),
            )),
        }
    }

    /// Normalized `(base, quote)` of the traded pair
    pub(super) fn assets(&self, options: &ClassifyOptions) -> Result<(String, String), PnlError> {
        split_pair(&self.pair, &options.fiat()).ok_or_else(|| {
            PnlError::malformed(&self.txid, format!("cannot split pair '{}'", self.pair))
        })
    }
}

pub fn read_trades_csv<R: Read>(reader: R) -> Result<Vec<TradeRow>, ImportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let rows = rdr
        .deserialize::<TradeRow>()
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("Read {} trades", rows.len());
    Ok(rows)
}

/// Classify trades from the trade export alone. Fees are taken to be
/// charged in the quote asset.
pub fn classify_trades(
    rows: &[TradeRow],
    options: &ClassifyOptions,
) -> Result<Vec<Transaction>, ImportError> {
    let mut transactions = rows
        .iter()
        .map(|row| classify_trade(row, options))
        .collect::<Result<Vec<_>, _>>()?;
    transactions.sort_by_key(|t| t.time);
    Ok(transactions)
}

fn classify_trade(row: &TradeRow, options: &ClassifyOptions) -> Result<Transaction, ImportError> {
    let time = row.datetime()?;
    let (base, quote) = row.assets(options)?;
    let buy = row.is_buy()?;

    if options.is_fiat(&base) {
        let reason = format!("fiat {base} traded as base asset");
        return Err(PnlError::malformed(&row.txid, reason).into());
    }

    let kind = match (options.is_fiat(&quote), buy) {
        (true, true) => TransactionKind::Fiat2Asset {
            asset: base,
            volume: row.vol,
            unit_price: row.price,
            cost: row.cost,
            fee_in_asset: Decimal::ZERO,
            fee_in_fiat: row.fee,
        },
        (true, false) => TransactionKind::Asset2Fiat {
            asset: base,
            volume: row.vol,
            proceeds: row.cost,
            fee_in_fiat: row.fee,
        },
        (false, true) => TransactionKind::Asset2Asset {
            asset_in: base,
            asset_out: quote,
            volume_in: row.vol,
            volume_out: row.cost,
            fee_in_asset_in: Decimal::ZERO,
            fee_in_asset_out: row.fee,
        },
        (false, false) => TransactionKind::Asset2Asset {
            asset_in: quote,
            asset_out: base,
            volume_in: row.cost,
            volume_out: row.vol,
            fee_in_asset_in: row.fee,
            fee_in_asset_out: Decimal::ZERO,
        },
    };

    Ok(Transaction {
        id: row.txid.clone(),
        time,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TRADES: &str = "\
txid,ordertxid,pair,time,type,ordertype,price,cost,fee,vol,margin,misc,ledgers
T3,O3,XXBTZEUR,2021-06-01 09:30:00.0000,sell,limit,30000,1500,3,0.05,0,,\"L3A,L3B\"
T1,O1,XXBTZEUR,2021-01-05 10:00:00.0000,buy,limit,20000,2000,4,0.1,0,,\"L1A,L1B\"
T2,O2,XETHXXBT,2021-02-10 12:00:00.0000,buy,market,0.05,0.01,0.00002,0.2,0,,\"L2A,L2B\"
";

    fn classify(csv: &str) -> Result<Vec<Transaction>, ImportError> {
        let rows = read_trades_csv(csv.as_bytes())?;
        classify_trades(&rows, &ClassifyOptions::default())
    }

    #[test]
    fn classifies_and_sorts_by_time() {
        let txs = classify(TRADES).unwrap();
        let ids: Vec<_> = txs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2", "T3"]);

        assert_eq!(
            txs[0].kind,
            TransactionKind::Fiat2Asset {
                asset: "XBT".to_string(),
                volume: dec!(0.1),
                unit_price: dec!(20000),
                cost: dec!(2000),
                fee_in_asset: dec!(0),
                fee_in_fiat: dec!(4),
            }
        );
        assert_eq!(
            txs[2].kind,
            TransactionKind::Asset2Fiat {
                asset: "XBT".to_string(),
                volume: dec!(0.05),
                proceeds: dec!(1500),
                fee_in_fiat: dec!(3),
            }
        );
    }

    #[test]
    fn crypto_buy_spends_quote_plus_fee() {
        let txs = classify(TRADES).unwrap();
        assert_eq!(
            txs[1].kind,
            TransactionKind::Asset2Asset {
                asset_in: "ETH".to_string(),
                asset_out: "XBT".to_string(),
                volume_in: dec!(0.2),
                volume_out: dec!(0.01),
                fee_in_asset_in: dec!(0),
                fee_in_asset_out: dec!(0.00002),
            }
        );
    }

    #[test]
    fn crypto_sell_receives_quote_less_fee() {
        let csv = "\
txid,pair,time,type,price,cost,fee,vol
T9,ADAETH,2021-03-01 00:00:00,sell,0.001,0.5,0.001,500
";
        let txs = classify(csv).unwrap();
        assert_eq!(
            txs[0].kind,
            TransactionKind::Asset2Asset {
                asset_in: "ETH".to_string(),
                asset_out: "ADA".to_string(),
                volume_in: dec!(0.5),
                volume_out: dec!(500),
                fee_in_asset_in: dec!(0.001),
                fee_in_asset_out: dec!(0),
            }
        );
    }

    #[test]
    fn ledger_ids_are_split() {
        let rows = read_trades_csv(TRADES.as_bytes()).unwrap();
        assert_eq!(rows[0].ledger_ids(), vec!["L3A", "L3B"]);
    }

    #[test]
    fn unknown_pair_is_malformed() {
        let csv = "\
txid,pair,time,type,price,cost,fee,vol
T9,FOOBAR,2021-03-01 00:00:00,buy,1,1,0,1
";
        let err = classify(csv).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Classify(PnlError::MalformedTransaction { ref id, .. }) if id == "T9"
        ));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let csv = "\
txid,pair,time,type,price,cost,fee,vol
T9,XXBTZEUR,2021-03-01 00:00:00,margin,1,1,0,1
";
        assert!(matches!(
            classify(csv).unwrap_err(),
            ImportError::Classify(PnlError::MalformedTransaction { .. })
        ));
    }

    #[test]
    fn bad_time_is_reported() {
        let csv = "\
txid,pair,time,type,price,cost,fee,vol
T9,XXBTZEUR,someday,buy,1,1,0,1
";
        assert!(matches!(
            classify(csv).unwrap_err(),
            ImportError::InvalidDatetime { ref value, .. } if value == "someday"
        ));
    }
}
