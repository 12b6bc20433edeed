use super::cost::CostBasis;
use super::error::PnlError;
use super::gains::{GainAggregator, RealizedGain};
use super::lots::LotLedger;
use super::price::{NoPrices, PriceOracle};
use super::transaction::{Transaction, TransactionKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How an exchange of one asset for another is accounted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossTradePolicy {
    /// Carry the cost of the asset given up over to the asset received.
    /// No gain is realised until the position is sold for fiat.
    #[default]
    CarryBasis,
    /// Value the asset given up at its market price, realising a gain on
    /// the exchange. The asset received starts at that market value.
    MarketValue,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub cross_trade: CrossTradePolicy,
}

/// Applies classified transactions to a lot ledger.
///
/// The processor borrows the ledger, the cost accumulator and the gain
/// aggregator; it keeps no state of its own between transactions.
pub struct Processor<'a> {
    ledger: &'a mut LotLedger,
    cost_basis: &'a mut CostBasis,
    gains: &'a mut GainAggregator,
    oracle: &'a dyn PriceOracle,
    policy: CrossTradePolicy,
}

impl<'a> Processor<'a> {
    pub fn new(
        ledger: &'a mut LotLedger,
        cost_basis: &'a mut CostBasis,
        gains: &'a mut GainAggregator,
    ) -> Self {
        Processor {
            ledger,
            cost_basis,
            gains,
            oracle: &NoPrices,
            policy: CrossTradePolicy::default(),
        }
    }

    pub fn with_oracle(mut self, oracle: &'a dyn PriceOracle) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_policy(mut self, policy: CrossTradePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply one transaction. Ledger errors are returned unchanged.
    pub fn process(&mut self, tx: &Transaction) -> Result<(), PnlError> {
        tx.validate()?;
        log::debug!("Processing {} {} at {}", tx.kind.display(), tx.id, tx.time);

        match &tx.kind {
            TransactionKind::Fiat2Asset {
                asset,
                volume,
                unit_price,
                cost,
                fee_in_asset,
                fee_in_fiat,
            } => {
                self.ledger
                    .add(asset, *volume, *unit_price, *fee_in_asset, *fee_in_fiat)?;
                self.cost_basis.update(*cost, *fee_in_fiat);
            }
            TransactionKind::Asset2Fiat {
                asset,
                volume,
                proceeds,
                fee_in_fiat,
            } => {
                let basis = self.ledger.take(asset, *volume)?;
                let cash_in = *proceeds - *fee_in_fiat;
                self.realize(tx, asset, *volume, cash_in, basis);
                self.cost_basis.update(-basis, Decimal::ZERO);
            }
            TransactionKind::Asset2Asset {
                asset_in,
                asset_out,
                volume_in,
                volume_out,
                fee_in_asset_in,
                fee_in_asset_out,
            } => {
                let net_in = *volume_in - *fee_in_asset_in;
                // price first so a missing price leaves the ledger untouched
                let market_price = match self.policy {
                    CrossTradePolicy::CarryBasis => None,
                    CrossTradePolicy::MarketValue => Some(self.oracle.price(asset_out, tx.time)?),
                };

                let sold = *volume_out + *fee_in_asset_out;
                let basis = self.ledger.take(asset_out, sold)?;

                let carried = match market_price {
                    None => basis,
                    Some(price) => {
                        let proceeds = price * *volume_out;
                        self.realize(tx, asset_out, sold, proceeds, basis);
                        self.cost_basis.update(proceeds - basis, Decimal::ZERO);
                        proceeds
                    }
                };
                let equivalent_price = carried / net_in;
                self.ledger.add(
                    asset_in,
                    *volume_in,
                    equivalent_price,
                    *fee_in_asset_in,
                    Decimal::ZERO,
                )?;
            }
        }
        Ok(())
    }

    fn realize(
        &mut self,
        tx: &Transaction,
        asset: &str,
        volume: Decimal,
        proceeds: Decimal,
        basis: Decimal,
    ) {
        let gain = RealizedGain::new(&tx.id, tx.time, asset, volume, proceeds, basis);
        self.gains.record(gain.year(), gain);
    }
}

/// Ledger state after a batch of transactions
#[derive(Debug, Clone, Default)]
pub struct PnlReport {
    pub ledger: LotLedger,
    pub cost_basis: CostBasis,
    pub gains: GainAggregator,
    /// Time of the last processed transaction
    pub last_time: Option<DateTime<Utc>>,
}

impl PnlReport {
    /// Running cost basis not attributed to any lot. Non-zero when a fee
    /// charged in the bought asset was paid for with fiat.
    pub fn unallocated_cost(&self) -> Decimal {
        self.cost_basis.get() - self.ledger.total_cost()
    }
}

/// Process a chronologically ordered batch, stopping at the first failure.
///
/// Lots are consumed in order, so skipping a bad transaction would shift
/// every later disposal onto the wrong lots.
pub fn calculate_pnl(
    transactions: &[Transaction],
    oracle: &dyn PriceOracle,
    options: Options,
) -> Result<PnlReport, PnlError> {
    let mut report = PnlReport::default();
    {
        let mut processor =
            Processor::new(&mut report.ledger, &mut report.cost_basis, &mut report.gains)
                .with_oracle(oracle)
                .with_policy(options.cross_trade);

        for tx in transactions {
            processor.process(tx).map_err(|err| {
                log::error!("Transaction {} failed: {}", tx.id, err);
                PnlError::Failed {
                    id: tx.id.clone(),
                    source: Box::new(err),
                }
            })?;
        }
    }
    report.last_time = transactions.iter().map(|t| t.time).max();
    log::info!(
        "Processed {} transactions, {} disposals",
        transactions.len(),
        report.gains.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::parse_datetime;
    use rust_decimal_macros::dec;

    struct FixedPrice(Decimal);

    impl PriceOracle for FixedPrice {
        fn price(&self, _asset: &str, _time: DateTime<Utc>) -> Result<Decimal, PnlError> {
            Ok(self.0)
        }
    }

    fn tx(id: &str, time: &str, kind: TransactionKind) -> Transaction {
        Transaction {
            id: id.to_string(),
            time: parse_datetime(time).unwrap(),
            kind,
        }
    }

    fn buy(id: &str, time: &str, asset: &str, volume: Decimal, price: Decimal, fee: Decimal) -> Transaction {
        tx(
            id,
            time,
            TransactionKind::Fiat2Asset {
                asset: asset.to_string(),
                volume,
                unit_price: price,
                cost: volume * price,
                fee_in_asset: Decimal::ZERO,
                fee_in_fiat: fee,
            },
        )
    }

    fn sell(id: &str, time: &str, asset: &str, volume: Decimal, proceeds: Decimal, fee: Decimal) -> Transaction {
        tx(
            id,
            time,
            TransactionKind::Asset2Fiat {
                asset: asset.to_string(),
                volume,
                proceeds,
                fee_in_fiat: fee,
            },
        )
    }

    fn swap_xbt_for_eth(fee_out: Decimal) -> Transaction {
        tx(
            "T2",
            "2021-02-10T12:00:00Z",
            TransactionKind::Asset2Asset {
                asset_in: "ETH".to_string(),
                asset_out: "XBT".to_string(),
                volume_in: dec!(0.2),
                volume_out: dec!(0.01),
                fee_in_asset_in: dec!(0),
                fee_in_asset_out: fee_out,
            },
        )
    }

    fn kraken_history() -> Vec<Transaction> {
        vec![
            buy("T1", "2021-01-05T10:00:00Z", "XBT", dec!(0.1), dec!(20000), dec!(4)),
            swap_xbt_for_eth(dec!(0.00002)),
            sell("T3", "2021-06-01T09:30:00Z", "XBT", dec!(0.05), dec!(1500), dec!(3)),
            sell("T4", "2022-03-15T18:45:00Z", "ETH", dec!(0.1), dec!(250), dec!(0.5)),
        ]
    }

    #[test]
    fn fiat_to_asset_adds_lot_and_updates_cost() {
        let mut ledger = LotLedger::new();
        let mut cost = CostBasis::new();
        let mut gains = GainAggregator::new();
        cost.set(dec!(10));

        Processor::new(&mut ledger, &mut cost, &mut gains)
            .process(&buy("b", "2021-01-01T00:00:00Z", "XBT", dec!(0.5), dec!(30000), dec!(6)))
            .unwrap();

        assert_eq!(cost.get(), dec!(10) + dec!(15000) + dec!(6));
        assert_eq!(ledger.lots("XBT")[0].volume, dec!(0.5));
        assert_eq!(ledger.lots("XBT")[0].unit_price, dec!(30000));
        assert!(gains.is_empty());
    }

    #[test]
    fn asset_to_fiat_records_gain_or_loss() {
        for (price, expected_gain) in [(dec!(10), dec!(1479.5)), (dec!(60000), dec!(-28515.5))] {
            let mut ledger = LotLedger::new();
            let mut cost = CostBasis::new();
            let mut gains = GainAggregator::new();
            ledger
                .add("XBT", dec!(1), price, dec!(0), dec!(0))
                .unwrap();

            Processor::new(&mut ledger, &mut cost, &mut gains)
                .process(&sell("s", "2021-05-01T00:00:00Z", "XBT", dec!(0.5), dec!(1485), dec!(0.5)))
                .unwrap();

            let recorded = &gains.gains(2021)[0];
            assert_eq!(recorded.proceeds, dec!(1484.5));
            assert_eq!(recorded.basis, price * dec!(0.5));
            assert_eq!(recorded.gain, expected_gain);
            assert_eq!(ledger.amount_held("XBT"), dec!(0.5));
            assert_eq!(ledger.lots("XBT")[0].unit_price, price);
        }
    }

    #[test]
    fn asset_to_asset_carries_basis_at_equivalent_price() {
        let mut ledger = LotLedger::new();
        let mut cost = CostBasis::new();
        let mut gains = GainAggregator::new();
        ledger
            .add("XBT", dec!(0.02), dec!(10), dec!(0), dec!(0))
            .unwrap();
        cost.set(dec!(0.2));

        Processor::new(&mut ledger, &mut cost, &mut gains)
            .process(&swap_xbt_for_eth(dec!(0.00002)))
            .unwrap();

        // 0.01002 XBT at 10 carried into 0.2 ETH
        assert_eq!(ledger.amount_held("XBT"), dec!(0.00998));
        let eth = &ledger.lots("ETH")[0];
        assert_eq!(eth.volume, dec!(0.2));
        assert_eq!(eth.unit_price, dec!(0.501));
        assert_eq!(eth.cost(), dec!(0.1002));
        assert!(gains.is_empty());
        assert_eq!(cost.get(), dec!(0.2));
    }

    #[test]
    fn asset_to_asset_fee_in_received_asset_reduces_lot() {
        let mut ledger = LotLedger::new();
        let mut cost = CostBasis::new();
        let mut gains = GainAggregator::new();
        ledger.add("ETH", dec!(1), dec!(1000), dec!(0), dec!(0)).unwrap();

        let swap = tx(
            "x",
            "2021-04-01T00:00:00Z",
            TransactionKind::Asset2Asset {
                asset_in: "XBT".to_string(),
                asset_out: "ETH".to_string(),
                volume_in: dec!(0.05),
                volume_out: dec!(1),
                fee_in_asset_in: dec!(0.01),
                fee_in_asset_out: dec!(0),
            },
        );
        Processor::new(&mut ledger, &mut cost, &mut gains)
            .process(&swap)
            .unwrap();

        let xbt = &ledger.lots("XBT")[0];
        assert_eq!(xbt.volume, dec!(0.04));
        assert_eq!(xbt.unit_price, dec!(25000));
        assert_eq!(ledger.amount_held("XBT"), dec!(0.04));
    }

    #[test]
    fn asset_to_asset_at_market_value_realises_gain() {
        let mut ledger = LotLedger::new();
        let mut cost = CostBasis::new();
        let mut gains = GainAggregator::new();
        ledger
            .add("XBT", dec!(0.1), dec!(20000), dec!(0), dec!(4))
            .unwrap();
        cost.set(dec!(2004));
        let oracle = FixedPrice(dec!(25000));

        Processor::new(&mut ledger, &mut cost, &mut gains)
            .with_oracle(&oracle)
            .with_policy(CrossTradePolicy::MarketValue)
            .process(&swap_xbt_for_eth(dec!(0.00002)))
            .unwrap();

        let recorded = &gains.gains(2021)[0];
        assert_eq!(recorded.asset, "XBT");
        assert_eq!(recorded.volume, dec!(0.01002));
        assert_eq!(recorded.proceeds, dec!(250));
        assert_eq!(recorded.basis, dec!(200.8008));
        assert_eq!(recorded.gain, dec!(49.1992));
        assert_eq!(ledger.lots("ETH")[0].unit_price, dec!(1250));
        assert_eq!(cost.get(), dec!(2004) + dec!(49.1992));
    }

    #[test]
    fn market_value_without_price_leaves_ledger_untouched() {
        let mut ledger = LotLedger::new();
        let mut cost = CostBasis::new();
        let mut gains = GainAggregator::new();
        ledger
            .add("XBT", dec!(0.1), dec!(20000), dec!(0), dec!(0))
            .unwrap();

        let err = Processor::new(&mut ledger, &mut cost, &mut gains)
            .with_policy(CrossTradePolicy::MarketValue)
            .process(&swap_xbt_for_eth(dec!(0)))
            .unwrap_err();

        assert!(matches!(err, PnlError::MissingPrice { ref asset, .. } if asset == "XBT"));
        assert_eq!(ledger.amount_held("XBT"), dec!(0.1));
        assert!(!ledger.contains("ETH"));
    }

    #[test]
    fn ledger_errors_propagate_unchanged() {
        let mut ledger = LotLedger::new();
        let mut cost = CostBasis::new();
        let mut gains = GainAggregator::new();
        let mut processor = Processor::new(&mut ledger, &mut cost, &mut gains);

        let err = processor
            .process(&sell("s", "2021-01-01T00:00:00Z", "XBT", dec!(1), dec!(1), dec!(0)))
            .unwrap_err();
        assert_eq!(err, PnlError::AssetNotFound("XBT".to_string()));

        processor
            .process(&buy("b", "2021-01-02T00:00:00Z", "XBT", dec!(1), dec!(1), dec!(0)))
            .unwrap();
        let err = processor
            .process(&sell("s2", "2021-01-03T00:00:00Z", "XBT", dec!(2), dec!(1), dec!(0)))
            .unwrap_err();
        assert!(matches!(err, PnlError::InsufficientBalance { .. }));
    }

    #[test]
    fn batch_computes_yearly_summary() {
        let report = calculate_pnl(&kraken_history(), &NoPrices, Options::default()).unwrap();

        assert_eq!(report.gains.summary()[&2021], dec!(495));
        assert_eq!(report.gains.summary()[&2022], dec!(149.0996));
        assert_eq!(report.ledger.amount_held("XBT"), dec!(0.03998));
        assert_eq!(report.ledger.amount_held("ETH"), dec!(0.1));
        assert_eq!(report.cost_basis.get(), dec!(901.5996));
        assert_eq!(report.unallocated_cost(), dec!(0));
        assert_eq!(report.last_time, parse_datetime("2022-03-15T18:45:00Z"));
    }

    #[test]
    fn batch_at_market_value() {
        let options = Options {
            cross_trade: CrossTradePolicy::MarketValue,
        };
        let report = calculate_pnl(&kraken_history(), &FixedPrice(dec!(25000)), options).unwrap();

        assert_eq!(report.gains.summary()[&2021], dec!(544.1992));
        assert_eq!(report.gains.summary()[&2022], dec!(124.5));
        assert_eq!(report.cost_basis.get(), dec!(926.1992));
    }

    #[test]
    fn batch_stops_at_first_failure() {
        let mut txs = kraken_history();
        txs.insert(
            1,
            sell("bad", "2021-01-06T00:00:00Z", "XBT", dec!(5), dec!(1), dec!(0)),
        );

        let err = calculate_pnl(&txs, &NoPrices, Options::default()).unwrap_err();
        match &err {
            PnlError::Failed { id, .. } => assert_eq!(id, "bad"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(err.root(), PnlError::InsufficientBalance { .. }));
    }

    #[test]
    fn end_to_end_eth_lots() {
        let txs = vec![
            buy("a", "2021-01-01T00:00:00Z", "ETH", dec!(10), dec!(100), dec!(0)),
            buy("b", "2021-02-01T00:00:00Z", "ETH", dec!(10), dec!(200), dec!(0)),
            sell("c", "2021-03-01T00:00:00Z", "ETH", dec!(15), dec!(4000), dec!(0)),
        ];
        let report = calculate_pnl(&txs, &NoPrices, Options::default()).unwrap();

        let disposal = &report.gains.gains(2021)[0];
        assert_eq!(disposal.basis, dec!(2000));
        assert_eq!(disposal.gain, dec!(2000));
        let volumes: Vec<_> = report.ledger.lots("ETH").iter().map(|l| l.volume).collect();
        assert_eq!(volumes, vec![dec!(0), dec!(5)]);
        assert_eq!(report.ledger.amount_held("ETH"), dec!(5));
    }
}
