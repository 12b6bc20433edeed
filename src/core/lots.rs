use super::error::PnlError;
use super::price::PriceOracle;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// A single acquisition of an asset, consumed first-in first-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lot {
    /// Volume at acquisition, kept for audit
    pub original_volume: Decimal,
    /// Volume still available for disposal
    pub volume: Decimal,
    /// Fiat cost per unit at acquisition
    pub unit_price: Decimal,
    /// Fiat fees still attached to the remaining volume
    pub fee_basis: Decimal,
}

impl Lot {
    pub fn new(volume: Decimal, unit_price: Decimal, fee_basis: Decimal) -> Self {
        Lot {
            original_volume: volume,
            volume,
            unit_price,
            fee_basis,
        }
    }

    /// Fiat cost attributable to the remaining volume
    pub fn cost(&self) -> Decimal {
        self.volume * self.unit_price + self.fee_basis
    }

    pub fn is_exhausted(&self) -> bool {
        self.volume.is_zero()
    }

    /// Consume the whole lot, returning its cost.
    fn exhaust(&mut self) -> Decimal {
        let cost = self.cost();
        self.volume = Decimal::ZERO;
        self.fee_basis = Decimal::ZERO;
        cost
    }

    /// Consume part of the lot. `volume` must be below the lot's volume.
    fn withdraw(&mut self, volume: Decimal) -> Decimal {
        let fee = self.fee_basis * volume / self.volume;
        self.volume -= volume;
        self.fee_basis -= fee;
        volume * self.unit_price + fee
    }
}

/// Lots held for one asset, in arrival order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetLots {
    lots: Vec<Lot>,
    amount_held: Decimal,
    /// Index of the first lot that has not been fully consumed
    #[serde(skip)]
    head: usize,
}

impl AssetLots {
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Lots that still hold volume, oldest first
    pub fn open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots[self.head..].iter().filter(|l| !l.is_exhausted())
    }

    pub fn amount_held(&self) -> Decimal {
        self.amount_held
    }

    /// Remaining fiat cost of every lot
    pub fn cost(&self) -> Decimal {
        self.lots.iter().map(Lot::cost).sum()
    }

    /// Work out how a withdrawal would be served without touching any lot.
    /// Returns the number of lots consumed in full from `head` and the
    /// volume left to take from the next one.
    fn plan_take(&self, asset: &str, volume: Decimal) -> Result<(usize, Decimal), PnlError> {
        let mut remaining = volume;
        let mut consumed = 0;
        for lot in &self.lots[self.head..] {
            if remaining.is_zero() {
                break;
            }
            if lot.volume <= remaining {
                remaining -= lot.volume;
                consumed += 1;
            } else {
                return Ok((consumed, remaining));
            }
        }
        if remaining > Decimal::ZERO {
            return Err(PnlError::InsufficientBalance {
                asset: asset.to_string(),
                requested: volume,
                available: self.amount_held,
            });
        }
        Ok((consumed, Decimal::ZERO))
    }
}

/// Per-asset FIFO inventory of lots.
#[derive(Debug, Clone, Default)]
pub struct LotLedger {
    assets: BTreeMap<String, AssetLots>,
}

impl LotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lots for `asset`, creating an empty entry the first time it is seen
    pub fn get_or_create(&mut self, asset: &str) -> &mut AssetLots {
        self.assets.entry(asset.to_string()).or_default()
    }

    pub fn get(&self, asset: &str) -> Option<&AssetLots> {
        self.assets.get(asset)
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.assets.contains_key(asset)
    }

    /// Add a lot. `fee_in_asset` is charged in units of the asset and reduces
    /// the usable volume; `fee_in_fiat` is carried as part of the lot's cost.
    pub fn add(
        &mut self,
        asset: &str,
        volume: Decimal,
        unit_price: Decimal,
        fee_in_asset: Decimal,
        fee_in_fiat: Decimal,
    ) -> Result<(), PnlError> {
        if volume <= Decimal::ZERO {
            return Err(PnlError::NonPositiveVolume {
                asset: asset.to_string(),
                volume,
            });
        }
        let net_volume = volume - fee_in_asset;
        if net_volume.is_sign_negative() {
            log::warn!(
                "Lot {} ADD: fee {} exceeds volume {}, lot is negative",
                asset,
                fee_in_asset,
                volume
            );
        }

        let entry = self.get_or_create(asset);
        entry.lots.push(Lot::new(net_volume, unit_price, fee_in_fiat));
        entry.amount_held += net_volume;
        log::debug!(
            "Lot {} ADD: vol={}, price={}, fee={}. Held: {}",
            asset,
            net_volume,
            unit_price,
            fee_in_fiat,
            entry.amount_held
        );
        Ok(())
    }

    /// Withdraw `volume` of `asset` oldest lot first, returning the fiat cost
    /// basis of what was taken.
    ///
    /// Sufficiency is established before any lot is touched, so a failed
    /// withdrawal leaves the ledger exactly as it was.
    pub fn take(&mut self, asset: &str, volume: Decimal) -> Result<Decimal, PnlError> {
        if volume.is_sign_negative() {
            return Err(PnlError::NonPositiveVolume {
                asset: asset.to_string(),
                volume,
            });
        }
        let entry = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| PnlError::AssetNotFound(asset.to_string()))?;

        let (consumed, remainder) = entry.plan_take(asset, volume)?;

        let mut basis = Decimal::ZERO;
        let end = entry.head + consumed;
        for lot in &mut entry.lots[entry.head..end] {
            basis += lot.exhaust();
        }
        entry.head = end;
        if !remainder.is_zero() {
            basis += entry.lots[entry.head].withdraw(remainder);
        }
        entry.amount_held -= volume;

        log::debug!(
            "Lot {} TAKE: vol={}, basis={}. Held: {}",
            asset,
            volume,
            basis,
            entry.amount_held
        );
        Ok(basis)
    }

    /// Volume currently held, zero for unknown assets
    pub fn amount_held(&self, asset: &str) -> Decimal {
        self.assets
            .get(asset)
            .map_or(Decimal::ZERO, AssetLots::amount_held)
    }

    /// All lots for `asset` including exhausted ones
    pub fn lots(&self, asset: &str) -> &[Lot] {
        self.assets
            .get(asset)
            .map(AssetLots::lots)
            .unwrap_or_default()
    }

    /// Remaining fiat basis of `asset`
    pub fn cost_of(&self, asset: &str) -> Decimal {
        self.assets.get(asset).map_or(Decimal::ZERO, AssetLots::cost)
    }

    pub fn assets(&self) -> impl Iterator<Item = (&str, &AssetLots)> {
        self.assets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Held volume per asset, sorted by symbol
    pub fn holdings(&self) -> Vec<(&str, Decimal)> {
        self.assets
            .iter()
            .map(|(asset, lots)| (asset.as_str(), lots.amount_held))
            .collect()
    }

    /// Remaining fiat basis across every asset
    pub fn total_cost(&self) -> Decimal {
        self.assets.values().map(AssetLots::cost).sum()
    }

    /// Market value of all non-zero holdings at `time`
    pub fn market_value(
        &self,
        oracle: &dyn PriceOracle,
        time: DateTime<Utc>,
    ) -> Result<Decimal, PnlError> {
        let mut value = Decimal::ZERO;
        for (asset, lots) in &self.assets {
            if lots.amount_held.is_zero() {
                continue;
            }
            value += lots.amount_held * oracle.price(asset, time)?;
        }
        Ok(value)
    }
}
