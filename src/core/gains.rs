use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Gain or loss realised by one disposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealizedGain {
    /// Id of the transaction that realised the gain
    pub id: String,
    pub time: DateTime<Utc>,
    pub asset: String,
    /// Volume disposed of, fees included
    pub volume: Decimal,
    /// Fiat received net of fees
    pub proceeds: Decimal,
    /// Fiat cost of the lots consumed
    pub basis: Decimal,
    pub gain: Decimal,
}

impl RealizedGain {
    pub fn new(
        id: &str,
        time: DateTime<Utc>,
        asset: &str,
        volume: Decimal,
        proceeds: Decimal,
        basis: Decimal,
    ) -> Self {
        RealizedGain {
            id: id.to_string(),
            time,
            asset: asset.to_string(),
            volume,
            proceeds,
            basis,
            gain: proceeds - basis,
        }
    }

    /// Calendar year the gain belongs to
    pub fn year(&self) -> i32 {
        self.time.year()
    }
}

/// Realised gains grouped by calendar year, chronological within a year.
#[derive(Debug, Clone, Default)]
pub struct GainAggregator {
    years: BTreeMap<i32, Vec<RealizedGain>>,
}

impl GainAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, year: i32, gain: RealizedGain) {
        log::debug!(
            "Gain {} {}: proceeds={}, basis={}, gain={}",
            year,
            gain.asset,
            gain.proceeds,
            gain.basis,
            gain.gain
        );
        self.years.entry(year).or_default().push(gain);
    }

    /// Total gain per year
    pub fn summary(&self) -> BTreeMap<i32, Decimal> {
        self.years
            .iter()
            .map(|(year, gains)| (*year, gains.iter().map(|g| g.gain).sum()))
            .collect()
    }

    /// Gains recorded for `year`, empty if none
    pub fn gains(&self, year: i32) -> &[RealizedGain] {
        self.years.get(&year).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every gain, ordered by year then by recording order
    pub fn iter(&self) -> impl Iterator<Item = &RealizedGain> {
        self.years.values().flatten()
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }

    pub fn total(&self) -> Decimal {
        self.iter().map(|g| g.gain).sum()
    }

    pub fn len(&self) -> usize {
        self.years.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gain_at(time: &str, gain: Decimal) -> RealizedGain {
        let time = DateTime::parse_from_rfc3339(time)
            .unwrap()
            .with_timezone(&Utc);
        RealizedGain::new("t", time, "BTC", dec!(1), gain, dec!(0))
    }

    #[test]
    fn summary_totals_per_year() {
        let mut gains = GainAggregator::new();
        gains.record(2021, gain_at("2021-02-01T00:00:00Z", dec!(5)));
        gains.record(2021, gain_at("2021-07-01T00:00:00Z", dec!(-2)));
        gains.record(2022, gain_at("2022-03-01T00:00:00Z", dec!(10)));

        let summary = gains.summary();
        assert_eq!(
            summary,
            BTreeMap::from([(2021, dec!(3)), (2022, dec!(10))])
        );
        assert_eq!(gains.total(), dec!(13));
        assert_eq!(gains.len(), 3);
    }

    #[test]
    fn summary_is_idempotent() {
        let mut gains = GainAggregator::new();
        gains.record(2023, gain_at("2023-05-01T00:00:00Z", dec!(1.5)));
        assert_eq!(gains.summary(), gains.summary());
    }

    #[test]
    fn gains_keep_recording_order() {
        let mut gains = GainAggregator::new();
        gains.record(2021, gain_at("2021-01-01T00:00:00Z", dec!(1)));
        gains.record(2021, gain_at("2021-06-01T00:00:00Z", dec!(2)));

        let amounts: Vec<_> = gains.gains(2021).iter().map(|g| g.gain).collect();
        assert_eq!(amounts, vec![dec!(1), dec!(2)]);
        assert!(gains.gains(1999).is_empty());
    }

    #[test]
    fn gain_is_proceeds_minus_basis() {
        let time = DateTime::parse_from_rfc3339("2021-06-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let gain = RealizedGain::new("t3", time, "XBT", dec!(0.05), dec!(1497), dec!(1002));
        assert_eq!(gain.gain, dec!(495));
        assert_eq!(gain.year(), 2021);
    }
}
