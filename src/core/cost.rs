use rust_decimal::Decimal;
use serde::Serialize;

/// Running fiat acquisition cost of the whole holding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CostBasis(Decimal);

impl CostBasis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an acquisition cost and its fee. A negative `cost` releases basis.
    pub fn update(&mut self, cost: Decimal, fee: Decimal) {
        self.0 += cost + fee;
        log::debug!("Cost basis UPDATE: {} + {}. Total: {}", cost, fee, self.0);
    }

    pub fn set(&mut self, value: Decimal) {
        log::debug!("Cost basis SET: {} -> {}", self.0, value);
        self.0 = value;
    }

    pub fn get(&self) -> Decimal {
        self.0
    }
}
