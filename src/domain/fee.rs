use crate::config::FeeSchedule;
use crate::domain::account::Balance;
use rust_decimal::Decimal;

/// Maps an order's budget to the fee an executor pays to claim it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeePolicy {
    schedule: FeeSchedule,
}

impl FeePolicy {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    pub fn fee_for(&self, budget: Option<Decimal>) -> Balance {
        match budget {
            Some(budget) if budget > self.schedule.threshold => Balance::new(self.schedule.high_fee),
            _ => Balance::new(self.schedule.low_fee),
        }
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::new(FeeSchedule::default())
    }
}
