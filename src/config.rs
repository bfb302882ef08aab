//! Runtime configuration for the admission core.
//!
//! Every value has a default matching the production marketplace, so an
//! empty JSON object (or no file at all) yields a working configuration.

use crate::error::StoreResult;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// What a successful claim does to the order's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// The order stays open until capacity is reached.
    #[default]
    StayActive,
    /// The first accepted claim closes the order.
    CompleteOnFirstClaim,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Budgets strictly above this pay `high_fee`.
    pub threshold: Decimal,
    pub high_fee: Decimal,
    pub low_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            threshold: dec!(10000),
            high_fee: dec!(100),
            low_fee: dec!(50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Maximum responses per order.
    pub capacity: usize,
    /// Minimum gap between two attempts by the same executor.
    pub cooldown_secs: u64,
    pub fee: FeeSchedule,
    pub completion: CompletionPolicy,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            cooldown_secs: 5,
            fee: FeeSchedule::default(),
            completion: CompletionPolicy::default(),
        }
    }
}

impl MarketConfig {
    /// The cooldown as a duration, saturating at the largest one chrono can hold.
    pub fn cooldown(&self) -> chrono::Duration {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MarketConfig::default();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.cooldown(), chrono::Duration::seconds(5));
        assert_eq!(config.completion, CompletionPolicy::StayActive);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"capacity": 2, "fee": {{"low_fee": "10"}}, "completion": "complete_on_first_claim"}}"#
        )
        .unwrap();

        let config = MarketConfig::load(file.path()).unwrap();
        assert_eq!(config.capacity, 2);
        assert_eq!(config.cooldown_secs, 5);
        assert_eq!(config.fee.low_fee, dec!(10));
        assert_eq!(config.fee.high_fee, dec!(100));
        assert_eq!(config.completion, CompletionPolicy::CompleteOnFirstClaim);
    }

    #[test]
    fn test_huge_cooldown_saturates() {
        let config = MarketConfig {
            cooldown_secs: u64::MAX,
            ..MarketConfig::default()
        };
        assert_eq!(config.cooldown(), chrono::Duration::MAX);

        let config = MarketConfig {
            cooldown_secs: i64::MAX as u64,
            ..MarketConfig::default()
        };
        assert_eq!(config.cooldown(), chrono::Duration::MAX);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "capacity = 3").unwrap();
        assert!(MarketConfig::load(file.path()).is_err());
    }
}
