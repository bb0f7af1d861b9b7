// 7.0 config.rs: all game settings in one place. cash, limits, timings, crowd behavior.
// 7.1 presets: default is the arcade game. practice is gentler, hardcore is meaner.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::crowd::{CrowdParams, DEFAULT_REWARD_RATE};
use crate::market::AssetConfig;
use crate::types::{Asset, Quote};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    // Cash at the start of each round
    pub starting_cash: Quote,
    // Opens are refused below this much cash, and dropping below it ends the game
    pub min_spend: Quote,
    // Inclusive leverage bounds for player opens
    pub min_leverage: Decimal,
    pub max_leverage: Decimal,
    // Share of a liquidated crowd margin paid to the player
    pub reward_rate: Decimal,
    pub tick_interval_ms: i64,
    pub round_duration_ms: i64,
    // Bonus pump/dump: mania window and the jump params it sets
    pub bonus_mania_ms: i64,
    pub bonus_jump_prob: Decimal,
    pub bonus_max_jump: Decimal,
    pub crowd: CrowdParams,
    pub assets: Vec<AssetConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_cash: Quote::new(dec!(100000)),
            min_spend: Quote::new(dec!(25)),
            min_leverage: dec!(2),
            max_leverage: dec!(50),
            reward_rate: DEFAULT_REWARD_RATE,
            tick_interval_ms: 150,
            round_duration_ms: 300_000, // 5 minutes
            bonus_mania_ms: 15_000,
            bonus_jump_prob: dec!(0.3),
            bonus_max_jump: dec!(0.015),
            crowd: CrowdParams::default(),
            assets: Asset::ALL.iter().map(|a| AssetConfig::for_asset(*a)).collect(),
        }
    }
}

impl GameConfig {
    // long round, low leverage cap, busier crowd to farm rewards from
    pub fn practice() -> Self {
        let mut config = Self::default();
        config.round_duration_ms = 600_000;
        config.max_leverage = dec!(20);
        config.crowd.spawn_prob_calm = 0.2;
        config.crowd.spawn_prob_active = 0.4;
        config
    }

    // short round, thin bankroll, smaller rewards
    pub fn hardcore() -> Self {
        let mut config = Self::default();
        config.starting_cash = Quote::new(dec!(10000));
        config.round_duration_ms = 120_000;
        config.reward_rate = dec!(0.05);
        config.bonus_mania_ms = 10_000;
        config
    }

    pub fn asset_config(&self, asset: Asset) -> AssetConfig {
        self.assets
            .iter()
            .find(|c| c.asset == asset)
            .cloned()
            .unwrap_or_else(|| AssetConfig::for_asset(asset))
    }

    pub fn leverage_allowed(&self, leverage: Decimal) -> bool {
        leverage >= self.min_leverage && leverage <= self.max_leverage
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.starting_cash.is_positive() || self.min_spend.is_negative() {
            return Err(ConfigError::InvalidCash {
                reason: "Starting cash must be positive and min spend non-negative".to_string(),
            });
        }
        if self.min_spend > self.starting_cash {
            return Err(ConfigError::InvalidCash {
                reason: "Min spend exceeds starting cash".to_string(),
            });
        }

        // leverage below 1 has no liquidation price
        if self.min_leverage < Decimal::ONE || self.min_leverage > self.max_leverage {
            return Err(ConfigError::InvalidLeverage {
                reason: "Leverage bounds must satisfy 1 <= min <= max".to_string(),
            });
        }

        if self.reward_rate < Decimal::ZERO || self.reward_rate > Decimal::ONE {
            return Err(ConfigError::InvalidReward {
                reason: "Reward rate must be within [0, 1]".to_string(),
            });
        }

        if self.tick_interval_ms <= 0 || self.round_duration_ms <= 0 || self.bonus_mania_ms < 0 {
            return Err(ConfigError::InvalidTiming {
                reason: "Tick interval and round duration must be positive".to_string(),
            });
        }

        let crowd = &self.crowd;
        let probs = [
            crowd.spawn_prob_calm,
            crowd.spawn_prob_active,
            crowd.close_prob_calm,
            crowd.close_prob_active,
        ];
        if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(ConfigError::InvalidCrowd {
                reason: "Crowd probabilities must be within [0, 1]".to_string(),
            });
        }
        if crowd.min_leverage < 1.0 || crowd.min_leverage >= crowd.max_leverage || crowd.min_margin <= 0.0 || crowd.min_margin >= crowd.max_margin {
            return Err(ConfigError::InvalidCrowd {
                reason: "Crowd leverage and margin ranges must be non-empty and positive".to_string(),
            });
        }

        for asset in Asset::ALL {
            if !self.assets.iter().any(|c| c.asset == asset) {
                return Err(ConfigError::MissingAsset(asset));
            }
        }
        if self.assets.iter().any(|c| c.base_volatility < Decimal::ZERO) {
            return Err(ConfigError::InvalidTiming {
                reason: "Base volatility cannot be negative".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid cash settings: {reason}")]
    InvalidCash { reason: String },

    #[error("Invalid leverage settings: {reason}")]
    InvalidLeverage { reason: String },

    #[error("Invalid reward settings: {reason}")]
    InvalidReward { reason: String },

    #[error("Invalid timing settings: {reason}")]
    InvalidTiming { reason: String },

    #[error("Invalid crowd settings: {reason}")]
    InvalidCrowd { reason: String },

    #[error("No configuration for {0}")]
    MissingAsset(Asset),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.starting_cash.value(), dec!(100000));
        assert_eq!(config.assets.len(), 2);
    }

    #[test]
    fn test_presets_valid() {
        assert!(GameConfig::practice().validate().is_ok());
        assert!(GameConfig::hardcore().validate().is_ok());
        assert_eq!(GameConfig::practice().max_leverage, dec!(20));
    }

    #[test]
    fn test_leverage_bounds_inclusive() {
        let config = GameConfig::default();
        assert!(config.leverage_allowed(dec!(2)));
        assert!(config.leverage_allowed(dec!(50)));
        assert!(!config.leverage_allowed(dec!(1.99)));
        assert!(!config.leverage_allowed(dec!(50.01)));
    }

    #[test]
    fn test_invalid_leverage() {
        let mut config = GameConfig::default();
        config.min_leverage = dec!(0.5);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLeverage { .. })));
    }

    #[test]
    fn test_invalid_crowd() {
        let mut config = GameConfig::default();
        config.crowd.close_prob_active = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCrowd { .. })));
    }

    #[test]
    fn test_missing_asset() {
        let mut config = GameConfig::default();
        config.assets.retain(|c| c.asset != Asset::EthPerp);
        assert_eq!(config.validate(), Err(ConfigError::MissingAsset(Asset::EthPerp)));
    }

    #[test]
    fn test_config_serialization() {
        let config = GameConfig::hardcore();
        let json = serde_json::to_string(&config).unwrap();
        let back: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
