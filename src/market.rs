//! Per-asset market configuration and runtime state.
//!
//! An `AssetMarket` is the full state of one synthetic perpetual: the index price the price
//! process walks, the basis on top of it, the mania regime a bonus leaves behind, and any
//! news reaction in flight.

use crate::mark_price::{mark_from_index, ManiaAction};
use crate::news::{NewsEvent, NewsImpact};
use crate::types::{Asset, Price, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Calm-market jump parameters. Mania pushes them up, the decay regime brings them back.
pub const BASELINE_JUMP_PROB: Decimal = dec!(0.04);
pub const BASELINE_MAX_JUMP: Decimal = dec!(0.004);

/// Static asset configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub asset: Asset,
    pub initial_price: Price,
    /// Per-tick volatility outside of news
    pub base_volatility: Decimal,
}

impl AssetConfig {
    pub fn btc_perp() -> Self {
        Self {
            asset: Asset::BtcPerp,
            initial_price: Price::new_unchecked(dec!(50000)),
            base_volatility: dec!(0.0007),
        }
    }

    pub fn eth_perp() -> Self {
        Self {
            asset: Asset::EthPerp,
            initial_price: Price::new_unchecked(dec!(3000)),
            base_volatility: dec!(0.001),
        }
    }

    pub fn for_asset(asset: Asset) -> Self {
        match asset {
            Asset::BtcPerp => Self::btc_perp(),
            Asset::EthPerp => Self::eth_perp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionPhase {
    /// Initial move
    Phase1,
    /// Pullback
    Phase2,
    /// Continuation
    Phase3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalRamp {
    pub start: Timestamp,
    /// Absolute price change the ramp walks toward
    pub target_change: Decimal,
    /// 0..=1 share of the ramp window elapsed
    pub progress: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsReaction {
    pub generation: u64,
    pub news: NewsEvent,
    pub impact: NewsImpact,
    pub phase: ReactionPhase,
    pub started_at: Timestamp,
    pub reaction_until: Timestamp,
    /// Index price just before the news hit
    pub original_price: Price,
    pub critical: Option<CriticalRamp>,
}

impl NewsReaction {
    pub fn is_critical(&self) -> bool {
        self.critical.is_some()
    }
}

/// Dynamic market state (changes every tick)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMarket {
    pub config: AssetConfig,
    pub index_price: Price,
    pub mark_price: Price,
    pub basis: Decimal,
    pub volatility: Decimal,
    pub base_volatility: Decimal,
    pub mania_until: Option<Timestamp>,
    pub jump_prob: Decimal,
    pub max_jump: Decimal,
    pub last_action: Option<ManiaAction>,
    pub reaction: Option<NewsReaction>,
    pub last_news_at: Timestamp,
    pub next_news_in_ms: i64,
    pub last_update: Timestamp,
}

impl AssetMarket {
    pub fn new(config: AssetConfig, next_news_in_ms: i64, timestamp: Timestamp) -> Self {
        let index_price = config.initial_price;
        let base_volatility = config.base_volatility;

        Self {
            config,
            index_price,
            mark_price: index_price,
            basis: Decimal::ZERO,
            volatility: base_volatility,
            base_volatility,
            mania_until: None,
            jump_prob: BASELINE_JUMP_PROB,
            max_jump: BASELINE_MAX_JUMP,
            last_action: None,
            reaction: None,
            last_news_at: timestamp,
            next_news_in_ms,
            last_update: timestamp,
        }
    }

    pub fn asset(&self) -> Asset {
        self.config.asset
    }

    pub fn recompute_mark(&mut self) {
        self.mark_price = mark_from_index(self.index_price, self.basis);
    }

    // floors at Price::FLOOR so the index stays positive whatever the regime drew
    pub fn set_index(&mut self, value: Decimal) {
        self.index_price = Price::floored(value);
        self.recompute_mark();
    }

    pub fn shift_index(&mut self, delta: Decimal) {
        self.set_index(self.index_price.value() + delta);
    }

    pub fn set_basis(&mut self, basis: Decimal) {
        self.basis = basis;
        self.recompute_mark();
    }

    pub fn is_mania_active(&self, now: Timestamp) -> bool {
        self.mania_until.map_or(false, |until| now < until)
    }

    pub fn is_news_active(&self) -> bool {
        self.reaction.is_some()
    }

    pub fn news_due(&self, now: Timestamp) -> bool {
        now.millis_since(self.last_news_at) > self.next_news_in_ms
    }

    pub fn clear_reaction(&mut self) {
        self.reaction = None;
        self.volatility = self.base_volatility;
    }

    // jump params above baseline after a mania window closed
    pub fn mania_decaying(&self) -> bool {
        self.mania_until.is_some() && (self.jump_prob > BASELINE_JUMP_PROB || self.max_jump > BASELINE_MAX_JUMP)
    }

    pub fn reset_mania(&mut self) {
        self.mania_until = None;
        self.last_action = None;
        self.jump_prob = BASELINE_JUMP_PROB;
        self.max_jump = BASELINE_MAX_JUMP;
    }
}
