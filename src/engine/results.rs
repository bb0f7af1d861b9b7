// 8.0.2: result types and errors for engine operations.

use crate::config::ConfigError;
use crate::position::{Position, PositionError};
use crate::price_process::Regime;
use crate::types::{Asset, Price, Quote, Side};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct OpenResult {
    pub asset: Asset,
    pub side: Side,
    pub fill_size: Decimal,
    pub fill_price: Price,
    /// Position after the fill, merged if one already existed
    pub position: Position,
    pub merged: bool,
}

#[derive(Debug, Clone)]
pub struct CloseResult {
    pub asset: Asset,
    pub side: Side,
    pub closed_size: Decimal,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub penalty: Quote,
    pub cash_returned: Quote,
    pub fully_closed: bool,
    pub bonus_granted: bool,
}

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub asset: Asset,
    pub side: Side,
    pub size: Decimal,
    pub mark_price: Price,
    pub liquidation_price: Price,
    pub margin_lost: Quote,
}

#[derive(Debug, Clone, Default)]
pub struct CrowdTickResult {
    pub spawned: usize,
    pub closed: usize,
    pub liquidated: usize,
    pub reward: Quote,
}

#[derive(Debug, Clone, Default)]
pub struct TickResult {
    pub regimes: BTreeMap<Asset, Regime>,
    pub effects_applied: usize,
    pub crowd: CrowdTickResult,
    pub liquidations: Vec<LiquidationResult>,
    pub game_over: bool,
    /// True when the tick did nothing because the game was already over
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Game over")]
    GameOver,

    #[error("Round is over")]
    RoundOver,

    #[error("Insufficient cash: required {required}, available {available}")]
    InsufficientCash { required: Quote, available: Quote },

    #[error("Cash is below the minimum spend")]
    BelowMinimumSpend,

    #[error("Margin must be positive")]
    InvalidMargin,

    #[error("Leverage {0} outside the allowed range")]
    InvalidLeverage(Decimal),

    #[error("Close fraction must be positive")]
    InvalidCloseFraction,

    #[error("No {side} position on {asset}")]
    NoPosition { asset: Asset, side: Side },

    #[error("No bonus available")]
    NoBonus,

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
