// 13.0: mark price derivation. mark = index + basis.
// basis is the only thing the player can push around (bonus pump/dump) and it bleeds
// back to zero with a 30s half-life.

use crate::types::{Price, Timestamp};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const BASIS_HALF_LIFE_SECS: Decimal = dec!(30);
pub const BONUS_BASIS_SHIFT: Decimal = dec!(0.008);

// direction of a player-triggered bonus. mania jumps lean the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManiaAction {
    Pump,
    Dump,
}

impl ManiaAction {
    pub fn sign(&self) -> Decimal {
        match self {
            ManiaAction::Pump => Decimal::ONE,
            ManiaAction::Dump => Decimal::NEGATIVE_ONE,
        }
    }
}

// 13.1: 0.5^(dt / half_life). dt <= 0 means no time passed so nothing decays.
pub fn half_life_factor(dt_secs: Decimal, half_life_secs: Decimal) -> Decimal {
    if dt_secs <= Decimal::ZERO || half_life_secs <= Decimal::ZERO {
        return Decimal::ONE;
    }
    dec!(0.5)
        .checked_powd(dt_secs / half_life_secs)
        .unwrap_or(Decimal::ZERO)
}

pub fn elapsed_secs(now: Timestamp, since: Timestamp) -> Decimal {
    Decimal::from(now.millis_since(since)) / dec!(1000)
}

pub fn decay_basis(basis: Decimal, dt_secs: Decimal) -> Decimal {
    basis * half_life_factor(dt_secs, BASIS_HALF_LIFE_SECS)
}

pub fn mark_from_index(index_price: Price, basis: Decimal) -> Price {
    Price::floored(index_price.value() + basis)
}

// 13.2: bonus shifts basis by 0.8% of the current mark in the chosen direction
pub fn bonus_basis_shift(mark_price: Price, action: ManiaAction) -> Decimal {
    action.sign() * mark_price.pct_of(BONUS_BASIS_SHIFT)
}
