// 4.0: open position tracking. pnl = side * (mark - entry) * size.
// 4.1 has merge (same-side add) and reduce (partial close) logic at the bottom.

use crate::liquidation::{is_liquidatable, liquidation_price};
use crate::types::{Leverage, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// closing inside this window costs a penalty that fades to zero at the boundary
pub const MIN_HOLD_MS: i64 = 10_000;
pub const QUICK_CLOSE_PENALTY_RATE: Decimal = dec!(0.05);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Price,
    pub isolated_margin: Quote,
    pub leverage: Leverage,
    pub maintenance_leverage: Decimal,
    pub notional: Quote,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    // fills at mark: notional = margin * leverage, size = notional / mark
    pub fn open(side: Side, margin: Quote, leverage: Leverage, mark_price: Price, timestamp: Timestamp) -> Self {
        let notional = margin.mul(leverage.value());
        let size = notional.value() / mark_price.value();

        Self {
            side,
            size,
            entry_price: mark_price,
            isolated_margin: margin,
            leverage,
            maintenance_leverage: leverage.maintenance(),
            notional,
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size <= Decimal::ZERO
    }

    // always recomputed. never trust a stored copy for a liquidation decision
    pub fn liquidation_price(&self) -> Price {
        liquidation_price(
            self.side,
            self.entry_price,
            self.size,
            self.isolated_margin,
            self.maintenance_leverage,
        )
    }

    pub fn should_liquidate(&self, mark_price: Price) -> bool {
        is_liquidatable(self.side, mark_price, self.liquidation_price())
    }

    // 4.1: paper gains/losses based on current price
    pub fn unrealized_pnl(&self, mark_price: Price) -> Quote {
        calculate_unrealized_pnl(self.side, self.size, self.entry_price, mark_price)
    }

    // margin + pnl: what the position would be worth if closed right now, before penalties
    pub fn equity(&self, mark_price: Price) -> Quote {
        self.isolated_margin.add(self.unrealized_pnl(mark_price))
    }

    // entry-based value; what the crowd totals and sentiment gauges add up
    pub fn entry_value(&self) -> Quote {
        Quote::new(self.size * self.entry_price.value())
    }

    pub fn held_ms(&self, now: Timestamp) -> i64 {
        now.millis_since(self.opened_at).max(0)
    }
}

// 4.2: the pnl formula. sign * (mark - entry) * size
pub fn calculate_unrealized_pnl(side: Side, size: Decimal, entry_price: Price, mark_price: Price) -> Quote {
    Quote::new(side.sign() * (mark_price.value() - entry_price.value()) * size)
}

// 4.3: 5% of the closed margin, scaled by how much of the 10s window is left
pub fn quick_close_penalty(closed_margin: Quote, held_ms: i64) -> Quote {
    if held_ms >= MIN_HOLD_MS {
        return Quote::zero();
    }
    let held = Decimal::from(held_ms.max(0));
    let remaining = Decimal::ONE - held / Decimal::from(MIN_HOLD_MS);
    closed_margin.mul(QUICK_CLOSE_PENALTY_RATE * remaining)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("Merge would leave size {size} and margin {margin}")]
    InvalidMerge { size: Decimal, margin: Quote },

    #[error("Cannot merge a {incoming} fill into a {existing} position")]
    SideMismatch { existing: Side, incoming: Side },
}

// 4.4: adds to an existing same-side position. entry is size weighted, leverage is margin
// weighted, opened_at stays with the original fill.
pub fn merge_position(existing: &Position, addition: &Position, timestamp: Timestamp) -> Result<Position, PositionError> {
    if existing.side != addition.side {
        return Err(PositionError::SideMismatch {
            existing: existing.side,
            incoming: addition.side,
        });
    }

    let new_size = existing.size + addition.size;
    let new_margin = existing.isolated_margin.add(addition.isolated_margin);
    if new_size <= Decimal::ZERO || new_margin.value() <= Decimal::ZERO {
        return Err(PositionError::InvalidMerge {
            size: new_size,
            margin: new_margin,
        });
    }

    let weighted_entry = existing.entry_price.value() * existing.size + addition.entry_price.value() * addition.size;
    let new_entry = Price::new_unchecked(weighted_entry / new_size);

    let weighted_leverage = existing.leverage.value() * existing.isolated_margin.value()
        + addition.leverage.value() * addition.isolated_margin.value();
    // both inputs are >= 1 so their margin-weighted mean is too
    let new_leverage = Leverage::new(weighted_leverage / new_margin.value()).unwrap_or(existing.leverage);

    Ok(Position {
        side: existing.side,
        size: new_size,
        entry_price: new_entry,
        isolated_margin: new_margin,
        leverage: new_leverage,
        maintenance_leverage: new_leverage.maintenance(),
        notional: new_margin.mul(new_leverage.value()),
        opened_at: existing.opened_at,
        updated_at: timestamp,
    })
}

#[derive(Debug, Clone)]
pub struct CloseOutcome {
    /// Remaining position after a partial close; `None` when fully closed.
    pub remaining: Option<Position>,
    pub closed_size: Decimal,
    pub closed_margin: Quote,
    pub realized_pnl: Quote,
    pub penalty: Quote,
    pub exit_price: Price,
}

impl CloseOutcome {
    // what goes back to cash
    pub fn net_return(&self) -> Quote {
        self.closed_margin.add(self.realized_pnl).sub(self.penalty)
    }

    pub fn is_full(&self) -> bool {
        self.remaining.is_none()
    }
}

// 4.5: closes `fraction` of the position at mark. entry and leverage are held on a partial;
// a residual that would be empty turns it into a full close.
pub fn reduce_position(position: &Position, fraction: Decimal, mark_price: Price, now: Timestamp) -> CloseOutcome {
    let fraction = fraction.min(Decimal::ONE);

    let upnl = position.unrealized_pnl(mark_price);
    let realized = upnl.mul(fraction);
    let closed_size = position.size * fraction;
    let closed_margin = position.isolated_margin.mul(fraction);
    let penalty = quick_close_penalty(closed_margin, position.held_ms(now));

    let residual_size = position.size - closed_size;
    let residual_margin = position.isolated_margin.sub(closed_margin);

    let remaining = if fraction >= Decimal::ONE || residual_size <= Decimal::ZERO || residual_margin.value() <= Decimal::ZERO {
        None
    } else {
        Some(Position {
            size: residual_size,
            isolated_margin: residual_margin,
            notional: residual_margin.mul(position.leverage.value()),
            updated_at: now,
            ..position.clone()
        })
    };

    CloseOutcome {
        remaining,
        closed_size,
        closed_margin,
        realized_pnl: realized,
        penalty,
        exit_price: mark_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_at(price: Decimal, margin: Decimal, leverage: Decimal, at: i64) -> Position {
        Position::open(
            Side::Long,
            Quote::new(margin),
            Leverage::new(leverage).unwrap(),
            Price::new_unchecked(price),
            Timestamp::from_millis(at),
        )
    }

    #[test]
    fn open_sizes_from_notional() {
        let pos = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        assert_eq!(pos.size, dec!(0.2));
        assert_eq!(pos.notional.value(), dec!(10000));
        assert_eq!(pos.maintenance_leverage, dec!(8.0));
        assert_eq!(pos.liquidation_price().value(), dec!(45000));
    }

    #[test]
    fn unrealized_pnl_long_and_short() {
        let long = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        assert_eq!(long.unrealized_pnl(Price::new_unchecked(dec!(51000))).value(), dec!(200));

        let short = Position::open(
            Side::Short,
            Quote::new(dec!(1000)),
            Leverage::new(dec!(10)).unwrap(),
            Price::new_unchecked(dec!(50000)),
            Timestamp::from_millis(0),
        );
        assert_eq!(short.unrealized_pnl(Price::new_unchecked(dec!(51000))).value(), dec!(-200));
    }

    #[test]
    fn merge_weights_entry_and_leverage() {
        let first = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        let second = long_at(dec!(40000), dec!(1000), dec!(20), 5_000);

        let merged = merge_position(&first, &second, Timestamp::from_millis(5_000)).unwrap();

        // sizes 0.2 and 0.5
        assert_eq!(merged.size, dec!(0.7));
        // (50000 * 0.2 + 40000 * 0.5) / 0.7
        assert_eq!(merged.entry_price.value(), dec!(30000) / dec!(0.7));
        assert_eq!(merged.isolated_margin.value(), dec!(2000));
        assert_eq!(merged.leverage.value(), dec!(15));
        assert_eq!(merged.maintenance_leverage, dec!(12.0));
        assert_eq!(merged.notional.value(), dec!(30000));
        assert_eq!(merged.opened_at, Timestamp::from_millis(0));
    }

    #[test]
    fn merge_rejects_opposite_side() {
        let long = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        let mut short = long.clone();
        short.side = Side::Short;
        assert!(matches!(
            merge_position(&long, &short, Timestamp::from_millis(0)),
            Err(PositionError::SideMismatch { .. })
        ));
    }

    #[test]
    fn merge_rejects_non_positive_result() {
        let long = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        let mut drain = long.clone();
        drain.size = -long.size;
        drain.isolated_margin = long.isolated_margin.negate();
        assert!(matches!(
            merge_position(&long, &drain, Timestamp::from_millis(0)),
            Err(PositionError::InvalidMerge { .. })
        ));
    }

    #[test]
    fn penalty_fades_linearly() {
        let margin = Quote::new(dec!(1000));
        assert_eq!(quick_close_penalty(margin, 0).value(), dec!(50));
        assert_eq!(quick_close_penalty(margin, 5_000).value(), dec!(25));
        assert_eq!(quick_close_penalty(margin, 10_000), Quote::zero());
        assert_eq!(quick_close_penalty(margin, 60_000), Quote::zero());
    }

    #[test]
    fn partial_close_keeps_entry_and_leverage() {
        let pos = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        let outcome = reduce_position(&pos, dec!(0.25), Price::new_unchecked(dec!(52000)), Timestamp::from_millis(20_000));

        let rest = outcome.remaining.clone().unwrap();
        assert_eq!(rest.size, dec!(0.15));
        assert_eq!(rest.isolated_margin.value(), dec!(750));
        assert_eq!(rest.entry_price, pos.entry_price);
        assert_eq!(rest.leverage, pos.leverage);
        assert_eq!(rest.notional.value(), dec!(7500));

        // 0.2 * 2000 = 400 unrealized, a quarter realized
        assert_eq!(outcome.realized_pnl.value(), dec!(100));
        assert_eq!(outcome.penalty, Quote::zero());
        assert_eq!(outcome.net_return().value(), dec!(350));
    }

    #[test]
    fn full_close_inside_hold_window_pays_penalty() {
        let pos = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        let outcome = reduce_position(&pos, Decimal::ONE, Price::new_unchecked(dec!(50000)), Timestamp::from_millis(2_000));

        assert!(outcome.is_full());
        // 5% of 1000 * (1 - 0.2)
        assert_eq!(outcome.penalty.value(), dec!(40));
        assert_eq!(outcome.net_return().value(), dec!(960));
    }

    #[test]
    fn fraction_above_one_is_a_full_close() {
        let pos = long_at(dec!(50000), dec!(1000), dec!(10), 0);
        let outcome = reduce_position(&pos, dec!(3), Price::new_unchecked(dec!(50000)), Timestamp::from_millis(20_000));
        assert!(outcome.is_full());
        assert_eq!(outcome.closed_margin.value(), dec!(1000));
    }
}
