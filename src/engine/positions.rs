//! Player commands: open, close and the bonus pump/dump.

use super::core::Engine;
use super::results::{CloseResult, EngineError, OpenResult};
use crate::events::{BonusGrantedEvent, BonusTriggeredEvent, EventPayload, PositionClosedEvent, PositionOpenedEvent};
use crate::history::{Execution, ExecutionSide, TransactionKind, TransactionRecord};
use crate::mark_price::ManiaAction;
use crate::position::{merge_position, reduce_position, Position};
use crate::price_process::apply_bonus;
use crate::types::{Asset, Leverage, Price, Quote, Side};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Opens or adds to the player's `side` position on `asset` at the current mark.
    pub fn open_position(
        &mut self,
        asset: Asset,
        side: Side,
        margin: Quote,
        leverage: Decimal,
    ) -> Result<OpenResult, EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if self.is_round_over() {
            return Err(EngineError::RoundOver);
        }
        if self.account.cash < self.game.min_spend {
            return Err(EngineError::BelowMinimumSpend);
        }
        if !margin.is_positive() {
            return Err(EngineError::InvalidMargin);
        }
        if !self.game.leverage_allowed(leverage) {
            return Err(EngineError::InvalidLeverage(leverage));
        }
        let leverage = Leverage::new(leverage).ok_or(EngineError::InvalidLeverage(leverage))?;
        if self.account.cash < margin {
            return Err(EngineError::InsufficientCash {
                required: margin,
                available: self.account.cash,
            });
        }

        let mark = self.mark_of(asset);
        let now = self.current_time;
        let fill = Position::open(side, margin, leverage, mark, now);

        // merge before touching cash so a rejected merge changes nothing
        let (position, merged) = match self.positions.get(&(asset, side)) {
            Some(existing) => (merge_position(existing, &fill, now)?, true),
            None => (fill.clone(), false),
        };

        self.account
            .reserve_margin(margin)
            .map_err(|_| EngineError::InsufficientCash {
                required: margin,
                available: self.account.cash,
            })?;
        self.positions.insert((asset, side), position.clone());

        self.record_execution(Execution {
            asset,
            price: mark,
            size: fill.size,
            side: ExecutionSide::opening(side),
            time: now,
            is_crowd: false,
        });

        let event = PositionOpenedEvent {
            asset,
            side,
            fill_size: fill.size,
            fill_price: mark,
            margin,
            leverage,
            entry_price: position.entry_price,
            liquidation_price: position.liquidation_price(),
        };
        self.emit_event(if merged {
            EventPayload::PositionIncreased(event)
        } else {
            EventPayload::PositionOpened(event)
        });

        Ok(OpenResult {
            asset,
            side,
            fill_size: fill.size,
            fill_price: mark,
            position,
            merged,
        })
    }

    /// Closes `fraction` of a player position at the current mark. Fractions above 1 close
    /// everything. Allowed after the round timer runs out.
    pub fn close_position(&mut self, asset: Asset, side: Side, fraction: Decimal) -> Result<CloseResult, EngineError> {
        if fraction <= Decimal::ZERO {
            return Err(EngineError::InvalidCloseFraction);
        }
        let position = self
            .positions
            .get(&(asset, side))
            .cloned()
            .ok_or(EngineError::NoPosition { asset, side })?;

        let mark = self.mark_of(asset);
        let now = self.current_time;
        let outcome = reduce_position(&position, fraction, mark, now);
        let cash_returned = outcome.net_return();

        self.account
            .settle_close(outcome.closed_margin, outcome.realized_pnl, outcome.penalty);

        match &outcome.remaining {
            Some(rest) => {
                self.positions.insert((asset, side), rest.clone());
            }
            None => {
                self.positions.remove(&(asset, side));
                self.transactions.push(TransactionRecord {
                    kind: TransactionKind::Closed,
                    asset,
                    side,
                    time: now,
                    entry_price: position.entry_price,
                    exit_price: mark,
                    size: position.size,
                    margin: position.isolated_margin,
                    leverage: position.leverage,
                    pnl: outcome.realized_pnl.sub(outcome.penalty),
                    liquidation_price: None,
                });
            }
        }

        self.record_execution(Execution {
            asset,
            price: mark,
            size: outcome.closed_size,
            side: ExecutionSide::closing(side),
            time: now,
            is_crowd: false,
        });

        let bonus_granted = self.account.record_trade(outcome.realized_pnl);
        if bonus_granted {
            info!(streak = self.account.win_streak.streak, "bonus unlocked");
            self.emit_event(EventPayload::BonusGranted(BonusGrantedEvent {
                streak: self.account.win_streak.streak,
            }));
        }

        let event = PositionClosedEvent {
            asset,
            side,
            closed_size: outcome.closed_size,
            exit_price: mark,
            realized_pnl: outcome.realized_pnl,
            penalty: outcome.penalty,
            cash_returned,
        };
        let fully_closed = outcome.is_full();
        self.emit_event(if fully_closed {
            EventPayload::PositionClosed(event)
        } else {
            EventPayload::PositionReduced(event)
        });

        Ok(CloseResult {
            asset,
            side,
            closed_size: outcome.closed_size,
            exit_price: mark,
            realized_pnl: outcome.realized_pnl,
            penalty: outcome.penalty,
            cash_returned,
            fully_closed,
            bonus_granted,
        })
    }

    /// Spends the streak bonus on a pump or dump of `asset`.
    pub fn trigger_bonus(&mut self, asset: Asset, action: ManiaAction) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if !self.account.win_streak.consume_bonus() {
            return Err(EngineError::NoBonus);
        }

        let now = self.current_time;
        let (mania_ms, jump_prob, max_jump) = (
            self.game.bonus_mania_ms,
            self.game.bonus_jump_prob,
            self.game.bonus_max_jump,
        );
        let Some(market) = self.markets.get_mut(&asset) else {
            return Ok(());
        };
        apply_bonus(market, action, now, mania_ms, jump_prob, max_jump);
        let basis = market.basis;
        let mania_until = now.plus_millis(mania_ms);

        info!(%asset, ?action, %basis, "bonus triggered");
        self.emit_event(EventPayload::BonusTriggered(BonusTriggeredEvent {
            asset,
            action,
            basis,
            mania_until,
        }));
        Ok(())
    }

    pub(super) fn mark_of(&self, asset: Asset) -> Price {
        self.markets
            .get(&asset)
            .map(|m| m.mark_price)
            .unwrap_or_else(|| self.game.asset_config(asset).initial_price)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GameConfig;
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::mark_price::ManiaAction;
    use crate::types::{Asset, Price, Quote, Side, Timestamp};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn setup_engine() -> Engine {
        Engine::new(EngineConfig::seeded(7), GameConfig::default(), Timestamp::from_millis(0)).unwrap()
    }

    #[test]
    fn open_debits_margin_and_fills_at_mark() {
        let mut engine = setup_engine();
        let result = engine
            .open_position(Asset::BtcPerp, Side::Long, Quote::new(dec!(1000)), dec!(10))
            .unwrap();

        assert!(!result.merged);
        assert_eq!(result.fill_size, dec!(0.2));
        assert_eq!(engine.cash().value(), dec!(99000));
        assert_eq!(engine.transactions().count(), 0);

        let exec = engine.executions().next().unwrap();
        assert!(!exec.is_crowd);
        assert_eq!(exec.side, crate::history::ExecutionSide::Buy);
    }

    #[test]
    fn open_rejections() {
        let mut engine = setup_engine();
        let margin = Quote::new(dec!(1000));

        assert_eq!(
            engine.open_position(Asset::BtcPerp, Side::Long, Quote::zero(), dec!(10)).unwrap_err(),
            EngineError::InvalidMargin
        );
        assert!(matches!(
            engine.open_position(Asset::BtcPerp, Side::Long, margin, dec!(1)),
            Err(EngineError::InvalidLeverage(_))
        ));
        assert!(matches!(
            engine.open_position(Asset::BtcPerp, Side::Long, margin, dec!(51)),
            Err(EngineError::InvalidLeverage(_))
        ));
        assert!(matches!(
            engine.open_position(Asset::BtcPerp, Side::Long, Quote::new(dec!(200000)), dec!(10)),
            Err(EngineError::InsufficientCash { .. })
        ));
        assert_eq!(engine.cash().value(), dec!(100000));
    }

    #[test]
    fn second_open_merges() {
        let mut engine = setup_engine();
        engine
            .open_position(Asset::BtcPerp, Side::Long, Quote::new(dec!(1000)), dec!(10))
            .unwrap();
        engine.set_index_price(Asset::BtcPerp, Price::new_unchecked(dec!(40000)));
        let result = engine
            .open_position(Asset::BtcPerp, Side::Long, Quote::new(dec!(1000)), dec!(20))
            .unwrap();

        assert!(result.merged);
        let pos = engine.position(Asset::BtcPerp, Side::Long).unwrap();
        assert_eq!(pos.size, dec!(0.7));
        assert_eq!(pos.leverage.value(), dec!(15));
        assert_eq!(pos.opened_at, Timestamp::from_millis(0));
        assert_eq!(engine.cash().value(), dec!(98000));
    }

    #[test]
    fn close_missing_or_zero_fraction() {
        let mut engine = setup_engine();
        assert_eq!(
            engine.close_position(Asset::EthPerp, Side::Short, Decimal::ONE).unwrap_err(),
            EngineError::NoPosition {
                asset: Asset::EthPerp,
                side: Side::Short
            }
        );
        engine
            .open_position(Asset::EthPerp, Side::Short, Quote::new(dec!(500)), dec!(5))
            .unwrap();
        assert_eq!(
            engine.close_position(Asset::EthPerp, Side::Short, Decimal::ZERO).unwrap_err(),
            EngineError::InvalidCloseFraction
        );
    }

    #[test]
    fn immediate_close_pays_full_penalty() {
        let mut engine = setup_engine();
        engine
            .open_position(Asset::BtcPerp, Side::Short, Quote::new(dec!(1000)), dec!(10))
            .unwrap();
        let result = engine.close_position(Asset::BtcPerp, Side::Short, Decimal::ONE).unwrap();

        // held 0ms: 5% of 1000
        assert_eq!(result.penalty.value(), dec!(50));
        assert_eq!(result.realized_pnl, Quote::zero());
        assert!(result.fully_closed);
        assert_eq!(engine.cash().value(), dec!(99950));

        let record = engine.transactions().next().unwrap();
        assert_eq!(record.pnl.value(), dec!(-50));
        // zero realized pnl is not a win
        assert_eq!(engine.account().win_streak.streak, 0);
        assert_eq!(engine.account().total_trades, 1);
    }

    #[test]
    fn bonus_requires_streak() {
        let mut engine = setup_engine();
        assert_eq!(
            engine.trigger_bonus(Asset::BtcPerp, ManiaAction::Pump).unwrap_err(),
            EngineError::NoBonus
        );

        for _ in 0..3 {
            engine
                .open_position(Asset::BtcPerp, Side::Long, Quote::new(dec!(1000)), dec!(10))
                .unwrap();
            let mark = engine.mark_price(Asset::BtcPerp).unwrap().value();
            engine.set_index_price(Asset::BtcPerp, Price::new_unchecked(mark + dec!(1000)));
            engine.close_position(Asset::BtcPerp, Side::Long, Decimal::ONE).unwrap();
        }
        assert!(engine.has_bonus());

        engine.trigger_bonus(Asset::BtcPerp, ManiaAction::Pump).unwrap();
        assert!(!engine.has_bonus());
        let market = engine.market(Asset::BtcPerp).unwrap();
        assert!(market.basis > Decimal::ZERO);
        assert!(market.is_mania_active(engine.time()));
    }
}
