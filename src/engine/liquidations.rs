//! Player liquidation detection and execution.

use super::core::Engine;
use super::results::LiquidationResult;
use crate::events::{EventPayload, LiquidationEvent};
use crate::history::{Execution, ExecutionSide, TransactionKind, TransactionRecord};
use crate::position::Position;
use crate::types::{Asset, Price, Side};
use tracing::info;

impl Engine {
    /// Checks every player position against its freshly computed liquidation price and
    /// liquidates the ones the mark has crossed. Detection runs to completion before any
    /// position is touched.
    pub fn check_liquidations(&mut self) -> Vec<LiquidationResult> {
        let mut liquidatable: Vec<(Asset, Side, Position, Price, Price)> = Vec::new();

        for (asset, side, position) in self.open_positions() {
            let mark = self.mark_of(asset);
            let liq_price = position.liquidation_price();
            if position.should_liquidate(mark) {
                liquidatable.push((asset, side, position.clone(), mark, liq_price));
            }
        }

        liquidatable
            .into_iter()
            .map(|(asset, side, position, mark, liq_price)| self.execute_liquidation(asset, side, position, mark, liq_price))
            .collect()
    }

    /// Execute a liquidation. The whole margin is forfeited.
    fn execute_liquidation(
        &mut self,
        asset: Asset,
        side: Side,
        position: Position,
        mark_price: Price,
        liquidation_price: Price,
    ) -> LiquidationResult {
        let now = self.current_time;
        let margin_lost = position.isolated_margin;

        self.positions.remove(&(asset, side));
        self.account.settle_liquidation(margin_lost);
        self.account.record_trade(margin_lost.negate());

        self.transactions.push(TransactionRecord {
            kind: TransactionKind::Liquidation,
            asset,
            side,
            time: now,
            entry_price: position.entry_price,
            exit_price: mark_price,
            size: position.size,
            margin: margin_lost,
            leverage: position.leverage,
            pnl: margin_lost.negate(),
            liquidation_price: Some(liquidation_price),
        });

        self.record_execution(Execution {
            asset,
            price: mark_price,
            size: position.size,
            side: ExecutionSide::closing(side),
            time: now,
            is_crowd: false,
        });

        info!(%asset, %side, mark = %mark_price, liq = %liquidation_price, margin = %margin_lost, "position liquidated");
        self.emit_event(EventPayload::Liquidation(LiquidationEvent {
            asset,
            side,
            size: position.size,
            mark_price,
            liquidation_price,
            margin_lost,
        }));

        LiquidationResult {
            asset,
            side,
            size: position.size,
            mark_price,
            liquidation_price,
            margin_lost,
        }
    }
}
