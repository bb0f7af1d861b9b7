//! Crowd lifecycle per tick: spawn, random close, liquidation sweep, reward payout.

use super::core::Engine;
use super::results::CrowdTickResult;
use crate::crowd::liquidation_reward;
use crate::events::{CrowdLiquidationEvent, EventPayload};
use crate::history::{Execution, ExecutionSide};
use crate::types::{Asset, Quote, Timestamp};
use rand::Rng;
use tracing::debug;

impl Engine {
    pub(super) fn advance_crowd(&mut self, now: Timestamp) -> CrowdTickResult {
        let mut result = CrowdTickResult::default();
        for asset in Asset::ALL {
            self.advance_crowd_for(asset, now, &mut result);
        }
        result
    }

    fn advance_crowd_for(&mut self, asset: Asset, now: Timestamp, result: &mut CrowdTickResult) {
        let Some(market) = self.markets.get(&asset) else {
            return;
        };
        let mark = market.mark_price;
        let active = market.is_news_active() || market.is_mania_active(now);
        let params = self.game.crowd.clone();

        if self.rng.gen::<f64>() < params.spawn_prob(active) {
            let spawned = self.crowd.spawn(&mut self.rng, asset, mark, &params, now);
            self.record_execution(Execution {
                asset,
                price: mark,
                size: spawned.position.size,
                side: ExecutionSide::opening(spawned.position.side),
                time: now,
                is_crowd: true,
            });
            result.spawned += 1;
        }

        if !self.crowd.is_empty(asset) && self.rng.gen::<f64>() < params.close_prob(active) {
            if let Some(closed) = self.crowd.remove_random(&mut self.rng, asset) {
                self.record_execution(Execution {
                    asset,
                    price: mark,
                    size: closed.position.size,
                    side: ExecutionSide::closing(closed.position.side),
                    time: now,
                    is_crowd: true,
                });
                result.closed += 1;
            }
        }

        let liquidated = self.crowd.sweep_liquidations(asset, mark);
        if liquidated.is_empty() {
            return;
        }

        let mut margin_total = Quote::zero();
        let mut reward_total = Quote::zero();
        for crowd in &liquidated {
            let margin = crowd.position.isolated_margin;
            margin_total = margin_total.add(margin);
            reward_total = reward_total.add(liquidation_reward(margin, self.game.reward_rate));
            self.record_execution(Execution {
                asset,
                price: mark,
                size: crowd.position.size,
                side: ExecutionSide::closing(crowd.position.side),
                time: now,
                is_crowd: true,
            });
        }

        self.account.credit_reward(reward_total);
        result.liquidated += liquidated.len();
        result.reward = result.reward.add(reward_total);

        debug!(%asset, count = liquidated.len(), reward = %reward_total, "crowd liquidated");
        self.emit_event(EventPayload::CrowdLiquidation(CrowdLiquidationEvent {
            asset,
            count: liquidated.len(),
            margin_liquidated: margin_total,
            reward: reward_total,
        }));
    }
}
