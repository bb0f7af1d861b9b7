//! Price process driving and deferred news effects.

use super::core::Engine;
use crate::events::{EventPayload, NewsEndedEvent, NewsPhaseEvent, NewsTriggeredEvent};
use crate::history::{Execution, ExecutionSide};
use crate::market::ReactionPhase;
use crate::news::Sentiment;
use crate::price_process::{advance_phase, end_reaction, step, NewsStarted, Regime};
use crate::schedule::{EffectKind, ScheduledEffect};
use crate::types::{decimal_from_f64, Asset, Price, Timestamp};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use tracing::{debug, info};

impl Engine {
    /// Runs one price-process step for every asset, BTC first.
    pub(super) fn advance_prices(&mut self, now: Timestamp) -> BTreeMap<Asset, Regime> {
        let mut regimes = BTreeMap::new();

        for asset in Asset::ALL {
            let generation = self.next_generation;
            let Some(market) = self.markets.get_mut(&asset) else {
                continue;
            };
            let outcome = step(market, now, &mut self.rng, generation);
            regimes.insert(asset, outcome.regime);

            if let Some(started) = outcome.news {
                self.next_generation += 1;
                self.on_news_started(asset, started, now);
            }
        }

        regimes
    }

    fn on_news_started(&mut self, asset: Asset, started: NewsStarted, now: Timestamp) {
        let NewsStarted {
            generation,
            news,
            impact,
        } = started;

        // phase transitions at absolute times fixed now
        let phase2_at = now.plus_millis(impact.phase1_ms);
        let phase3_at = phase2_at.plus_millis(impact.phase2_ms);
        let end_at = now.plus_millis(impact.total_ms);
        self.effects.schedule(
            phase2_at,
            asset,
            generation,
            EffectKind::AdvancePhase {
                from: ReactionPhase::Phase1,
            },
        );
        self.effects.schedule(
            phase3_at,
            asset,
            generation,
            EffectKind::AdvancePhase {
                from: ReactionPhase::Phase2,
            },
        );
        self.effects.schedule(end_at, asset, generation, EffectKind::EndReaction);

        // a short burst of crowd order flow in the direction of the headline
        let side = match news.sentiment {
            Sentiment::Bullish => ExecutionSide::Buy,
            Sentiment::Bearish => ExecutionSide::Sell,
        };
        let bursts = self.rng.gen_range(2..=4);
        for i in 0..bursts {
            let delay = i * 200 + self.rng.gen_range(0..300);
            self.effects
                .schedule(now.plus_millis(delay), asset, generation, EffectKind::CrowdExecution { side });
        }

        let original_price = self
            .markets
            .get(&asset)
            .and_then(|m| m.reaction.as_ref())
            .map(|r| r.original_price)
            .unwrap_or_else(|| self.mark_of(asset));

        info!(
            %asset,
            generation,
            title = %news.title,
            importance = %news.importance,
            sentiment = %news.sentiment,
            "news triggered"
        );
        self.emit_event(EventPayload::NewsTriggered(NewsTriggeredEvent {
            asset,
            generation,
            title: news.title.clone(),
            sentiment: news.sentiment,
            importance: news.importance,
            initial_change: impact.initial_change,
            original_price,
        }));
        self.current_news = Some(news);
    }

    /// Fires every deferred effect due at `now`. Returns how many actually applied.
    pub(super) fn drain_effects(&mut self, now: Timestamp) -> usize {
        let due = self.effects.drain_due(now);
        let mut applied = 0;
        for effect in due {
            if self.apply_effect(effect, now) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_effect(&mut self, effect: ScheduledEffect, now: Timestamp) -> bool {
        let ScheduledEffect {
            asset,
            generation,
            kind,
            ..
        } = effect;

        match kind {
            EffectKind::AdvancePhase { from } => {
                let Some(market) = self.markets.get_mut(&asset) else {
                    return false;
                };
                if !advance_phase(market, generation, from) {
                    return false;
                }
                let index_price = market.index_price;
                let phase = market.reaction.as_ref().map(|r| r.phase).unwrap_or(from);
                self.emit_event(EventPayload::NewsPhaseAdvanced(NewsPhaseEvent {
                    asset,
                    generation,
                    phase,
                    index_price,
                }));
                true
            }
            EffectKind::EndReaction => {
                let Some(market) = self.markets.get_mut(&asset) else {
                    return false;
                };
                if !end_reaction(market, generation) {
                    return false;
                }
                self.emit_event(EventPayload::NewsEnded(NewsEndedEvent { asset, generation }));
                true
            }
            EffectKind::CrowdExecution { side } => {
                let mark = self.mark_of(asset).value();
                let jitter = decimal_from_f64((self.rng.gen::<f64>() - 0.5) * 0.002);
                let size_factor = decimal_from_f64(0.1 + self.rng.gen::<f64>() * 0.5);
                let price = Price::floored(mark * (Decimal::ONE + jitter));
                let size = size_factor * mark * dec!(0.001);
                debug!(%asset, ?side, %price, "news order flow");
                self.record_execution(Execution {
                    asset,
                    price,
                    size,
                    side,
                    time: now,
                    is_crowd: true,
                });
                true
            }
        }
    }
}
