//! Per-asset price process.
//!
//! One call to [`step`] advances a market by one tick. Exactly one regime runs per tick, picked
//! in priority order: a news trigger, news expiry, the critical-news ramp, mania jumps,
//! post-mania decay, and finally plain noise. Whatever ran, the basis then decays and the mark
//! is recomputed.
//!
//! Deferred news phases are not driven from here. The engine schedules them when a reaction
//! starts and calls [`advance_phase`] / [`end_reaction`] when they come due; both check the
//! reaction's generation so a superseded reaction is left untouched.

use crate::mark_price::{bonus_basis_shift, decay_basis, elapsed_secs, half_life_factor, ManiaAction};
use crate::market::{AssetMarket, CriticalRamp, NewsReaction, ReactionPhase, BASELINE_JUMP_PROB, BASELINE_MAX_JUMP};
use crate::news::{generate_news, news_impact, NewsEvent, NewsImpact};
use crate::types::{decimal_from_f64, decimal_to_f64, Timestamp};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest move a noise or mania tick may make, as a fraction of the pre-tick index.
pub const MAX_TICK_MOVE: Decimal = dec!(0.01);
/// Largest move any single news application may make, as a fraction of the current index.
pub const MAX_NEWS_MOVE: Decimal = dec!(0.02);

pub const CRITICAL_RAMP_MS: i64 = 3_000;
pub const MAX_CRITICAL_STEP: Decimal = dec!(0.0075);

pub const MANIA_HALF_LIFE_SECS: Decimal = dec!(25);
const MANIA_JUMP_FLOOR: f64 = 0.005;
// within 1% of baseline counts as fully decayed
const MANIA_RESET_TOLERANCE: Decimal = dec!(1.01);

pub const NEWS_INTERVAL_MIN_MS: i64 = 20_000;
pub const NEWS_INTERVAL_MAX_MS: i64 = 40_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    NewsTrigger,
    NewsExpiry,
    CriticalRamp,
    Mania,
    ManiaDecay,
    Normal,
}

#[derive(Debug, Clone)]
pub struct NewsStarted {
    pub generation: u64,
    pub news: NewsEvent,
    pub impact: NewsImpact,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub regime: Regime,
    /// Set only on the tick a news event fired
    pub news: Option<NewsStarted>,
}

pub fn sample_news_interval<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    rng.gen_range(NEWS_INTERVAL_MIN_MS..NEWS_INTERVAL_MAX_MS)
}

/// Advances `market` to `now`. `generation` tags the reaction if news fires on this tick.
pub fn step<R: Rng + ?Sized>(market: &mut AssetMarket, now: Timestamp, rng: &mut R, generation: u64) -> StepOutcome {
    let dt_secs = elapsed_secs(now, market.last_update);

    let (regime, news) = if market.news_due(now) {
        let news = generate_news(rng, market.asset());
        let impact = news_impact(&news, rng);
        let next_in = sample_news_interval(rng);
        start_reaction(market, &news, &impact, generation, now, next_in);
        let started = NewsStarted {
            generation,
            news,
            impact,
        };
        (Regime::NewsTrigger, Some(started))
    } else {
        (advance_regime(market, now, dt_secs, rng), None)
    };

    settle(market, now, dt_secs);
    StepOutcome { regime, news }
}

// regimes 2 through 6
fn advance_regime<R: Rng + ?Sized>(market: &mut AssetMarket, now: Timestamp, dt_secs: Decimal, rng: &mut R) -> Regime {
    let (expired, ramping) = match &market.reaction {
        Some(r) => (now >= r.reaction_until, r.phase == ReactionPhase::Phase1 && r.is_critical()),
        None => (false, false),
    };
    if expired {
        market.clear_reaction();
        return Regime::NewsExpiry;
    }
    if ramping {
        ramp_critical(market, now);
        return Regime::CriticalRamp;
    }

    let pre_tick = market.index_price.value();
    let (regime, fraction) = if market.is_mania_active(now) {
        (Regime::Mania, mania_move(market, rng))
    } else if market.mania_decaying() {
        decay_mania(market, dt_secs);
        (Regime::ManiaDecay, elevated_noise(rng))
    } else {
        (Regime::Normal, normal_noise(rng))
    };

    let limit = pre_tick * MAX_TICK_MOVE;
    let delta = clamp_abs(pre_tick * fraction, limit);
    market.shift_index(delta);
    regime
}

fn settle(market: &mut AssetMarket, now: Timestamp, dt_secs: Decimal) {
    market.basis = decay_basis(market.basis, dt_secs);
    market.recompute_mark();
    market.last_update = now;
}

pub fn start_reaction(
    market: &mut AssetMarket,
    news: &NewsEvent,
    impact: &NewsImpact,
    generation: u64,
    now: Timestamp,
    next_news_in_ms: i64,
) {
    let original = market.index_price;
    let critical = if news.is_critical() {
        Some(CriticalRamp {
            start: now,
            target_change: original.value() * impact.initial_change,
            progress: Decimal::ZERO,
        })
    } else {
        let limit = original.value() * MAX_NEWS_MOVE;
        market.shift_index(clamp_abs(original.value() * impact.initial_change, limit));
        None
    };

    market.reaction = Some(NewsReaction {
        generation,
        news: news.clone(),
        impact: impact.clone(),
        phase: ReactionPhase::Phase1,
        started_at: now,
        reaction_until: now.plus_millis(impact.total_ms),
        original_price: original,
        critical,
    });
    market.volatility = market.base_volatility * impact.volatility_multiplier;
    market.last_news_at = now;
    market.next_news_in_ms = next_news_in_ms;
}

// walks toward original + target * progress, never more than 0.75% of original per tick.
// once the window has elapsed it holds at the target until phase 2 takes over.
fn ramp_critical(market: &mut AssetMarket, now: Timestamp) {
    let index = market.index_price.value();
    let Some(reaction) = market.reaction.as_mut() else {
        return;
    };
    let original = reaction.original_price.value();
    let Some(ramp) = reaction.critical.as_mut() else {
        return;
    };

    let elapsed = Decimal::from(now.millis_since(ramp.start).max(0));
    let progress = (elapsed / Decimal::from(CRITICAL_RAMP_MS)).min(Decimal::ONE);
    ramp.progress = progress;

    let desired = original + ramp.target_change * progress;
    let max_step = (original * MAX_CRITICAL_STEP).abs();
    let delta = clamp_abs(desired - index, max_step);
    market.shift_index(delta);
}

/// Moves a reaction out of `from` into the next phase, applying the pullback (into phase 2)
/// or continuation (into phase 3). Returns false when the reaction is gone, superseded, or
/// already past `from`.
pub fn advance_phase(market: &mut AssetMarket, generation: u64, from: ReactionPhase) -> bool {
    let Some(reaction) = market.reaction.as_ref() else {
        debug!(asset = %market.asset(), generation, "phase effect with no active reaction");
        return false;
    };
    if reaction.generation != generation || reaction.phase != from {
        debug!(
            asset = %market.asset(),
            generation,
            active = reaction.generation,
            "stale phase effect ignored"
        );
        return false;
    }

    let (change, next) = match from {
        ReactionPhase::Phase1 => (reaction.impact.pullback_change, ReactionPhase::Phase2),
        ReactionPhase::Phase2 => (reaction.impact.continuation_change, ReactionPhase::Phase3),
        ReactionPhase::Phase3 => return false,
    };

    let raw = reaction.original_price.value() * change;
    let limit = market.index_price.value() * MAX_NEWS_MOVE;
    market.shift_index(clamp_abs(raw, limit));
    if let Some(reaction) = market.reaction.as_mut() {
        reaction.phase = next;
    }
    true
}

pub fn end_reaction(market: &mut AssetMarket, generation: u64) -> bool {
    match &market.reaction {
        Some(reaction) if reaction.generation == generation => {
            market.clear_reaction();
            true
        }
        _ => {
            debug!(asset = %market.asset(), generation, "stale end-of-reaction effect ignored");
            false
        }
    }
}

/// Bonus pump/dump: basis shift plus a 15 second mania window.
pub fn apply_bonus(market: &mut AssetMarket, action: ManiaAction, now: Timestamp, mania_ms: i64, jump_prob: Decimal, max_jump: Decimal) {
    let shift = bonus_basis_shift(market.mark_price, action);
    market.set_basis(market.basis + shift);
    market.mania_until = Some(now.plus_millis(mania_ms));
    market.jump_prob = jump_prob;
    market.max_jump = max_jump;
    market.last_action = Some(action);
}

fn mania_move<R: Rng + ?Sized>(market: &AssetMarket, rng: &mut R) -> Decimal {
    if rng.gen::<f64>() >= decimal_to_f64(market.jump_prob) {
        return elevated_noise(rng);
    }

    let u = rng.gen::<f64>();
    let max_jump = decimal_to_f64(market.max_jump);
    let lo = MANIA_JUMP_FLOOR.min(max_jump);
    let hi = MANIA_JUMP_FLOOR.max(max_jump);
    let magnitude = lo + (hi - lo) * u * u;

    let up_prob = match market.last_action {
        Some(ManiaAction::Pump) => 0.55,
        Some(ManiaAction::Dump) => 0.45,
        None => 0.5,
    };
    let sign = if rng.gen::<f64>() < up_prob { 1.0 } else { -1.0 };
    decimal_from_f64(sign * magnitude)
}

fn decay_mania(market: &mut AssetMarket, dt_secs: Decimal) {
    let factor = half_life_factor(dt_secs, MANIA_HALF_LIFE_SECS);
    market.jump_prob = BASELINE_JUMP_PROB + (market.jump_prob - BASELINE_JUMP_PROB) * factor;
    market.max_jump = BASELINE_MAX_JUMP + (market.max_jump - BASELINE_MAX_JUMP) * factor;

    if market.jump_prob <= BASELINE_JUMP_PROB * MANIA_RESET_TOLERANCE
        && market.max_jump <= BASELINE_MAX_JUMP * MANIA_RESET_TOLERANCE
    {
        market.reset_mania();
    }
}

// +-0.03% to +-0.10%
fn elevated_noise<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    let u1 = rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    decimal_from_f64((u1 - 0.5) * (0.0006 + 0.0014 * u2))
}

fn normal_noise<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    let larger = rng.gen::<f64>() < 0.3;
    let u1 = rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let fraction = if larger {
        (u1 - 0.5) * (0.001 + 0.003 * u2)
    } else {
        (u1 - 0.5) * (0.0008 + 0.0017 * u2)
    };
    decimal_from_f64(fraction)
}

fn clamp_abs(value: Decimal, limit: Decimal) -> Decimal {
    let limit = limit.abs();
    value.max(-limit).min(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::AssetConfig;
    use crate::news::{Importance, Sentiment};
    use crate::types::Asset;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn btc_at(now: i64) -> AssetMarket {
        AssetMarket::new(AssetConfig::btc_perp(), 30_000, Timestamp::from_millis(now))
    }

    fn news(importance: Importance, sentiment: Sentiment) -> NewsEvent {
        NewsEvent {
            title: "headline".to_string(),
            description: String::new(),
            sentiment,
            importance,
            asset: Asset::BtcPerp,
        }
    }

    fn impact(initial: Decimal) -> NewsImpact {
        NewsImpact {
            initial_change: initial,
            pullback_change: -initial * dec!(0.5),
            continuation_change: initial * dec!(0.5),
            volatility_multiplier: dec!(5),
            phase1_ms: 4_000,
            phase2_ms: 3_000,
            phase3_ms: 3_000,
            total_ms: 10_000,
        }
    }

    #[test]
    fn normal_ticks_stay_within_one_percent() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut market = btc_at(0);
        for i in 1..=150 {
            let before = market.index_price.value();
            let outcome = step(&mut market, Timestamp::from_millis(i * 150), &mut rng, 1);
            assert_eq!(outcome.regime, Regime::Normal);
            let moved = (market.index_price.value() - before).abs();
            assert!(moved <= before * MAX_TICK_MOVE);
        }
        assert_eq!(market.last_update, Timestamp::from_millis(150 * 150));
    }

    #[test]
    fn mania_jumps_are_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut market = btc_at(0);
        market.mania_until = Some(Timestamp::from_millis(100_000));
        market.jump_prob = Decimal::ONE;
        market.max_jump = dec!(0.5);

        let mut hit_limit = false;
        for i in 1..=50 {
            let before = market.index_price.value();
            let outcome = step(&mut market, Timestamp::from_millis(i * 150), &mut rng, 1);
            assert_eq!(outcome.regime, Regime::Mania);
            let moved = (market.index_price.value() - before).abs();
            let limit = before * MAX_TICK_MOVE;
            assert!(moved <= limit + dec!(0.000001));
            hit_limit |= moved >= limit - dec!(0.000001);
        }
        assert!(hit_limit);
    }

    #[test]
    fn mania_decays_back_to_baseline() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut market = btc_at(0);
        market.mania_until = Some(Timestamp::from_millis(0));
        market.jump_prob = dec!(0.3);
        market.max_jump = dec!(0.015);
        market.last_action = Some(ManiaAction::Pump);
        market.next_news_in_ms = i64::MAX;

        let first = step(&mut market, Timestamp::from_millis(150), &mut rng, 1);
        assert_eq!(first.regime, Regime::ManiaDecay);
        assert!(market.jump_prob < dec!(0.3));

        // a 10 minute gap is 24 half-lives
        step(&mut market, Timestamp::from_millis(600_000), &mut rng, 1);
        assert_eq!(market.jump_prob, BASELINE_JUMP_PROB);
        assert_eq!(market.max_jump, BASELINE_MAX_JUMP);
        assert!(market.mania_until.is_none());
        assert!(market.last_action.is_none());
    }

    #[test]
    fn news_fires_after_interval_and_skips_noise() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut market = btc_at(0);
        market.next_news_in_ms = 1_000;

        let quiet = step(&mut market, Timestamp::from_millis(1_000), &mut rng, 7);
        assert!(quiet.news.is_none());

        let fired = step(&mut market, Timestamp::from_millis(1_150), &mut rng, 7);
        assert_eq!(fired.regime, Regime::NewsTrigger);
        let started = fired.news.unwrap();
        assert_eq!(started.generation, 7);
        assert_eq!(market.last_news_at, Timestamp::from_millis(1_150));
        assert!((NEWS_INTERVAL_MIN_MS..NEWS_INTERVAL_MAX_MS).contains(&market.next_news_in_ms));
        let reaction = market.reaction.as_ref().unwrap();
        assert_eq!(reaction.phase, ReactionPhase::Phase1);
        assert_eq!(market.volatility, market.base_volatility * started.impact.volatility_multiplier);
    }

    #[test]
    fn non_critical_initial_move_is_clamped_to_two_percent() {
        let mut market = btc_at(0);
        start_reaction(
            &mut market,
            &news(Importance::High, Sentiment::Bearish),
            &impact(dec!(-0.05)),
            1,
            Timestamp::from_millis(0),
            30_000,
        );
        assert_eq!(market.index_price.value(), dec!(49000));
        assert_eq!(market.reaction.as_ref().unwrap().original_price.value(), dec!(50000));
    }

    #[test]
    fn phases_apply_against_original_price() {
        let mut market = btc_at(0);
        start_reaction(
            &mut market,
            &news(Importance::Medium, Sentiment::Bullish),
            &impact(dec!(0.01)),
            3,
            Timestamp::from_millis(0),
            30_000,
        );
        assert_eq!(market.index_price.value(), dec!(50500));

        // pullback: 50000 * -0.005
        assert!(advance_phase(&mut market, 3, ReactionPhase::Phase1));
        assert_eq!(market.index_price.value(), dec!(50250));

        // wrong expected phase
        assert!(!advance_phase(&mut market, 3, ReactionPhase::Phase1));

        // continuation: 50000 * 0.005
        assert!(advance_phase(&mut market, 3, ReactionPhase::Phase2));
        assert_eq!(market.index_price.value(), dec!(50500));
        assert_eq!(market.reaction.as_ref().unwrap().phase, ReactionPhase::Phase3);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut market = btc_at(0);
        start_reaction(
            &mut market,
            &news(Importance::Low, Sentiment::Bullish),
            &impact(dec!(0.004)),
            2,
            Timestamp::from_millis(0),
            30_000,
        );
        let before = market.index_price;
        assert!(!advance_phase(&mut market, 1, ReactionPhase::Phase1));
        assert!(!end_reaction(&mut market, 1));
        assert_eq!(market.index_price, before);
        assert!(market.reaction.is_some());

        assert!(end_reaction(&mut market, 2));
        assert!(market.reaction.is_none());
        assert_eq!(market.volatility, market.base_volatility);
    }

    #[test]
    fn expiry_restores_volatility() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut market = btc_at(0);
        start_reaction(
            &mut market,
            &news(Importance::Low, Sentiment::Bullish),
            &impact(dec!(0.004)),
            1,
            Timestamp::from_millis(0),
            60_000,
        );
        let before = market.index_price;
        let outcome = step(&mut market, Timestamp::from_millis(10_000), &mut rng, 2);
        assert_eq!(outcome.regime, Regime::NewsExpiry);
        assert_eq!(market.index_price, before);
        assert_eq!(market.volatility, market.base_volatility);
    }

    #[test]
    fn bonus_shifts_basis_and_opens_mania() {
        let mut market = btc_at(0);
        apply_bonus(
            &mut market,
            ManiaAction::Dump,
            Timestamp::from_millis(1_000),
            15_000,
            dec!(0.3),
            dec!(0.015),
        );
        assert_eq!(market.basis, dec!(-400));
        assert_eq!(market.mark_price.value(), dec!(49600));
        assert_eq!(market.mania_until, Some(Timestamp::from_millis(16_000)));
        assert_eq!(market.last_action, Some(ManiaAction::Dump));
    }
}
