//! The tick: one fixed-cadence step of the whole simulation, and a driver that runs ticks on
//! simulated time.

use super::core::Engine;
use super::results::TickResult;
use crate::events::{EventPayload, GameOverEvent};
use crate::types::{Asset, Timestamp};
use tracing::info;

impl Engine {
    /// Advances the simulation to `now`.
    ///
    /// Order within a tick:
    /// 0. due deferred effects
    /// 1. price process, BTC then ETH
    /// 2. crowd spawn / close / liquidation sweep
    /// 3. player liquidation sweep
    /// 4. game-over check
    /// 5. 1 Hz price history sampling
    ///
    /// Once the game is over nothing advances until a new round starts.
    pub fn tick(&mut self, now: Timestamp) -> TickResult {
        if self.game_over {
            return TickResult {
                skipped: true,
                game_over: true,
                ..TickResult::default()
            };
        }
        self.current_time = now;

        let effects_applied = self.drain_effects(now);
        let regimes = self.advance_prices(now);
        let crowd = self.advance_crowd(now);
        let liquidations = self.check_liquidations();
        let game_over = self.check_game_over();
        self.sample_prices(now);

        TickResult {
            regimes,
            effects_applied,
            crowd,
            liquidations,
            game_over,
            skipped: false,
        }
    }

    fn check_game_over(&mut self) -> bool {
        if self.account.cash >= self.game.min_spend {
            return false;
        }
        self.game_over = true;
        info!(cash = %self.account.cash, "game over");
        self.emit_event(EventPayload::GameOver(GameOverEvent {
            cash: self.account.cash,
            min_spend: self.game.min_spend,
        }));
        true
    }

    fn sample_prices(&mut self, now: Timestamp) {
        for asset in Asset::ALL {
            let Some(mark) = self.markets.get(&asset).map(|m| m.mark_price) else {
                continue;
            };
            if let Some(history) = self.histories.get_mut(&asset) {
                history.maybe_sample(now, mark);
            }
        }
    }
}

/// Runs engine ticks on simulated time at the configured cadence.
#[derive(Debug)]
pub struct TickDriver {
    engine: Engine,
    interval_ms: i64,
    now: Timestamp,
}

impl TickDriver {
    pub fn new(engine: Engine) -> Self {
        let interval_ms = engine.game.tick_interval_ms;
        let now = engine.time();
        Self {
            engine,
            interval_ms,
            now,
        }
    }

    pub fn with_interval(engine: Engine, interval_ms: i64) -> Self {
        let now = engine.time();
        Self {
            engine,
            interval_ms: interval_ms.max(1),
            now,
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// One tick, `interval_ms` after the previous one.
    pub fn step(&mut self) -> TickResult {
        self.now = self.now.plus_millis(self.interval_ms);
        self.engine.tick(self.now)
    }

    /// Ticks until `duration_ms` of simulated time has passed. Returns every tick's result.
    pub fn run_for(&mut self, duration_ms: i64) -> Vec<TickResult> {
        let ticks = duration_ms / self.interval_ms;
        (0..ticks).map(|_| self.step()).collect()
    }

    /// Ticks until the round timer runs out or the game ends.
    pub fn run_round(&mut self) -> Vec<TickResult> {
        let mut results = Vec::new();
        while !self.engine.is_round_over() && !self.engine.is_game_over() {
            results.push(self.step());
        }
        results
    }

    /// Starts a new round at the driver's current time.
    pub fn start_new_round(&mut self) {
        self.engine.start_new_round(self.now);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn into_inner(self) -> Engine {
        self.engine
    }
}
