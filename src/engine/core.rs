// 8.0 engine/core.rs: main engine. holds both markets, the player account and book, the crowd,
// the deferred-effect queue and the rng.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::account::Account;
use crate::config::GameConfig;
use crate::crowd::{CrowdBook, CrowdPosition, CrowdTotals};
use crate::events::{Event, EventCollector, EventEmitter, EventPayload, RoundStartedEvent};
use crate::history::{Execution, ExecutionFeed, PriceHistory, PriceSample, TransactionLog, TransactionRecord};
use crate::market::AssetMarket;
use crate::news::NewsEvent;
use crate::position::Position;
use crate::price_process::sample_news_interval;
use crate::schedule::EffectQueue;
use crate::types::{Asset, Price, Quote, Side, Timestamp};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

// price_change_pct default: ten 1 Hz samples
pub const DEFAULT_CHANGE_LOOKBACK: usize = 10;

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) game: GameConfig,
    pub(super) markets: BTreeMap<Asset, AssetMarket>,
    pub(super) histories: BTreeMap<Asset, PriceHistory>,
    pub(super) positions: HashMap<(Asset, Side), Position>,
    pub(super) crowd: CrowdBook,
    pub(super) account: Account,
    pub(super) transactions: TransactionLog,
    pub(super) executions: ExecutionFeed,
    pub(super) effects: EffectQueue,
    pub(super) events: EventCollector,
    pub(super) rng: ChaCha8Rng,
    pub(super) current_time: Timestamp,
    pub(super) round_started_at: Timestamp,
    pub(super) round: u64,
    pub(super) next_generation: u64,
    pub(super) game_over: bool,
    pub(super) current_news: Option<NewsEvent>,
}

impl Engine {
    /// Builds an engine and starts the first round at `now`.
    pub fn new(config: EngineConfig, game: GameConfig, now: Timestamp) -> Result<Self, EngineError> {
        game.validate()?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let events = EventCollector::new(config.max_events);
        let account = Account::new(game.starting_cash);

        let mut engine = Self {
            config,
            game,
            markets: BTreeMap::new(),
            histories: BTreeMap::new(),
            positions: HashMap::new(),
            crowd: CrowdBook::new(),
            account,
            transactions: TransactionLog::new(),
            executions: ExecutionFeed::new(),
            effects: EffectQueue::new(),
            events,
            rng,
            current_time: now,
            round_started_at: now,
            round: 0,
            next_generation: 1,
            game_over: false,
            current_news: None,
        };
        engine.reset_round(now, false);
        Ok(engine)
    }

    /// Full reset: markets, positions, crowd, cash, histories. Pending deferred effects are
    /// dropped so nothing from the old round can touch the new one.
    pub fn start_new_round(&mut self, now: Timestamp) {
        self.reset_round(now, true);
    }

    fn reset_round(&mut self, now: Timestamp, reseed: bool) {
        if reseed {
            if let Some(seed) = self.config.seed {
                self.rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(self.round));
            }
        }

        self.effects.clear();
        self.round += 1;
        self.current_time = now;
        self.round_started_at = now;
        self.game_over = false;
        self.current_news = None;

        self.markets.clear();
        self.histories.clear();
        for asset in Asset::ALL {
            let next_news_in = sample_news_interval(&mut self.rng);
            let market = AssetMarket::new(self.game.asset_config(asset), next_news_in, now);
            self.markets.insert(asset, market);
            self.histories.insert(asset, PriceHistory::new());
        }

        self.positions.clear();
        self.crowd.clear();
        self.account = Account::new(self.game.starting_cash);
        self.transactions.clear();
        self.executions.clear();

        info!(round = self.round, "round started");
        let ends_at = now.plus_millis(self.game.round_duration_ms);
        self.emit_event(EventPayload::RoundStarted(RoundStartedEvent {
            round: self.round,
            starting_cash: self.game.starting_cash,
            ends_at,
        }));
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.game
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Oracle override for tooling and tests. Resets basis so mark lands exactly on `price`.
    pub fn set_index_price(&mut self, asset: Asset, price: Price) {
        if let Some(market) = self.markets.get_mut(&asset) {
            market.basis = Decimal::ZERO;
            market.set_index(price.value());
        }
    }

    pub fn market(&self, asset: Asset) -> Option<&AssetMarket> {
        self.markets.get(&asset)
    }

    pub fn mark_price(&self, asset: Asset) -> Option<Price> {
        self.markets.get(&asset).map(|m| m.mark_price)
    }

    pub fn position(&self, asset: Asset, side: Side) -> Option<&Position> {
        self.positions.get(&(asset, side))
    }

    pub fn open_positions(&self) -> impl Iterator<Item = (Asset, Side, &Position)> {
        Asset::ALL.into_iter().flat_map(move |asset| {
            Side::BOTH
                .into_iter()
                .filter_map(move |side| self.positions.get(&(asset, side)).map(|p| (asset, side, p)))
        })
    }

    pub fn crowd_positions(&self, asset: Asset) -> &[CrowdPosition] {
        self.crowd.positions(asset)
    }

    pub fn crowd_totals(&self, asset: Asset) -> CrowdTotals {
        self.crowd.totals(asset)
    }

    pub fn crowd_sentiment(&self, asset: Asset) -> Decimal {
        self.crowd.totals(asset).sentiment()
    }

    pub fn price_history(&self, asset: Asset) -> Vec<PriceSample> {
        self.histories
            .get(&asset)
            .map(|h| h.samples().copied().collect())
            .unwrap_or_default()
    }

    /// Percent move of the current mark against the sample `lookback` seconds back.
    pub fn price_change_pct(&self, asset: Asset, lookback: usize) -> Decimal {
        match (self.histories.get(&asset), self.mark_price(asset)) {
            (Some(history), Some(mark)) => history.change_pct(mark, lookback),
            _ => Decimal::ZERO,
        }
    }

    pub fn price_change_pct_default(&self, asset: Asset) -> Decimal {
        self.price_change_pct(asset, DEFAULT_CHANGE_LOOKBACK)
    }

    pub fn executions(&self) -> impl Iterator<Item = &Execution> {
        self.executions.iter()
    }

    pub fn transactions(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.transactions.iter()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn cash(&self) -> Quote {
        self.account.cash
    }

    /// Cash plus every open position's margin and unrealized pnl at the current mark.
    pub fn equity(&self) -> Quote {
        let in_positions: Quote = self
            .open_positions()
            .filter_map(|(asset, _, position)| self.mark_price(asset).map(|mark| position.equity(mark)))
            .sum();
        self.account.cash.add(in_positions)
    }

    pub fn profit(&self) -> Quote {
        self.equity().sub(self.account.starting_cash)
    }

    pub fn win_rate(&self) -> Decimal {
        self.account.win_rate()
    }

    pub fn has_bonus(&self) -> bool {
        self.account.has_bonus()
    }

    pub fn round_remaining_ms(&self) -> i64 {
        let ends_at = self.round_started_at.plus_millis(self.game.round_duration_ms);
        ends_at.millis_since(self.current_time).max(0)
    }

    pub fn is_round_over(&self) -> bool {
        self.round_remaining_ms() == 0
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn current_news(&self) -> Option<&NewsEvent> {
        self.current_news.as_ref()
    }

    pub fn pending_effects(&self) -> usize {
        self.effects.len()
    }

    pub fn recent_events(&self, count: usize) -> impl Iterator<Item = &Event> {
        self.events.recent(count)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.events()
    }

    pub(super) fn record_execution(&mut self, execution: Execution) {
        self.executions.push(execution);
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(self.events.next_id(), self.current_time, payload);

        if self.config.verbose {
            info!(id = event.id.0, payload = ?event.payload, "event");
        } else {
            debug!(id = event.id.0, payload = ?event.payload, "event");
        }

        self.events.emit(event);
    }
}
