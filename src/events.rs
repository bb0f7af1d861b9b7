// 11.0: every state change produces an event. used for audit trails, replay checks in tests,
// and for whatever presentation layer sits on top. the EventPayload enum lists all event types.

use crate::mark_price::ManiaAction;
use crate::market::ReactionPhase;
use crate::news::{Importance, Sentiment};
use crate::types::{Asset, Leverage, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Round events
    RoundStarted(RoundStartedEvent),
    GameOver(GameOverEvent),

    // Market events
    NewsTriggered(NewsTriggeredEvent),
    NewsPhaseAdvanced(NewsPhaseEvent),
    NewsEnded(NewsEndedEvent),
    BonusTriggered(BonusTriggeredEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionIncreased(PositionOpenedEvent),
    PositionReduced(PositionClosedEvent),
    PositionClosed(PositionClosedEvent),

    // Risk events
    Liquidation(LiquidationEvent),
    CrowdLiquidation(CrowdLiquidationEvent),

    // Account events
    BonusGranted(BonusGrantedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundStartedEvent {
    pub round: u64,
    pub starting_cash: Quote,
    pub ends_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOverEvent {
    pub cash: Quote,
    pub min_spend: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsTriggeredEvent {
    pub asset: Asset,
    pub generation: u64,
    pub title: String,
    pub sentiment: Sentiment,
    pub importance: Importance,
    pub initial_change: Decimal,
    pub original_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsPhaseEvent {
    pub asset: Asset,
    pub generation: u64,
    pub phase: ReactionPhase,
    pub index_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEndedEvent {
    pub asset: Asset,
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusTriggeredEvent {
    pub asset: Asset,
    pub action: ManiaAction,
    pub basis: Decimal,
    pub mania_until: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub asset: Asset,
    pub side: Side,
    pub fill_size: Decimal,
    pub fill_price: Price,
    pub margin: Quote,
    pub leverage: Leverage,
    pub entry_price: Price,
    pub liquidation_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub asset: Asset,
    pub side: Side,
    pub closed_size: Decimal,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub penalty: Quote,
    pub cash_returned: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub asset: Asset,
    pub side: Side,
    pub size: Decimal,
    pub mark_price: Price,
    pub liquidation_price: Price,
    pub margin_lost: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrowdLiquidationEvent {
    pub asset: Asset,
    pub count: usize,
    pub margin_liquidated: Quote,
    pub reward: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusGrantedEvent {
    pub streak: u32,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

// bounded: once `capacity` is reached the oldest events fall off
#[derive(Debug, Default)]
pub struct EventCollector {
    events: VecDeque<Event>,
    next_id: u64,
    capacity: usize,
}

impl EventCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Event> {
        self.events.iter().skip(self.events.len().saturating_sub(count))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }
}
