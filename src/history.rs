//! Capped histories: closed-trade records, the execution tape, and the 1 Hz price chart.
//!
//! All three are bounded. Records and executions are kept most-recent-first, price samples
//! oldest-first since that is the order a chart walks them.

use crate::types::{Asset, Leverage, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const TRANSACTION_LOG_CAPACITY: usize = 100;
pub const EXECUTION_FEED_CAPACITY: usize = 10;
pub const PRICE_HISTORY_CAPACITY: usize = 180;
pub const PRICE_SAMPLE_INTERVAL_MS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Closed,
    Liquidation,
}

/// Written once when a position is fully closed or liquidated. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: TransactionKind,
    pub asset: Asset,
    pub side: Side,
    pub time: Timestamp,
    pub entry_price: Price,
    pub exit_price: Price,
    pub size: Decimal,
    pub margin: Quote,
    pub leverage: Leverage,
    pub pnl: Quote,
    /// Only set on liquidations
    pub liquidation_price: Option<Price>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionLog {
    records: VecDeque<TransactionRecord>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TransactionRecord) {
        self.records.push_front(record);
        self.records.truncate(TRANSACTION_LOG_CAPACITY);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&TransactionRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionSide {
    Buy,
    Sell,
}

impl ExecutionSide {
    // opening a long buys, opening a short sells
    pub fn opening(side: Side) -> Self {
        match side {
            Side::Long => ExecutionSide::Buy,
            Side::Short => ExecutionSide::Sell,
        }
    }

    pub fn closing(side: Side) -> Self {
        Self::opening(side.opposite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub asset: Asset,
    pub price: Price,
    pub size: Decimal,
    pub side: ExecutionSide,
    pub time: Timestamp,
    pub is_crowd: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionFeed {
    executions: VecDeque<Execution>,
}

impl ExecutionFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, execution: Execution) {
        self.executions.push_front(execution);
        self.executions.truncate(EXECUTION_FEED_CAPACITY);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Execution> {
        self.executions.iter()
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    pub fn clear(&mut self) {
        self.executions.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub time: Timestamp,
    pub price: Price,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    samples: VecDeque<PriceSample>,
    last_sample_at: Option<Timestamp>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    // records a sample if at least a second has passed since the last one
    pub fn maybe_sample(&mut self, now: Timestamp, price: Price) -> bool {
        let due = self
            .last_sample_at
            .map_or(true, |last| now.millis_since(last) >= PRICE_SAMPLE_INTERVAL_MS);
        if !due {
            return false;
        }
        self.push(PriceSample { time: now, price });
        self.last_sample_at = Some(now);
        true
    }

    pub fn push(&mut self, sample: PriceSample) {
        self.samples.push_back(sample);
        while self.samples.len() > PRICE_HISTORY_CAPACITY {
            self.samples.pop_front();
        }
    }

    pub fn samples(&self) -> impl Iterator<Item = &PriceSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&PriceSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.last_sample_at = None;
    }

    /// Percent change of `current` against the sample `lookback` entries back from the newest.
    /// Falls back to the oldest sample when the history is shorter than that.
    pub fn change_pct(&self, current: Price, lookback: usize) -> Decimal {
        if self.samples.is_empty() {
            return Decimal::ZERO;
        }
        let idx = self.samples.len().saturating_sub(lookback + 1);
        let Some(past) = self.samples.get(idx) else {
            return Decimal::ZERO;
        };
        (current.value() - past.price.value()) / past.price.value() * dec!(100)
    }
}
