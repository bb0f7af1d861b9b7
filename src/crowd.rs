// 15.0: the crowd. synthetic counterparties that open, close and get liquidated on their own.
// they never trade with the player; their liquidations are what pay the player rewards.

use crate::position::Position;
use crate::types::{decimal_from_f64, Asset, Leverage, Price, Quote, Side, Timestamp};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CrowdId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdPosition {
    pub id: CrowdId,
    pub position: Position,
}

// 15.1: how busy the crowd is. news and mania roughly double everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdParams {
    pub spawn_prob_calm: f64,
    pub spawn_prob_active: f64,
    pub close_prob_calm: f64,
    pub close_prob_active: f64,
    pub min_leverage: f64,
    pub max_leverage: f64,
    pub min_margin: f64,
    pub max_margin: f64,
}

impl Default for CrowdParams {
    fn default() -> Self {
        Self {
            spawn_prob_calm: 0.10,
            spawn_prob_active: 0.25,
            close_prob_calm: 0.15,
            close_prob_active: 0.30,
            min_leverage: 5.0,
            max_leverage: 15.0,
            min_margin: 1_000.0,
            max_margin: 6_000.0,
        }
    }
}

impl CrowdParams {
    pub fn spawn_prob(&self, active: bool) -> f64 {
        if active {
            self.spawn_prob_active
        } else {
            self.spawn_prob_calm
        }
    }

    pub fn close_prob(&self, active: bool) -> f64 {
        if active {
            self.close_prob_active
        } else {
            self.close_prob_calm
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CrowdTotals {
    pub long_value: Quote,
    pub short_value: Quote,
    pub long_count: usize,
    pub short_count: usize,
}

impl CrowdTotals {
    /// (long - short) / (long + short), in [-1, 1]. Zero when the crowd is empty.
    pub fn sentiment(&self) -> Decimal {
        let total = self.long_value.value() + self.short_value.value();
        if total.is_zero() {
            return Decimal::ZERO;
        }
        (self.long_value.value() - self.short_value.value()) / total
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrowdBook {
    positions: BTreeMap<Asset, Vec<CrowdPosition>>,
    next_id: u64,
}

impl CrowdBook {
    pub fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn positions(&self, asset: Asset) -> &[CrowdPosition] {
        self.positions.get(&asset).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, asset: Asset) -> usize {
        self.positions(asset).len()
    }

    pub fn is_empty(&self, asset: Asset) -> bool {
        self.len(asset) == 0
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn insert(&mut self, asset: Asset, position: Position) -> CrowdId {
        let id = CrowdId(self.next_id);
        self.next_id += 1;
        self.positions
            .entry(asset)
            .or_default()
            .push(CrowdPosition { id, position });
        id
    }

    // 15.2: random side, leverage and margin. entry at mark.
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        asset: Asset,
        mark_price: Price,
        params: &CrowdParams,
        now: Timestamp,
    ) -> CrowdPosition {
        let side = if rng.gen::<f64>() < 0.5 { Side::Long } else { Side::Short };
        let leverage = rng.gen_range(params.min_leverage..params.max_leverage);
        let margin = rng.gen_range(params.min_margin..params.max_margin);

        let leverage = Leverage::new(decimal_from_f64(leverage)).unwrap_or(Leverage::MIN);
        let position = Position::open(side, Quote::new(decimal_from_f64(margin)), leverage, mark_price, now);
        let id = self.insert(asset, position.clone());
        CrowdPosition { id, position }
    }

    pub fn remove_random<R: Rng + ?Sized>(&mut self, rng: &mut R, asset: Asset) -> Option<CrowdPosition> {
        let book = self.positions.get_mut(&asset)?;
        if book.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..book.len());
        Some(book.remove(idx))
    }

    // 15.3: two-phase like the player sweep. collect ids first, then pull them out.
    pub fn sweep_liquidations(&mut self, asset: Asset, mark_price: Price) -> Vec<CrowdPosition> {
        let Some(book) = self.positions.get_mut(&asset) else {
            return Vec::new();
        };

        let doomed: Vec<CrowdId> = book
            .iter()
            .filter(|c| c.position.should_liquidate(mark_price))
            .map(|c| c.id)
            .collect();

        if doomed.is_empty() {
            return Vec::new();
        }

        let (liquidated, survivors): (Vec<_>, Vec<_>) = book.drain(..).partition(|c| doomed.contains(&c.id));
        *book = survivors;
        liquidated
    }

    pub fn totals(&self, asset: Asset) -> CrowdTotals {
        let mut totals = CrowdTotals::default();
        for crowd in self.positions(asset) {
            let value = crowd.position.entry_value();
            match crowd.position.side {
                Side::Long => {
                    totals.long_value = totals.long_value.add(value);
                    totals.long_count += 1;
                }
                Side::Short => {
                    totals.short_value = totals.short_value.add(value);
                    totals.short_count += 1;
                }
            }
        }
        totals
    }
}

// flat share of every liquidated crowd margin goes to the player
pub fn liquidation_reward(margin: Quote, reward_rate: Decimal) -> Quote {
    margin.mul(reward_rate)
}

pub const DEFAULT_REWARD_RATE: Decimal = dec!(0.12);
