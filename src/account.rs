//! Player account: cash, trade counters and the win streak that unlocks the bonus.
//!
//! Margin leaves cash when a position opens and comes back (plus pnl, minus any penalty)
//! when it closes. A liquidation returns nothing.

use crate::types::Quote;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// consecutive winning closes needed before the bonus unlocks
pub const WIN_STREAK_FOR_BONUS: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinStreak {
    pub streak: u32,
    pub max_streak: u32,
    pub has_bonus: bool,
}

impl WinStreak {
    // returns true when this win is the one that granted the bonus
    pub fn record_win(&mut self) -> bool {
        self.streak += 1;
        self.max_streak = self.max_streak.max(self.streak);
        if self.streak >= WIN_STREAK_FOR_BONUS && !self.has_bonus {
            self.has_bonus = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.streak = 0;
        self.has_bonus = false;
    }

    // spending the bonus starts the streak over
    pub fn consume_bonus(&mut self) -> bool {
        if !self.has_bonus {
            return false;
        }
        self.reset();
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub cash: Quote,
    pub starting_cash: Quote,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub win_streak: WinStreak,
    pub total_rewards: Quote,
    pub total_penalties: Quote,
    pub realized_pnl: Quote,
}

impl Account {
    pub fn new(starting_cash: Quote) -> Self {
        Self {
            cash: starting_cash,
            starting_cash,
            total_trades: 0,
            winning_trades: 0,
            win_streak: WinStreak::default(),
            total_rewards: Quote::zero(),
            total_penalties: Quote::zero(),
            realized_pnl: Quote::zero(),
        }
    }

    pub fn reserve_margin(&mut self, amount: Quote) -> Result<(), AccountError> {
        if amount > self.cash {
            return Err(AccountError::InsufficientCash {
                requested: amount,
                available: self.cash,
            });
        }
        self.cash = self.cash.sub(amount);
        Ok(())
    }

    /// Credits a close: margin back plus realized pnl, less the quick-close penalty.
    pub fn settle_close(&mut self, closed_margin: Quote, realized: Quote, penalty: Quote) {
        self.cash = self.cash.add(closed_margin).add(realized).sub(penalty);
        self.realized_pnl = self.realized_pnl.add(realized);
        self.total_penalties = self.total_penalties.add(penalty);
    }

    // margin already left cash at open, so only the pnl bookkeeping moves
    pub fn settle_liquidation(&mut self, margin: Quote) {
        self.realized_pnl = self.realized_pnl.sub(margin);
    }

    pub fn credit_reward(&mut self, amount: Quote) {
        self.cash = self.cash.add(amount);
        self.total_rewards = self.total_rewards.add(amount);
    }

    /// Counts a finished trade. Only strictly positive realized pnl is a win.
    pub fn record_trade(&mut self, realized: Quote) -> bool {
        self.total_trades += 1;
        if realized.is_positive() {
            self.winning_trades += 1;
            self.win_streak.record_win()
        } else {
            self.win_streak.reset();
            false
        }
    }

    pub fn win_rate(&self) -> Decimal {
        if self.total_trades == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.winning_trades) / Decimal::from(self.total_trades) * dec!(100)
    }

    pub fn has_bonus(&self) -> bool {
        self.win_streak.has_bonus
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient cash: requested {requested}, available {available}")]
    InsufficientCash { requested: Quote, available: Quote },
}
