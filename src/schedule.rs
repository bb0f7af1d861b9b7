// 14.0: deferred effects. news phases and crowd order-flow bursts fire later than the tick
// that created them. each carries the generation of the reaction it belongs to so a stale
// effect can tell it lost the race and do nothing.

use crate::history::ExecutionSide;
use crate::market::ReactionPhase;
use crate::types::{Asset, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Move the reaction out of `from` into the next phase
    AdvancePhase { from: ReactionPhase },
    EndReaction,
    /// One crowd execution; price and size are drawn from the mark at fire time
    CrowdExecution { side: ExecutionSide },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEffect {
    pub fire_at: Timestamp,
    pub asset: Asset,
    pub generation: u64,
    pub kind: EffectKind,
    seq: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectQueue {
    pending: Vec<ScheduledEffect>,
    next_seq: u64,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: Timestamp, asset: Asset, generation: u64, kind: EffectKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(ScheduledEffect {
            fire_at,
            asset,
            generation,
            kind,
            seq,
        });
    }

    // 14.1: everything with fire_at <= now, earliest first. ties keep scheduling order.
    pub fn drain_due(&mut self, now: Timestamp) -> Vec<ScheduledEffect> {
        let (mut due, pending): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|e| e.fire_at <= now);
        self.pending = pending;
        due.sort_by_key(|e| (e.fire_at, e.seq));
        due
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_due(&self) -> Option<Timestamp> {
        self.pending.iter().map(|e| e.fire_at).min()
    }

    pub fn pending_for(&self, asset: Asset) -> impl Iterator<Item = &ScheduledEffect> {
        self.pending.iter().filter(move |e| e.asset == asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_only_due_effects_in_order() {
        let mut queue = EffectQueue::new();
        queue.schedule(Timestamp::from_millis(500), Asset::BtcPerp, 1, EffectKind::EndReaction);
        queue.schedule(
            Timestamp::from_millis(100),
            Asset::BtcPerp,
            1,
            EffectKind::AdvancePhase { from: ReactionPhase::Phase1 },
        );
        queue.schedule(
            Timestamp::from_millis(100),
            Asset::EthPerp,
            2,
            EffectKind::CrowdExecution { side: ExecutionSide::Buy },
        );

        let due = queue.drain_due(Timestamp::from_millis(300));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].asset, Asset::BtcPerp);
        assert_eq!(due[1].asset, Asset::EthPerp);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(Timestamp::from_millis(500)));

        let rest = queue.drain_due(Timestamp::from_millis(500));
        assert_eq!(rest[0].kind, EffectKind::EndReaction);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut queue = EffectQueue::new();
        queue.schedule(Timestamp::from_millis(1), Asset::BtcPerp, 1, EffectKind::EndReaction);
        queue.schedule(Timestamp::from_millis(2), Asset::EthPerp, 1, EffectKind::EndReaction);
        assert_eq!(queue.pending_for(Asset::EthPerp).count(), 1);
        queue.clear();
        assert!(queue.drain_due(Timestamp::from_millis(1_000)).is_empty());
    }
}
