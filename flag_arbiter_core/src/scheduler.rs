//! Delayed transitions.
//!
//! A satisfied condition with a delay captures its decision now and applies it
//! once `ready_at` passes. The decision is not re-checked when it fires.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{FlagId, Timestamp};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingTransition {
    pub flag_id: FlagId,
    pub target_state: bool,
    pub ready_at: Timestamp,
}

/// At most one live entry per `(flag_id, target_state)`.
#[derive(Clone, Debug, Default)]
pub struct DelayScheduler {
    pending: BTreeMap<(FlagId, bool), Timestamp>,
}

impl DelayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a new entry was created. A request for a pair that is
    /// already pending is a no-op: the original `ready_at` stands.
    pub fn schedule(&mut self, flag_id: &str, target_state: bool, delay: f64, now: Timestamp) -> bool {
        let key = (flag_id.to_string(), target_state);
        if self.pending.contains_key(&key) {
            return false;
        }
        self.pending.insert(key, now + delay.max(0.0));
        true
    }

    pub fn is_pending(&self, flag_id: &str, target_state: bool) -> bool {
        self.pending.contains_key(&(flag_id.to_string(), target_state))
    }

    /// Remove and return every entry with `ready_at <= now`, earliest first.
    pub fn drain_ready(&mut self, now: Timestamp) -> Vec<PendingTransition> {
        let ready: Vec<(FlagId, bool)> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut out: Vec<PendingTransition> = ready
            .into_iter()
            .filter_map(|key| {
                let ready_at = self.pending.remove(&key)?;
                Some(PendingTransition {
                    flag_id: key.0,
                    target_state: key.1,
                    ready_at,
                })
            })
            .collect();
        out.sort_by(|a, b| a.ready_at.total_cmp(&b.ready_at));
        out
    }

    /// Drop every entry for a flag (e.g. when it is removed). Returns how many.
    pub fn forget(&mut self, flag_id: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(id, _), _| id != flag_id);
        before - self.pending.len()
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

    pub fn entries(&self) -> Vec<PendingTransition> {
        self.pending
            .iter()
            .map(|((id, target), at)| PendingTransition {
                flag_id: id.clone(),
                target_state: *target,
                ready_at: *at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduling_is_coalesced_not_additive() {
        let mut s = DelayScheduler::new();
        assert!(s.schedule("a", true, 5.0, 0.0));
        assert!(!s.schedule("a", true, 5.0, 3.0));
        assert!(s.schedule("a", false, 1.0, 3.0));
        assert_eq!(s.len(), 2);
        assert!(s.drain_ready(4.9).iter().all(|p| !p.target_state));
        let fired = s.drain_ready(5.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].ready_at, 5.0);
        assert!(s.is_empty());
    }

    #[test]
    fn drained_entries_fire_once() {
        let mut s = DelayScheduler::new();
        s.schedule("a", true, 1.0, 0.0);
        assert_eq!(s.drain_ready(2.0).len(), 1);
        assert!(s.drain_ready(3.0).is_empty());
    }

    #[test]
    fn forget_drops_both_directions() {
        let mut s = DelayScheduler::new();
        s.schedule("a", true, 1.0, 0.0);
        s.schedule("a", false, 1.0, 0.0);
        s.schedule("b", true, 1.0, 0.0);
        assert_eq!(s.forget("a"), 2);
        assert!(s.is_pending("b", true));
    }
}
