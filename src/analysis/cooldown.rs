// src/analysis/cooldown.rs
//
// Per-owner trigger bookkeeping shared by the voice and zone detectors.
// Owner = voice id or camera id, key = gesture type.

use std::collections::HashMap;
use std::hash::Hash;

/// Last-trigger timestamps keyed by (owner, gesture).
///
/// Entries are created lazily on the first trigger. A key with no entry is
/// always ready, so a gesture that never fired is never held back.
#[derive(Debug, Clone)]
pub struct CooldownLedger<O, K> {
    last_trigger: HashMap<O, HashMap<K, u64>>,
}

impl<O, K> Default for CooldownLedger<O, K> {
    fn default() -> Self {
        Self {
            last_trigger: HashMap::new(),
        }
    }
}

impl<O, K> CooldownLedger<O, K>
where
    O: Eq + Hash + Copy,
    K: Eq + Hash + Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self, owner: O, key: K, now_ms: u64, cooldown_ms: u64) -> bool {
        match self.last_trigger(owner, key) {
            Some(last) => now_ms >= last.saturating_add(cooldown_ms),
            None => true,
        }
    }

    /// Never moves a key backwards in time.
    pub fn record(&mut self, owner: O, key: K, now_ms: u64) {
        let last = self
            .last_trigger
            .entry(owner)
            .or_default()
            .entry(key)
            .or_insert(now_ms);
        *last = (*last).max(now_ms);
    }

    /// Check-and-record in one step. Returns true when the trigger was accepted.
    pub fn try_trigger(&mut self, owner: O, key: K, now_ms: u64, cooldown_ms: u64) -> bool {
        if !self.is_ready(owner, key, now_ms, cooldown_ms) {
            return false;
        }
        self.record(owner, key, now_ms);
        true
    }

    pub fn last_trigger(&self, owner: O, key: K) -> Option<u64> {
        self.last_trigger
            .get(&owner)
            .and_then(|keys| keys.get(&key))
            .copied()
    }

    pub fn remove_owner(&mut self, owner: O) {
        self.last_trigger.remove(&owner);
    }

    pub fn has_owner(&self, owner: O) -> bool {
        self.last_trigger.contains_key(&owner)
    }

    pub fn clear(&mut self) {
        self.last_trigger.clear();
    }
}
