// src/analysis/sample_history.rs
//
// Bounded per-voice motion history.
//
// Every tracked voice gets a VecDeque of samples capped at `capacity`
// (oldest evicted first). Velocity is derived once on insert from the
// previous sample so the detectors never recompute finite differences.
// The store owns no classification logic.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::ops::{Div, Sub};
use tracing::debug;

use super::EntityId;

pub const DEFAULT_HISTORY_CAPACITY: usize = 45;

// ============================================================================
// VECTOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;

    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

// ============================================================================
// SAMPLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Monotonic milliseconds supplied by the caller
    pub timestamp_ms: u64,
    pub position: Vec3,
    /// Units per second, derived from the previous sample
    pub velocity: Vec3,
    pub motion: f32,
    pub energy: f32,
}

impl Sample {
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// Finite-difference velocity against the previous sample.
/// Zero when there is no previous sample or the clock did not advance.
pub fn derive_velocity(previous: Option<&Sample>, position: Vec3, timestamp_ms: u64) -> Vec3 {
    let Some(prev) = previous else {
        return Vec3::ZERO;
    };
    let dt = timestamp_ms.saturating_sub(prev.timestamp_ms) as f32 / 1000.0;
    if dt > 0.0 {
        (position - prev.position) / dt
    } else {
        Vec3::ZERO
    }
}

// ============================================================================
// HISTORY STORE
// ============================================================================

pub struct SampleHistory {
    histories: HashMap<EntityId, VecDeque<Sample>>,
    capacity: usize,
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl SampleHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clamp to at least one sample and trim every existing buffer right away.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        for history in self.histories.values_mut() {
            while history.len() > self.capacity {
                history.pop_front();
            }
        }
    }

    /// Append a sample for `id`, creating the buffer on first use.
    ///
    /// Returns `false` when the timestamp does not advance past the newest
    /// stored sample; such samples are dropped so timestamps stay strictly
    /// increasing within a history.
    pub fn add_sample(
        &mut self,
        id: EntityId,
        position: Vec3,
        motion: f32,
        energy: f32,
        timestamp_ms: u64,
    ) -> bool {
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(id)
            .or_insert_with(|| VecDeque::with_capacity(capacity));

        if let Some(last) = history.back() {
            if timestamp_ms <= last.timestamp_ms {
                debug!(
                    "Voice {} sample at {}ms dropped (newest is {}ms)",
                    id, timestamp_ms, last.timestamp_ms
                );
                return false;
            }
        }

        let velocity = derive_velocity(history.back(), position, timestamp_ms);
        history.push_back(Sample {
            timestamp_ms,
            position,
            velocity,
            motion,
            energy,
        });

        while history.len() > capacity {
            history.pop_front();
        }
        true
    }

    pub fn remove_entity(&mut self, id: EntityId) {
        self.histories.remove(&id);
    }

    pub fn get_history(&self, id: EntityId) -> Option<&VecDeque<Sample>> {
        self.histories.get(&id)
    }

    pub fn has_entity(&self, id: EntityId) -> bool {
        self.histories.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
