// src/analysis/voice_detector.rs
//
// Names what a single voice just did with its body.
//
// Each tick re-scans the voice's recent window (bounded by max_window_ms)
// and extracts a handful of features:
//   - horizontal / vertical span (bounding box of x and y)
//   - average motion and peak instantaneous speed
//   - net displacement from the first to the last sample
//   - sign flips of the velocity components outside a small dead-band
//
// Rules are evaluated independently, so several gestures may fire on the
// same tick (a raise that is also fast enough to be a burst, for example).
// Every rule is gated by a per-voice, per-gesture cooldown.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use super::cooldown::CooldownLedger;
use super::events::{clamp01, VoiceGestureEvent, VoiceGestureType};
use super::sample_history::Sample;
use super::EntityId;

/// Fraction of shake_min_motion a velocity component must exceed before its
/// sign counts towards the flip total.
const SIGN_FLIP_DEAD_BAND: f32 = 0.25;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceDetectorConfig {
    /// Upward travel (negative y) required for a raise
    pub raise_delta_y: f32,
    /// Downward travel required for a lower
    pub lower_delta_y: f32,
    /// Horizontal travel required for a swipe
    pub swipe_delta_x: f32,
    /// |dx| must exceed |dy| by this factor
    pub swipe_orthogonality: f32,
    /// Maximum horizontal span during a raise or lower
    pub raise_horizontal_limit: f32,
    /// Maximum vertical travel during a swipe
    pub swipe_vertical_limit: f32,
    /// Maximum footprint of a shake
    pub shake_radius: f32,
    pub shake_min_sign_flips: u32,
    pub shake_min_motion: f32,
    /// Speed (units/s) where a burst starts
    pub burst_speed_threshold: f32,
    /// Speed mapped to full burst strength
    pub burst_max_speed: f32,
    pub hold_motion_threshold: f32,
    pub hold_duration_ms: u64,
    /// Windows shorter than this are not analyzed
    pub min_window_ms: u64,
    pub max_window_ms: u64,
    /// Cooldown for raise, lower, swipes and shake
    pub gesture_cooldown_ms: u64,
    pub burst_cooldown_ms: u64,
    pub hold_cooldown_ms: u64,
}

impl Default for VoiceDetectorConfig {
    fn default() -> Self {
        Self {
            raise_delta_y: 0.18,
            lower_delta_y: 0.18,
            swipe_delta_x: 0.25,
            swipe_orthogonality: 1.6,
            raise_horizontal_limit: 0.12,
            swipe_vertical_limit: 0.18,
            shake_radius: 0.08,
            shake_min_sign_flips: 4,
            shake_min_motion: 0.08,
            burst_speed_threshold: 1.5,
            burst_max_speed: 3.5,
            hold_motion_threshold: 0.05,
            hold_duration_ms: 1200,
            min_window_ms: 400,
            max_window_ms: 1200,
            gesture_cooldown_ms: 900,
            burst_cooldown_ms: 600,
            hold_cooldown_ms: 1800,
        }
    }
}

impl VoiceDetectorConfig {
    pub fn cooldown_for(&self, gesture: VoiceGestureType) -> u64 {
        match gesture {
            VoiceGestureType::Burst => self.burst_cooldown_ms,
            VoiceGestureType::Hold => self.hold_cooldown_ms,
            _ => self.gesture_cooldown_ms,
        }
    }
}

// ============================================================================
// WINDOW FEATURES
// ============================================================================

/// Statistics over one analysis window. Recomputed from scratch every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowFeatures {
    pub now_ms: u64,
    pub window_start_ms: u64,
    pub horizontal_span: f32,
    pub vertical_span: f32,
    pub avg_motion: f32,
    pub max_speed: f32,
    pub delta_x: f32,
    pub delta_y: f32,
    pub sign_flips: u32,
    /// Time since motion last exceeded the hold threshold
    pub still_duration_ms: u64,
    pub latest_y: f32,
}

impl WindowFeatures {
    /// Returns None when there are fewer than two samples or the window is
    /// shorter than min_window_ms.
    pub fn extract(samples: &VecDeque<Sample>, config: &VoiceDetectorConfig) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        let latest = samples.back()?;
        let now = latest.timestamp_ms;
        let min_timestamp = now.saturating_sub(config.max_window_ms);

        let start_idx = samples
            .iter()
            .position(|s| s.timestamp_ms >= min_timestamp)
            .unwrap_or(0);
        let start = &samples[start_idx];
        if now.saturating_sub(start.timestamp_ms) < config.min_window_ms {
            return None;
        }

        let dead_band = config.shake_min_motion * SIGN_FLIP_DEAD_BAND;
        let mut min_x = start.position.x;
        let mut max_x = start.position.x;
        let mut min_y = start.position.y;
        let mut max_y = start.position.y;
        let mut total_motion = 0.0f32;
        let mut max_speed = 0.0f32;
        let mut sign_flips = 0u32;
        let mut prev_sign_x: Option<bool> = None;
        let mut prev_sign_y: Option<bool> = None;

        for (offset, sample) in samples.iter().skip(start_idx).enumerate() {
            min_x = min_x.min(sample.position.x);
            max_x = max_x.max(sample.position.x);
            min_y = min_y.min(sample.position.y);
            max_y = max_y.max(sample.position.y);
            total_motion += sample.motion;
            max_speed = max_speed.max(sample.speed());

            // The first sample's velocity points outside the window
            if offset == 0 {
                continue;
            }
            sign_flips += count_flip(&mut prev_sign_x, sample.velocity.x, dead_band);
            sign_flips += count_flip(&mut prev_sign_y, sample.velocity.y, dead_band);
        }

        let window_len = (samples.len() - start_idx) as f32;

        // Newest sample with motion above the hold threshold ends the still run
        let still_since = samples
            .iter()
            .skip(start_idx)
            .rev()
            .find(|s| s.motion > config.hold_motion_threshold)
            .map(|s| s.timestamp_ms)
            .unwrap_or(start.timestamp_ms);

        Some(Self {
            now_ms: now,
            window_start_ms: start.timestamp_ms,
            horizontal_span: max_x - min_x,
            vertical_span: max_y - min_y,
            avg_motion: total_motion / window_len,
            max_speed,
            delta_x: latest.position.x - start.position.x,
            delta_y: latest.position.y - start.position.y,
            sign_flips,
            still_duration_ms: now.saturating_sub(still_since),
            latest_y: latest.position.y,
        })
    }

    pub fn radius(&self) -> f32 {
        self.horizontal_span.max(self.vertical_span)
    }
}

fn count_flip(prev_sign: &mut Option<bool>, component: f32, dead_band: f32) -> u32 {
    if component.abs() <= dead_band {
        return 0;
    }
    let positive = component >= 0.0;
    let flipped = matches!(*prev_sign, Some(prev) if prev != positive);
    *prev_sign = Some(positive);
    u32::from(flipped)
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct VoiceGestureDetector {
    config: VoiceDetectorConfig,
    cooldowns: CooldownLedger<EntityId, VoiceGestureType>,
}

impl Default for VoiceGestureDetector {
    fn default() -> Self {
        Self::new(VoiceDetectorConfig::default())
    }
}

impl VoiceGestureDetector {
    pub fn new(config: VoiceDetectorConfig) -> Self {
        Self {
            config,
            cooldowns: CooldownLedger::new(),
        }
    }

    pub fn config(&self) -> &VoiceDetectorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: VoiceDetectorConfig) {
        self.config = config;
    }

    /// Analyze one voice's history and return every gesture that fired.
    pub fn update_voice(
        &mut self,
        voice_id: EntityId,
        samples: &VecDeque<Sample>,
    ) -> Vec<VoiceGestureEvent> {
        let Some(features) = WindowFeatures::extract(samples, &self.config) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for (gesture, strength, extra) in self.evaluate_rules(&features) {
            let cooldown = self.config.cooldown_for(gesture);
            if !self
                .cooldowns
                .try_trigger(voice_id, gesture, features.now_ms, cooldown)
            {
                debug!(
                    "Voice {} {} suppressed by cooldown ({}ms)",
                    voice_id,
                    gesture.as_str(),
                    cooldown
                );
                continue;
            }

            info!(
                "🙌 Voice {} {} | strength={:.2} extra={:.2}",
                voice_id,
                gesture.as_str(),
                strength,
                extra
            );
            events.push(VoiceGestureEvent {
                voice_id,
                gesture,
                strength,
                extra,
            });
        }
        events
    }

    /// Gesture candidates in declaration order: (type, strength, extra).
    fn evaluate_rules(&self, f: &WindowFeatures) -> Vec<(VoiceGestureType, f32, f32)> {
        let c = &self.config;
        let mut candidates = Vec::new();

        // Raise: committed upward travel with a narrow horizontal footprint
        if f.delta_y <= -c.raise_delta_y && f.horizontal_span <= c.raise_horizontal_limit {
            candidates.push((
                VoiceGestureType::Raise,
                clamp01(-f.delta_y / c.raise_delta_y),
                f.latest_y,
            ));
        }

        // Lower: mirror of raise
        if f.delta_y >= c.lower_delta_y && f.horizontal_span <= c.raise_horizontal_limit {
            candidates.push((
                VoiceGestureType::Lower,
                clamp01(f.delta_y / c.lower_delta_y),
                f.latest_y,
            ));
        }

        let abs_dx = f.delta_x.abs();
        let abs_dy = f.delta_y.abs();
        if abs_dx >= c.swipe_delta_x
            && abs_dx > abs_dy * c.swipe_orthogonality
            && abs_dy <= c.swipe_vertical_limit
        {
            let gesture = if f.delta_x < 0.0 {
                VoiceGestureType::SwipeLeft
            } else {
                VoiceGestureType::SwipeRight
            };
            candidates.push((gesture, clamp01(abs_dx / c.swipe_delta_x), 0.0));
        }

        // Shake: small footprint, lots of motion, lots of direction changes
        if f.radius() <= c.shake_radius
            && f.avg_motion >= c.shake_min_motion
            && f.sign_flips >= c.shake_min_sign_flips
        {
            candidates.push((
                VoiceGestureType::Shake,
                clamp01(f.avg_motion / (c.shake_min_motion * 2.0)),
                0.0,
            ));
        }

        if f.max_speed >= c.burst_speed_threshold {
            let span = (c.burst_max_speed - c.burst_speed_threshold).max(0.01);
            candidates.push((
                VoiceGestureType::Burst,
                clamp01((f.max_speed - c.burst_speed_threshold) / span),
                0.0,
            ));
        }

        if f.avg_motion <= c.hold_motion_threshold && f.still_duration_ms >= c.hold_duration_ms {
            let threshold = c.hold_motion_threshold.max(0.01);
            let progress = f.still_duration_ms as f32 / c.hold_duration_ms.max(1) as f32;
            candidates.push((
                VoiceGestureType::Hold,
                clamp01(1.0 - f.avg_motion / threshold),
                clamp01(progress),
            ));
        }

        candidates
    }

    /// Forget a voice's cooldowns so it starts fresh when it returns.
    pub fn remove_voice(&mut self, voice_id: EntityId) {
        self.cooldowns.remove_owner(voice_id);
    }

    pub fn clear(&mut self) {
        self.cooldowns.clear();
    }
}

// ============================================================================
// TESTS
// ============================================================================
