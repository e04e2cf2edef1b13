// src/analysis/global_detector.rs
//
// Room-wide gestures from the aggregate motion stream.
//
//   ERUPTION:  the room goes from quiet to loud. The history is split at
//               now - eruption_window_ms into PREVIOUS and RECENT; the
//               previous mean must sit at or below eruption_low while the
//               recent mean reaches eruption_high. Edge-triggered through
//               EruptionLatch (Idle → Armed → Cooling → Idle).
//   STILLNESS: enough voices present and the room stays quiet for
//               stillness_duration_ms. StillnessLatch times the quiet run;
//               after firing the timer is rebased, not cleared, so a quiet
//               room fires again once the cooldown allows.
//
// Both latches are small explicit state machines so re-arm behaviour can
// be tested on its own.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use super::events::{clamp01, GlobalGestureEvent, GlobalGestureType};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalDetectorConfig {
    pub history_ms: u64,
    /// Previous-window mean must be at or below this
    pub eruption_low: f32,
    /// Recent-window mean must reach this
    pub eruption_high: f32,
    pub eruption_cooldown_ms: u64,
    /// Length of the RECENT partition
    pub eruption_window_ms: u64,
    pub stillness_motion_threshold: f32,
    pub stillness_duration_ms: u64,
    pub stillness_min_voices: u32,
    pub stillness_cooldown_ms: u64,
}

impl Default for GlobalDetectorConfig {
    fn default() -> Self {
        Self {
            history_ms: 5000,
            eruption_low: 0.25,
            eruption_high: 0.7,
            eruption_cooldown_ms: 4500,
            eruption_window_ms: 1200,
            stillness_motion_threshold: 0.22,
            stillness_duration_ms: 3000,
            stillness_min_voices: 3,
            stillness_cooldown_ms: 6000,
        }
    }
}

// ============================================================================
// LATCHES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EruptionLatch {
    /// No quiet baseline behind us
    Idle,
    /// Previous window was quiet; a loud recent window fires
    Armed,
    /// Fired; ignores everything until the cooldown has passed
    Cooling { fired_at_ms: u64 },
}

impl EruptionLatch {
    /// Advance the latch. Returns true on the tick the eruption fires.
    pub fn step(
        &mut self,
        now_ms: u64,
        cooldown_ms: u64,
        baseline_quiet: bool,
        recent_loud: bool,
    ) -> bool {
        if let Self::Cooling { fired_at_ms } = *self {
            if now_ms < fired_at_ms.saturating_add(cooldown_ms) {
                return false;
            }
            *self = Self::Idle;
        }

        *self = if baseline_quiet { Self::Armed } else { Self::Idle };

        if *self == Self::Armed && recent_loud {
            *self = Self::Cooling {
                fired_at_ms: now_ms,
            };
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillnessTimer {
    Idle,
    Timing { since_ms: u64 },
}

/// Quiet-run timer plus the stillness cooldown. The cooldown outlives the
/// timer: a broken quiet run resets the timer but not the last fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StillnessLatch {
    pub timer: StillnessTimer,
    pub last_fired_ms: Option<u64>,
}

impl Default for StillnessLatch {
    fn default() -> Self {
        Self {
            timer: StillnessTimer::Idle,
            last_fired_ms: None,
        }
    }
}

impl StillnessLatch {
    /// Advance the latch. Returns the quiet duration when stillness fires.
    pub fn step(
        &mut self,
        now_ms: u64,
        quiet: bool,
        duration_ms: u64,
        cooldown_ms: u64,
    ) -> Option<u64> {
        if !quiet {
            self.timer = StillnessTimer::Idle;
            return None;
        }

        let since_ms = match self.timer {
            StillnessTimer::Timing { since_ms } => since_ms,
            StillnessTimer::Idle => {
                self.timer = StillnessTimer::Timing { since_ms: now_ms };
                now_ms
            }
        };

        let elapsed = now_ms.saturating_sub(since_ms);
        if elapsed < duration_ms {
            return None;
        }
        let cooled = self
            .last_fired_ms
            .map_or(true, |last| now_ms >= last.saturating_add(cooldown_ms));
        if !cooled {
            return None;
        }

        self.last_fired_ms = Some(now_ms);
        self.timer = StillnessTimer::Timing { since_ms: now_ms };
        Some(elapsed)
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct GlobalSample {
    timestamp_ms: u64,
    global_motion: f32,
}

/// Mean global motion on each side of the eruption split.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowAverages {
    pub previous_avg: f32,
    pub previous_count: usize,
    pub recent_avg: f32,
    pub recent_count: usize,
}

pub struct GlobalGestureDetector {
    config: GlobalDetectorConfig,
    history: VecDeque<GlobalSample>,
    eruption: EruptionLatch,
    stillness: StillnessLatch,
}

impl Default for GlobalGestureDetector {
    fn default() -> Self {
        Self::new(GlobalDetectorConfig::default())
    }
}

impl GlobalGestureDetector {
    pub fn new(config: GlobalDetectorConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            eruption: EruptionLatch::Idle,
            stillness: StillnessLatch::default(),
        }
    }

    pub fn config(&self) -> &GlobalDetectorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GlobalDetectorConfig) {
        self.config = config;
    }

    pub fn eruption_latch(&self) -> EruptionLatch {
        self.eruption
    }

    pub fn stillness_latch(&self) -> StillnessLatch {
        self.stillness
    }

    pub fn update(
        &mut self,
        global_motion: f32,
        active_voices: u32,
        timestamp_ms: u64,
    ) -> Vec<GlobalGestureEvent> {
        self.history.push_back(GlobalSample {
            timestamp_ms,
            global_motion,
        });
        let min_timestamp = timestamp_ms.saturating_sub(self.config.history_ms);
        while self
            .history
            .front()
            .is_some_and(|s| s.timestamp_ms < min_timestamp)
        {
            self.history.pop_front();
        }

        let avgs = self.window_averages(timestamp_ms);
        let mut events = Vec::new();

        let baseline_quiet = avgs.previous_count > 0 && avgs.previous_avg <= self.config.eruption_low;
        let recent_loud = avgs.recent_count > 0 && avgs.recent_avg >= self.config.eruption_high;
        if self.eruption.step(
            timestamp_ms,
            self.config.eruption_cooldown_ms,
            baseline_quiet,
            recent_loud,
        ) {
            let span = (1.0 - self.config.eruption_high).max(0.01);
            let strength = clamp01((avgs.recent_avg - self.config.eruption_high) / span);
            info!(
                "🌋 Eruption | strength={:.2} (recent={:.2}, previous={:.2})",
                strength, avgs.recent_avg, avgs.previous_avg
            );
            events.push(GlobalGestureEvent {
                gesture: GlobalGestureType::Eruption,
                strength,
            });
        } else if baseline_quiet && recent_loud {
            debug!("Eruption suppressed by cooldown");
        }

        let quiet = global_motion <= self.config.stillness_motion_threshold
            && active_voices >= self.config.stillness_min_voices;
        if let Some(duration) = self.stillness.step(
            timestamp_ms,
            quiet,
            self.config.stillness_duration_ms,
            self.config.stillness_cooldown_ms,
        ) {
            let strength = self.stillness_strength(avgs.recent_avg, active_voices);
            info!(
                "🤫 Stillness | strength={:.2} after {}ms with {} voices",
                strength, duration, active_voices
            );
            events.push(GlobalGestureEvent {
                gesture: GlobalGestureType::Stillness,
                strength,
            });
        }

        events
    }

    /// Split the retained history at now - eruption_window_ms.
    pub fn window_averages(&self, now_ms: u64) -> WindowAverages {
        let split = now_ms.saturating_sub(self.config.eruption_window_ms);
        let mut avgs = WindowAverages::default();
        for s in &self.history {
            if s.timestamp_ms < split {
                avgs.previous_avg += s.global_motion;
                avgs.previous_count += 1;
            } else {
                avgs.recent_avg += s.global_motion;
                avgs.recent_count += 1;
            }
        }
        if avgs.previous_count > 0 {
            avgs.previous_avg /= avgs.previous_count as f32;
        }
        if avgs.recent_count > 0 {
            avgs.recent_avg /= avgs.recent_count as f32;
        }
        avgs
    }

    fn stillness_strength(&self, recent_avg: f32, active_voices: u32) -> f32 {
        let c = &self.config;
        let motion_strength =
            clamp01(1.0 - recent_avg / c.stillness_motion_threshold.max(0.01));
        let min_voices = c.stillness_min_voices as f32;
        let voice_strength =
            clamp01((active_voices as f32 - min_voices) / min_voices.max(1.0));
        clamp01(0.6 * motion_strength + 0.4 * voice_strength)
    }

    /// Session boundary: forget history and both latches.
    pub fn reset(&mut self) {
        self.history.clear();
        self.eruption = EruptionLatch::Idle;
        self.stillness = StillnessLatch::default();
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn count(events: &[GlobalGestureEvent], gesture: GlobalGestureType) -> usize {
        events.iter().filter(|e| e.gesture == gesture).count()
    }

    #[test]
    fn test_eruption_quiet_to_loud() {
        let mut detector = GlobalGestureDetector::default();
        assert!(detector.update(0.2, 2, 0).is_empty());
        assert!(detector.update(0.2, 2, 1000).is_empty());

        let events = detector.update(0.75, 2, 2500);
        let avgs = detector.window_averages(2500);
        assert!((avgs.previous_avg - 0.2).abs() < 1e-6);
        assert!((avgs.recent_avg - 0.75).abs() < 1e-6);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].gesture, GlobalGestureType::Eruption);
        assert!((events[0].strength - 0.05 / 0.3).abs() < 1e-4);
        assert_eq!(
            detector.eruption_latch(),
            EruptionLatch::Cooling { fired_at_ms: 2500 }
        );

        // Same conditions right after: still cooling
        assert!(detector.update(0.75, 2, 2600).is_empty());
    }

    #[test]
    fn test_eruption_needs_quiet_baseline() {
        let mut detector = GlobalGestureDetector::default();
        let mut events = Vec::new();
        for i in 0..30u64 {
            let motion = if i < 20 { 0.5 } else { 0.9 };
            events.extend(detector.update(motion, 2, i * 100));
        }
        assert_eq!(count(&events, GlobalGestureType::Eruption), 0);
    }

    #[test]
    fn test_eruption_fires_once_over_ramp() {
        let mut detector = GlobalGestureDetector::default();
        let mut events = Vec::new();
        for i in 0..60u64 {
            let motion = if i < 25 { 0.1 } else { 0.95 };
            events.extend(detector.update(motion, 1, i * 100));
        }
        assert_eq!(count(&events, GlobalGestureType::Eruption), 1);
    }

    #[test]
    fn test_eruption_latch_transitions() {
        let mut latch = EruptionLatch::Idle;
        assert!(!latch.step(0, 1000, false, true));
        assert_eq!(latch, EruptionLatch::Idle);

        assert!(!latch.step(100, 1000, true, false));
        assert_eq!(latch, EruptionLatch::Armed);

        assert!(latch.step(200, 1000, true, true));
        assert_eq!(latch, EruptionLatch::Cooling { fired_at_ms: 200 });

        assert!(!latch.step(1199, 1000, true, true));
        assert!(latch.step(1200, 1000, true, true));
    }

    #[test]
    fn test_stillness_fires_at_duration() {
        let mut detector = GlobalGestureDetector::default();
        for i in 0..30u64 {
            let events = detector.update(0.1, 4, i * 100);
            assert!(events.is_empty(), "fired early at {}ms", i * 100);
        }
        let events = detector.update(0.1, 4, 3000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].gesture, GlobalGestureType::Stillness);

        // 0.6 * (1 - 0.1/0.22) + 0.4 * (1/3)
        let expected = 0.6 * (1.0 - 0.1 / 0.22) + 0.4 / 3.0;
        assert!((events[0].strength - expected).abs() < 1e-4);
    }

    #[test]
    fn test_stillness_requires_enough_voices() {
        let mut detector = GlobalGestureDetector::default();
        let mut events = Vec::new();
        for i in 0..=40u64 {
            events.extend(detector.update(0.05, 2, i * 100));
        }
        assert!(events.is_empty());
    }

    #[test]
    fn test_stillness_timer_resets_on_motion() {
        let mut detector = GlobalGestureDetector::default();
        let mut events = Vec::new();
        for i in 0..=40u64 {
            let motion = if i == 20 { 0.5 } else { 0.1 };
            events.extend(detector.update(motion, 3, i * 100));
        }
        // Restarted at 2100ms, needs until 5100ms
        assert!(events.is_empty());
        assert_eq!(
            detector.stillness_latch().timer,
            StillnessTimer::Timing { since_ms: 2100 }
        );
    }

    #[test]
    fn test_stillness_rearms_after_cooldown() {
        let mut detector = GlobalGestureDetector::default();
        let mut fired = Vec::new();
        for i in 0..=120u64 {
            let t = i * 100;
            for e in detector.update(0.0, 3, t) {
                if e.gesture == GlobalGestureType::Stillness {
                    fired.push(t);
                }
            }
        }
        // Cooldown (6s) is longer than the duration (3s)
        assert_eq!(fired, vec![3000, 9000]);
    }

    #[test]
    fn test_stillness_latch_cooldown_survives_timer_reset() {
        let mut latch = StillnessLatch::default();
        assert_eq!(latch.step(0, true, 1000, 5000), None);
        assert_eq!(latch.step(1000, true, 1000, 5000), Some(1000));
        assert_eq!(latch.timer, StillnessTimer::Timing { since_ms: 1000 });

        // Break the quiet run, then go quiet again long enough
        assert_eq!(latch.step(1500, false, 1000, 5000), None);
        assert_eq!(latch.timer, StillnessTimer::Idle);
        assert_eq!(latch.step(2000, true, 1000, 5000), None);
        assert_eq!(latch.step(3000, true, 1000, 5000), None);
        assert_eq!(latch.step(6000, true, 1000, 5000), Some(4000));
    }

    #[test]
    fn test_reset_clears_history_and_latches() {
        let mut detector = GlobalGestureDetector::default();
        detector.update(0.2, 4, 0);
        detector.update(0.2, 4, 1000);
        assert_eq!(detector.update(0.9, 4, 2500).len(), 1);

        detector.reset();
        assert_eq!(detector.history_len(), 0);
        assert_eq!(detector.eruption_latch(), EruptionLatch::Idle);
        assert_eq!(detector.stillness_latch(), StillnessLatch::default());

        detector.update(0.2, 4, 2600);
        detector.update(0.2, 4, 3600);
        assert_eq!(detector.update(0.9, 4, 5100).len(), 1);
    }

    #[test]
    fn test_history_trimmed_by_duration() {
        let mut detector = GlobalGestureDetector::default();
        for i in 0..100u64 {
            detector.update(0.5, 1, i * 100);
        }
        // 4900..9900 inclusive
        assert_eq!(detector.history_len(), 51);
    }
}
