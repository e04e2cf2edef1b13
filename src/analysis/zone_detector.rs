// src/analysis/zone_detector.rs
//
// Reads the 4x4 activity grids coming from each camera and calls out
// crowd-level gestures:
//
//   SWEEP: the hottest cell of a row (or column) drifts steadily across
//          the line within sweep_window_ms. Tracked as the sequence of
//          per-sample argmax indices, which must be monotonic and move
//          at least two cells.
//   PULSE: a single cell rises and then falls (a local peak) above
//          pulse_threshold. Each cell keeps its own slope tracker.
//
// Sweeps and pulses run independently every update. Sweep cooldowns are
// keyed by (camera, sweep type); pulse cooldowns live on the per-cell
// tracker and never interact with the sweep ledger.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

use super::cooldown::CooldownLedger;
use super::events::{clamp01, SweepAxis, SweepDirection, ZoneGestureEvent, ZoneGestureType};
use super::CameraId;

pub const GRID_SIZE: usize = 4;
pub const ZONE_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// Row-major 4x4 activity grid, values in 0..1.
pub type ZoneGrid = [f32; ZONE_COUNT];

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneDetectorConfig {
    /// How much grid history each camera keeps
    pub history_ms: u64,
    /// Span of samples a sweep is read from
    pub sweep_window_ms: u64,
    /// Minimum samples inside the sweep window
    pub sweep_min_steps: usize,
    /// Minimum max-min spread along the line on the newest sample
    pub sweep_min_strength: f32,
    pub sweep_cooldown_ms: u64,
    /// Minimum peak value for a pulse
    pub pulse_threshold: f32,
    /// Minimum per-sample slope on both sides of the peak
    pub pulse_slope_threshold: f32,
    pub pulse_cooldown_ms: u64,
}

impl Default for ZoneDetectorConfig {
    fn default() -> Self {
        Self {
            history_ms: 2000,
            sweep_window_ms: 900,
            sweep_min_steps: 3,
            sweep_min_strength: 0.25,
            sweep_cooldown_ms: 1600,
            pulse_threshold: 0.35,
            pulse_slope_threshold: 0.05,
            pulse_cooldown_ms: 900,
        }
    }
}

// ============================================================================
// PER-CAMERA STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneSample {
    pub timestamp_ms: u64,
    pub values: ZoneGrid,
}

/// Slope tracker for one grid cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseTracker {
    pub initialized: bool,
    pub prev_value: f32,
    pub prev_slope: f32,
    pub last_trigger_ms: Option<u64>,
}

impl PulseTracker {
    /// Feed the next value. Returns the peak value when the previous sample
    /// turned out to be a qualifying local maximum.
    fn observe(&mut self, value: f32, slope_threshold: f32, peak_threshold: f32) -> Option<f32> {
        if !self.initialized {
            self.initialized = true;
            self.prev_value = value;
            self.prev_slope = 0.0;
            return None;
        }

        let slope = value - self.prev_value;
        let rising = self.prev_slope > slope_threshold;
        let falling = slope <= -slope_threshold;
        let peak = self.prev_value;

        self.prev_slope = slope;
        self.prev_value = value;

        (rising && falling && peak >= peak_threshold).then_some(peak)
    }

    fn cooled_down(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        self.last_trigger_ms
            .map_or(true, |last| now_ms >= last.saturating_add(cooldown_ms))
    }
}

#[derive(Debug, Clone)]
struct CameraState {
    history: VecDeque<ZoneSample>,
    pulses: [PulseTracker; ZONE_COUNT],
}

impl CameraState {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            pulses: [PulseTracker::default(); ZONE_COUNT],
        }
    }
}

// ============================================================================
// LINE HELPERS
// ============================================================================

fn line_cell(axis: SweepAxis, line: usize, step: usize) -> usize {
    match axis {
        SweepAxis::Row => line * GRID_SIZE + step,
        SweepAxis::Column => step * GRID_SIZE + line,
    }
}

/// Position (0..4) of the hottest cell along a line. Ties go to the lowest index.
pub fn line_argmax(values: &ZoneGrid, axis: SweepAxis, line: usize) -> usize {
    let mut max_index = 0;
    let mut max_value = values[line_cell(axis, line, 0)];
    for step in 1..GRID_SIZE {
        let value = values[line_cell(axis, line, step)];
        if value > max_value {
            max_value = value;
            max_index = step;
        }
    }
    max_index
}

/// max - min across the four cells of a line.
pub fn line_range(values: &ZoneGrid, axis: SweepAxis, line: usize) -> f32 {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for step in 0..GRID_SIZE {
        let value = values[line_cell(axis, line, step)];
        min = min.min(value);
        max = max.max(value);
    }
    max - min
}

/// Direction of a monotonic index drift of at least two cells, if any.
pub fn sweep_direction(indices: &[usize]) -> Option<SweepDirection> {
    let (first, last) = (*indices.first()?, *indices.last()?);
    let increasing = indices.windows(2).all(|w| w[1] >= w[0]);
    let decreasing = indices.windows(2).all(|w| w[1] <= w[0]);
    let delta = last as i64 - first as i64;

    if increasing && delta >= 2 {
        Some(SweepDirection::Forward)
    } else if decreasing && delta <= -2 {
        Some(SweepDirection::Backward)
    } else {
        None
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct ZoneGestureDetector {
    config: ZoneDetectorConfig,
    cameras: HashMap<CameraId, CameraState>,
    sweep_cooldowns: CooldownLedger<CameraId, ZoneGestureType>,
}

impl Default for ZoneGestureDetector {
    fn default() -> Self {
        Self::new(ZoneDetectorConfig::default())
    }
}

impl ZoneGestureDetector {
    pub fn new(config: ZoneDetectorConfig) -> Self {
        Self {
            config,
            cameras: HashMap::new(),
            sweep_cooldowns: CooldownLedger::new(),
        }
    }

    pub fn config(&self) -> &ZoneDetectorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ZoneDetectorConfig) {
        self.config = config;
    }

    /// Push one grid for a camera and run both passes.
    /// Events come out as row sweeps, then column sweeps, then pulses.
    pub fn update_camera(
        &mut self,
        cam_id: CameraId,
        zones: &ZoneGrid,
        timestamp_ms: u64,
    ) -> Vec<ZoneGestureEvent> {
        let state = self.cameras.entry(cam_id).or_insert_with(CameraState::new);
        state.history.push_back(ZoneSample {
            timestamp_ms,
            values: *zones,
        });

        let min_timestamp = timestamp_ms.saturating_sub(self.config.history_ms);
        while state
            .history
            .front()
            .is_some_and(|s| s.timestamp_ms < min_timestamp)
        {
            state.history.pop_front();
        }

        let mut events =
            detect_sweeps(&self.config, &mut self.sweep_cooldowns, cam_id, &state.history);
        events.extend(detect_pulses(
            &self.config,
            cam_id,
            &mut state.pulses,
            zones,
            timestamp_ms,
        ));
        events
    }

    /// Drop history, pulse trackers and cooldowns for a camera.
    pub fn remove_camera(&mut self, cam_id: CameraId) {
        self.cameras.remove(&cam_id);
        self.sweep_cooldowns.remove_owner(cam_id);
    }

    pub fn has_camera(&self, cam_id: CameraId) -> bool {
        self.cameras.contains_key(&cam_id)
    }

    pub fn history_len(&self, cam_id: CameraId) -> usize {
        self.cameras.get(&cam_id).map_or(0, |c| c.history.len())
    }

    pub fn clear(&mut self) {
        self.cameras.clear();
        self.sweep_cooldowns.clear();
    }
}

fn detect_sweeps(
    config: &ZoneDetectorConfig,
    cooldowns: &mut CooldownLedger<CameraId, ZoneGestureType>,
    cam_id: CameraId,
    history: &VecDeque<ZoneSample>,
) -> Vec<ZoneGestureEvent> {
    let mut events = Vec::new();
    if history.len() < config.sweep_min_steps {
        return events;
    }
    let Some(latest) = history.back() else {
        return events;
    };
    let now = latest.timestamp_ms;
    let min_timestamp = now.saturating_sub(config.sweep_window_ms);
    let window: Vec<&ZoneSample> = history
        .iter()
        .filter(|s| s.timestamp_ms >= min_timestamp)
        .collect();
    if window.len() < config.sweep_min_steps {
        return events;
    }

    for axis in [SweepAxis::Row, SweepAxis::Column] {
        for line in 0..GRID_SIZE {
            // Flat or noisy lines never sweep
            let range = line_range(&latest.values, axis, line);
            if range < config.sweep_min_strength {
                continue;
            }

            let indices: Vec<usize> = window
                .iter()
                .map(|s| line_argmax(&s.values, axis, line))
                .collect();
            let Some(direction) = sweep_direction(&indices) else {
                continue;
            };

            let gesture = ZoneGestureType::Sweep {
                axis,
                line,
                direction,
            };
            if !cooldowns.try_trigger(cam_id, gesture, now, config.sweep_cooldown_ms) {
                debug!("Cam {} {} suppressed by cooldown", cam_id, gesture.as_str());
                continue;
            }

            let strength = clamp01(range);
            info!(
                "🌊 Cam {} {} | strength={:.2} | path={:?}",
                cam_id,
                gesture.as_str(),
                strength,
                indices
            );
            events.push(ZoneGestureEvent {
                cam_id,
                gesture,
                strength,
                zone_index: None,
            });
        }
    }
    events
}

fn detect_pulses(
    config: &ZoneDetectorConfig,
    cam_id: CameraId,
    trackers: &mut [PulseTracker; ZONE_COUNT],
    zones: &ZoneGrid,
    timestamp_ms: u64,
) -> Vec<ZoneGestureEvent> {
    let mut events = Vec::new();
    let span = (1.0 - config.pulse_threshold).max(0.01);

    for (zone_index, tracker) in trackers.iter_mut().enumerate() {
        let Some(peak) = tracker.observe(
            zones[zone_index],
            config.pulse_slope_threshold,
            config.pulse_threshold,
        ) else {
            continue;
        };

        if !tracker.cooled_down(timestamp_ms, config.pulse_cooldown_ms) {
            debug!("Cam {} pulse zone {} suppressed by cooldown", cam_id, zone_index);
            continue;
        }
        tracker.last_trigger_ms = Some(timestamp_ms);

        let strength = clamp01((peak - config.pulse_threshold) / span);
        info!(
            "💥 Cam {} pulse zone {} | peak={:.2} strength={:.2}",
            cam_id, zone_index, peak, strength
        );
        events.push(ZoneGestureEvent {
            cam_id,
            gesture: ZoneGestureType::PulseZone,
            strength,
            zone_index: Some(zone_index),
        });
    }
    events
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// One lit row (0.1 floor, 0.5 peak at `peak_col`, range 0.4). The floor
    /// pins every column's argmax to `row` so only the row can sweep.
    fn row_peak(row: usize, peak_col: usize) -> ZoneGrid {
        let mut grid = [0.0; ZONE_COUNT];
        for col in 0..GRID_SIZE {
            grid[row * GRID_SIZE + col] = 0.1;
        }
        grid[row * GRID_SIZE + peak_col] = 0.5;
        grid
    }

    fn column_peak(col: usize, peak_row: usize) -> ZoneGrid {
        let mut grid = [0.0; ZONE_COUNT];
        for row in 0..GRID_SIZE {
            grid[row * GRID_SIZE + col] = 0.1;
        }
        grid[peak_row * GRID_SIZE + col] = 0.6;
        grid
    }

    fn sweeps(events: &[ZoneGestureEvent]) -> Vec<&'static str> {
        events
            .iter()
            .filter(|e| e.gesture != ZoneGestureType::PulseZone)
            .map(|e| e.gesture.as_str())
            .collect()
    }

    #[test]
    fn test_row_sweep_left_to_right() {
        let mut detector = ZoneGestureDetector::default();
        let mut events = Vec::new();
        for (i, col) in [0, 1, 2, 3].into_iter().enumerate() {
            events.extend(detector.update_camera(0, &row_peak(0, col), i as u64 * 300));
        }

        // Fires once the index has drifted two cells, then cools down
        assert_eq!(sweeps(&events), vec!["sweep_lr_top"]);
        let sweep = events
            .iter()
            .find(|e| e.gesture != ZoneGestureType::PulseZone)
            .unwrap();
        assert!((sweep.strength - 0.4).abs() < 1e-6);
        assert_eq!(sweep.zone_index, None);
        assert_eq!(sweep.cam_id, 0);
    }

    #[test]
    fn test_row_sweep_on_final_step_of_four() {
        let config = ZoneDetectorConfig {
            sweep_min_steps: 4,
            ..ZoneDetectorConfig::default()
        };
        let mut detector = ZoneGestureDetector::new(config);
        let mut fired_at = Vec::new();
        for (i, col) in [0, 1, 2, 3].into_iter().enumerate() {
            let t = i as u64 * 300;
            let events = detector.update_camera(0, &row_peak(0, col), t);
            if !sweeps(&events).is_empty() {
                fired_at.push((t, sweeps(&events)));
            }
        }
        assert_eq!(fired_at, vec![(900, vec!["sweep_lr_top"])]);
    }

    #[test]
    fn test_row_sweep_right_to_left() {
        let mut detector = ZoneGestureDetector::default();
        let mut events = Vec::new();
        for (i, col) in [3, 2, 1, 0].into_iter().enumerate() {
            events.extend(detector.update_camera(0, &row_peak(0, col), i as u64 * 300));
        }
        assert_eq!(sweeps(&events), vec!["sweep_rl_top"]);
    }

    #[test]
    fn test_column_sweeps() {
        let mut detector = ZoneGestureDetector::default();
        let mut events = Vec::new();
        for (i, row) in [0, 1, 2].into_iter().enumerate() {
            events.extend(detector.update_camera(2, &column_peak(3, row), i as u64 * 200));
        }
        assert_eq!(sweeps(&events), vec!["sweep_tb_right"]);

        let mut detector = ZoneGestureDetector::default();
        let mut events = Vec::new();
        for (i, row) in [3, 2, 1].into_iter().enumerate() {
            events.extend(detector.update_camera(2, &column_peak(0, row), i as u64 * 200));
        }
        assert_eq!(sweeps(&events), vec!["sweep_bt_left"]);
    }

    #[test]
    fn test_flat_line_never_sweeps() {
        let mut detector = ZoneGestureDetector::default();
        let mut events = Vec::new();
        for (i, col) in [0, 1, 2, 3].into_iter().enumerate() {
            let mut grid = [0.5; ZONE_COUNT];
            grid[col] = 0.6; // range 0.1 < 0.25
            events.extend(detector.update_camera(0, &grid, i as u64 * 300));
        }
        assert!(sweeps(&events).is_empty());
    }

    #[test]
    fn test_non_monotonic_path_rejected() {
        assert_eq!(sweep_direction(&[0, 2, 1, 3]), None);
        assert_eq!(sweep_direction(&[0, 1, 1]), None);
        assert_eq!(sweep_direction(&[0, 0, 2]), Some(SweepDirection::Forward));
        assert_eq!(sweep_direction(&[3, 3, 1]), Some(SweepDirection::Backward));
        assert_eq!(sweep_direction(&[]), None);
    }

    #[test]
    fn test_sweep_reads_only_recent_window() {
        let mut detector = ZoneGestureDetector::default();
        // Columns 0 and 1 are older than the 900ms sweep window at t=1500
        detector.update_camera(0, &row_peak(0, 0), 0);
        detector.update_camera(0, &row_peak(0, 1), 300);
        let events = detector.update_camera(0, &row_peak(0, 2), 1500);
        assert!(sweeps(&events).is_empty());
    }

    #[test]
    fn test_history_trimmed_by_duration() {
        let mut detector = ZoneGestureDetector::default();
        for i in 0..50u64 {
            detector.update_camera(1, &[0.0; ZONE_COUNT], i * 100);
        }
        // t=2900..4900 inclusive
        assert_eq!(detector.history_len(1), 21);
    }

    #[test]
    fn test_pulse_fires_on_peak() {
        let mut detector = ZoneGestureDetector::default();
        let mut grid = [0.0; ZONE_COUNT];

        grid[5] = 0.1;
        assert!(detector.update_camera(0, &grid, 0).is_empty());
        grid[5] = 0.5;
        assert!(detector.update_camera(0, &grid, 100).is_empty());
        grid[5] = 0.3;
        let events = detector.update_camera(0, &grid, 200);

        assert_eq!(events.len(), 1);
        let pulse = &events[0];
        assert_eq!(pulse.gesture, ZoneGestureType::PulseZone);
        assert_eq!(pulse.zone_index, Some(5));
        assert!((pulse.strength - 0.15 / 0.65).abs() < 1e-4);

        grid[5] = 0.1;
        assert!(detector.update_camera(0, &grid, 300).is_empty());
    }

    #[test]
    fn test_low_peak_is_not_a_pulse() {
        let mut detector = ZoneGestureDetector::default();
        let mut grid = [0.0; ZONE_COUNT];
        let mut events = Vec::new();
        for (i, value) in [0.0, 0.3, 0.1].into_iter().enumerate() {
            grid[0] = value;
            events.extend(detector.update_camera(0, &grid, i as u64 * 100));
        }
        assert!(events.is_empty());
    }

    #[test]
    fn test_pulse_cooldown_is_per_cell() {
        let mut detector = ZoneGestureDetector::default();
        let mut grid = [0.0; ZONE_COUNT];
        let mut pulses = Vec::new();
        // Cell 0 spikes twice 400ms apart, cell 15 spikes in between
        let script: [(u64, usize, f32); 9] = [
            (0, 0, 0.1),
            (100, 0, 0.8),
            (200, 0, 0.2),
            (300, 15, 0.9),
            (400, 15, 0.1),
            (500, 0, 0.9),
            (600, 0, 0.2),
            (700, 0, 0.2),
            (1200, 0, 0.2),
        ];
        for (t, cell, value) in script {
            grid[cell] = value;
            pulses.extend(
                detector
                    .update_camera(0, &grid, t)
                    .into_iter()
                    .filter(|e| e.gesture == ZoneGestureType::PulseZone)
                    .map(|e| (t, e.zone_index)),
            );
        }
        assert_eq!(pulses, vec![(200, Some(0)), (400, Some(15))]);
    }

    #[test]
    fn test_remove_camera_resets_everything() {
        let mut detector = ZoneGestureDetector::default();
        let run = |d: &mut ZoneGestureDetector| {
            let mut events = Vec::new();
            for (i, col) in [0, 1, 2, 3].into_iter().enumerate() {
                events.extend(d.update_camera(7, &row_peak(1, col), 10_000 + i as u64 * 300));
            }
            events
        };

        assert_eq!(sweeps(&run(&mut detector)), vec!["sweep_lr_upper_mid"]);
        detector.remove_camera(7);
        assert!(!detector.has_camera(7));
        // Same timestamps again: cooldown would block without the reset
        assert_eq!(sweeps(&run(&mut detector)), vec!["sweep_lr_upper_mid"]);
    }

    #[test]
    fn test_cameras_are_independent() {
        let mut detector = ZoneGestureDetector::default();
        let mut events = Vec::new();
        for (i, col) in [0, 1, 2].into_iter().enumerate() {
            let t = i as u64 * 300;
            events.extend(detector.update_camera(0, &row_peak(2, col), t));
            events.extend(detector.update_camera(1, &row_peak(2, 3 - col), t));
        }
        let names: Vec<_> = events
            .iter()
            .filter(|e| e.gesture != ZoneGestureType::PulseZone)
            .map(|e| (e.cam_id, e.gesture.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![(0, "sweep_lr_lower_mid"), (1, "sweep_rl_lower_mid")]
        );
    }
}
