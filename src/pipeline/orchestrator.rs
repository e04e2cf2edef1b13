// src/pipeline/orchestrator.rs
//
// Per-tick driver. Owns the shared sample history, one detector of each
// kind and the voice/camera registries, and turns one tick of telemetry
// into an ordered list of gesture events.
//
// Tick order (a session reset, if flagged, runs first):
//   1. disconnects        → registry, history and cooldowns dropped
//   2. voice states       → registry + sample history
//   3. stale voices/cams  → pruned like a disconnect
//   4. voice detector     → ascending voice id
//   5. camera grids       → shape check, then zone detector in input order
//   6. global detector    → latest global motion + registry size

use crate::analysis::{
    CameraId, EntityId, GestureEvent, GlobalGestureDetector, SampleHistory, Vec3,
    VoiceGestureDetector, ZoneGestureDetector, ZoneGrid, ZONE_COUNT,
};
use crate::analysis::zone_detector::GRID_SIZE;
use crate::pipeline::metrics::PipelineMetrics;
use crate::types::{CameraGrid, Config, EngineConfig, VoiceState};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Everything that arrived for one tick.
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub timestamp_ms: u64,
    pub voice_states: Vec<VoiceState>,
    pub disconnects: Vec<EntityId>,
    pub camera_grids: Vec<CameraGrid>,
    pub global_motion: Option<f32>,
    /// Applied before anything else in the tick
    pub session_reset: bool,
}

impl TickInput {
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.voice_states.is_empty()
            && self.disconnects.is_empty()
            && self.camera_grids.is_empty()
            && self.global_motion.is_none()
            && !self.session_reset
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub events: Vec<GestureEvent>,
    pub active_voices: u32,
}

pub struct GestureEngine {
    config: EngineConfig,
    history: SampleHistory,
    voice_detector: VoiceGestureDetector,
    zone_detector: ZoneGestureDetector,
    global_detector: GlobalGestureDetector,
    /// Registered voices and the tick each was last updated on
    voices: BTreeMap<EntityId, u64>,
    cameras: HashMap<CameraId, u64>,
    last_global_motion: Option<f32>,
    metrics: PipelineMetrics,
}

impl GestureEngine {
    pub fn new(config: &Config) -> Self {
        info!(
            "Gesture engine: history={} samples, voice stale={}ms, camera stale={}ms",
            config.history.capacity, config.engine.voice_stale_ms, config.engine.camera_stale_ms
        );
        Self {
            config: config.engine.clone(),
            history: SampleHistory::new(config.history.capacity),
            voice_detector: VoiceGestureDetector::new(config.voice.clone()),
            zone_detector: ZoneGestureDetector::new(config.zone.clone()),
            global_detector: GlobalGestureDetector::new(config.global.clone()),
            voices: BTreeMap::new(),
            cameras: HashMap::new(),
            last_global_motion: None,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn process_tick(&mut self, input: &TickInput) -> TickOutput {
        let now = input.timestamp_ms;
        self.metrics.record_tick(now);

        if input.session_reset {
            self.reset_session();
        }

        for &voice_id in &input.disconnects {
            if self.voices.contains_key(&voice_id) {
                debug!("Voice {} disconnected", voice_id);
            }
            self.remove_voice(voice_id);
        }

        for state in &input.voice_states {
            self.apply_voice_state(state, now);
        }

        // Cameras that delivered a usable grid this tick count as seen
        // before the stale sweep runs.
        let valid_grids: Vec<(CameraId, ZoneGrid)> = input
            .camera_grids
            .iter()
            .filter_map(|grid| self.validate_grid(grid))
            .collect();
        for (cam_id, _) in &valid_grids {
            self.cameras.insert(*cam_id, now);
        }

        self.prune_stale(now);

        let mut events = Vec::new();

        let voice_ids: Vec<EntityId> = self.voices.keys().copied().collect();
        for voice_id in voice_ids {
            let Some(samples) = self.history.get_history(voice_id) else {
                continue;
            };
            if samples.len() < 2 {
                continue;
            }
            events.extend(
                self.voice_detector
                    .update_voice(voice_id, samples)
                    .into_iter()
                    .map(GestureEvent::from),
            );
        }

        for (cam_id, zones) in &valid_grids {
            events.extend(
                self.zone_detector
                    .update_camera(*cam_id, zones, now)
                    .into_iter()
                    .map(GestureEvent::from),
            );
        }

        if let Some(motion) = input.global_motion {
            self.last_global_motion = Some(motion);
        }
        let active_voices = self.active_voices();
        if let Some(motion) = self.last_global_motion {
            events.extend(
                self.global_detector
                    .update(motion, active_voices, now)
                    .into_iter()
                    .map(GestureEvent::from),
            );
        }

        for event in &events {
            self.metrics.record_event(event);
        }

        TickOutput {
            events,
            active_voices,
        }
    }

    fn apply_voice_state(&mut self, state: &VoiceState, now: u64) {
        let position = Vec3::from(state.position);
        if !self.voices.contains_key(&state.voice_id) {
            debug!("Voice {} registered", state.voice_id);
        }
        self.voices.insert(state.voice_id, now);

        if self
            .history
            .add_sample(state.voice_id, position, state.motion, state.energy, now)
        {
            self.metrics.voice_samples += 1;
        } else {
            self.metrics.dropped_samples += 1;
        }
    }

    fn validate_grid(&mut self, grid: &CameraGrid) -> Option<(CameraId, ZoneGrid)> {
        if grid.rows != GRID_SIZE || grid.cols != GRID_SIZE {
            warn!(
                "Camera {} sent a {}x{} grid, expected {}x{}; skipped",
                grid.cam_id, grid.rows, grid.cols, GRID_SIZE, GRID_SIZE
            );
            self.metrics.malformed_grids += 1;
            return None;
        }
        let zones: Result<ZoneGrid, _> = grid.values.as_slice().try_into();
        match zones {
            Ok(zones) => Some((grid.cam_id, zones)),
            Err(_) => {
                warn!(
                    "Camera {} sent {} zone values, expected {}; skipped",
                    grid.cam_id,
                    grid.values.len(),
                    ZONE_COUNT
                );
                self.metrics.malformed_grids += 1;
                None
            }
        }
    }

    fn prune_stale(&mut self, now: u64) {
        let stale_voices: Vec<EntityId> = self
            .voices
            .iter()
            .filter(|(_, seen)| now.saturating_sub(**seen) > self.config.voice_stale_ms)
            .map(|(id, _)| *id)
            .collect();
        for voice_id in stale_voices {
            debug!("Voice {} went stale, pruning", voice_id);
            self.remove_voice(voice_id);
            self.metrics.pruned_voices += 1;
        }

        let stale_cameras: Vec<CameraId> = self
            .cameras
            .iter()
            .filter(|(_, seen)| now.saturating_sub(**seen) > self.config.camera_stale_ms)
            .map(|(id, _)| *id)
            .collect();
        for cam_id in stale_cameras {
            debug!("Camera {} went stale, pruning", cam_id);
            self.remove_camera(cam_id);
            self.metrics.pruned_cameras += 1;
        }
    }

    /// Forget a voice entirely. A later state for the same id starts fresh.
    pub fn remove_voice(&mut self, voice_id: EntityId) {
        self.voices.remove(&voice_id);
        self.history.remove_entity(voice_id);
        self.voice_detector.remove_voice(voice_id);
    }

    pub fn remove_camera(&mut self, cam_id: CameraId) {
        self.cameras.remove(&cam_id);
        self.zone_detector.remove_camera(cam_id);
    }

    /// New performance session: room-wide history and latches start over.
    pub fn reset_session(&mut self) {
        info!("Session reset");
        self.global_detector.reset();
        self.last_global_motion = None;
    }

    pub fn active_voices(&self) -> u32 {
        u32::try_from(self.voices.len()).unwrap_or(u32::MAX)
    }

    /// Tick on which a registered voice last reported.
    pub fn last_update(&self, voice_id: EntityId) -> Option<u64> {
        self.voices.get(&voice_id).copied()
    }

    pub fn last_global_motion(&self) -> Option<f32> {
        self.last_global_motion
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn zone_detector(&self) -> &ZoneGestureDetector {
        &self.zone_detector
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}
