use serde::{Deserialize, Serialize};

use crate::analysis::sample_history::DEFAULT_HISTORY_CAPACITY;
use crate::analysis::{GlobalDetectorConfig, VoiceDetectorConfig, ZoneDetectorConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub voice: VoiceDetectorConfig,
    pub zone: ZoneDetectorConfig,
    pub global: GlobalDetectorConfig,
    pub engine: EngineConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples kept per voice; values below 1 are clamped to 1
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A voice with no state for this long is dropped
    pub voice_stale_ms: u64,
    /// A camera with no grid for this long is dropped
    pub camera_stale_ms: u64,
    pub max_pending_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voice_stale_ms: 2500,
            camera_stale_ms: 5000,
            max_pending_events: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub extension: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "recordings".to_string(),
            output_dir: "output".to_string(),
            extension: "jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "crowd_gesture=info".to_string(),
        }
    }
}

/// One voice's state as reported by the tracker for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceState {
    pub voice_id: u32,
    pub position: [f32; 3],
    #[serde(default)]
    pub size: f32,
    pub motion: f32,
    pub energy: f32,
}

/// One camera's activity grid as received. Shape is checked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraGrid {
    pub cam_id: u32,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}
