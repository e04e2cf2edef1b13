// src/analysis/mod.rs
//
// Gesture classification core.
//
// Signal flow:
//   Voice samples  → sample_history → voice_detector  ─┐
//   Camera 4x4 grids ──────────────→ zone_detector   ─┼→ GestureEvent
//   Global motion + voice count ───→ global_detector ─┘
//
// The detectors share no state. Time is always supplied by the caller
// (monotonic milliseconds); nothing in here reads a clock.
// Orchestrated per tick by pipeline::orchestrator::GestureEngine.

pub mod cooldown;
pub mod events;
pub mod global_detector;
pub mod sample_history;
pub mod voice_detector;
pub mod zone_detector;

/// Tracked voice (performer) id, assigned upstream.
pub type EntityId = u32;
pub type CameraId = u32;

// Re-exports for ergonomic access from the pipeline and main.rs
pub use cooldown::CooldownLedger;
pub use events::{
    GestureEvent, GlobalGestureEvent, GlobalGestureType, SweepAxis, SweepDirection,
    VoiceGestureEvent, VoiceGestureType, ZoneGestureEvent, ZoneGestureType,
};
pub use global_detector::{
    EruptionLatch, GlobalDetectorConfig, GlobalGestureDetector, StillnessLatch, StillnessTimer,
};
pub use sample_history::{Sample, SampleHistory, Vec3};
pub use voice_detector::{VoiceDetectorConfig, VoiceGestureDetector, WindowFeatures};
pub use zone_detector::{ZoneDetectorConfig, ZoneGestureDetector, ZoneGrid, ZONE_COUNT};
