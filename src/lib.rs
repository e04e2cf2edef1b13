// src/lib.rs
//
// Crowd gesture engine: turns per-voice motion telemetry, per-camera zone
// grids and a room-wide motion level into typed, confidence-scored
// gesture events.

pub mod analysis;
mod config;
pub mod pipeline;
pub mod replay;
pub mod types;

pub use analysis::GestureEvent;
pub use pipeline::{GestureEngine, TickInput, TickOutput};
pub use types::Config;
