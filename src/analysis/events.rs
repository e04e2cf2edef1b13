// src/analysis/events.rs
//
// Gesture events emitted by the three detectors. Kept plain so the
// transport side can serialize them without touching detector state.

use serde::{Serialize, Serializer};

use super::{CameraId, EntityId};

pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

// ============================================================================
// GESTURE TYPES
// ============================================================================

/// Per-voice gestures, in the order the detector evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGestureType {
    Raise,
    Lower,
    SwipeLeft,
    SwipeRight,
    Shake,
    Burst,
    Hold,
}

impl VoiceGestureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raise => "raise",
            Self::Lower => "lower",
            Self::SwipeLeft => "swipe_left",
            Self::SwipeRight => "swipe_right",
            Self::Shake => "shake",
            Self::Burst => "burst",
            Self::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepAxis {
    /// Peak moves along a row (left/right)
    Row,
    /// Peak moves along a column (top/bottom)
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepDirection {
    /// Peak index increases: left→right for rows, top→bottom for columns
    Forward,
    /// Peak index decreases: right→left for rows, bottom→top for columns
    Backward,
}

const SWEEP_LR: [&str; 4] = [
    "sweep_lr_top",
    "sweep_lr_upper_mid",
    "sweep_lr_lower_mid",
    "sweep_lr_bottom",
];
const SWEEP_RL: [&str; 4] = [
    "sweep_rl_top",
    "sweep_rl_upper_mid",
    "sweep_rl_lower_mid",
    "sweep_rl_bottom",
];
const SWEEP_TB: [&str; 4] = [
    "sweep_tb_left",
    "sweep_tb_mid_left",
    "sweep_tb_mid_right",
    "sweep_tb_right",
];
const SWEEP_BT: [&str; 4] = [
    "sweep_bt_left",
    "sweep_bt_mid_left",
    "sweep_bt_mid_right",
    "sweep_bt_right",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneGestureType {
    Sweep {
        axis: SweepAxis,
        /// Row index for row sweeps, column index for column sweeps (0..4)
        line: usize,
        direction: SweepDirection,
    },
    PulseZone,
}

impl ZoneGestureType {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Sweep {
                axis,
                line,
                direction,
            } => {
                let table = match (axis, direction) {
                    (SweepAxis::Row, SweepDirection::Forward) => &SWEEP_LR,
                    (SweepAxis::Row, SweepDirection::Backward) => &SWEEP_RL,
                    (SweepAxis::Column, SweepDirection::Forward) => &SWEEP_TB,
                    (SweepAxis::Column, SweepDirection::Backward) => &SWEEP_BT,
                };
                table[line.min(3)]
            }
            Self::PulseZone => "pulse_zone",
        }
    }
}

impl Serialize for ZoneGestureType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalGestureType {
    Eruption,
    Stillness,
}

impl GlobalGestureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eruption => "eruption",
            Self::Stillness => "stillness",
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceGestureEvent {
    pub voice_id: EntityId,
    #[serde(rename = "type")]
    pub gesture: VoiceGestureType,
    pub strength: f32,
    /// Gesture-specific payload: hand height for raise/lower,
    /// hold progress for hold, zero otherwise
    pub extra: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneGestureEvent {
    pub cam_id: CameraId,
    #[serde(rename = "type")]
    pub gesture: ZoneGestureType,
    pub strength: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalGestureEvent {
    #[serde(rename = "type")]
    pub gesture: GlobalGestureType,
    pub strength: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GestureEvent {
    Voice(VoiceGestureEvent),
    Zone(ZoneGestureEvent),
    Global(GlobalGestureEvent),
}

impl GestureEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Voice(e) => e.gesture.as_str(),
            Self::Zone(e) => e.gesture.as_str(),
            Self::Global(e) => e.gesture.as_str(),
        }
    }

    pub fn strength(&self) -> f32 {
        match self {
            Self::Voice(e) => e.strength,
            Self::Zone(e) => e.strength,
            Self::Global(e) => e.strength,
        }
    }
}

impl From<VoiceGestureEvent> for GestureEvent {
    fn from(event: VoiceGestureEvent) -> Self {
        Self::Voice(event)
    }
}

impl From<ZoneGestureEvent> for GestureEvent {
    fn from(event: ZoneGestureEvent) -> Self {
        Self::Zone(event)
    }
}

impl From<GlobalGestureEvent> for GestureEvent {
    fn from(event: GlobalGestureEvent) -> Self {
        Self::Global(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.3), 0.0);
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(0.42), 0.42);
        assert_eq!(clamp01(f32::NAN), 0.0);
    }

    #[test]
    fn test_sweep_names() {
        let lr_top = ZoneGestureType::Sweep {
            axis: SweepAxis::Row,
            line: 0,
            direction: SweepDirection::Forward,
        };
        let bt_mid_right = ZoneGestureType::Sweep {
            axis: SweepAxis::Column,
            line: 2,
            direction: SweepDirection::Backward,
        };
        assert_eq!(lr_top.as_str(), "sweep_lr_top");
        assert_eq!(bt_mid_right.as_str(), "sweep_bt_mid_right");
        assert_eq!(ZoneGestureType::PulseZone.as_str(), "pulse_zone");
    }

    #[test]
    fn test_event_json_shape() {
        let voice = GestureEvent::from(VoiceGestureEvent {
            voice_id: 3,
            gesture: VoiceGestureType::SwipeLeft,
            strength: 0.5,
            extra: 0.0,
        });
        let json = serde_json::to_value(&voice).unwrap();
        assert_eq!(json["kind"], "voice");
        assert_eq!(json["type"], "swipe_left");
        assert_eq!(json["voice_id"], 3);

        let zone = GestureEvent::from(ZoneGestureEvent {
            cam_id: 1,
            gesture: ZoneGestureType::PulseZone,
            strength: 0.25,
            zone_index: Some(5),
        });
        let json = serde_json::to_value(&zone).unwrap();
        assert_eq!(json["kind"], "zone");
        assert_eq!(json["type"], "pulse_zone");
        assert_eq!(json["zone_index"], 5);

        let sweep = GestureEvent::from(ZoneGestureEvent {
            cam_id: 1,
            gesture: ZoneGestureType::Sweep {
                axis: SweepAxis::Row,
                line: 3,
                direction: SweepDirection::Backward,
            },
            strength: 0.25,
            zone_index: None,
        });
        let json = serde_json::to_value(&sweep).unwrap();
        assert_eq!(json["type"], "sweep_rl_bottom");
        assert!(json.get("zone_index").is_none());

        let global = GestureEvent::from(GlobalGestureEvent {
            gesture: GlobalGestureType::Stillness,
            strength: 1.0,
        });
        assert_eq!(global.name(), "stillness");
        let json = serde_json::to_value(&global).unwrap();
        assert_eq!(json["kind"], "global");
        assert_eq!(json["type"], "stillness");
    }
}
