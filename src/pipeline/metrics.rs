// src/pipeline/metrics.rs
//
// Run counters for one engine. Logged at the end of each replay and
// serializable for a status endpoint.

use crate::analysis::GestureEvent;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub total_ticks: u64,
    pub voice_samples: u64,
    pub dropped_samples: u64,
    pub voice_events: u64,
    pub zone_events: u64,
    pub global_events: u64,
    pub malformed_grids: u64,
    pub pruned_voices: u64,
    pub pruned_cameras: u64,
    pub first_tick_ms: Option<u64>,
    pub last_tick_ms: Option<u64>,
    per_gesture: BTreeMap<&'static str, u64>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self, timestamp_ms: u64) {
        self.total_ticks += 1;
        self.first_tick_ms.get_or_insert(timestamp_ms);
        self.last_tick_ms = Some(timestamp_ms);
    }

    pub fn record_event(&mut self, event: &GestureEvent) {
        match event {
            GestureEvent::Voice(_) => self.voice_events += 1,
            GestureEvent::Zone(_) => self.zone_events += 1,
            GestureEvent::Global(_) => self.global_events += 1,
        }
        *self.per_gesture.entry(event.name()).or_insert(0) += 1;
    }

    pub fn total_events(&self) -> u64 {
        self.voice_events + self.zone_events + self.global_events
    }

    /// Replayed span in seconds (telemetry time, not wall time).
    pub fn span_secs(&self) -> f64 {
        match (self.first_tick_ms, self.last_tick_ms) {
            (Some(first), Some(last)) => last.saturating_sub(first) as f64 / 1000.0,
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_ticks: self.total_ticks,
            span_secs: self.span_secs(),
            voice_samples: self.voice_samples,
            dropped_samples: self.dropped_samples,
            voice_events: self.voice_events,
            zone_events: self.zone_events,
            global_events: self.global_events,
            malformed_grids: self.malformed_grids,
            pruned_voices: self.pruned_voices,
            pruned_cameras: self.pruned_cameras,
            per_gesture: self
                .per_gesture
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub span_secs: f64,
    pub voice_samples: u64,
    pub dropped_samples: u64,
    pub voice_events: u64,
    pub zone_events: u64,
    pub global_events: u64,
    pub malformed_grids: u64,
    pub pruned_voices: u64,
    pub pruned_cameras: u64,
    pub per_gesture: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        GlobalGestureEvent, GlobalGestureType, VoiceGestureEvent, VoiceGestureType,
    };

    #[test]
    fn test_counts_by_kind_and_gesture() {
        let mut metrics = PipelineMetrics::new();
        metrics.record_tick(1000);
        metrics.record_tick(3500);

        let raise = GestureEvent::Voice(VoiceGestureEvent {
            voice_id: 1,
            gesture: VoiceGestureType::Raise,
            strength: 1.0,
            extra: 0.3,
        });
        let eruption = GestureEvent::Global(GlobalGestureEvent {
            gesture: GlobalGestureType::Eruption,
            strength: 0.5,
        });
        metrics.record_event(&raise);
        metrics.record_event(&raise);
        metrics.record_event(&eruption);

        assert_eq!(metrics.total_events(), 3);
        let summary = metrics.summary();
        assert_eq!(summary.total_ticks, 2);
        assert!((summary.span_secs - 2.5).abs() < 1e-9);
        assert_eq!(summary.voice_events, 2);
        assert_eq!(summary.global_events, 1);
        assert_eq!(summary.per_gesture.get("raise"), Some(&2));
        assert_eq!(summary.per_gesture.get("eruption"), Some(&1));
    }

    #[test]
    fn test_empty_run_has_zero_span() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.span_secs(), 0.0);
        assert_eq!(metrics.summary().total_ticks, 0);
    }
}
