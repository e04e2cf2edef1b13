// src/pipeline/event_bus.rs
//
// Hand-off queue between the engine and whatever ships events out
// (the replay writer today, a network sender in a live rig). The engine
// publishes; the consumer drains in order.

use crate::analysis::GestureEvent;
use std::collections::VecDeque;
use tracing::warn;

pub struct EventBus {
    events: VecDeque<GestureEvent>,
    max_pending: usize,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: GestureEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn publish_all(&mut self, events: impl IntoIterator<Item = GestureEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn drain(&mut self) -> Vec<GestureEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.max_pending
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{GlobalGestureEvent, GlobalGestureType};

    fn global(strength: f32) -> GestureEvent {
        GestureEvent::Global(GlobalGestureEvent {
            gesture: GlobalGestureType::Eruption,
            strength,
        })
    }

    #[test]
    fn test_drain_preserves_order() {
        let mut bus = EventBus::new(8);
        bus.publish_all([global(0.1), global(0.2), global(0.3)]);
        assert_eq!(bus.pending_count(), 3);

        let strengths: Vec<f32> = bus.drain().iter().map(|e| e.strength()).collect();
        assert_eq!(strengths, vec![0.1, 0.2, 0.3]);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_oldest() {
        let mut bus = EventBus::new(2);
        bus.publish(global(0.1));
        assert!(!bus.is_full());
        bus.publish(global(0.2));
        assert!(bus.is_full());
        bus.publish(global(0.3));
        assert_eq!(bus.dropped_count(), 1);

        let strengths: Vec<f32> = bus.drain().iter().map(|e| e.strength()).collect();
        assert_eq!(strengths, vec![0.2, 0.3]);
    }
}
