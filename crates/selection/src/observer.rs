//! Observer sinks for orchestration events.

use std::sync::{Arc, Mutex, PoisonError};

use crate::events::OrchestrationEvent;

/// Receives orchestration events.
///
/// Implementations must be cheap and must not block; they are called inline
/// from the orchestration task.
pub trait OrchestrationObserver: Send + Sync {
    fn on_event(&self, event: &OrchestrationEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl OrchestrationObserver for NoOpObserver {
    fn on_event(&self, _event: &OrchestrationEvent) {}
}

/// Writes events as structured tracing records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl OrchestrationObserver for TracingObserver {
    fn on_event(&self, event: &OrchestrationEvent) {
        match event {
            OrchestrationEvent::Started(d) => {
                tracing::info!(selection_id = %d.selection_id, key = %d.key, round_trip = d.round_trip, "selection started");
            }
            OrchestrationEvent::Transitioned(d) => {
                tracing::debug!(selection_id = %d.selection_id, from = %d.from, to = %d.to, "state transition");
            }
            OrchestrationEvent::CartAcquired(d) => {
                tracing::info!(selection_id = %d.selection_id, cart_id = %d.cart_id, replacement = d.replacement, "cart acquired");
            }
            OrchestrationEvent::CartRedirected(d) => {
                tracing::info!(selection_id = %d.selection_id, from = %d.from, to = %d.to, "cart redirected by upstream");
            }
            OrchestrationEvent::LegAdded(d) => {
                tracing::info!(selection_id = %d.selection_id, leg = %d.leg, cart_id = %d.cart_id, item_count = d.item_count, "leg added");
            }
            OrchestrationEvent::CartInvalidated(d) => {
                tracing::warn!(selection_id = %d.selection_id, leg = %d.leg, cart_id = %d.cart_id, reason = %d.reason, "cart invalidated");
            }
            OrchestrationEvent::Completed(d) => {
                tracing::info!(selection_id = %d.selection_id, cart_id = %d.cart_id, leg_count = d.leg_count, "selection completed");
            }
            OrchestrationEvent::Failed(d) => {
                tracing::warn!(selection_id = %d.selection_id, state = %d.state, code = %d.code, error = %d.error, "selection failed");
            }
        }
    }
}

/// Keeps every event in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<OrchestrationEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events seen so far.
    pub fn events(&self) -> Vec<OrchestrationEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the type names of the events seen so far.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.event_type()).collect()
    }
}

impl OrchestrationObserver for RecordingObserver {
    fn on_event(&self, event: &OrchestrationEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransitionData;
    use crate::state::OrchestrationState;
    use common::SelectionId;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        let id = SelectionId::new();
        for (from, to) in [
            (OrchestrationState::Acquiring, OrchestrationState::AddingOutbound),
            (OrchestrationState::AddingOutbound, OrchestrationState::Complete),
        ] {
            observer.on_event(&OrchestrationEvent::Transitioned(TransitionData {
                selection_id: id,
                from,
                to,
            }));
        }

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            OrchestrationEvent::Transitioned(d) if d.to == OrchestrationState::Complete
        ));
        assert_eq!(observer.event_types(), vec!["Transitioned", "Transitioned"]);
    }

    #[test]
    fn test_clones_share_events() {
        let observer = RecordingObserver::new();
        let sink: Arc<dyn OrchestrationObserver> = Arc::new(observer.clone());
        sink.on_event(&OrchestrationEvent::Transitioned(TransitionData {
            selection_id: SelectionId::new(),
            from: OrchestrationState::Acquiring,
            to: OrchestrationState::Failed,
        }));
        assert_eq!(observer.events().len(), 1);
    }
}
