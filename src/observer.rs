//! Fan-out of engine state changes to external listeners.
//!
//! Every mutation the engine applies produces a `RunSnapshot` that is
//! handed to all subscribers in registration order. Snapshots are
//! immutable; a telemetry transport serializes them as-is.

use crate::engine::{ExecutionState, Phase};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Immutable view of a run, captured after each state mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub program_name: String,
    pub phase: Phase,
    pub current_state: String,
    pub step_count: u64,
    pub band_position: usize,
    pub running: bool,
    pub paused: bool,
    pub speed: u8,
    pub errors: Vec<String>,
}

impl RunSnapshot {
    pub(crate) fn capture(program_name: &str, state: &ExecutionState) -> Self {
        Self {
            program_name: program_name.to_string(),
            phase: state.phase,
            current_state: state.current_state.clone(),
            step_count: state.step_count,
            band_position: state.band_position,
            running: state.running,
            paused: state.paused,
            speed: state.speed,
            errors: state.errors.clone(),
        }
    }
}

/// A listener for run snapshots.
///
/// Observers are invoked synchronously between engine state mutations;
/// they must return quickly and must not call back into the engine's
/// subscription surface.
pub trait RunObserver: Send + Sync {
    fn on_update(&self, snapshot: &RunSnapshot);
}

impl<F> RunObserver for F
where
    F: Fn(&RunSnapshot) + Send + Sync,
{
    fn on_update(&self, snapshot: &RunSnapshot) {
        self(snapshot)
    }
}

/// Subscribers, notified in registration order.
#[derive(Default)]
pub struct ObserverSet {
    subscribers: RwLock<Vec<Arc<dyn RunObserver>>>,
}

impl ObserverSet {
    pub fn subscribe(&self, observer: Arc<dyn RunObserver>) {
        self.subscribers.write().push(observer);
    }

    pub fn notify(&self, snapshot: &RunSnapshot) {
        for observer in self.subscribers.read().iter() {
            observer.on_update(snapshot);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn snapshot() -> RunSnapshot {
        RunSnapshot {
            program_name: "Test".to_string(),
            phase: Phase::Stepping,
            current_state: "s0".to_string(),
            step_count: 3,
            band_position: 2,
            running: true,
            paused: false,
            speed: 5,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_notify_in_registration_order() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::default();

        let first = Arc::clone(&log);
        set.subscribe(Arc::new(move |_: &RunSnapshot| first.lock().push("first")));
        let second = Arc::clone(&log);
        set.subscribe(Arc::new(move |_: &RunSnapshot| second.lock().push("second")));

        assert_eq!(set.len(), 2);
        set.notify(&snapshot());
        set.notify(&snapshot());
        assert_eq!(*log.lock(), vec!["first", "second", "first", "second"]);
    }

    #[test]
    fn test_snapshot_wire_format() {
        let json = serde_json::to_value(snapshot()).unwrap();
        for field in [
            "program_name",
            "phase",
            "current_state",
            "step_count",
            "band_position",
            "running",
            "paused",
            "speed",
            "errors",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["phase"], "Stepping");
        assert_eq!(json["step_count"], 3);
    }

    #[test]
    fn test_empty_set_is_quiet() {
        let set = ObserverSet::default();
        assert!(set.is_empty());
        set.notify(&snapshot());
    }
}
