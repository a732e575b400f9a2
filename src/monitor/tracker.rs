//! Per-target health state machine.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::model::{Status, TargetState, TransitionEvent};
use crate::probe::ProbeOutcome;

/// Turns probe outcomes into transition events.
///
/// The first outcome for a target only establishes its baseline. Unless
/// `alert_on_baseline_down` is set, no event is produced for it even when
/// the target starts out down.
#[derive(Debug, Default)]
pub struct StatusTracker {
    states: RwLock<HashMap<String, TargetState>>,
    alert_on_baseline_down: bool,
}

impl StatusTracker {
    pub fn new(alert_on_baseline_down: bool) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            alert_on_baseline_down,
        }
    }

    /// Record an outcome and return the transition it caused, if any.
    pub fn observe(&self, outcome: ProbeOutcome) -> Option<TransitionEvent> {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(outcome.target_name.clone()).or_default();

        let previous = state.current_status;
        let new_status = Status::from_healthy(outcome.healthy);

        if previous == new_status {
            state.last_outcome = Some(outcome);
            return None;
        }

        state.current_status = new_status;
        state.last_transition_at = Some(outcome.observed_at);
        state.last_outcome = Some(outcome.clone());

        let alert = match previous {
            Status::Unknown => self.alert_on_baseline_down && new_status == Status::Down,
            _ => true,
        };
        if !alert {
            return None;
        }

        Some(TransitionEvent {
            target_name: outcome.target_name.clone(),
            previous_status: previous,
            new_status,
            triggering_outcome: outcome,
        })
    }

    /// Copy of all observed states.
    pub fn snapshot(&self) -> HashMap<String, TargetState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FailureReason;

    fn healthy(name: &str) -> ProbeOutcome {
        ProbeOutcome::up(name, 200, 12.5)
    }

    fn unhealthy(name: &str) -> ProbeOutcome {
        ProbeOutcome::down(name, FailureReason::Timeout)
    }

    #[test]
    fn test_first_observation_is_baseline() {
        let tracker = StatusTracker::default();
        assert!(tracker.observe(healthy("a")).is_none());
        assert!(tracker.observe(unhealthy("b")).is_none());

        assert_eq!(tracker.snapshot()["a"].current_status, Status::Up);
        let b = tracker.snapshot()["b"].clone();
        assert_eq!(b.current_status, Status::Down);
        assert!(b.last_transition_at.is_some());
    }

    #[test]
    fn test_up_up_down_emits_one_event() {
        let tracker = StatusTracker::default();
        assert!(tracker.observe(healthy("t")).is_none());
        assert!(tracker.observe(healthy("t")).is_none());

        let third = unhealthy("t");
        let event = tracker.observe(third.clone()).expect("down transition");
        assert_eq!(event.target_name, "t");
        assert_eq!(event.previous_status, Status::Up);
        assert_eq!(event.new_status, Status::Down);
        assert_eq!(event.triggering_outcome, third);
    }

    #[test]
    fn test_stable_status_updates_last_outcome_only() {
        let tracker = StatusTracker::default();
        tracker.observe(unhealthy("t"));
        let first_transition = tracker.snapshot()["t"].last_transition_at;

        let mut later = unhealthy("t");
        later.failure_reason = Some(FailureReason::ConnectionError);
        assert!(tracker.observe(later.clone()).is_none());

        let state = tracker.snapshot()["t"].clone();
        assert_eq!(state.current_status, Status::Down);
        assert_eq!(state.last_transition_at, first_transition);
        assert_eq!(state.last_outcome, Some(later));
    }

    #[test]
    fn test_every_flip_emits_exactly_one_event() {
        let tracker = StatusTracker::default();
        tracker.observe(healthy("t"));

        let seq = [false, false, true, true, false, true];
        let events: Vec<_> = seq
            .iter()
            .filter_map(|&h| tracker.observe(if h { healthy("t") } else { unhealthy("t") }))
            .collect();

        let directions: Vec<_> = events
            .iter()
            .map(|e| (e.previous_status, e.new_status))
            .collect();
        assert_eq!(
            directions,
            vec![
                (Status::Up, Status::Down),
                (Status::Down, Status::Up),
                (Status::Up, Status::Down),
                (Status::Down, Status::Up),
            ]
        );
    }

    #[test]
    fn test_targets_are_independent() {
        let tracker = StatusTracker::default();
        tracker.observe(healthy("a"));
        tracker.observe(unhealthy("b"));

        assert!(tracker.observe(healthy("b")).is_some());
        assert!(tracker.observe(healthy("a")).is_none());
        assert_eq!(tracker.snapshot().len(), 2);
    }

    #[test]
    fn test_baseline_down_alert_when_enabled() {
        let tracker = StatusTracker::new(true);
        let event = tracker.observe(unhealthy("t")).expect("baseline alert");
        assert_eq!(event.previous_status, Status::Unknown);
        assert_eq!(event.new_status, Status::Down);

        // Baseline up still never alerts
        assert!(tracker.observe(healthy("u")).is_none());
    }
}
