//! The monitor engine: target registry plus tracked state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::model::{StatusSummary, Target, TargetState, TransitionEvent};
use super::tracker::StatusTracker;
use crate::probe::ProbeOutcome;

/// Owns the configured targets and their health state.
#[derive(Debug)]
pub struct MonitorEngine {
    targets: BTreeMap<String, Arc<Target>>,
    tracker: StatusTracker,
}

impl MonitorEngine {
    pub fn new(targets: Vec<Target>, alert_on_baseline_down: bool) -> Self {
        let targets = targets
            .into_iter()
            .map(|t| (t.name.clone(), Arc::new(t)))
            .collect();

        Self {
            targets,
            tracker: StatusTracker::new(alert_on_baseline_down),
        }
    }

    /// Targets ordered by name.
    pub fn targets(&self) -> impl Iterator<Item = &Arc<Target>> {
        self.targets.values()
    }

    pub fn target(&self, name: &str) -> Option<&Arc<Target>> {
        self.targets.get(name)
    }

    pub fn observe(&self, outcome: ProbeOutcome) -> Option<TransitionEvent> {
        self.tracker.observe(outcome)
    }

    /// State of every configured target. Targets not probed yet report `Unknown`.
    pub fn snapshot(&self) -> BTreeMap<String, TargetState> {
        let mut observed: HashMap<String, TargetState> = self.tracker.snapshot();
        self.targets
            .keys()
            .map(|name| (name.clone(), observed.remove(name).unwrap_or_default()))
            .collect()
    }

    pub fn summary(&self) -> StatusSummary {
        summarize(&self.snapshot())
    }
}

/// Summarize a snapshot.
pub fn summarize(snapshot: &BTreeMap<String, TargetState>) -> StatusSummary {
    StatusSummary::from_statuses(snapshot.values().map(|s| s.current_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Status;
    use crate::probe::FailureReason;

    fn engine() -> MonitorEngine {
        MonitorEngine::new(
            vec![
                Target::new("beta", "http://beta.example"),
                Target::new("alpha", "http://alpha.example"),
            ],
            false,
        )
    }

    #[test]
    fn test_snapshot_covers_unprobed_targets() {
        let engine = engine();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.values().all(|s| s.current_status == Status::Unknown));

        let summary = engine.summary();
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.unknown_count, 2);
        assert_eq!(summary.uptime_percentage, 0.0);
    }

    #[test]
    fn test_summary_one_up_one_down() {
        let engine = engine();
        engine.observe(ProbeOutcome::up("alpha", 200, 10.0));
        engine.observe(ProbeOutcome::down("beta", FailureReason::ConnectionError));

        let summary = engine.summary();
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.up_count, 1);
        assert_eq!(summary.down_count, 1);
        assert_eq!(summary.uptime_percentage, 50.0);
        assert_eq!(engine.snapshot()["beta"].current_status, Status::Down);
    }

    #[test]
    fn test_targets_sorted_by_name() {
        let engine = engine();
        let names: Vec<_> = engine.targets().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(engine.target("alpha").is_some());
        assert!(engine.target("gamma").is_none());
    }
}
