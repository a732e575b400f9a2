//! Monitor model types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::probe::ProbeOutcome;

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub name: String,
    pub url: String,
    #[serde(serialize_with = "serialize_secs")]
    pub timeout: Duration,
    pub expected_status: u16,
    /// Literal, case-sensitive substring the body must contain.
    pub check_content: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub check_interval: Duration,
}

impl Target {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            timeout: Duration::from_secs(10),
            expected_status: 200,
            check_content: None,
            check_interval: Duration::from_secs(300),
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Health classification of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unknown,
    Up,
    Down,
}

impl Status {
    pub fn from_healthy(healthy: bool) -> Self {
        if healthy {
            Status::Up
        } else {
            Status::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Up => "up",
            Status::Down => "down",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-target state held by the status tracker.
#[derive(Debug, Clone, Serialize)]
pub struct TargetState {
    pub current_status: Status,
    pub last_outcome: Option<ProbeOutcome>,
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl Default for TargetState {
    fn default() -> Self {
        Self {
            current_status: Status::Unknown,
            last_outcome: None,
            last_transition_at: None,
        }
    }
}

/// A change of a target's health classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    pub target_name: String,
    pub previous_status: Status,
    pub new_status: Status,
    pub triggering_outcome: ProbeOutcome,
}

/// Aggregate over all configured targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub total_count: usize,
    pub up_count: usize,
    pub down_count: usize,
    /// Targets not observed yet.
    pub unknown_count: usize,
    pub uptime_percentage: f64,
}

impl StatusSummary {
    /// Summarize a set of statuses. `uptime_percentage` is rounded to two decimals.
    pub fn from_statuses<I: IntoIterator<Item = Status>>(statuses: I) -> Self {
        let mut summary = Self {
            total_count: 0,
            up_count: 0,
            down_count: 0,
            unknown_count: 0,
            uptime_percentage: 0.0,
        };

        for status in statuses {
            summary.total_count += 1;
            match status {
                Status::Up => summary.up_count += 1,
                Status::Down => summary.down_count += 1,
                Status::Unknown => summary.unknown_count += 1,
            }
        }

        if summary.total_count > 0 {
            let pct = summary.up_count as f64 * 100.0 / summary.total_count as f64;
            summary.uptime_percentage = (pct * 100.0).round() / 100.0;
        }

        summary
    }
}
