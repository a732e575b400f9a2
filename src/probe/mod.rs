//! Probe module for website health checks.

mod http;

pub use http::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::monitor::Target;

/// Why a probe was classified unhealthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    ConnectionError,
    StatusMismatch(u16),
    ContentMismatch,
    /// Anything the transport could not classify further.
    Other(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::ConnectionError => f.write_str("connection_error"),
            FailureReason::StatusMismatch(code) => write!(f, "status_mismatch:{}", code),
            FailureReason::ContentMismatch => f.write_str("content_mismatch"),
            FailureReason::Other(msg) => write!(f, "error:{}", msg),
        }
    }
}

impl FromStr for FailureReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reason = match s {
            "timeout" => FailureReason::Timeout,
            "connection_error" => FailureReason::ConnectionError,
            "content_mismatch" => FailureReason::ContentMismatch,
            other => {
                if let Some(code) = other
                    .strip_prefix("status_mismatch:")
                    .and_then(|c| c.parse().ok())
                {
                    FailureReason::StatusMismatch(code)
                } else {
                    let msg = other.strip_prefix("error:").unwrap_or(other);
                    FailureReason::Other(msg.to_string())
                }
            }
        };
        Ok(reason)
    }
}

impl Serialize for FailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The result of a single probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub target_name: String,
    pub observed_at: DateTime<Utc>,
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub failure_reason: Option<FailureReason>,
}

impl ProbeOutcome {
    pub fn up(target_name: &str, status_code: u16, response_time_ms: f64) -> Self {
        Self {
            target_name: target_name.to_string(),
            observed_at: Utc::now(),
            healthy: true,
            status_code: Some(status_code),
            response_time_ms: Some(response_time_ms),
            failure_reason: None,
        }
    }

    pub fn down(target_name: &str, reason: FailureReason) -> Self {
        Self {
            target_name: target_name.to_string(),
            observed_at: Utc::now(),
            healthy: false,
            status_code: None,
            response_time_ms: None,
            failure_reason: Some(reason),
        }
    }
}

/// Something that can check a target.
///
/// Implementations never fail: every failure mode is folded into an
/// unhealthy [`ProbeOutcome`].
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> ProbeOutcome;
}

/// Run a probe after a short random delay.
pub async fn run_probe(prober: &dyn Prober, target: &Target) -> ProbeOutcome {
    // Add jitter to avoid thundering herd
    let jitter = rand::random::<u64>() % 100;
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    prober.probe(target).await
}
