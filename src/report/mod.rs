//! Rendering of alert notices and the periodic digest.
//!
//! Templates are plain HTML with `{{placeholder}}` substitution.

use chrono::{DateTime, Local, TimeZone};
use std::collections::BTreeMap;

use crate::monitor::{Status, StatusSummary, Target, TargetState, TransitionEvent};
use crate::notify::{Notification, NotificationStatus, DIGEST_TARGET};

const ALERT_DOWN_TEMPLATE: &str = include_str!("templates/alert_down.html");
const ALERT_UP_TEMPLATE: &str = include_str!("templates/alert_up.html");
const DIGEST_TEMPLATE: &str = include_str!("templates/digest.html");
const DIGEST_ROW_TEMPLATE: &str = include_str!("templates/digest_row.html");

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A rendered digest, ready to hand to the notification channels.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDigest {
    pub subject: String,
    pub body: String,
}

impl From<RenderedDigest> for Notification {
    fn from(digest: RenderedDigest) -> Self {
        Notification {
            target_name: DIGEST_TARGET.to_string(),
            status: NotificationStatus::Digest,
            subject: digest.subject,
            body: digest.body,
        }
    }
}

/// Render the notice for a transition of `target`.
pub fn render_alert(target: &Target, event: &TransitionEvent) -> Notification {
    let outcome = &event.triggering_outcome;
    let time = local_time(outcome.observed_at).format(TIME_FORMAT).to_string();

    let (status, subject, body) = match event.new_status {
        Status::Up => {
            let body = ALERT_UP_TEMPLATE
                .replace("{{name}}", &escape(&target.name))
                .replace("{{url}}", &escape(&target.url))
                .replace("{{response_time}}", &format_response_time(outcome.response_time_ms))
                .replace(
                    "{{status_code}}",
                    &outcome
                        .status_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "N/A".to_string()),
                )
                .replace("{{time}}", &time);
            (
                NotificationStatus::Up,
                format!("[RECOVERED] Website back online: {}", target.name),
                body,
            )
        }
        _ => {
            let reason = outcome
                .failure_reason
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let body = ALERT_DOWN_TEMPLATE
                .replace("{{name}}", &escape(&target.name))
                .replace("{{url}}", &escape(&target.url))
                .replace("{{reason}}", &escape(&reason))
                .replace("{{time}}", &time);
            (
                NotificationStatus::Down,
                format!("[DOWN] Website outage: {}", target.name),
                body,
            )
        }
    };

    Notification {
        target_name: target.name.clone(),
        status,
        subject,
        body,
    }
}

/// Render the digest for a summary and the per-target snapshot it was computed from.
pub fn render_digest<Tz: TimeZone>(
    summary: &StatusSummary,
    snapshot: &BTreeMap<String, TargetState>,
    generated_at: &DateTime<Tz>,
) -> RenderedDigest
where
    Tz::Offset: std::fmt::Display,
{
    let date = generated_at.format("%Y-%m-%d").to_string();

    let rows: String = snapshot
        .iter()
        .map(|(name, state)| {
            let color = match state.current_status {
                Status::Up => "green",
                Status::Down => "red",
                Status::Unknown => "gray",
            };
            let outcome = state.last_outcome.as_ref();
            let checked_at = outcome
                .map(|o| local_time(o.observed_at).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());

            DIGEST_ROW_TEMPLATE
                .replace("{{name}}", &escape(name))
                .replace("{{color}}", color)
                .replace("{{status}}", state.current_status.as_str())
                .replace(
                    "{{response_time}}",
                    &format_response_time(outcome.and_then(|o| o.response_time_ms)),
                )
                .replace("{{checked_at}}", &checked_at)
        })
        .collect();

    let body = DIGEST_TEMPLATE
        .replace("{{date}}", &date)
        .replace("{{total}}", &summary.total_count.to_string())
        .replace("{{up}}", &summary.up_count.to_string())
        .replace("{{down}}", &summary.down_count.to_string())
        .replace("{{unknown}}", &summary.unknown_count.to_string())
        .replace("{{uptime}}", &format!("{:.2}", summary.uptime_percentage))
        .replace("{{rows}}", &rows);

    RenderedDigest {
        subject: format!("Daily monitoring report - {}", date),
        body,
    }
}

fn local_time<Tz: TimeZone>(t: DateTime<Tz>) -> DateTime<Local> {
    t.with_timezone(&Local)
}

fn format_response_time(ms: Option<f64>) -> String {
    match ms {
        Some(ms) => format!("{:.2}ms", ms),
        None => "N/A".to_string(),
    }
}

/// Minimal HTML escaping for values placed into templates.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
