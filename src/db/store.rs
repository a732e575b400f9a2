//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use crate::notify::{AlertRecord, ChannelKind};
use crate::probe::ProbeOutcome;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("connection lock poisoned")]
    Poisoned,
    #[error("invalid duration: {0:?}")]
    Duration(Duration),
}

/// One row of check history: an outcome and the url that was probed.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckLog {
    pub url: String,
    pub outcome: ProbeOutcome,
}

impl CheckLog {
    pub fn new(url: impl Into<String>, outcome: ProbeOutcome) -> Self {
        Self {
            url: url.into(),
            outcome,
        }
    }
}

/// Thread-safe, append-mostly history store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Check history ---

    /// Append check results in one transaction.
    pub fn record_checks(&self, checks: &[CheckLog]) -> Result<(), DbError> {
        if checks.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO check_logs (target_name, url, observed_at, healthy, status_code, response_time_ms, failure_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for check in checks {
                let o = &check.outcome;
                stmt.execute(params![
                    o.target_name,
                    check.url,
                    format_db_time(o.observed_at),
                    o.healthy,
                    o.status_code,
                    o.response_time_ms,
                    o.failure_reason.as_ref().map(|r| r.to_string()),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Outcomes for a target observed within `since` of now, newest first.
    pub fn query_history(
        &self,
        target_name: &str,
        since: Duration,
    ) -> Result<Vec<ProbeOutcome>, DbError> {
        let window = chrono::Duration::from_std(since).map_err(|_| DbError::Duration(since))?;
        let cutoff = Utc::now() - window;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT target_name, observed_at, healthy, status_code, response_time_ms, failure_reason
             FROM check_logs
             WHERE target_name = ?1 AND observed_at >= ?2
             ORDER BY observed_at DESC, id DESC",
        )?;

        let outcomes = stmt
            .query_map(params![target_name, format_db_time(cutoff)], outcome_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(outcomes)
    }

    /// Delete check history older than `cutoff`. Returns the number of rows removed.
    pub fn delete_checks_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM check_logs WHERE observed_at < ?1",
            params![format_db_time(cutoff)],
        )?;
        Ok(removed)
    }

    // --- Alert log ---

    /// Append alert attempts in one transaction.
    pub fn record_alerts(&self, records: &[AlertRecord]) -> Result<(), DbError> {
        if records.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO alert_logs (target_name, channel_kind, subject, sent_successfully, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for r in records {
                stmt.execute(params![
                    r.target_name,
                    r.channel_kind.as_str(),
                    r.rendered_subject,
                    r.sent_successfully,
                    format_db_time(r.timestamp),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Most recent alert attempts, newest first.
    pub fn recent_alerts(&self, limit: u32) -> Result<Vec<AlertRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT target_name, channel_kind, subject, sent_successfully, timestamp
             FROM alert_logs ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;

        let records = stmt
            .query_map(params![limit], |row| {
                let kind: String = row.get(1)?;
                let time_str: String = row.get(4)?;
                Ok(AlertRecord {
                    target_name: row.get(0)?,
                    channel_kind: kind.parse().unwrap_or(ChannelKind::Webhook),
                    rendered_subject: row.get(2)?,
                    sent_successfully: row.get(3)?,
                    timestamp: parse_db_time(&time_str).unwrap_or_else(Utc::now),
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(records)
    }
}

fn outcome_from_row(row: &Row<'_>) -> SqlResult<ProbeOutcome> {
    let time_str: String = row.get(1)?;
    let reason: Option<String> = row.get(5)?;
    Ok(ProbeOutcome {
        target_name: row.get(0)?,
        observed_at: parse_db_time(&time_str).unwrap_or_else(Utc::now),
        healthy: row.get(2)?,
        status_code: row.get(3)?,
        response_time_ms: row.get(4)?,
        failure_reason: reason.and_then(|r| r.parse().ok()),
    })
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
