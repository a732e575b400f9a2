//! Scheduler module: drives probe cycles, alerting and the daily digest.

mod retention;

pub use retention::*;

use crate::db::{CheckLog, Store};
use crate::monitor::{summarize, MonitorEngine, Target};
use crate::notify::{AlertDispatcher, AlertRecord};
use crate::probe::{run_probe, Prober};
use crate::report::render_digest;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Timing and parallelism settings.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub probe_interval: Duration,
    /// Local time of day at which the digest is sent.
    pub digest_time: NaiveTime,
    pub max_concurrent_probes: usize,
    /// Check history older than this is pruned. `None` keeps everything.
    pub history_retention: Option<Duration>,
}

/// The single scheduling authority of the monitor.
///
/// A probe cycle waits for all of its probes before returning, and the next
/// cycle only starts after that, so a target never has two probes in flight.
pub struct Scheduler {
    engine: Arc<MonitorEngine>,
    prober: Arc<dyn Prober>,
    dispatcher: Arc<AlertDispatcher>,
    store: Arc<Store>,
    settings: SchedulerSettings,
    last_started: Mutex<HashMap<String, Instant>>,
}

impl Scheduler {
    pub fn new(
        engine: Arc<MonitorEngine>,
        prober: Arc<dyn Prober>,
        dispatcher: Arc<AlertDispatcher>,
        store: Arc<Store>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            engine,
            prober,
            dispatcher,
            store,
            settings,
            last_started: Mutex::new(HashMap::new()),
        }
    }

    /// Run until `shutdown` fires.
    ///
    /// The first probe cycle starts immediately. On shutdown the current cycle
    /// finishes the probes it already started and pending history is flushed
    /// before this returns.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            "Starting scheduler with {} targets, probing every {:?}, digest at {}",
            self.engine.targets().count(),
            self.settings.probe_interval,
            self.settings.digest_time.format("%H:%M")
        );

        let (tx, rx) = mpsc::channel(1000);
        let writer = tokio::spawn(run_batch_writer(rx, self.store.clone()));

        let probes = tokio::spawn(self.clone().run_probe_loop(tx, shutdown.clone()));
        let digests = tokio::spawn(self.clone().run_digest_loop(shutdown.clone()));

        let retention = self.settings.history_retention.map(|keep| {
            let manager = RetentionManager::new(self.store.clone(), keep);
            tokio::spawn(manager.run(shutdown.clone()))
        });

        if let Err(e) = probes.await {
            tracing::error!("Probe loop failed: {}", e);
        }
        if let Err(e) = digests.await {
            tracing::error!("Digest loop failed: {}", e);
        }
        if let Some(handle) = retention {
            if let Err(e) = handle.await {
                tracing::error!("Retention task failed: {}", e);
            }
        }

        // The probe loop owned the last sender, so the writer drains and exits.
        if let Err(e) = writer.await {
            tracing::error!("Batch writer failed: {}", e);
        }

        tracing::info!("Scheduler stopped");
    }

    async fn run_probe_loop(self: Arc<Self>, tx: mpsc::Sender<CheckLog>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.probe_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                tick = interval.tick() => {
                    self.run_cycle(tick.into_std(), &tx, &shutdown).await;
                }
            }
        }
    }

    async fn run_digest_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut last_sent: Option<NaiveDate> = None;

        loop {
            let now = Local::now().naive_local();
            let next = next_digest_at(self.settings.digest_time, now, last_sent);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {
                    self.send_digest().await;
                    last_sent = Some(next.date());
                }
            }
        }
    }

    /// Probe every target due at `started`, with bounded parallelism.
    ///
    /// Every probe of the cycle is stamped with `started`, so a target whose
    /// interval equals the cycle cadence stays due on the next cycle.
    /// Returns the number of probes started. No new probe starts once
    /// `shutdown` has fired, but started probes always complete.
    pub async fn run_cycle(
        self: &Arc<Self>,
        started: Instant,
        tx: &mpsc::Sender<CheckLog>,
        shutdown: &CancellationToken,
    ) -> usize {
        let due = self.due_targets(started);
        if due.is_empty() {
            return 0;
        }

        tracing::debug!("Probe cycle: {} targets due", due.len());

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_probes.max(1)));
        let mut tasks = JoinSet::new();

        for target in due {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            self.last_started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(target.name.clone(), started);

            let this = Arc::clone(self);
            let tx = tx.clone();
            tasks.spawn(async move {
                let _permit = permit; // Hold permit until done
                this.check_target(&target, &tx).await;
            });
        }

        let started = tasks.len();
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Probe task failed: {}", e);
            }
        }

        started
    }

    fn due_targets(&self, now: Instant) -> Vec<Arc<Target>> {
        let last_started = self
            .last_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.engine
            .targets()
            .filter(|t| match last_started.get(&t.name) {
                Some(started) => now.saturating_duration_since(*started) >= t.check_interval,
                None => true,
            })
            .cloned()
            .collect()
    }

    async fn check_target(&self, target: &Target, tx: &mpsc::Sender<CheckLog>) {
        let outcome = run_probe(self.prober.as_ref(), target).await;

        if outcome.healthy {
            tracing::info!(
                "{} up - {:.2}ms",
                target.name,
                outcome.response_time_ms.unwrap_or_default()
            );
        } else {
            tracing::warn!(
                "{} down - {}",
                target.name,
                outcome
                    .failure_reason
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_default()
            );
        }

        let log = CheckLog::new(target.url.clone(), outcome.clone());
        if tx.send(log).await.is_err() {
            tracing::error!("Failed to queue check result for {}", target.name);
        }

        if let Some(event) = self.engine.observe(outcome) {
            tracing::warn!(
                "Status change: {} {} -> {}",
                event.target_name,
                event.previous_status,
                event.new_status
            );
            let records = self.dispatcher.dispatch(target, &event).await;
            self.record_alerts(&records);
        }
    }

    /// Render the digest from the current state and send it on every channel.
    pub async fn send_digest(&self) -> Vec<AlertRecord> {
        let snapshot = self.engine.snapshot();
        let summary = summarize(&snapshot);

        tracing::info!(
            "Sending digest: {}/{} targets up ({}%)",
            summary.up_count,
            summary.total_count,
            summary.uptime_percentage
        );

        let digest = render_digest(&summary, &snapshot, &Local::now());
        let records = self.dispatcher.broadcast(&digest.into()).await;
        self.record_alerts(&records);
        records
    }

    fn record_alerts(&self, records: &[AlertRecord]) {
        if let Err(e) = self.store.record_alerts(records) {
            tracing::error!("Failed to record alerts: {}", e);
        }
    }
}

/// Next wall-clock occurrence of `at` after `now`, skipping the date of the
/// last digest sent.
pub fn next_digest_at(
    at: NaiveTime,
    now: NaiveDateTime,
    last_sent: Option<NaiveDate>,
) -> NaiveDateTime {
    let mut next = now.date().and_time(at);
    while next <= now || Some(next.date()) == last_sent {
        next += chrono::Duration::days(1);
    }
    next
}

/// Run the batch writer that accumulates and flushes check results.
async fn run_batch_writer(mut rx: mpsc::Receiver<CheckLog>, store: Arc<Store>) {
    let mut buffer: Vec<CheckLog> = Vec::with_capacity(100);
    let mut interval = tokio::time::interval(Duration::from_secs(2));

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Some(r) => {
                        buffer.push(r);
                        if buffer.len() >= 500 {
                            flush_buffer(&store, &mut buffer);
                        }
                    }
                    None => {
                        // Channel closed, flush remaining and exit
                        flush_buffer(&store, &mut buffer);
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                flush_buffer(&store, &mut buffer);
            }
        }
    }
}

fn flush_buffer(store: &Store, buffer: &mut Vec<CheckLog>) {
    if buffer.is_empty() {
        return;
    }

    if let Err(e) = store.record_checks(buffer) {
        tracing::error!("Failed to flush check results: {}", e);
    }

    buffer.clear();
}
