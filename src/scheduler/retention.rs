//! Retention manager for pruning old check history.

use crate::db::Store;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deletes check history older than the retention period.
pub struct RetentionManager {
    store: Arc<Store>,
    keep: Duration,
    period: Duration,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>, keep: Duration) -> Self {
        Self {
            store,
            keep,
            period: Duration::from_secs(3600),
        }
    }

    /// Prune every hour until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.process_retention();
                }
            }
        }
    }

    /// Delete everything older than the retention period. Returns rows removed.
    pub fn process_retention(&self) -> usize {
        let keep = match chrono::Duration::from_std(self.keep) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("RetentionManager: invalid retention {:?}: {}", self.keep, e);
                return 0;
            }
        };

        match self.store.delete_checks_before(Utc::now() - keep) {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!("RetentionManager: pruned {} check records", removed);
                }
                removed
            }
            Err(e) => {
                tracing::error!("RetentionManager: failed to prune check history: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CheckLog;
    use crate::probe::ProbeOutcome;
    use tempfile::NamedTempFile;

    #[test]
    fn test_process_retention() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());

        let mut old = ProbeOutcome::up("site", 200, 1.0);
        old.observed_at = Utc::now() - chrono::Duration::days(10);
        store
            .record_checks(&[
                CheckLog::new("https://site.example", old),
                CheckLog::new("https://site.example", ProbeOutcome::up("site", 200, 2.0)),
            ])
            .unwrap();

        let manager = RetentionManager::new(store.clone(), Duration::from_secs(7 * 24 * 3600));
        assert_eq!(manager.process_retention(), 1);
        assert_eq!(manager.process_retention(), 0);

        let left = store
            .query_history("site", Duration::from_secs(30 * 24 * 3600))
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].response_time_ms, Some(2.0));
    }
}
