//! Fan-out of alerts to every configured channel.

use chrono::Utc;
use futures::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{AlertRecord, Channel, Notification};
use crate::monitor::{Target, TransitionEvent};
use crate::report::render_alert;

/// Sends notifications to all channels independently.
///
/// Each send is bounded by `send_timeout`. Sends in flight when shutdown
/// fires are abandoned. Both cases are recorded as failed deliveries.
pub struct AlertDispatcher {
    channels: Vec<Channel>,
    send_timeout: Duration,
    shutdown: CancellationToken,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<Channel>, send_timeout: Duration, shutdown: CancellationToken) -> Self {
        Self {
            channels,
            send_timeout,
            shutdown,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Render and send the notice for a transition of `target`.
    ///
    /// Returns one record per channel, in channel order.
    pub async fn dispatch(&self, target: &Target, event: &TransitionEvent) -> Vec<AlertRecord> {
        let notification = render_alert(target, event);
        self.broadcast(&notification).await
    }

    /// Send a notification through every channel concurrently.
    pub async fn broadcast(&self, notification: &Notification) -> Vec<AlertRecord> {
        let sends = self.channels.iter().map(|channel| async move {
            let sent = self.send_one(channel, notification).await;
            AlertRecord {
                target_name: notification.target_name.clone(),
                channel_kind: channel.kind(),
                rendered_subject: notification.subject.clone(),
                sent_successfully: sent,
                timestamp: Utc::now(),
            }
        });

        join_all(sends).await
    }

    async fn send_one(&self, channel: &Channel, notification: &Notification) -> bool {
        // Sends begun after shutdown (probes finishing during the drain) are
        // still attempted, bounded by the timeout.
        if self.shutdown.is_cancelled() {
            return self.send_with_timeout(channel, notification).await;
        }

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                tracing::warn!(
                    "Shutdown interrupted {} delivery for {}",
                    channel.kind(),
                    notification.target_name
                );
                false
            }
            sent = self.send_with_timeout(channel, notification) => sent,
        }
    }

    async fn send_with_timeout(&self, channel: &Channel, notification: &Notification) -> bool {
        match tokio::time::timeout(self.send_timeout, channel.send(notification)).await {
            Ok(sent) => sent,
            Err(_) => {
                tracing::error!(
                    "{} delivery for {} timed out after {:?}",
                    channel.kind(),
                    notification.target_name,
                    self.send_timeout
                );
                false
            }
        }
    }
}
