//! Notification channels and alert dispatch.

mod dispatcher;
mod mail;
mod webhook;

pub use dispatcher::*;
pub use mail::*;
pub use webhook::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Mail,
    Webhook,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Mail => "mail",
            ChannelKind::Webhook => "webhook",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mail" => Ok(ChannelKind::Mail),
            "webhook" => Ok(ChannelKind::Webhook),
            other => Err(format!("unknown channel kind: {}", other)),
        }
    }
}

/// Channel configuration, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    Mail(MailConfig),
    Webhook(WebhookConfig),
}

/// What a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Down,
    Up,
    Digest,
}

/// Content handed to every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Target name, or [`DIGEST_TARGET`] for digests.
    pub target_name: String,
    pub status: NotificationStatus,
    pub subject: String,
    /// HTML body.
    pub body: String,
}

/// Target name recorded for digest deliveries.
pub const DIGEST_TARGET: &str = "digest";

/// One attempted delivery on one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub target_name: String,
    pub channel_kind: ChannelKind,
    pub rendered_subject: String,
    pub sent_successfully: bool,
    pub timestamp: DateTime<Utc>,
}

/// A configured notification destination.
pub enum Channel {
    Mail(MailChannel),
    Webhook(WebhookChannel),
}

impl Channel {
    pub fn from_config(config: &ChannelConfig, client: &reqwest::Client) -> Self {
        match config {
            ChannelConfig::Mail(c) => Channel::Mail(MailChannel::new(c.clone())),
            ChannelConfig::Webhook(c) => {
                Channel::Webhook(WebhookChannel::new(c.clone(), client.clone()))
            }
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Mail(_) => ChannelKind::Mail,
            Channel::Webhook(_) => ChannelKind::Webhook,
        }
    }

    /// Deliver a notification. Returns whether delivery succeeded.
    pub async fn send(&self, notification: &Notification) -> bool {
        match self {
            Channel::Mail(c) => c.send(notification).await,
            Channel::Webhook(c) => c.send(notification).await,
        }
    }
}
