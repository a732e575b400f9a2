//! Mail notification channel.
//!
//! Messages are handed to a sendmail-compatible binary, which owns
//! delivery and any retry policy.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::Notification;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub to: Vec<String>,
    #[serde(default = "default_sendmail_path")]
    pub sendmail_path: String,
}

fn default_sendmail_path() -> String {
    "/usr/sbin/sendmail".to_string()
}

pub struct MailChannel {
    config: MailConfig,
}

impl MailChannel {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Build an HTML mail message with headers.
    pub fn build_message(&self, notification: &Notification) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{}\r\n",
            self.config.from,
            self.config.to.join(", "),
            notification.subject.replace(['\r', '\n'], " "),
            Utc::now().to_rfc2822(),
            notification.body,
        )
    }

    pub async fn send(&self, notification: &Notification) -> bool {
        let mut child = match Command::new(&self.config.sendmail_path)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(
                    "Mail: failed to execute {}: {}",
                    self.config.sendmail_path,
                    e
                );
                return false;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let message = self.build_message(notification);
            // The exit status decides the outcome; a closed pipe alone does not.
            if let Err(e) = stdin.write_all(message.as_bytes()).await {
                tracing::debug!("Mail: writing message failed: {}", e);
            }
        }

        match child.wait_with_output().await {
            Ok(output) if output.status.success() => {
                tracing::info!("Mail alert sent: {}", notification.subject);
                true
            }
            Ok(output) => {
                tracing::error!(
                    "Mail delivery failed ({}): {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                tracing::error!("Mail delivery failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationStatus;

    fn channel(sendmail_path: &str) -> MailChannel {
        MailChannel::new(MailConfig {
            from: "monitor@example.com".to_string(),
            to: vec!["ops@example.com".to_string(), "dev@example.com".to_string()],
            sendmail_path: sendmail_path.to_string(),
        })
    }

    fn notification() -> Notification {
        Notification {
            target_name: "site".to_string(),
            status: NotificationStatus::Up,
            subject: "Site recovered\nBcc: evil@example.com".to_string(),
            body: "<p>ok</p>".to_string(),
        }
    }

    #[test]
    fn test_build_message_headers() {
        let msg = channel("sendmail").build_message(&notification());
        assert!(msg.starts_with("From: monitor@example.com\r\n"));
        assert!(msg.contains("To: ops@example.com, dev@example.com\r\n"));
        assert!(msg.contains("Subject: Site recovered Bcc: evil@example.com\r\n"));
        assert!(msg.contains("Content-Type: text/html; charset=utf-8\r\n\r\n<p>ok</p>"));
    }

    #[tokio::test]
    async fn test_send_reports_exit_status() {
        assert!(channel("true").send(&notification()).await);
        assert!(!channel("false").send(&notification()).await);
    }

    #[tokio::test]
    async fn test_send_missing_binary_fails() {
        let ch = channel("/nonexistent/sendmail");
        assert!(!ch.send(&notification()).await);
    }
}
