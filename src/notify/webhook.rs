//! Webhook notification channel.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Notification;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// Posts a JSON payload to a configured URL.
pub struct WebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub async fn send(&self, notification: &Notification) -> bool {
        let method = match reqwest::Method::from_bytes(self.config.method.as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                tracing::error!("Webhook: invalid method {}", self.config.method);
                return false;
            }
        };

        let payload = serde_json::json!({
            "target": notification.target_name,
            "status": notification.status,
            "subject": notification.subject,
            "message": notification.body,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let mut request = self.client.request(method, &self.config.url).json(&payload);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("Webhook alert sent for {}", notification.target_name);
                true
            }
            Ok(resp) => {
                tracing::error!(
                    "Webhook delivery for {} failed with status {}",
                    notification.target_name,
                    resp.status()
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    "Webhook delivery for {} failed: {}",
                    notification.target_name,
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationStatus;
    use crate::testing::serve;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{post, put},
        Json, Router,
    };
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<(HeaderMap, serde_json::Value)>>>;

    fn notification() -> Notification {
        Notification {
            target_name: "site".to_string(),
            status: NotificationStatus::Down,
            subject: "Site down".to_string(),
            body: "<p>timeout</p>".to_string(),
        }
    }

    async fn record(
        State(received): State<Received>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        received.lock().unwrap().push((headers, body));
        StatusCode::OK
    }

    #[tokio::test]
    async fn test_webhook_delivers_payload() {
        let received: Received = Arc::default();
        let router = Router::new()
            .route("/hook", put(record))
            .with_state(received.clone());
        let addr = serve(router).await;

        let mut headers = BTreeMap::new();
        headers.insert("X-Token".to_string(), "secret".to_string());
        let channel = WebhookChannel::new(
            WebhookConfig {
                url: format!("http://{}/hook", addr),
                method: "PUT".to_string(),
                headers,
            },
            reqwest::Client::new(),
        );

        assert!(channel.send(&notification()).await);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let (headers, body) = &received[0];
        assert_eq!(headers["x-token"], "secret");
        assert_eq!(body["target"], "site");
        assert_eq!(body["status"], "down");
        assert_eq!(body["subject"], "Site down");
        assert_eq!(body["message"], "<p>timeout</p>");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_webhook_non_success_status_fails() {
        let router = Router::new().route(
            "/hook",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let addr = serve(router).await;

        let channel = WebhookChannel::new(
            WebhookConfig {
                url: format!("http://{}/hook", addr),
                method: default_method(),
                headers: BTreeMap::new(),
            },
            reqwest::Client::new(),
        );
        assert!(!channel.send(&notification()).await);
    }

    #[tokio::test]
    async fn test_webhook_invalid_method_fails() {
        let channel = WebhookChannel::new(
            WebhookConfig {
                url: "http://127.0.0.1:9/hook".to_string(),
                method: "NOT A METHOD".to_string(),
                headers: BTreeMap::new(),
            },
            reqwest::Client::new(),
        );
        assert!(!channel.send(&notification()).await);
    }
}
