//! HTTP probe implementation.

use async_trait::async_trait;
use std::time::Instant;

use super::{FailureReason, ProbeOutcome, Prober};
use crate::monitor::Target;

pub const USER_AGENT: &str = concat!("sitewatch/", env!("CARGO_PKG_VERSION"));

/// Probes targets with a GET request, following redirects.
#[derive(Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let start = Instant::now();

        // The per-request timeout covers connect through the end of the body.
        let response = match self
            .client
            .get(&target.url)
            .timeout(target.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ProbeOutcome::down(&target.name, classify_error(&e)),
        };

        let status_code = response.status().as_u16();

        // Read the full body to measure complete transfer time
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ProbeOutcome::down(&target.name, classify_error(&e)),
        };

        let elapsed_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
        let mut outcome = ProbeOutcome::up(&target.name, status_code, elapsed_ms);

        if status_code != target.expected_status {
            outcome.healthy = false;
            outcome.failure_reason = Some(FailureReason::StatusMismatch(status_code));
        } else if let Some(needle) = &target.check_content {
            if !body.contains(needle.as_str()) {
                outcome.healthy = false;
                outcome.failure_reason = Some(FailureReason::ContentMismatch);
            }
        }

        outcome
    }
}

fn classify_error(e: &reqwest::Error) -> FailureReason {
    if e.is_timeout() {
        FailureReason::Timeout
    } else if e.is_connect() {
        FailureReason::ConnectionError
    } else {
        FailureReason::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::{http::StatusCode, routing::get, Router};
    use std::time::Duration;

    fn site() -> Router {
        Router::new()
            .route("/", get(|| async { "<html>Welcome to GitHub</html>" }))
            .route(
                "/broken",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "late"
                }),
            )
    }

    fn target(url: String) -> Target {
        let mut t = Target::new("site", &url);
        t.timeout = Duration::from_millis(500);
        t
    }

    #[tokio::test]
    async fn test_http_probe_healthy() {
        let addr = serve(site()).await;
        let prober = HttpProber::new().unwrap();

        let outcome = prober.probe(&target(format!("http://{}/", addr))).await;
        assert!(outcome.healthy);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.response_time_ms.is_some());
        assert_eq!(outcome.failure_reason, None);
    }

    #[tokio::test]
    async fn test_http_probe_content_check() {
        let addr = serve(site()).await;
        let prober = HttpProber::new().unwrap();

        let mut t = target(format!("http://{}/", addr));
        t.check_content = Some("GitHub".to_string());
        assert!(prober.probe(&t).await.healthy);

        // Match is case-sensitive
        t.check_content = Some("github".to_string());
        let outcome = prober.probe(&t).await;
        assert!(!outcome.healthy);
        assert_eq!(outcome.failure_reason, Some(FailureReason::ContentMismatch));
        assert_eq!(outcome.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_http_probe_status_mismatch() {
        let addr = serve(site()).await;
        let prober = HttpProber::new().unwrap();

        let outcome = prober.probe(&target(format!("http://{}/broken", addr))).await;
        assert!(!outcome.healthy);
        assert_eq!(outcome.status_code, Some(503));
        assert_eq!(outcome.failure_reason, Some(FailureReason::StatusMismatch(503)));
    }

    #[tokio::test]
    async fn test_http_probe_timeout() {
        let addr = serve(site()).await;
        let prober = HttpProber::new().unwrap();

        let outcome = prober.probe(&target(format!("http://{}/slow", addr))).await;
        assert!(!outcome.healthy);
        assert_eq!(outcome.failure_reason, Some(FailureReason::Timeout));
        assert_eq!(outcome.response_time_ms, None);
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::new().unwrap();
        let outcome = prober.probe(&target(format!("http://{}/", addr))).await;
        assert!(!outcome.healthy);
        assert_eq!(outcome.failure_reason, Some(FailureReason::ConnectionError));
    }
}
