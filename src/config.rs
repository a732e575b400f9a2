//! Configuration module for sitewatch.
//!
//! Server settings come from environment variables; the monitored targets and
//! notification channels come from a JSON file.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::monitor::Target;
use crate::notify::{ChannelConfig, MailConfig, WebhookConfig};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the status server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "sitewatch.db")
    pub db_path: String,
    /// Path to the monitor configuration file (default: "monitor_config.json")
    pub config_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "sitewatch.db".to_string(),
            config_path: PathBuf::from("monitor_config.json"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SITEWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `SITEWATCH_DB_PATH`: Database file path (default: "sitewatch.db")
    /// - `SITEWATCH_CONFIG`: Monitor config path (default: "monitor_config.json")
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("SITEWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("SITEWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(path) = env::var("SITEWATCH_CONFIG") {
            cfg.config_path = PathBuf::from(path);
        }

        cfg
    }
}

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no config found, wrote a default one to {}; edit it and restart", .0.display())]
    CreatedDefault(PathBuf),
    #[error("no targets configured")]
    NoTargets,
    #[error("duplicate target name: {0}")]
    DuplicateTarget(String),
    #[error("target {name}: {reason}")]
    InvalidTarget { name: String, reason: String },
    #[error("invalid digest_time {0:?}, expected HH:MM")]
    InvalidDigestTime(String),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// One target as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_target_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_content: Option<String>,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_target_timeout() -> u64 {
    10
}

fn default_expected_status() -> u16 {
    200
}

fn default_check_interval() -> u64 {
    300
}

/// Monitor configuration file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    /// Probe cycle cadence.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    /// Local time of day for the digest, "HH:MM".
    #[serde(default = "default_digest_time")]
    pub digest_time: String,
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: u32,
    /// Alert once when a target is already down on its first probe.
    #[serde(default)]
    pub alert_on_baseline_down: bool,
}

fn default_probe_interval() -> u64 {
    300
}

fn default_digest_time() -> String {
    "09:00".to_string()
}

fn default_max_concurrent_probes() -> usize {
    8
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_history_retention_days() -> u32 {
    30
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            targets: vec![
                TargetConfig {
                    name: "Google".to_string(),
                    url: "https://www.google.com".to_string(),
                    timeout_secs: 10,
                    expected_status: 200,
                    check_content: None,
                    check_interval_secs: 300,
                },
                TargetConfig {
                    name: "GitHub".to_string(),
                    url: "https://github.com".to_string(),
                    timeout_secs: 15,
                    expected_status: 200,
                    check_content: Some("GitHub".to_string()),
                    check_interval_secs: 600,
                },
            ],
            channels: vec![
                ChannelConfig::Mail(MailConfig {
                    from: "monitor@example.com".to_string(),
                    to: vec!["admin@example.com".to_string()],
                    sendmail_path: "/usr/sbin/sendmail".to_string(),
                }),
                ChannelConfig::Webhook(WebhookConfig {
                    url: "https://hooks.example.com/services/YOUR/WEBHOOK".to_string(),
                    method: "POST".to_string(),
                    headers,
                }),
            ],
            probe_interval_secs: default_probe_interval(),
            digest_time: default_digest_time(),
            max_concurrent_probes: default_max_concurrent_probes(),
            notify_timeout_secs: default_notify_timeout(),
            history_retention_days: default_history_retention_days(),
            alert_on_baseline_down: false,
        }
    }
}

impl MonitorConfig {
    /// Load and validate the config at `path`.
    ///
    /// A missing file is replaced by a default config, and loading fails with
    /// [`ConfigError::CreatedDefault`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let default = serde_json::to_string_pretty(&Self::default()).map_err(|e| {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
            std::fs::write(path, default).map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            return Err(ConfigError::CreatedDefault(path.to_path_buf()));
        }

        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let cfg: Self = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check invariants the monitor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut names = HashSet::new();
        for t in &self.targets {
            if !names.insert(t.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(t.name.clone()));
            }
            let invalid = |reason: &str| ConfigError::InvalidTarget {
                name: t.name.clone(),
                reason: reason.to_string(),
            };
            if t.name.trim().is_empty() {
                return Err(invalid("name must not be empty"));
            }
            match reqwest::Url::parse(&t.url) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
                Ok(_) => return Err(invalid("url must use http or https")),
                Err(e) => return Err(invalid(&format!("invalid url: {}", e))),
            }
            if t.timeout_secs == 0 {
                return Err(invalid("timeout_secs must be positive"));
            }
            if t.check_interval_secs == 0 {
                return Err(invalid("check_interval_secs must be positive"));
            }
            if !(100..=599).contains(&t.expected_status) {
                return Err(invalid("expected_status must be a valid HTTP status"));
            }
        }

        if self.probe_interval_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "probe_interval_secs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_probes == 0 {
            return Err(ConfigError::InvalidSetting(
                "max_concurrent_probes must be positive".to_string(),
            ));
        }
        if self.notify_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "notify_timeout_secs must be positive".to_string(),
            ));
        }
        self.digest_time()?;

        Ok(())
    }

    pub fn digest_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.digest_time, "%H:%M")
            .map_err(|_| ConfigError::InvalidDigestTime(self.digest_time.clone()))
    }

    /// Targets as monitor model values.
    pub fn targets(&self) -> Vec<Target> {
        self.targets
            .iter()
            .map(|t| Target {
                timeout: Duration::from_secs(t.timeout_secs),
                expected_status: t.expected_status,
                check_content: t.check_content.clone(),
                check_interval: Duration::from_secs(t.check_interval_secs),
                ..Target::new(&t.name, &t.url)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "sitewatch.db");
        assert_eq!(cfg.config_path, PathBuf::from("monitor_config.json"));
    }

    #[test]
    fn test_parse_with_defaults() {
        let json = r#"{
            "targets": [
                {"name": "Blog", "url": "https://blog.example.com", "check_content": "Welcome"}
            ],
            "channels": [{"kind": "webhook", "url": "https://hooks.example.com/x"}]
        }"#;
        let cfg: MonitorConfig = serde_json::from_str(json).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.probe_interval_secs, 300);
        assert_eq!(cfg.max_concurrent_probes, 8);
        assert!(!cfg.alert_on_baseline_down);
        assert_eq!(cfg.digest_time().unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());

        let targets = cfg.targets();
        assert_eq!(targets[0].timeout, Duration::from_secs(10));
        assert_eq!(targets[0].expected_status, 200);
        assert_eq!(targets[0].check_content.as_deref(), Some("Welcome"));
        assert_eq!(targets[0].check_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut cfg = MonitorConfig::default();
        cfg.targets.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoTargets)));

        let mut cfg = MonitorConfig::default();
        cfg.targets[1].name = "Google".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateTarget(_))));

        let mut cfg = MonitorConfig::default();
        cfg.targets[0].url = "ftp://example.com".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidTarget { .. })));

        let mut cfg = MonitorConfig::default();
        cfg.targets[0].timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidTarget { .. })));

        let mut cfg = MonitorConfig::default();
        cfg.digest_time = "25:00".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDigestTime(_))));

        let mut cfg = MonitorConfig::default();
        cfg.max_concurrent_probes = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidSetting(_))));
    }

    #[test]
    fn test_missing_file_writes_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor_config.json");

        let err = MonitorConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::CreatedDefault(_)));
        assert!(path.exists());

        // The written default is itself a valid config
        let cfg = MonitorConfig::load(&path).unwrap();
        assert_eq!(cfg, MonitorConfig::default());
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = MonitorConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
