//! Heartbeat notifications to an external uptime monitor
//!
//! The monitor URL lives in a small text file so it stays out of the config
//! file and the repository. No file, no notifications.

use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::services::HeartbeatReporter;

const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpHeartbeat {
    client: Client,
    url: Option<String>,
    report_success: bool,
}

impl HttpHeartbeat {
    pub fn new(url: Option<String>, report_success: bool) -> Self {
        let client = Client::builder()
            .timeout(HEARTBEAT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            report_success,
        }
    }

    /// Read the URL from `path`; a missing or empty file disables reporting
    pub fn from_url_file(path: Option<&Path>, report_success: bool) -> Self {
        Self::new(path.and_then(read_url_file), report_success)
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn ping(&self, url: String) {
        info!("💓 Reporting heartbeat to {}", url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Heartbeat accepted [{}]", response.status());
            }
            Ok(response) => warn!("Heartbeat rejected [{}]", response.status()),
            Err(e) => warn!("Heartbeat failed: {}", e),
        }
    }
}

fn read_url_file(path: &Path) -> Option<String> {
    let url = std::fs::read_to_string(path).ok()?.trim().to_string();
    (!url.is_empty()).then_some(url)
}

#[async_trait]
impl HeartbeatReporter for HttpHeartbeat {
    async fn report_success(&self) {
        if !self.report_success {
            return;
        }
        if let Some(url) = &self.url {
            self.ping(url.clone()).await;
        }
    }

    async fn report_failure(&self) {
        if let Some(url) = &self.url {
            self.ping(format!("{}/fail", url.trim_end_matches('/'))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_url_is_read_and_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heartbeat.url");
        std::fs::write(&path, "  https://uptime.test/api/v1/heartbeat/abc\n").unwrap();

        let heartbeat = HttpHeartbeat::from_url_file(Some(&path), true);
        assert_eq!(heartbeat.url.as_deref(), Some("https://uptime.test/api/v1/heartbeat/abc"));
    }

    #[test]
    fn test_missing_or_blank_file_disables_reporting() {
        let dir = TempDir::new().unwrap();
        assert!(!HttpHeartbeat::from_url_file(Some(&dir.path().join("nope.url")), true).is_enabled());
        assert!(!HttpHeartbeat::from_url_file(None, true).is_enabled());

        let blank = dir.path().join("blank.url");
        std::fs::write(&blank, "\n").unwrap();
        assert!(!HttpHeartbeat::from_url_file(Some(&blank), true).is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_silent() {
        let heartbeat = HttpHeartbeat::new(None, true);
        heartbeat.report_success().await;
        heartbeat.report_failure().await;
    }
}
