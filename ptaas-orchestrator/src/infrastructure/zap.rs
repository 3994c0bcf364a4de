//! Web application scanner (OWASP ZAP) control API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use ptaas_core::config::WebScannerConfig;

use crate::domain::errors::ScanError;
use crate::domain::services::WebScannerApi;

const SERVICE: &str = "zap";

#[derive(Debug, Deserialize)]
struct ScanStarted {
    scan: String,
}

/// ZAP reports percentages as strings
#[derive(Debug, Deserialize)]
struct ScanStatus {
    status: String,
}

pub struct ZapClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ZapClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_timeout(base_url, api_key, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            error!(error = %e, "Failed to build ZAP HTTP client with custom timeout, using default client");
            Client::new()
        });

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &WebScannerConfig) -> Self {
        Self::with_timeout(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Vec<u8>, ScanError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.client.get(&url).query(params);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key.as_str())]);
        }

        debug!(endpoint, "Calling ZAP API");

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ScanError::unavailable(SERVICE, e.to_string())
            } else {
                ScanError::upstream(SERVICE, None, e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ScanError::upstream(SERVICE, Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(ScanError::upstream(
                SERVICE,
                Some(status.as_u16()),
                String::from_utf8_lossy(&body).trim().to_string(),
            ));
        }

        Ok(body.to_vec())
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ScanError> {
        let body = self.call(endpoint, params).await?;
        serde_json::from_slice(&body).map_err(|e| {
            malformed(format!("unexpected response from {}: {}", endpoint, e))
        })
    }

    async fn status(&self, endpoint: &str, scan_id: &str) -> Result<u8, ScanError> {
        let status: ScanStatus = self.call_json(endpoint, &[("scanId", scan_id)]).await?;
        parse_percentage(&status.status)
    }
}

fn parse_percentage(raw: &str) -> Result<u8, ScanError> {
    raw.trim()
        .parse::<u32>()
        .map(|pct| pct.min(100) as u8)
        .map_err(|_| malformed(format!("invalid progress value '{}'", raw)))
}

/// The scanner answered, but with something it should never produce
fn malformed(output: String) -> ScanError {
    ScanError::ToolExecution {
        tool: SERVICE.to_string(),
        exit_code: None,
        output,
    }
}

#[async_trait]
impl WebScannerApi for ZapClient {
    async fn access_url(&self, url: &str) -> Result<(), ScanError> {
        self.call("JSON/core/action/accessUrl/", &[("url", url)])
            .await
            .map(|_| ())
    }

    async fn start_crawl(&self, url: &str) -> Result<String, ScanError> {
        let started: ScanStarted = self
            .call_json("JSON/spider/action/scan/", &[("url", url)])
            .await?;
        Ok(started.scan)
    }

    async fn crawl_status(&self, scan_id: &str) -> Result<u8, ScanError> {
        self.status("JSON/spider/view/status/", scan_id).await
    }

    async fn start_active_scan(&self, url: &str) -> Result<String, ScanError> {
        let started: ScanStarted = self
            .call_json("JSON/ascan/action/scan/", &[("url", url)])
            .await?;
        Ok(started.scan)
    }

    async fn active_scan_status(&self, scan_id: &str) -> Result<u8, ScanError> {
        self.status("JSON/ascan/view/status/", scan_id).await
    }

    async fn json_report(&self) -> Result<Vec<u8>, ScanError> {
        self.call("OTHER/core/other/jsonreport/", &[]).await
    }
}
