//! Vulnerability management (DefectDojo) REST client
//!
//! Imports go to `/api/v2/import-scan/` as multipart uploads. Every call
//! authenticates with `Authorization: Token {api_key}`. Imports report failure
//! as [`ImportResult::Failed`]; reads log errors and come back empty.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use ptaas_core::config::DefectDojoConfig;

use crate::domain::entities::{FindingSummary, FindingsQuery, ImportRequest, ImportResult};
use crate::domain::services::VulnerabilityManagement;

/// Transport or protocol failure talking to DefectDojo
#[derive(Debug, thiserror::Error)]
pub enum DefectDojoError {
    #[error("DefectDojo API key is not configured")]
    MissingApiKey,
    #[error("DefectDojo request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("DefectDojo returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected DefectDojo response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Identified {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImportResponse {
    test: Option<i64>,
    test_id: Option<i64>,
    engagement_id: Option<i64>,
    product_id: Option<i64>,
    scan_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DojoFinding {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    severity: String,
    description: Option<String>,
    mitigation: Option<String>,
    impact: Option<String>,
    references: Option<String>,
    cve: Option<String>,
    cvssv3_score: Option<Value>,
    #[serde(default)]
    found_by: Vec<i64>,
    url: Option<String>,
    date: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    verified: bool,
}

fn default_true() -> bool {
    true
}

/// Scores arrive as numbers or numeric strings depending on the server version
fn score(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<DojoFinding> for FindingSummary {
    fn from(finding: DojoFinding) -> Self {
        Self {
            id: finding.id,
            title: finding.title,
            severity: finding.severity,
            description: finding.description,
            mitigation: finding.mitigation,
            impact: finding.impact,
            references: finding.references,
            cve: finding.cve,
            cvss_score: score(finding.cvssv3_score),
            found_by: finding.found_by,
            url: finding.url,
            date: finding.date,
            active: finding.active,
            verified: finding.verified,
        }
    }
}

pub struct DefectDojoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    product_name: String,
    product_type_name: String,
}

impl DefectDojoClient {
    pub fn new(config: &DefectDojoConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build DefectDojo HTTP client with custom timeout, using default client");
                Client::new()
            });

        if config.api_key.is_none() {
            warn!("DefectDojo API key not set; imports will be reported as failed");
        }

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            product_name: config.product_name.clone(),
            product_type_name: config.product_type_name.clone(),
        }
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder, DefectDojoError> {
        let key = self.api_key.as_deref().ok_or(DefectDojoError::MissingApiKey)?;
        Ok(self
            .client
            .request(method, format!("{}/api/v2/{}", self.base_url, endpoint))
            .header("Authorization", format!("Token {}", key)))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, DefectDojoError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DefectDojoError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| DefectDojoError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, DefectDojoError> {
        let builder = self.request(Method::GET, endpoint)?.query(params);
        self.send_json(builder).await
    }

    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T, DefectDojoError> {
        let builder = self.request(Method::POST, endpoint)?.json(&body);
        self.send_json(builder).await
    }

    async fn product_id(&self, name: &str) -> Result<Option<i64>, DefectDojoError> {
        let page: Page<Identified> = self
            .get("products/", &[("name", name.to_string())])
            .await?;
        Ok(page.results.first().map(|p| p.id))
    }

    /// Create the configured product (and a product type if none exist).
    pub async fn ensure_product_exists(&self) -> Result<i64, DefectDojoError> {
        if let Some(id) = self.product_id(&self.product_name).await? {
            debug!(product = %self.product_name, id, "Product exists");
            return Ok(id);
        }

        let types: Page<Identified> = self.get("product_types/", &[]).await?;
        let prod_type = match types.results.first() {
            Some(product_type) => product_type.id,
            None => {
                let created: Identified = self
                    .post(
                        "product_types/",
                        json!({
                            "name": self.product_type_name,
                            "description": "Security testing projects",
                        }),
                    )
                    .await?;
                info!(name = %self.product_type_name, id = created.id, "Created product type");
                created.id
            }
        };

        let product: Identified = self
            .post(
                "products/",
                json!({
                    "name": self.product_name,
                    "description": "PTaaS security testing project",
                    "prod_type": prod_type,
                }),
            )
            .await?;
        info!(product = %self.product_name, id = product.id, "Created product");
        Ok(product.id)
    }

    async fn try_import(&self, request: ImportRequest) -> Result<ImportResult, DefectDojoError> {
        if let Err(e) = self.ensure_product_exists().await {
            if matches!(e, DefectDojoError::MissingApiKey) {
                return Err(e);
            }
            warn!(error = %e, "Could not ensure product exists; relying on auto-create");
        }

        let part = Part::bytes(request.content)
            .file_name(request.filename.clone())
            .mime_str(&request.content_type)?;

        let form = Form::new()
            .text("scan_type", request.scan_type.clone())
            .text("product_name", self.product_name.clone())
            .text("engagement_name", request.engagement_name.clone())
            .text("auto_create_context", "true")
            .text("active", "true")
            .text("verified", "false")
            .text("close_old_findings", "false")
            .part("file", part);

        let response = self
            .request(Method::POST, "import-scan/")?
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "DefectDojo rejected import");
            return Ok(ImportResult::failed(body, Some(status.as_u16())));
        }

        let parsed: ImportResponse = serde_json::from_str(&body).unwrap_or_default();
        Ok(ImportResult::Imported {
            product_id: parsed.product_id,
            engagement_id: parsed.engagement_id,
            test_id: parsed.test_id.or(parsed.test),
            scan_type: parsed.scan_type.or(Some(request.scan_type)),
        })
    }

    async fn try_findings(&self, query: &FindingsQuery) -> Result<Vec<FindingSummary>, DefectDojoError> {
        let mut params = vec![
            ("limit", query.limit.max(1).to_string()),
            ("active", query.active.unwrap_or(true).to_string()),
        ];

        if let Some(product) = &query.product {
            match self.product_id(product).await? {
                Some(id) => params.push(("test__engagement__product", id.to_string())),
                None => return Ok(Vec::new()),
            }
        }

        if let Some(severity) = &query.severity {
            params.push(("severity", severity.clone()));
        }

        let page: Page<DojoFinding> = self.get("findings/", &params).await?;
        Ok(page.results.into_iter().map(FindingSummary::from).collect())
    }

    async fn list_raw(&self, endpoint: &str, params: &[(&str, String)]) -> Vec<Value> {
        match self.get::<Page<Value>>(endpoint, params).await {
            Ok(page) => page.results,
            Err(e) => {
                warn!(endpoint, error = %e, "DefectDojo listing failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl VulnerabilityManagement for DefectDojoClient {
    async fn import_scan(&self, request: ImportRequest) -> ImportResult {
        match self.try_import(request).await {
            Ok(result) => result,
            Err(DefectDojoError::Status { status, body }) => ImportResult::failed(body, Some(status)),
            Err(e) => {
                warn!(error = %e, "DefectDojo import failed");
                ImportResult::failed(e.to_string(), None)
            }
        }
    }

    async fn findings(&self, query: &FindingsQuery) -> Vec<FindingSummary> {
        self.try_findings(query).await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list findings");
            Vec::new()
        })
    }

    async fn finding(&self, id: i64) -> Option<FindingSummary> {
        match self.get::<DojoFinding>(&format!("findings/{}/", id), &[]).await {
            Ok(finding) => Some(finding.into()),
            Err(e) => {
                warn!(id, error = %e, "Failed to load finding");
                None
            }
        }
    }

    async fn products(&self) -> Vec<Value> {
        self.list_raw("products/", &[]).await
    }

    async fn engagements(&self, product_id: Option<i64>) -> Vec<Value> {
        let mut params = vec![("limit", "100".to_string())];
        if let Some(id) = product_id {
            params.push(("product", id.to_string()));
        }
        self.list_raw("engagements/", &params).await
    }

    async fn tests(&self, engagement_id: Option<i64>) -> Vec<Value> {
        let mut params = vec![("limit", "1000".to_string())];
        if let Some(id) = engagement_id {
            params.push(("engagement", id.to_string()));
        }
        self.list_raw("tests/", &params).await
    }
}
