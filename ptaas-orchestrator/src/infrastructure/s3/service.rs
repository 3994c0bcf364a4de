//! S3-compatible artifact storage

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use ptaas_core::config::StorageConfig;

use crate::domain::entities::ArtifactObject;
use crate::domain::errors::ScanError;
use crate::domain::services::ArtifactStore;

const SERVICE: &str = "s3";

/// Raw scan artifacts in a single bucket.
///
/// With a custom endpoint (MinIO) requests use path-style addressing and
/// object URLs take the form `{endpoint}/{bucket}/{key}`.
pub struct S3ArtifactStore {
    client: S3Client,
    bucket: String,
    endpoint: Option<String>,
}

impl S3ArtifactStore {
    /// Build a client from storage configuration.
    ///
    /// Explicit keys win; otherwise the default AWS credential chain applies.
    pub async fn connect(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "ptaas-artifact-store",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            endpoint: config.endpoint.clone(),
        }
    }

    /// Create the bucket when it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), ScanError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!(bucket = %self.bucket, "Artifact bucket present");
                Ok(())
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| {
                        sdk_error(format!("failed to create bucket {}", self.bucket), &e)
                    })?;
                info!(bucket = %self.bucket, "Created artifact bucket");
                Ok(())
            }
            Err(e) => Err(sdk_error(format!("failed to check bucket {}", self.bucket), &e)),
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        object_url(self.endpoint.as_deref(), &self.bucket, key)
    }
}

fn object_url(endpoint: Option<&str>, bucket: &str, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
    }
}

/// S3 failures surface as upstream errors carrying the HTTP status when
/// a response was received.
fn sdk_error<E>(context: String, err: &SdkError<E>) -> ScanError
where
    E: std::error::Error + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    ScanError::upstream(SERVICE, status, format!("{}: {}", context, err))
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, key: &str, content: Vec<u8>, content_type: &str) -> Result<String, ScanError> {
        let size = content.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| {
                warn!(key, error = %e, "Artifact upload failed");
                sdk_error(format!("failed to upload {}", key), &e)
            })?;

        debug!(key, size, "Uploaded artifact");
        Ok(self.object_url(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ScanError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(sdk_error(format!("failed to download {}", key), &e));
            }
        };

        let body = response.body.collect().await.map_err(|e| {
            ScanError::upstream(SERVICE, None, format!("failed to read body for {}: {}", key, e))
        })?;

        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ArtifactObject>, ScanError> {
        let mut continuation_token: Option<String> = None;
        let mut objects = Vec::new();

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);

            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| sdk_error("failed to list objects".to_string(), &e))?;

            for object in response.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                objects.push(ArtifactObject {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0),
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), ScanError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(format!("failed to delete {}", key), &e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_with_custom_endpoint() {
        assert_eq!(
            object_url(Some("http://minio:9000/"), "ptaas", "nmap_10.0.0.5_1700000000.xml"),
            "http://minio:9000/ptaas/nmap_10.0.0.5_1700000000.xml"
        );
    }

    #[test]
    fn test_object_url_on_aws() {
        assert_eq!(
            object_url(None, "ptaas", "zap_http_app_1700000000.json"),
            "https://ptaas.s3.amazonaws.com/zap_http_app_1700000000.json"
        );
    }

    #[test]
    fn test_timestamp_conversion() {
        let timestamp = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        let converted = to_chrono(&timestamp).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_rejected_upload_is_upstream_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
            ))
            .mount(&server)
            .await;

        let store = S3ArtifactStore::connect(&StorageConfig {
            endpoint: Some(server.uri()),
            bucket: "scans".to_string(),
            access_key: Some("minio".to_string()),
            secret_key: Some("minio123".to_string()),
            region: "us-east-1".to_string(),
            create_bucket: false,
        })
        .await;

        let err = store
            .put("nmap_10.0.0.5_1700000000.xml", b"<nmaprun/>".to_vec(), "application/xml")
            .await
            .unwrap_err();

        match err {
            ScanError::UpstreamApi { service, status, .. } => {
                assert_eq!(service, "s3");
                assert_eq!(status, Some(403));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_uses_configured_endpoint() {
        let store = S3ArtifactStore::connect(&StorageConfig {
            endpoint: Some("http://localhost:9000".to_string()),
            bucket: "scans".to_string(),
            access_key: Some("minio".to_string()),
            secret_key: Some("minio123".to_string()),
            region: "us-east-1".to_string(),
            create_bucket: false,
        })
        .await;

        assert_eq!(store.object_url("a.txt"), "http://localhost:9000/scans/a.txt");
    }
}
