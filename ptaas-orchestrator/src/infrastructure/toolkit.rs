//! Production scanner clients for the worker pool

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ptaas_core::config::{DefectDojoConfig, ScannersConfig, StorageConfig};

use super::defectdojo::DefectDojoClient;
use super::docker::DockerCliRuntime;
use super::s3::S3ArtifactStore;
use super::zap::ZapClient;
use crate::application::classifier::KeywordInjectionClassifier;
use crate::application::jobs::{ScanToolkit, ToolkitFactory};
use crate::application::publisher::ResultPublisher;
use crate::domain::errors::ScanError;

/// Builds docker, ZAP, S3 and DefectDojo clients from configuration
pub struct DefaultToolkitFactory {
    scanners: Arc<ScannersConfig>,
    storage: StorageConfig,
    defectdojo: DefectDojoConfig,
}

impl DefaultToolkitFactory {
    pub fn new(scanners: ScannersConfig, storage: StorageConfig, defectdojo: DefectDojoConfig) -> Self {
        Self {
            scanners: Arc::new(scanners),
            storage,
            defectdojo,
        }
    }
}

#[async_trait]
impl ToolkitFactory for DefaultToolkitFactory {
    async fn build(&self) -> Result<ScanToolkit, ScanError> {
        let artifacts = S3ArtifactStore::connect(&self.storage).await;
        let publisher = ResultPublisher::new(
            Arc::new(artifacts),
            Arc::new(DefectDojoClient::new(&self.defectdojo)),
        );

        debug!(
            docker = %self.scanners.docker_binary,
            zap = %self.scanners.web.base_url,
            "Built scanner clients"
        );

        Ok(ScanToolkit {
            runtime: Arc::new(DockerCliRuntime::new(self.scanners.docker_binary.clone())),
            web_scanner: Arc::new(ZapClient::from_config(&self.scanners.web)),
            publisher: Arc::new(publisher),
            classifier: Arc::new(KeywordInjectionClassifier),
            scanners: self.scanners.clone(),
        })
    }
}
