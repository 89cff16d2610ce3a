use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use snmpmon_common::types::{InventoryRequest, ResourcesWithServicesRequest};
use std::time::Duration;

pub const INVENTORY_PATH: &str = "api/synchronizer";
pub const MONITORING_PATH: &str = "api/monitoring";

/// Delivers inventory and metrics to the monitoring backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_inventory(&self, request: &InventoryRequest) -> anyhow::Result<()>;
    async fn send_metrics(&self, request: &ResourcesWithServicesRequest) -> anyhow::Result<()>;
}

/// Posts JSON requests to the transit endpoint.
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> anyhow::Result<()> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("POST {url} returned {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_inventory(&self, request: &InventoryRequest) -> anyhow::Result<()> {
        self.post(INVENTORY_PATH, request).await?;
        tracing::info!(
            resources = request.resources.len(),
            groups = request.groups.len(),
            "Inventory sent"
        );
        Ok(())
    }

    async fn send_metrics(&self, request: &ResourcesWithServicesRequest) -> anyhow::Result<()> {
        self.post(MONITORING_PATH, request).await?;
        tracing::debug!(resources = request.resources.len(), "Metrics sent");
        Ok(())
    }
}

/// Writes requests to the log when no endpoint is configured.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send_inventory(&self, request: &InventoryRequest) -> anyhow::Result<()> {
        let payload = serde_json::to_string(request)?;
        tracing::info!(resources = request.resources.len(), %payload, "Inventory");
        Ok(())
    }

    async fn send_metrics(&self, request: &ResourcesWithServicesRequest) -> anyhow::Result<()> {
        let payload = serde_json::to_string(request)?;
        tracing::info!(resources = request.resources.len(), %payload, "Metrics");
        Ok(())
    }
}
