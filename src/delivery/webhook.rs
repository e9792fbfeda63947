// src/delivery/webhook.rs - Downstream consumer of retirement decisions
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use reqwest::Client;
use serde::{Serialize, Serializer};

use crate::errors::DeliveryError;
use crate::models::record::RecordId;
use crate::utils::pipeline_config::DeliveryConfig;

/// Payload received by the downstream webhook, for both batches and full reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReport {
    pub duplicates: Vec<RecordId>,
    /// Records fetched in this run.
    pub total: usize,
    /// Records retired so far in this run.
    pub found: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub timestamp: DateTime<Utc>,
}

fn serialize_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, report: &DuplicateReport) -> Result<(), DeliveryError>;
}

/// POSTs each report as JSON to a webhook URL. A single attempt per report.
pub struct WebhookSink {
    http: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(config: &DeliveryConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            url: config.webhook_url.to_string(),
        })
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    async fn deliver(&self, report: &DuplicateReport) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(report)?;
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        info!("📤 Delivered {} ids to webhook: {}", report.duplicates.len(), status);
        Ok(())
    }
}

/// Logs reports instead of sending them. Used for dry runs.
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    async fn deliver(&self, report: &DuplicateReport) -> Result<(), DeliveryError> {
        info!("📝 [dry run] {}", serde_json::to_string(report)?);
        Ok(())
    }
}
