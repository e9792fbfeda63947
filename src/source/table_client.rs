// src/source/table_client.rs - Paginated retrieval of ticket rows from the table store
use anyhow::Context;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, Duration};

use crate::errors::SourceFetchError;
use crate::models::record::Record;
use crate::utils::pipeline_config::SourceConfig;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// One page of rows. An empty page means there is no more data.
    async fn fetch_page(&self, limit: usize, offset: usize)
        -> Result<Vec<Record>, SourceFetchError>;
}

/// Read every record, page by page, until an empty page comes back.
/// Any failed page aborts the whole fetch; partial results are dropped.
pub async fn fetch_all(
    source: &dyn RecordSource,
    page_size: usize,
    page_delay: Duration,
) -> Result<Vec<Record>, SourceFetchError> {
    let mut all_records = Vec::new();
    let mut offset = 0;
    loop {
        let page = source.fetch_page(page_size, offset).await?;
        if page.is_empty() {
            break;
        }
        debug!("Fetched {} rows at offset {}", page.len(), offset);
        all_records.extend(page);
        offset += page_size;
        sleep(page_delay).await;
    }
    info!("📥 Fetched {} records from the table store", all_records.len());
    Ok(all_records)
}

#[derive(Debug, Serialize)]
struct FindRowsRequest<'a> {
    limit: usize,
    offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct FindRowsResponse {
    rows: Option<Value>,
}

/// Client for the hosted table API's `rows/find` endpoint.
pub struct TableClient {
    http: Client,
    endpoint: String,
    filter: Option<Value>,
    max_retries: usize,
    retry_backoff: Duration,
}

impl TableClient {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_token))
                .context("Table API token is not a valid header value")?,
        );
        headers.insert("x-bot-id", HeaderValue::from_str(&config.bot_id)?);
        if let Some(workspace_id) = &config.workspace_id {
            headers.insert("x-workspace-id", HeaderValue::from_str(workspace_id)?);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/tables/{}/rows/find",
                config.api_url.as_str().trim_end_matches('/'),
                config.table
            ),
            filter: config.filter.clone(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    async fn attempt_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>, SourceFetchError> {
        let request = FindRowsRequest {
            limit,
            offset,
            filter: self.filter.as_ref(),
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|source| SourceFetchError::Transport { offset, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceFetchError::Status {
                offset,
                status: status.as_u16(),
                body,
            });
        }

        let body: FindRowsResponse = response
            .json()
            .await
            .map_err(|e| SourceFetchError::Malformed {
                offset,
                reason: e.to_string(),
            })?;
        parse_rows(body.rows, offset)
    }
}

fn is_transient(error: &SourceFetchError) -> bool {
    match error {
        SourceFetchError::Transport { .. } => true,
        SourceFetchError::Status { status, .. } => *status == 429 || *status >= 500,
        SourceFetchError::Malformed { .. } => false,
    }
}

fn parse_rows(rows: Option<Value>, offset: usize) -> Result<Vec<Record>, SourceFetchError> {
    let rows = match rows {
        Some(Value::Array(rows)) => rows,
        Some(other) => {
            return Err(SourceFetchError::Malformed {
                offset,
                reason: format!("expected rows to be an array, got {}", other),
            })
        }
        None => {
            return Err(SourceFetchError::Malformed {
                offset,
                reason: "response has no rows field".to_string(),
            })
        }
    };
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<Record>(row).map_err(|e| SourceFetchError::Malformed {
                offset,
                reason: format!("undecodable row: {}", e),
            })
        })
        .collect()
}

#[async_trait]
impl RecordSource for TableClient {
    async fn fetch_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>, SourceFetchError> {
        let mut attempt = 1;
        loop {
            match self.attempt_page(limit, offset).await {
                Ok(records) => return Ok(records),
                Err(e) if is_transient(&e) && attempt <= self.max_retries => {
                    warn!(
                        "Table page at offset {} failed on attempt {} ({}), retrying...",
                        offset, attempt, e
                    );
                    sleep(self.retry_backoff * attempt as u32).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
