//! Run configuration for the duplicate detection pipeline.
//! Every threshold and endpoint is an explicit field so the two sweeps can be
//! parameterized independently and tests can build configs without touching
//! the process environment.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::models::stats_models::SweepKind;

pub const DEFAULT_TABLE_NAME: &str = "TicketsTable";
pub const DEFAULT_ARBITER_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ARBITER_MODEL: &str = "gpt-4o-mini";

/// How retirement decisions reach the downstream consumer. A run uses exactly
/// one style so the consumer never sees the same id in two payload shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Bounded batches during the run plus a final flush of the remainder.
    Incremental,
    /// A single payload with every retired id once the run completes.
    FullReport,
}

impl FromStr for DeliveryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" | "batch" | "batches" => Ok(DeliveryMode::Incremental),
            "full" | "full-report" | "full_report" => Ok(DeliveryMode::FullReport),
            other => Err(anyhow!("unknown delivery mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub api_url: Url,
    pub table: String,
    pub bot_id: String,
    pub workspace_id: Option<String>,
    /// Row filter passed verbatim to every `rows/find` request.
    pub filter: Option<serde_json::Value>,
    pub api_token: String,
    pub page_size: usize,
    pub page_delay: Duration,
    pub request_timeout: Duration,
    pub max_retries: usize,
    /// Base of the linear backoff between retries of a failed page.
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    pub api_url: Url,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub min_interval: Duration,
    pub max_retries: usize,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub webhook_url: Url,
    pub batch_size: usize,
    pub mode: DeliveryMode,
    pub request_timeout: Duration,
}

/// Thresholds for one pass of the similarity cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub kind: SweepKind,
    /// Characters of each body compared by every stage.
    pub text_window: usize,
    /// Minimum Jaccard ratio for a pair to reach edit-distance confirmation.
    pub lexical_threshold: f64,
    /// Minimum normalized Levenshtein similarity to reach the arbiter.
    pub edit_threshold: f64,
    /// Primary sweep only: refine the partition key with the city.
    pub include_city: bool,
}

impl SweepConfig {
    pub fn primary_default() -> Self {
        Self {
            kind: SweepKind::Primary,
            text_window: 400,
            lexical_threshold: 0.08,
            edit_threshold: 0.55,
            include_city: false,
        }
    }

    pub fn contact_default() -> Self {
        Self {
            kind: SweepKind::Contact,
            text_window: 500,
            lexical_threshold: 0.15,
            edit_threshold: 0.83,
            include_city: false,
        }
    }

    fn from_lookup<F>(kind: SweepKind, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = match kind {
            SweepKind::Primary => Self::primary_default(),
            SweepKind::Contact => Self::contact_default(),
        };
        let prefix = kind.as_str().to_ascii_uppercase();
        let config = Self {
            kind,
            text_window: parse_or(
                lookup,
                &format!("{}_TEXT_WINDOW", prefix),
                defaults.text_window,
            ),
            lexical_threshold: parse_or(
                lookup,
                &format!("{}_LEXICAL_THRESHOLD", prefix),
                defaults.lexical_threshold,
            ),
            edit_threshold: parse_or(
                lookup,
                &format!("{}_EDIT_THRESHOLD", prefix),
                defaults.edit_threshold,
            ),
            include_city: kind == SweepKind::Primary
                && parse_or(lookup, "PRIMARY_INCLUDE_CITY", defaults.include_city),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.text_window == 0 {
            return Err(anyhow!("{} sweep text window must be positive", self.kind.as_str()));
        }
        for (name, value) in [("lexical", self.lexical_threshold), ("edit", self.edit_threshold)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!(
                    "{} sweep {} threshold {} is outside [0, 1]",
                    self.kind.as_str(),
                    name,
                    value
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub arbiter: ArbiterConfig,
    pub delivery: DeliveryConfig,
    pub primary: SweepConfig,
    /// `None` disables the contact-identifier sweep.
    pub contact: Option<SweepConfig>,
}

impl PipelineConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64));
        let retry_backoff = Duration::from_millis(parse_or(&lookup, "RETRY_BACKOFF_MS", 1000u64));

        let source = SourceConfig {
            api_url: required_url(&lookup, "TABLE_API_URL")?,
            table: lookup("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            bot_id: required(&lookup, "TABLE_BOT_ID")?,
            workspace_id: lookup("TABLE_WORKSPACE_ID").filter(|s| !s.trim().is_empty()),
            filter: table_filter(&lookup)?,
            api_token: required(&lookup, "TABLE_API_TOKEN")?,
            page_size: parse_or(&lookup, "PAGE_SIZE", 1000usize).max(1),
            page_delay: Duration::from_millis(parse_or(&lookup, "PAGE_DELAY_MS", 200u64)),
            request_timeout: timeout,
            max_retries: parse_or(&lookup, "SOURCE_MAX_RETRIES", 3usize),
            retry_backoff,
        };

        let arbiter_url =
            lookup("ARBITER_API_URL").unwrap_or_else(|| DEFAULT_ARBITER_URL.to_string());
        let arbiter = ArbiterConfig {
            api_url: Url::parse(&arbiter_url).context("ARBITER_API_URL is not a valid URL")?,
            api_key: required(&lookup, "OPENAI_API_KEY")?,
            model: lookup("ARBITER_MODEL").unwrap_or_else(|| DEFAULT_ARBITER_MODEL.to_string()),
            max_tokens: parse_or(&lookup, "ARBITER_MAX_TOKENS", 3u32),
            request_timeout: timeout,
            min_interval: Duration::from_millis(parse_or(
                &lookup,
                "ARBITER_MIN_INTERVAL_MS",
                250u64,
            )),
            max_retries: parse_or(&lookup, "ARBITER_MAX_RETRIES", 2usize),
            retry_backoff,
        };

        let mode = match lookup("DELIVERY_MODE") {
            Some(raw) => raw.parse().context("Invalid DELIVERY_MODE")?,
            None => DeliveryMode::Incremental,
        };
        let delivery = DeliveryConfig {
            webhook_url: required_url(&lookup, "WEBHOOK_URL")?,
            batch_size: parse_or(&lookup, "DELIVERY_BATCH_SIZE", 50usize).max(1),
            mode,
            request_timeout: timeout,
        };

        let primary = SweepConfig::from_lookup(SweepKind::Primary, &lookup)?;
        let contact = if parse_or(&lookup, "CONTACT_SWEEP_ENABLED", true) {
            Some(SweepConfig::from_lookup(SweepKind::Contact, &lookup)?)
        } else {
            None
        };

        let config = Self {
            source,
            arbiter,
            delivery,
            primary,
            contact,
        };
        debug!("Pipeline configuration loaded: {:?}", config.primary);
        Ok(config)
    }

    /// Log the effective configuration. Credentials are never printed.
    pub fn log_config(&self) {
        info!(
            "⚙️  Table source: {} (table {}, page size {}, page delay {:?})",
            self.source.api_url, self.source.table, self.source.page_size, self.source.page_delay
        );
        if self.source.filter.is_some() {
            info!("⚙️  Table source: row filter enabled");
        }
        info!(
            "⚙️  Arbiter: model {} at {} (min interval {:?}, retries {})",
            self.arbiter.model,
            self.arbiter.api_url,
            self.arbiter.min_interval,
            self.arbiter.max_retries
        );
        info!(
            "⚙️  Delivery: {:?} to {} (batch size {})",
            self.delivery.mode, self.delivery.webhook_url, self.delivery.batch_size
        );
        for sweep in std::iter::once(&self.primary).chain(self.contact.iter()) {
            info!(
                "⚙️  Sweep {}: window {} chars, lexical >= {}, edit >= {}{}",
                sweep.kind.as_str(),
                sweep.text_window,
                sweep.lexical_threshold,
                sweep.edit_threshold,
                if sweep.include_city { ", partitioned by city" } else { "" }
            );
        }
        if self.contact.is_none() {
            info!("⚙️  Sweep contact: disabled");
        }
    }
}

/// `TABLE_FILTER` must hold a JSON object when set.
fn table_filter<F>(lookup: &F) -> Result<Option<serde_json::Value>>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = match lookup("TABLE_FILTER").filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("TABLE_FILTER is not valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("TABLE_FILTER must be a JSON object, got {}", value));
    }
    Ok(Some(value))
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{} must be set", key))
}

fn required_url<F>(lookup: &F, key: &str) -> Result<Url>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    Url::parse(&raw).with_context(|| format!("{} is not a valid URL", key))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
