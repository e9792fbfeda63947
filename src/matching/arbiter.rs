// src/matching/arbiter.rs - Language-model yes/no duplicate classification
//
// The arbiter is the authoritative duplicate decision. It is also the most
// expensive and rate-limited step, so the cascade only calls it for pairs
// that passed both lexical gates.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::errors::ArbiterError;
use crate::utils::pipeline_config::ArbiterConfig;
use crate::utils::rate_limit::RateLimiter;

const SYSTEM_PROMPT: &str = "You compare two job listings. Answer strictly 'yes' if both texts \
describe the same vacancy, or 'no' if they are different offers. No explanations.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Duplicate,
    Distinct,
}

#[async_trait]
pub trait SemanticArbiter: Send + Sync {
    /// Exactly one logical classification per candidate pair.
    async fn classify(&self, text_a: &str, text_b: &str) -> Result<Verdict, ArbiterError>;
}

/// Interpret the model's reply. Only a bare "yes" or "no" counts.
pub fn parse_verdict(answer: Option<&str>) -> Result<Verdict, ArbiterError> {
    let normalized = answer.map(|a| a.trim().to_lowercase()).unwrap_or_default();
    match normalized.as_str() {
        "yes" => Ok(Verdict::Duplicate),
        "no" => Ok(Verdict::Distinct),
        _ => Err(ArbiterError::Unparseable(normalized)),
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Arbiter backed by an OpenAI-compatible chat-completion endpoint.
pub struct OpenAiArbiter {
    http: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    max_retries: usize,
    retry_backoff: Duration,
    limiter: RateLimiter,
}

impl OpenAiArbiter {
    pub fn new(config: &ArbiterConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/chat/completions",
                config.api_url.as_str().trim_end_matches('/')
            ),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            limiter: RateLimiter::new(config.min_interval),
        })
    }

    async fn attempt(&self, request: &ChatRequest<'_>) -> Result<Verdict, ArbiterError> {
        self.limiter.acquire().await;

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ArbiterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // A success status with a body that is not a completion counts as a bad answer.
        let body = response.text().await.map_err(map_transport_error)?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ArbiterError::Unparseable(format!(
                "invalid completion body ({}): {}",
                e,
                preview(&body)
            ))
        })?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        debug!("Arbiter raw answer: {:?}", answer);
        parse_verdict(answer.as_deref())
    }
}

fn preview(body: &str) -> String {
    body.chars().take(80).collect()
}

fn map_transport_error(e: reqwest::Error) -> ArbiterError {
    if e.is_timeout() {
        ArbiterError::Timeout
    } else {
        ArbiterError::Transport(e)
    }
}

#[async_trait]
impl SemanticArbiter for OpenAiArbiter {
    async fn classify(&self, text_a: &str, text_b: &str) -> Result<Verdict, ArbiterError> {
        let user_content = format!(
            "Text 1:\n{}\n\nText 2:\n{}\n\nAre these duplicates?",
            text_a, text_b
        );
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &user_content },
            ],
        };

        let mut attempt = 1;
        loop {
            match self.attempt(&request).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    warn!("Arbiter attempt {} failed ({}), retrying...", attempt, e);
                    tokio::time::sleep(self.retry_backoff * attempt as u32).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
