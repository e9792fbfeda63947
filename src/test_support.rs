// In-memory stand-ins for the table store, the arbiter and the webhook.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::delivery::webhook::{DeliverySink, DuplicateReport};
use crate::errors::{ArbiterError, DeliveryError, SourceFetchError};
use crate::matching::arbiter::{SemanticArbiter, Verdict};
use crate::models::record::{Record, RecordId};
use crate::source::table_client::RecordSource;
use crate::utils::pipeline_config::PipelineConfig;

/// Default configuration with fake endpoints and no pacing delays.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::from_lookup(|key| {
        let value = match key {
            "TABLE_API_URL" => "http://127.0.0.1:9/v1",
            "TABLE_BOT_ID" => "bot",
            "TABLE_API_TOKEN" => "token",
            "OPENAI_API_KEY" => "sk-test",
            "WEBHOOK_URL" => "http://127.0.0.1:9/hook",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test configuration is valid");
    config.source.page_delay = Duration::ZERO;
    config.source.retry_backoff = Duration::ZERO;
    config.arbiter.min_interval = Duration::ZERO;
    config.arbiter.retry_backoff = Duration::ZERO;
    config
}

pub fn record(id: i64, category: &str, sub_category: &str, body: &str) -> Record {
    Record {
        id: RecordId::Numeric(id),
        category: Some(category.to_string()),
        sub_category: Some(sub_category.to_string()),
        city: None,
        contact: None,
        poster: None,
        body: body.to_string(),
    }
}

enum ArbiterScript {
    Always(Verdict),
    IdenticalOnly,
    Fail,
}

pub struct ScriptedArbiter {
    script: ArbiterScript,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedArbiter {
    fn with(script: ArbiterScript) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always_yes() -> Self {
        Self::with(ArbiterScript::Always(Verdict::Duplicate))
    }

    pub fn always_no() -> Self {
        Self::with(ArbiterScript::Always(Verdict::Distinct))
    }

    /// "yes" exactly when both texts are equal.
    pub fn identical_only() -> Self {
        Self::with(ArbiterScript::IdenticalOnly)
    }

    pub fn failing() -> Self {
        Self::with(ArbiterScript::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_texts(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SemanticArbiter for ScriptedArbiter {
    async fn classify(&self, text_a: &str, text_b: &str) -> Result<Verdict, ArbiterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((text_a.to_string(), text_b.to_string()));
        match self.script {
            ArbiterScript::Always(verdict) => Ok(verdict),
            ArbiterScript::IdenticalOnly if text_a == text_b => Ok(Verdict::Duplicate),
            ArbiterScript::IdenticalOnly => Ok(Verdict::Distinct),
            ArbiterScript::Fail => Err(ArbiterError::Unparseable("maybe".to_string())),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    reports: Mutex<Vec<DuplicateReport>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn reports(&self) -> Vec<DuplicateReport> {
        self.reports.lock().unwrap().clone()
    }

    /// Every id across every received payload, in delivery order.
    pub fn delivered_ids(&self) -> Vec<RecordId> {
        self.reports()
            .into_iter()
            .flat_map(|r| r.duplicates)
            .collect()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, report: &DuplicateReport) -> Result<(), DeliveryError> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(DeliveryError::Status {
                status: 500,
                body: "webhook down".to_string(),
            });
        }
        Ok(())
    }
}

/// Serves `records` in pages; optionally fails at a given offset.
pub struct VecSource {
    records: Vec<Record>,
    fail_at_offset: Option<usize>,
    requests: Mutex<Vec<(usize, usize)>>,
}

impl VecSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            fail_at_offset: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(records: Vec<Record>, offset: usize) -> Self {
        Self {
            fail_at_offset: Some(offset),
            ..Self::new(records)
        }
    }

    pub fn requests(&self) -> Vec<(usize, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn fetch_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>, SourceFetchError> {
        self.requests.lock().unwrap().push((limit, offset));
        if self.fail_at_offset == Some(offset) {
            return Err(SourceFetchError::Malformed {
                offset,
                reason: "rows is not an array".to_string(),
            });
        }
        Ok(self.records.iter().skip(offset).take(limit).cloned().collect())
    }
}

/// One canned answer from `HttpStub`.
#[derive(Clone)]
pub enum StubReply {
    Respond {
        status: u16,
        content_type: &'static str,
        body: String,
    },
    /// Read the request and never answer.
    Hang,
}

impl StubReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        StubReply::Respond {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn html(status: u16, body: &str) -> Self {
        StubReply::Respond {
            status,
            content_type: "text/html",
            body: body.to_string(),
        }
    }
}

/// A local HTTP/1.1 server that answers the n-th connection with the n-th
/// reply, repeating the last one once the script runs out.
pub struct HttpStub {
    pub url: Url,
    hits: Arc<AtomicUsize>,
}

impl HttpStub {
    pub async fn start(replies: Vec<StubReply>) -> Self {
        assert!(!replies.is_empty(), "stub needs at least one reply");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = replies[n.min(replies.len() - 1)].clone();
                tokio::spawn(serve_one(socket, reply));
            }
        });
        Self {
            url: Url::parse(&format!("http://{}/v1", addr)).unwrap(),
            hits,
        }
    }

    /// Requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve_one(mut socket: TcpStream, reply: StubReply) {
    read_request(&mut socket).await;
    match reply {
        StubReply::Respond {
            status,
            content_type,
            body,
        } => {
            let response = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        StubReply::Hang => tokio::time::sleep(Duration::from_secs(60)).await,
    }
}

/// Consume the request head and its `Content-Length` body.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n");
        if let Some(end) = head_end {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}
