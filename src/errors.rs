// src/errors.rs - Error taxonomy for the three external seams

use thiserror::Error;

/// A page request against the table store failed. Always fatal to a run.
#[derive(Debug, Error)]
pub enum SourceFetchError {
    #[error("table request at offset {offset} failed: {source}")]
    Transport {
        offset: usize,
        #[source]
        source: reqwest::Error,
    },
    #[error("table store returned status {status} at offset {offset}: {body}")]
    Status {
        offset: usize,
        status: u16,
        body: String,
    },
    #[error("malformed page at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
}

/// A classification call could not produce a clean verdict.
/// The cascade treats every variant as "not a duplicate".
#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("arbiter request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("arbiter request timed out")]
    Timeout,
    #[error("arbiter returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("arbiter answer is not a clean yes/no: {0:?}")]
    Unparseable(String),
}

impl ArbiterError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ArbiterError::Transport(_) | ArbiterError::Timeout => true,
            ArbiterError::Status { status, .. } => *status == 429 || *status >= 500,
            ArbiterError::Unparseable(_) => false,
        }
    }
}

/// A flush to the downstream consumer failed. Logged, never retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("webhook returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
