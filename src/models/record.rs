// src/models/record.rs - Job-listing ticket as received from the table store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Poster identity used by the intake bot when the author is unknown.
pub const ANONYMOUS_POSTER: &str = "Anonymous participant";

/// Opaque row identifier. The table store hands out numeric ids, but
/// string ids are accepted and echoed back in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Numeric(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Numeric(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/// One ticket row. Never mutated by the pipeline; only referenced by id.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(rename = "Job categories", default)]
    pub category: Option<String>,
    #[serde(rename = "Job sub categories", default)]
    pub sub_category: Option<String>,
    #[serde(rename = "City", default)]
    pub city: Option<String>,
    #[serde(rename = "Phone number", default)]
    pub contact: Option<String>,
    #[serde(rename = "Username", default)]
    pub poster: Option<String>,
    #[serde(rename = "Requirements", default, deserialize_with = "null_as_empty")]
    pub body: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Record {
    pub fn is_anonymous(&self) -> bool {
        self.poster.as_deref() == Some(ANONYMOUS_POSTER)
    }

    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }

    pub fn sub_category(&self) -> &str {
        self.sub_category.as_deref().unwrap_or("")
    }
}
