// src/models/matching.rs - Pair identity and per-pair cascade outcomes

use crate::models::record::RecordId;

/// Order-independent identifier of an unordered pair of record ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(RecordId, RecordId);

impl PairKey {
    pub fn new(a: &RecordId, b: &RecordId) -> Self {
        if a <= b {
            PairKey(a.clone(), b.clone())
        } else {
            PairKey(b.clone(), a.clone())
        }
    }

    pub fn ids(&self) -> (&RecordId, &RecordId) {
        (&self.0, &self.1)
    }
}

/// Result of running one candidate pair through the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    RejectedLexical,
    RejectedEditDistance,
    ConfirmedDuplicate,
    ConfirmedDistinct,
    ArbiterFailed,
}

impl PairOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PairOutcome::ConfirmedDuplicate)
    }

    /// Whether the arbiter was consulted for this pair.
    pub fn reached_arbiter(&self) -> bool {
        matches!(
            self,
            PairOutcome::ConfirmedDuplicate
                | PairOutcome::ConfirmedDistinct
                | PairOutcome::ArbiterFailed
        )
    }
}
