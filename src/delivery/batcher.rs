// src/delivery/batcher.rs - Retirement bookkeeping and bounded delivery
use chrono::Utc;
use log::{debug, warn};
use std::collections::HashSet;

use crate::delivery::webhook::{DeliverySink, DuplicateReport};
use crate::models::record::RecordId;
use crate::utils::pipeline_config::DeliveryMode;

/// Ids marked for removal during a run, in the order they were decided.
/// Grows monotonically; an id is never added twice.
#[derive(Debug, Default, Clone)]
pub struct RetirementSet {
    order: Vec<RecordId>,
    members: HashSet<RecordId>,
}

impl RetirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id was already retired.
    pub fn insert(&mut self, id: RecordId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.order
    }

    pub fn into_vec(self) -> Vec<RecordId> {
        self.order
    }
}

/// What the batcher hands back once the run is finalized.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub retired: Vec<RecordId>,
    pub batches_delivered: usize,
    pub delivery_failures: usize,
}

/// Owns the run's `RetirementSet` and the pending batch, and pushes
/// reports to the sink in the configured delivery style.
pub struct ResultBatcher<'a> {
    sink: &'a dyn DeliverySink,
    mode: DeliveryMode,
    batch_size: usize,
    total_records: usize,
    retired: RetirementSet,
    pending: Vec<RecordId>,
    batches_delivered: usize,
    delivery_failures: usize,
}

impl<'a> ResultBatcher<'a> {
    pub fn new(
        sink: &'a dyn DeliverySink,
        mode: DeliveryMode,
        batch_size: usize,
        total_records: usize,
    ) -> Self {
        Self {
            sink,
            mode,
            batch_size: batch_size.max(1),
            total_records,
            retired: RetirementSet::new(),
            pending: Vec::new(),
            batches_delivered: 0,
            delivery_failures: 0,
        }
    }

    pub fn is_retired(&self, id: &RecordId) -> bool {
        self.retired.contains(id)
    }

    pub fn retired(&self) -> &RetirementSet {
        &self.retired
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Mark `id` for retirement. Returns `false` and does nothing if it
    /// already was. In incremental mode a full batch is flushed right away.
    pub async fn add(&mut self, id: RecordId) -> bool {
        if !self.retired.insert(id.clone()) {
            return false;
        }
        if self.mode == DeliveryMode::Incremental {
            self.pending.push(id);
            if self.pending.len() >= self.batch_size {
                self.flush().await;
            }
        }
        true
    }

    /// Send the pending batch and clear it. The batch is cleared even when
    /// delivery fails; retirement decisions are never rolled back.
    pub async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let report = DuplicateReport {
            duplicates: std::mem::take(&mut self.pending),
            total: self.total_records,
            found: self.retired.len(),
            timestamp: Utc::now(),
        };
        self.send(&report).await;
    }

    /// Deliver whatever the mode still owes the consumer and hand back the result.
    pub async fn finalize(mut self) -> DeliveryOutcome {
        match self.mode {
            DeliveryMode::Incremental => self.flush().await,
            DeliveryMode::FullReport => {
                let report = DuplicateReport {
                    duplicates: self.retired.ids().to_vec(),
                    total: self.total_records,
                    found: self.retired.len(),
                    timestamp: Utc::now(),
                };
                self.send(&report).await;
            }
        }
        DeliveryOutcome {
            retired: self.retired.into_vec(),
            batches_delivered: self.batches_delivered,
            delivery_failures: self.delivery_failures,
        }
    }

    async fn send(&mut self, report: &DuplicateReport) {
        match self.sink.deliver(report).await {
            Ok(()) => {
                self.batches_delivered += 1;
                debug!(
                    "Delivered report with {} ids ({} found so far)",
                    report.duplicates.len(),
                    report.found
                );
            }
            Err(e) => {
                self.delivery_failures += 1;
                warn!("❌ Failed to deliver {} ids, not retrying: {}", report.duplicates.len(), e);
            }
        }
    }
}
