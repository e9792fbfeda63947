// src/models/stats_models.rs
use log::info;
use std::time::Duration;
use uuid::Uuid;

use crate::models::matching::PairOutcome;
use crate::models::record::RecordId;

/// Which comparison pass a set of statistics belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepKind {
    Primary,
    Contact,
}

impl SweepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Primary => "primary",
            SweepKind::Contact => "contact",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepStats {
    pub kind: SweepKind,
    pub records_considered: usize,
    pub groups_total: usize,
    pub groups_compared: usize,
    pub pairs_evaluated: usize,
    pub pairs_skipped_retired: usize,
    pub rejected_lexical: usize,
    pub rejected_edit_distance: usize,
    pub confirmed_duplicates: usize,
    pub confirmed_distinct: usize,
    pub arbiter_failures: usize,
    pub arbiter_calls: usize,
    pub records_retired: usize,
    pub elapsed: Duration,
}

impl SweepStats {
    pub fn new(kind: SweepKind) -> Self {
        Self {
            kind,
            records_considered: 0,
            groups_total: 0,
            groups_compared: 0,
            pairs_evaluated: 0,
            pairs_skipped_retired: 0,
            rejected_lexical: 0,
            rejected_edit_distance: 0,
            confirmed_duplicates: 0,
            confirmed_distinct: 0,
            arbiter_failures: 0,
            arbiter_calls: 0,
            records_retired: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn record_outcome(&mut self, outcome: PairOutcome) {
        self.pairs_evaluated += 1;
        if outcome.reached_arbiter() {
            self.arbiter_calls += 1;
        }
        match outcome {
            PairOutcome::RejectedLexical => self.rejected_lexical += 1,
            PairOutcome::RejectedEditDistance => self.rejected_edit_distance += 1,
            PairOutcome::ConfirmedDuplicate => self.confirmed_duplicates += 1,
            PairOutcome::ConfirmedDistinct => self.confirmed_distinct += 1,
            PairOutcome::ArbiterFailed => self.arbiter_failures += 1,
        }
    }
}

/// End-of-run bookkeeping returned by the driver.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_records: usize,
    pub arbiter_calls: usize,
    pub retired: Vec<RecordId>,
    pub primary: SweepStats,
    pub contact: Option<SweepStats>,
    pub batches_delivered: usize,
    pub delivery_failures: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total_retired(&self) -> usize {
        self.retired.len()
    }

    pub fn log_summary(&self) {
        info!("=== Duplicate Detection Summary ===");
        info!("Run ID: {}", self.run_id);
        info!("Total records: {}", self.total_records);
        info!("Records retired: {}", self.total_retired());
        info!("Arbiter calls: {}", self.arbiter_calls);
        for sweep in std::iter::once(&self.primary).chain(self.contact.iter()) {
            info!(
                "Sweep {}: {} of {} groups compared, {} pairs evaluated, {} skipped (retired), {} lexical rejects, {} edit-distance rejects, {} duplicates, {} distinct, {} arbiter failures in {:.2?}",
                sweep.kind.as_str(),
                sweep.groups_compared,
                sweep.groups_total,
                sweep.pairs_evaluated,
                sweep.pairs_skipped_retired,
                sweep.rejected_lexical,
                sweep.rejected_edit_distance,
                sweep.confirmed_duplicates,
                sweep.confirmed_distinct,
                sweep.arbiter_failures,
                sweep.elapsed
            );
        }
        info!(
            "Deliveries: {} succeeded, {} failed",
            self.batches_delivered, self.delivery_failures
        );
        info!("Total execution time: {:.2?}", self.elapsed);
    }
}
