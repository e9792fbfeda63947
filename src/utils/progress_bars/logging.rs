// src/utils/progress_bars/logging.rs - Logging helpers for comparison sweeps
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::stats_models::{SweepKind, SweepStats};
use crate::utils::pipeline_config::SweepConfig;

#[derive(Clone)]
pub struct SweepLogger {
    sweep_name: &'static str,
    sweep_emoji: &'static str,
    start_time: Instant,
}

impl SweepLogger {
    pub fn new(kind: SweepKind) -> Self {
        let (sweep_name, sweep_emoji) = match kind {
            SweepKind::Primary => ("PRIMARY", "🗂️"),
            SweepKind::Contact => ("CONTACT", "📞"),
        };
        Self {
            sweep_name,
            sweep_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn emoji(&self) -> &'static str {
        self.sweep_emoji
    }

    pub fn log_start(&self, run_id: &str, config: &SweepConfig) {
        info!(
            "[{}] {} 🚀 Starting {} sweep (run ID: {})",
            self.sweep_name,
            self.sweep_emoji,
            self.sweep_name.to_lowercase(),
            run_id
        );
        info!(
            "[{}] {} ⚙️  Window {} chars, lexical >= {:.2}, edit distance >= {:.2}",
            self.sweep_name,
            self.sweep_emoji,
            config.text_window,
            config.lexical_threshold,
            config.edit_threshold
        );
    }

    pub fn log_partitioned(
        &self,
        records: usize,
        groups: usize,
        comparable_groups: usize,
        pairs: usize,
    ) {
        info!(
            "[{}] {} ✅ Partitioning complete: {} records → {} groups → {} groups with 2+ records",
            self.sweep_name, self.sweep_emoji, records, groups, comparable_groups
        );
        info!(
            "[{}] {} 📈 Potential pairs to evaluate: {}",
            self.sweep_name, self.sweep_emoji, pairs
        );
    }

    pub fn log_excluded(&self, retired: usize, implausible_contact: usize) {
        if retired + implausible_contact > 0 {
            info!(
                "[{}] {} 🚫 Excluded {} already retired records and {} records without a usable contact",
                self.sweep_name, self.sweep_emoji, retired, implausible_contact
            );
        }
    }

    pub fn log_retirement(&self, retired: &str, kept: &str) {
        debug!(
            "[{}] {} 🗑️  Retiring {} as a duplicate of {}",
            self.sweep_name, self.sweep_emoji, retired, kept
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.sweep_name, self.sweep_emoji, message);
    }

    pub fn log_completion(&self, stats: &SweepStats) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED: {} records retired in {:.2?}",
            self.sweep_name, self.sweep_emoji, stats.records_retired, duration
        );
        info!(
            "[{}] {} 📦 Groups: {} of {} compared",
            self.sweep_name, self.sweep_emoji, stats.groups_compared, stats.groups_total
        );
        info!(
            "[{}] {} 📊 Pairs: {} evaluated, {} lexical rejects, {} edit-distance rejects, {} arbiter calls",
            self.sweep_name,
            self.sweep_emoji,
            stats.pairs_evaluated,
            stats.rejected_lexical,
            stats.rejected_edit_distance,
            stats.arbiter_calls
        );
        if stats.arbiter_failures > 0 {
            warn!(
                "[{}] {} ⚠️  {} arbiter calls failed and were treated as distinct",
                self.sweep_name, self.sweep_emoji, stats.arbiter_failures
            );
        }
    }

    pub fn get_elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

pub fn log_pipeline_start(run_id: &str, contact_sweep: bool) {
    info!("🚀 ===== DUPLICATE DETECTION PIPELINE STARTING =====");
    info!("📅 Run ID: {}", run_id);
    info!(
        "🎯 Sweeps: Primary 🗂️{}",
        if contact_sweep { ", Contact 📞" } else { "" }
    );
    info!("====================================================");
}
