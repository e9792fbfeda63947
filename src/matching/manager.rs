// src/matching/manager.rs - Pipeline driver: fetch, primary sweep, contact sweep, finalize
use anyhow::{Context, Result};
use log::info;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::delivery::batcher::ResultBatcher;
use crate::delivery::webhook::{DeliverySink, WebhookSink};
use crate::matching::arbiter::{OpenAiArbiter, SemanticArbiter};
use crate::matching::cascade::PairCascade;
use crate::matching::elimination::choose_record_to_retire;
use crate::matching::partition::{
    comparable_groups, contact_key, normalize_contact, pair_count, partition, primary_key,
};
use crate::models::matching::PairKey;
use crate::models::record::Record;
use crate::models::stats_models::{RunSummary, SweepStats};
use crate::source::table_client::{fetch_all, RecordSource, TableClient};
use crate::utils::pipeline_config::{PipelineConfig, SweepConfig};
use crate::utils::progress_bars::logging::{log_pipeline_start, SweepLogger};
use crate::utils::progress_bars::progress_config::ProgressConfig;

/// Runs one duplicate detection pass end to end. Holds no state between runs.
pub struct DuplicatePipeline {
    config: PipelineConfig,
    source: Arc<dyn RecordSource>,
    arbiter: Arc<dyn SemanticArbiter>,
    sink: Arc<dyn DeliverySink>,
    progress: ProgressConfig,
}

impl DuplicatePipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn RecordSource>,
        arbiter: Arc<dyn SemanticArbiter>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            config,
            source,
            arbiter,
            sink,
            progress: ProgressConfig::disabled(),
        }
    }

    /// Wire the HTTP-backed table client, arbiter and webhook from `config`.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let source = TableClient::new(&config.source).context("Failed to build table client")?;
        let arbiter =
            OpenAiArbiter::new(&config.arbiter).context("Failed to build arbiter client")?;
        let sink = WebhookSink::new(&config.delivery).context("Failed to build webhook client")?;
        Ok(Self::new(config, Arc::new(source), Arc::new(arbiter), Arc::new(sink)))
    }

    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DeliverySink>) -> Self {
        self.sink = sink;
        self
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let run_id_str = run_id.to_string();
        let start = Instant::now();
        log_pipeline_start(&run_id_str, self.config.contact.is_some());

        let records = fetch_all(
            self.source.as_ref(),
            self.config.source.page_size,
            self.config.source.page_delay,
        )
        .await
        .context("Failed to fetch records from the table store")?;

        let mut batcher = ResultBatcher::new(
            self.sink.as_ref(),
            self.config.delivery.mode,
            self.config.delivery.batch_size,
            records.len(),
        );

        let all_records: Vec<&Record> = records.iter().collect();
        let include_city = self.config.primary.include_city;
        let primary_logger = SweepLogger::new(self.config.primary.kind);
        let primary = self
            .run_sweep(
                &self.config.primary,
                &primary_logger,
                &all_records,
                |r| primary_key(r, include_city),
                &mut batcher,
                &run_id_str,
            )
            .await;

        let contact = match &self.config.contact {
            Some(contact_config) => {
                let logger = SweepLogger::new(contact_config.kind);
                let mut excluded_retired = 0;
                let mut excluded_contact = 0;
                let eligible: Vec<&Record> = records
                    .iter()
                    .filter(|r| {
                        if batcher.is_retired(&r.id) {
                            excluded_retired += 1;
                            return false;
                        }
                        if r.contact.as_deref().and_then(normalize_contact).is_none() {
                            excluded_contact += 1;
                            return false;
                        }
                        true
                    })
                    .collect();
                logger.log_excluded(excluded_retired, excluded_contact);
                Some(
                    self.run_sweep(
                        contact_config,
                        &logger,
                        &eligible,
                        contact_key,
                        &mut batcher,
                        &run_id_str,
                    )
                    .await,
                )
            }
            None => None,
        };

        let outcome = batcher.finalize().await;
        let arbiter_calls = primary.arbiter_calls + contact.as_ref().map_or(0, |s| s.arbiter_calls);

        let summary = RunSummary {
            run_id,
            total_records: records.len(),
            arbiter_calls,
            retired: outcome.retired,
            primary,
            contact,
            batches_delivered: outcome.batches_delivered,
            delivery_failures: outcome.delivery_failures,
            elapsed: start.elapsed(),
        };
        summary.log_summary();
        Ok(summary)
    }

    /// Compare every unordered pair inside each partition group, strictly in
    /// order, skipping pairs that touch an already retired record.
    async fn run_sweep<F>(
        &self,
        config: &SweepConfig,
        logger: &SweepLogger,
        records: &[&Record],
        key_fn: F,
        batcher: &mut ResultBatcher<'_>,
        run_id: &str,
    ) -> SweepStats
    where
        F: Fn(&Record) -> String,
    {
        logger.log_start(run_id, config);
        let mut stats = SweepStats::new(config.kind);
        stats.records_considered = records.len();

        let groups = partition(records, key_fn);
        stats.groups_total = groups.len();
        let groups = comparable_groups(groups);
        logger.log_partitioned(
            records.len(),
            stats.groups_total,
            groups.len(),
            pair_count(&groups),
        );
        if groups.is_empty() {
            logger.log_warning("No group holds two or more records, nothing to compare");
        }

        let cascade = PairCascade::new(config, self.arbiter.as_ref());
        let pb = self.progress.group_bar(groups.len(), logger.emoji());
        let mut seen_pairs: HashSet<PairKey> = HashSet::new();

        for group in groups.values() {
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    let (first, second) = (group[i], group[j]);
                    if first.id == second.id {
                        continue;
                    }
                    if !seen_pairs.insert(PairKey::new(&first.id, &second.id)) {
                        continue;
                    }
                    if batcher.is_retired(&first.id) || batcher.is_retired(&second.id) {
                        stats.pairs_skipped_retired += 1;
                        continue;
                    }

                    let outcome = cascade.evaluate(first, second).await;
                    stats.record_outcome(outcome);
                    if !outcome.is_duplicate() {
                        continue;
                    }

                    let loser = choose_record_to_retire(first, second);
                    let keeper = if loser == &first.id { &second.id } else { &first.id };
                    if batcher.add(loser.clone()).await {
                        stats.records_retired += 1;
                        logger.log_retirement(&loser.to_string(), &keeper.to_string());
                    }
                }
            }
            stats.groups_compared += 1;
            pb.inc(1);
            if self.progress.should_show_detailed() {
                pb.set_message(format!(
                    "{} retired, {} arbiter calls",
                    stats.records_retired, stats.arbiter_calls
                ));
            }
        }
        pb.finish_and_clear();

        stats.elapsed = logger.get_elapsed();
        logger.log_completion(&stats);
        info!(
            "{} sweep retired {} records ({} retired overall)",
            config.kind.as_str(),
            stats.records_retired,
            batcher.retired().len()
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{RecordId, ANONYMOUS_POSTER};
    use crate::test_support::{record, test_config, RecordingSink, ScriptedArbiter, VecSource};
    use crate::utils::pipeline_config::DeliveryMode;

    struct Harness {
        arbiter: Arc<ScriptedArbiter>,
        sink: Arc<RecordingSink>,
        pipeline: DuplicatePipeline,
    }

    fn harness(records: Vec<Record>, arbiter: ScriptedArbiter, config: PipelineConfig) -> Harness {
        let arbiter = Arc::new(arbiter);
        let sink = Arc::new(RecordingSink::default());
        let pipeline = DuplicatePipeline::new(
            config,
            Arc::new(VecSource::new(records)),
            arbiter.clone(),
            sink.clone(),
        );
        Harness { arbiter, sink, pipeline }
    }

    fn with_contact(mut r: Record, contact: &str) -> Record {
        r.contact = Some(contact.to_string());
        r
    }

    const JOB: &str = "Welder needed in Wroclaw, full time, accommodation provided";

    #[tokio::test]
    async fn test_identical_pair_retires_exactly_one() {
        let records = vec![
            record(1, "Construction", "Welder", JOB),
            record(2, "Construction", "Welder", JOB),
        ];
        let h = harness(records, ScriptedArbiter::identical_only(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        assert_eq!(summary.retired, vec![RecordId::Numeric(2)]);
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.arbiter_calls, 1);
        assert_eq!(h.sink.delivered_ids(), vec![RecordId::Numeric(2)]);
    }

    #[tokio::test]
    async fn test_singleton_group_makes_no_calls() {
        let records = vec![
            record(1, "Construction", "Welder", JOB),
            record(2, "Logistics", "Driver", JOB),
        ];
        let h = harness(records, ScriptedArbiter::always_yes(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        assert_eq!(h.arbiter.calls(), 0);
        assert!(summary.retired.is_empty());
        assert!(h.sink.reports().is_empty());
    }

    #[tokio::test]
    async fn test_partitions_are_never_compared_across() {
        let records = vec![
            record(1, "Construction", "Welder", JOB),
            record(2, "Construction", "Painter", JOB),
            record(3, "Construction", "Welder", "Nanny for two kids, weekends only"),
        ];
        let h = harness(records, ScriptedArbiter::always_yes(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        // Only 1 and 3 share a group, and they fail the lexical gate.
        assert_eq!(h.arbiter.calls(), 0);
        assert_eq!(summary.primary.groups_total, 2);
        assert_eq!(summary.primary.groups_compared, 1);
        assert_eq!(summary.primary.rejected_lexical, 1);
    }

    #[tokio::test]
    async fn test_edit_distance_rejection_makes_no_calls() {
        let records = vec![
            record(1, "A", "B", "alpha beta gamma delta epsilon zeta eta theta"),
            record(2, "A", "B", "theta eta zeta epsilon delta gamma beta alpha"),
        ];
        let h = harness(records, ScriptedArbiter::always_yes(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        assert_eq!(h.arbiter.calls(), 0);
        assert_eq!(summary.primary.rejected_edit_distance, 1);
    }

    #[tokio::test]
    async fn test_contact_sweep_skips_records_retired_by_primary() {
        let records = vec![
            with_contact(record(1, "Construction", "Welder", JOB), "+48 123 456 789"),
            with_contact(record(2, "Construction", "Welder", JOB), "+48123456789"),
        ];
        let h = harness(records, ScriptedArbiter::always_yes(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        assert_eq!(summary.retired, vec![RecordId::Numeric(2)]);
        let contact = summary.contact.unwrap();
        assert_eq!(contact.records_considered, 1);
        assert_eq!(contact.arbiter_calls, 0);
        assert_eq!(h.arbiter.calls(), 1);
    }

    #[tokio::test]
    async fn test_contact_sweep_catches_cross_city_duplicates() {
        let mut a = with_contact(record(1, "Construction", "Welder", JOB), "+48123456789");
        a.city = Some("Wroclaw".to_string());
        let mut b = with_contact(record(2, "Construction", "Welder", JOB), "+48 123-456-789");
        b.city = Some("Poznan".to_string());
        let mut c = with_contact(record(3, "Construction", "Welder", JOB), "n/a");
        c.city = Some("Gdansk".to_string());

        let mut config = test_config();
        config.primary.include_city = true;
        let h = harness(vec![a, b, c], ScriptedArbiter::always_yes(), config);
        let summary = h.pipeline.run().await.unwrap();
        assert_eq!(summary.primary.arbiter_calls, 0);
        let contact = summary.contact.unwrap();
        assert_eq!(contact.records_considered, 2);
        assert_eq!(contact.records_retired, 1);
        assert_eq!(summary.retired, vec![RecordId::Numeric(2)]);
    }

    #[tokio::test]
    async fn test_anonymous_poster_is_retired() {
        let mut anon = record(1, "A", "B", JOB);
        anon.poster = Some(ANONYMOUS_POSTER.to_string());
        let mut known = record(2, "A", "B", JOB);
        known.poster = Some("Jan".to_string());
        let h = harness(vec![anon, known], ScriptedArbiter::always_yes(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        assert_eq!(summary.retired, vec![RecordId::Numeric(1)]);
    }

    #[tokio::test]
    async fn test_retired_records_are_not_compared_again() {
        let records: Vec<Record> = (1..=3).map(|i| record(i, "A", "B", JOB)).collect();
        let h = harness(records, ScriptedArbiter::always_yes(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        // (1,2) retires 2; (1,3) retires 3; (2,3) is skipped.
        assert_eq!(summary.retired, vec![RecordId::Numeric(2), RecordId::Numeric(3)]);
        assert_eq!(summary.arbiter_calls, 2);
        assert_eq!(summary.primary.pairs_skipped_retired, 1);
    }

    #[tokio::test]
    async fn test_repeated_rows_are_not_paired_with_themselves() {
        let records = vec![record(7, "A", "B", JOB), record(7, "A", "B", JOB)];
        let h = harness(records, ScriptedArbiter::always_yes(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        assert_eq!(h.arbiter.calls(), 0);
        assert!(summary.retired.is_empty());
    }

    #[tokio::test]
    async fn test_arbiter_failures_retire_nothing() {
        let records = vec![record(1, "A", "B", JOB), record(2, "A", "B", JOB)];
        let h = harness(records, ScriptedArbiter::failing(), test_config());
        let summary = h.pipeline.run().await.unwrap();
        assert!(summary.retired.is_empty());
        assert_eq!(summary.primary.arbiter_failures, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal_and_delivers_nothing() {
        let records = vec![record(1, "A", "B", JOB), record(2, "A", "B", JOB)];
        let arbiter = Arc::new(ScriptedArbiter::always_yes());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = DuplicatePipeline::new(
            test_config(),
            Arc::new(VecSource::failing_at(records, 0)),
            arbiter.clone(),
            sink.clone(),
        );
        assert!(pipeline.run().await.is_err());
        assert_eq!(arbiter.calls(), 0);
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn test_full_report_mode_delivers_once() {
        let records: Vec<Record> = (1..=4)
            .map(|i| record(i, "A", "B", JOB))
            .chain((5..=6).map(|i| record(i, "C", "D", JOB)))
            .collect();
        let mut config = test_config();
        config.delivery.mode = DeliveryMode::FullReport;
        config.delivery.batch_size = 1;
        let h = harness(records, ScriptedArbiter::always_yes(), config);
        let summary = h.pipeline.run().await.unwrap();
        let reports = h.sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].found, summary.total_retired());
        assert_eq!(reports[0].total, 6);
        assert_eq!(reports[0].duplicates, summary.retired);
    }

    #[tokio::test]
    async fn test_incremental_delivery_never_repeats_ids() {
        let records: Vec<Record> = (1..=7).map(|i| record(i, "A", "B", JOB)).collect();
        let mut config = test_config();
        config.delivery.batch_size = 2;
        let h = harness(records, ScriptedArbiter::always_yes(), config);
        let summary = h.pipeline.run().await.unwrap();
        let delivered = h.sink.delivered_ids();
        assert_eq!(delivered, summary.retired);
        assert_eq!(delivered.len(), 6);
        assert_eq!(summary.batches_delivered, 3);
    }
}
