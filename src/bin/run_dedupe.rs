// src/bin/run_dedupe.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use url::Url;

use dedupe_lib::delivery::webhook::LogSink;
use dedupe_lib::matching::manager::DuplicatePipeline;
use dedupe_lib::utils::env::load_env;
use dedupe_lib::utils::pipeline_config::{DeliveryMode, PipelineConfig};
use dedupe_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Run one duplicate detection pass in the foreground",
    long_about = None
)]
struct RunArgs {
    /// Log the payloads instead of sending them to the webhook
    #[arg(long)]
    dry_run: bool,

    /// Delivery style: incremental or full
    #[arg(long)]
    mode: Option<DeliveryMode>,

    /// Skip the contact-identifier sweep
    #[arg(long)]
    no_contact_sweep: bool,

    /// Override WEBHOOK_URL
    #[arg(long)]
    webhook_url: Option<Url>,

    /// Override DELIVERY_BATCH_SIZE
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    env_logger::init();
    let args = RunArgs::parse();

    let mut config = PipelineConfig::from_env().context("Failed to load pipeline configuration")?;
    if let Some(mode) = args.mode {
        config.delivery.mode = mode;
    }
    if let Some(url) = args.webhook_url {
        config.delivery.webhook_url = url;
    }
    if let Some(batch_size) = args.batch_size {
        config.delivery.batch_size = batch_size.max(1);
    }
    if args.no_contact_sweep {
        config.contact = None;
    }
    config.log_config();

    let mut pipeline =
        DuplicatePipeline::from_config(config)?.with_progress(ProgressConfig::from_env());
    if args.dry_run {
        info!("🧪 Dry run: reports will be logged, not delivered");
        pipeline = pipeline.with_sink(Arc::new(LogSink));
    }

    let summary = pipeline.run().await?;
    println!(
        "Retired {} of {} records with {} arbiter calls in {:.2?}",
        summary.total_retired(),
        summary.total_records,
        summary.arbiter_calls,
        summary.elapsed
    );
    Ok(())
}
