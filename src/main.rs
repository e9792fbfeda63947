use anyhow::{Context, Result};
use dedupe_lib::matching::manager::DuplicatePipeline;
use dedupe_lib::server::routes::{build_router, AppState};
use dedupe_lib::utils::env::load_env;
use dedupe_lib::utils::pipeline_config::PipelineConfig;
use log::info;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    env_logger::init();
    info!("Starting job-listing duplicate detection service");

    let config = PipelineConfig::from_env().context("Failed to load pipeline configuration")?;
    config.log_config();

    let pipeline = DuplicatePipeline::from_config(config)?;
    let app = build_router(AppState::new(pipeline));

    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "10000".to_string())
        .parse()
        .context("PORT must be a valid port number")?;
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("✅ Server is running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
