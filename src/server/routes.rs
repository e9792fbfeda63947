// src/server/routes.rs - HTTP trigger for background duplicate checks
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::matching::manager::DuplicatePipeline;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<DuplicatePipeline>,
    running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(pipeline: DuplicatePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Clears the running flag when the background run ends, even on panic.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/check", post(trigger_check))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Acknowledge immediately and run the pipeline in the background. A trigger
/// that arrives while a run is active is acknowledged without starting another.
async fn trigger_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    info!("✅ Received duplicate check request");
    if state.running.swap(true, Ordering::SeqCst) {
        info!("⏭️  Duplicate check already running, not starting another");
        return (StatusCode::ACCEPTED, "Duplicate check already in progress");
    }

    let guard = RunGuard(state.running.clone());
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let _guard = guard;
        if let Err(e) = pipeline.run().await {
            error!("❌ Background duplicate check failed: {:#}", e);
        }
    });

    (StatusCode::ACCEPTED, "Duplicate check accepted for processing")
}
