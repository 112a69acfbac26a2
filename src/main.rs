mod api;
mod config;
mod db;
mod error;
mod ingest;
mod scheduler;
mod types;
mod upstream;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::{RecordStore, SqliteRecordStore};
use crate::error::Result;
use crate::ingest::IngestionJob;
use crate::upstream::{HttpUpstream, Upstream};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::connect(&cfg.database_url).await?);
    info!("Record store ready at {}", cfg.database_url);

    // --- Upstream client ---
    let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(&cfg)?);
    info!(
        "Upstream {} (timeout {}s), sport allow-list: {}",
        cfg.upstream_base_url,
        cfg.upstream_timeout.as_secs(),
        cfg.ingest.sport_ids.join(","),
    );
    if cfg.ingest.include_sample_record {
        warn!("INCLUDE_SAMPLE_RECORD is on: the \"sample data\" sentinel is added to every cycle");
    }

    // --- Ingestion job ---
    let health = Arc::new(HealthState::new());
    let job = Arc::new(IngestionJob::new(
        Arc::clone(&store),
        Arc::clone(&upstream),
        cfg.ingest.clone(),
        Arc::clone(&health),
    ));

    if cfg.run_on_startup {
        let startup_job = Arc::clone(&job);
        tokio::spawn(async move { startup_job.run_cycle().await });
    }

    let mut sched = scheduler::start(job, &cfg.job_schedule).await?;

    // --- HTTP API server ---
    let app = router(ApiState { store, upstream, health });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down scheduler");
    sched.shutdown().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

pub(crate) fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
