//! Shared health state for the /health endpoint.
//! Updated by the ingestion job after every cycle.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::routes::ApiState;

#[derive(Default)]
pub struct HealthState {
    /// Nanosecond timestamp of the last finished cycle, successful or not (0 = none yet).
    pub last_cycle_at_ns: AtomicU64,
    pub cycles_ok: AtomicU64,
    pub cycles_failed: AtomicU64,
    /// Records written across all cycles since startup.
    pub records_inserted: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at_ns: u64, inserted: u64) {
        self.last_cycle_at_ns.store(at_ns, Ordering::Relaxed);
        self.cycles_ok.fetch_add(1, Ordering::Relaxed);
        self.records_inserted.fetch_add(inserted, Ordering::Relaxed);
    }

    pub fn record_failure(&self, at_ns: u64) {
        self.last_cycle_at_ns.store(at_ns, Ordering::Relaxed);
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthResponse {
        let last = self.last_cycle_at_ns.load(Ordering::Relaxed);
        HealthResponse {
            status: "ok",
            last_cycle_at_ns: (last != 0).then_some(last),
            cycles_ok: self.cycles_ok.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            records_inserted: self.records_inserted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub last_cycle_at_ns: Option<u64>,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub records_inserted: u64,
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(state.health.snapshot())
}
