//! Poll-cycle health state.
//!
//! Shared between the background poller (writer) and the `/health` endpoint
//! (reader). Tracks the most recent ingest cycle and whether it succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Outcome of one ingest cycle, as recorded in health state.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub alerts_fired: usize,
}

#[derive(Clone)]
pub struct HealthState {
    inner: Arc<RwLock<HealthData>>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthData {
    status: String,
    started_at: DateTime<Utc>,
    uptime_seconds: i64,
    cycles_completed: u64,
    last_cycle_at: Option<DateTime<Utc>>,
    last_cycle_fetched: usize,
    last_cycle_inserted: usize,
    last_cycle_updated: usize,
    last_cycle_alerts_fired: usize,
    last_cycle_error: Option<String>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthData {
                status: "ok".to_string(),
                started_at: Utc::now(),
                uptime_seconds: 0,
                cycles_completed: 0,
                last_cycle_at: None,
                last_cycle_fetched: 0,
                last_cycle_inserted: 0,
                last_cycle_updated: 0,
                last_cycle_alerts_fired: 0,
                last_cycle_error: None,
            })),
        }
    }

    pub async fn record_cycle(&self, cycle_number: u64, report: &CycleReport) {
        let mut data = self.inner.write().await;
        data.status = "ok".to_string();
        data.cycles_completed = cycle_number + 1;
        data.last_cycle_at = Some(Utc::now());
        data.last_cycle_fetched = report.fetched;
        data.last_cycle_inserted = report.inserted;
        data.last_cycle_updated = report.updated;
        data.last_cycle_alerts_fired = report.alerts_fired;
        data.last_cycle_error = None;
        data.uptime_seconds = (Utc::now() - data.started_at).num_seconds();
    }

    /// A failed cycle is degraded, not fatal — the previous data stands.
    pub async fn record_failure(&self, error: &str) {
        let mut data = self.inner.write().await;
        data.status = "degraded".to_string();
        data.last_cycle_at = Some(Utc::now());
        data.last_cycle_error = Some(error.to_string());
        data.uptime_seconds = (Utc::now() - data.started_at).num_seconds();
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let data = self.inner.read().await;
        serde_json::to_value(&*data).unwrap_or_else(|_| {
            serde_json::json!({"status": "error", "message": "serialization failed"})
        })
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}
