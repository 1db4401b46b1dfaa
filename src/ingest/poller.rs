//! Periodic ingest cycle.
//!
//! Every cycle pulls the day's events, the upcoming schedule, and the live
//! scoreboard, merges them (livescore wins on overlap — it is the freshest),
//! then normalizes, reconciles, and runs the alert trigger check. Upstream
//! failures are soft: the cycle is skipped and stored data stands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::config::PollerConfig;
use crate::db::store::Store;
use crate::ingest::normalize::normalize_events;
use crate::ingest::reconcile::reconcile;
use crate::monitoring::health::{CycleReport, HealthState};
use crate::notify::trigger::process_transitions;
use crate::notify::webhook::Notifier;
use crate::sportsdb::client::SportsDbClient;
use crate::sportsdb::models::SportsDbEvent;

pub struct Poller {
    store: Arc<Store>,
    client: Arc<SportsDbClient>,
    notifier: Arc<Notifier>,
    health: HealthState,
    config: PollerConfig,
    cycle_number: u64,
}

impl Poller {
    pub fn new(
        store: Arc<Store>,
        client: Arc<SportsDbClient>,
        notifier: Arc<Notifier>,
        health: HealthState,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            client,
            notifier,
            health,
            config,
            cycle_number: 0,
        }
    }

    /// Run cycles forever. Never returns under normal operation.
    pub async fn run(mut self) {
        let interval = std::time::Duration::from_secs(self.config.interval_seconds);
        info!(interval_s = self.config.interval_seconds, "Poller started");

        loop {
            match self.run_cycle().await {
                Ok(report) => {
                    self.health.record_cycle(self.cycle_number, &report).await;
                }
                Err(e) => {
                    warn!(cycle = self.cycle_number, error = %e, "Ingest cycle failed — keeping previous data");
                    self.health.record_failure(&e.to_string()).await;
                    if let Err(e) = self
                        .notifier
                        .ingest_failed(self.cycle_number, &e.to_string())
                        .await
                    {
                        warn!(error = %e, "Failed to report ingest failure");
                    }
                }
            }

            self.cycle_number += 1;
            tokio::time::sleep(interval).await;
        }
    }

    /// One fetch → normalize → reconcile → trigger-check pass.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let start = Instant::now();
        let now = Utc::now();
        info!(cycle = self.cycle_number, "Starting ingest cycle");

        let mut merged: HashMap<String, SportsDbEvent> = HashMap::new();
        let mut sources_ok = 0usize;

        // Fetch order matters: the livescore lands last so its view of a
        // match overwrites the schedule's.
        match self.client.events_on_day(now.date_naive()).await {
            Ok(events) => {
                sources_ok += 1;
                merge_events(&mut merged, events);
            }
            Err(e) => warn!(error = %e, "Day fetch failed"),
        }
        match self.client.next_events().await {
            Ok(events) => {
                sources_ok += 1;
                merge_events(&mut merged, events);
            }
            Err(e) => warn!(error = %e, "Schedule fetch failed"),
        }
        match self.client.live_events().await {
            Ok(events) => {
                sources_ok += 1;
                merge_events(&mut merged, events);
            }
            Err(e) => warn!(error = %e, "Livescore fetch failed"),
        }

        if sources_ok == 0 {
            bail!("all upstream sources failed");
        }

        let raw: Vec<SportsDbEvent> = merged.into_values().collect();
        let normalized = normalize_events(&raw, now);
        let outcome = reconcile(&self.store, &normalized).await?;
        let alerts_fired =
            process_transitions(&self.store, &self.notifier, &outcome.transitions).await?;

        let report = CycleReport {
            fetched: raw.len(),
            inserted: outcome.summary.inserted,
            updated: outcome.summary.updated,
            unchanged: outcome.summary.unchanged,
            alerts_fired,
        };

        info!(
            cycle = self.cycle_number,
            duration_ms = start.elapsed().as_millis() as u64,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            alerts_fired = report.alerts_fired,
            "Ingest cycle complete"
        );

        Ok(report)
    }

    pub fn cycle_number(&self) -> u64 {
        self.cycle_number
    }
}

fn merge_events(merged: &mut HashMap<String, SportsDbEvent>, events: Vec<SportsDbEvent>) {
    for event in events {
        let Some(id) = event.id_event.clone() else {
            continue;
        };
        merged.insert(id, event);
    }
}
