//! Idempotent reconciliation of normalized matches against storage.
//!
//! Keyed by `external_event_id`: insert when absent, update mutable fields
//! only when they differ, always refresh the fetch timestamp. Reports the
//! status/score transitions it observed so the alert check can run on them.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::db::store::{MatchRecord, Store};
use crate::model::{MatchStatus, MatchTransition, NormalizedMatch, ScorePayload};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub summary: ReconcileSummary,
    pub transitions: Vec<MatchTransition>,
}

/// Upsert a batch of normalized matches. Running this twice with identical
/// input leaves the table unchanged apart from the timestamp touch.
pub async fn reconcile(store: &Store, batch: &[NormalizedMatch]) -> Result<ReconcileOutcome> {
    let mut outcome = ReconcileOutcome::default();

    for m in batch {
        match store
            .get_match_by_external_id(&m.external_event_id)
            .await
            .with_context(|| format!("Lookup failed for event {}", m.external_event_id))?
        {
            None => {
                store.insert_match(m).await?;
                outcome.summary.inserted += 1;
            }
            Some(existing) => {
                if differs(&existing, m) {
                    let old_status = stored_status(&existing);
                    if old_status == MatchStatus::Finished && m.status != MatchStatus::Finished {
                        warn!(
                            external_event_id = %m.external_event_id,
                            old = %old_status,
                            new = %m.status,
                            "Upstream reports a backward status transition"
                        );
                    }

                    store.update_match_fields(existing.id, m).await?;
                    outcome.summary.updated += 1;
                    outcome.transitions.push(MatchTransition {
                        match_id: existing.id,
                        external_event_id: m.external_event_id.clone(),
                        home_player: m.home_player.clone(),
                        away_player: m.away_player.clone(),
                        old_status,
                        new_status: m.status,
                        old_score: stored_score(&existing),
                        new_score: m.score.clone(),
                    });
                } else {
                    store.touch_match(existing.id).await?;
                    outcome.summary.unchanged += 1;
                }
            }
        }
    }

    debug!(
        inserted = outcome.summary.inserted,
        updated = outcome.summary.updated,
        unchanged = outcome.summary.unchanged,
        "Reconcile pass complete"
    );
    Ok(outcome)
}

fn stored_status(record: &MatchRecord) -> MatchStatus {
    record.status.parse().unwrap_or(MatchStatus::Scheduled)
}

fn stored_score(record: &MatchRecord) -> Option<ScorePayload> {
    record
        .score
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
}

/// Whether any mutable field differs between the stored row and the
/// normalized record.
fn differs(existing: &MatchRecord, m: &NormalizedMatch) -> bool {
    stored_status(existing) != m.status
        || stored_score(existing) != m.score
        || existing.round != m.round
        || existing.league != m.league
        || existing.home_player != m.home_player
        || existing.away_player != m.away_player
        || existing.start_time != m.start_time.to_rfc3339()
        || existing.venue != m.venue
        || existing.city != m.city
}
