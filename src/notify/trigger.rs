//! Alert trigger evaluation.
//!
//! Pure rule matching over match transitions. The reconciler reports what
//! changed; this module decides which trigger kinds that change represents
//! and joins them against the active alerts on the match.

use anyhow::Result;
use tracing::info;

use crate::db::store::Store;
use crate::model::{MatchStatus, MatchTransition, ScorePayload, TriggerKind};
use crate::notify::webhook::Notifier;

/// Which trigger kinds a single transition represents.
pub fn fired_triggers(transition: &MatchTransition) -> Vec<TriggerKind> {
    let mut fired = Vec::new();

    if transition.old_status == MatchStatus::Scheduled
        && transition.new_status == MatchStatus::InPlay
    {
        fired.push(TriggerKind::MatchStarted);
    }

    if transition.old_status != MatchStatus::Finished
        && transition.new_status == MatchStatus::Finished
    {
        fired.push(TriggerKind::MatchFinished);
    }

    if transition.new_status == MatchStatus::InPlay {
        if crossed(transition, |s| s.sets_completed() >= 2) {
            fired.push(TriggerKind::ThirdSet);
        }
        if crossed(transition, ScorePayload::mentions_tie_break) {
            fired.push(TriggerKind::TieBreak);
        }
    }

    fired
}

/// True when the predicate holds for the new score but not the old one, so a
/// condition fires once when first observed rather than on every poll.
fn crossed(transition: &MatchTransition, pred: impl Fn(&ScorePayload) -> bool) -> bool {
    let new_holds = transition.new_score.as_ref().is_some_and(&pred);
    let old_holds = transition.old_score.as_ref().is_some_and(&pred);
    new_holds && !old_holds
}

/// Run the trigger check for a batch of transitions and deliver matching
/// alerts. Returns the number of alerts fired.
pub async fn process_transitions(
    store: &Store,
    notifier: &Notifier,
    transitions: &[MatchTransition],
) -> Result<usize> {
    let mut fired_count = 0usize;

    for transition in transitions {
        let fired = fired_triggers(transition);
        if fired.is_empty() {
            continue;
        }

        let alerts = store.get_active_alerts_for_match(transition.match_id).await?;
        for alert in &alerts {
            let Ok(kind) = alert.trigger_kind.parse::<TriggerKind>() else {
                continue;
            };
            if !fired.contains(&kind) {
                continue;
            }

            info!(
                alert_id = alert.id,
                user_id = alert.user_id,
                match_id = transition.match_id,
                trigger = %kind,
                "Alert fired"
            );
            notifier
                .alert_fired(alert.user_id, &transition.label(), kind)
                .await?;
            fired_count += 1;
        }
    }

    Ok(fired_count)
}
