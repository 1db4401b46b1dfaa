//! Normalization of raw upstream events into the internal match schema.
//!
//! Pure functions only: `now` is passed in so the date-based status fallback
//! stays deterministic under test.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::model::{MatchStatus, NormalizedMatch, ScorePayload};
use crate::sportsdb::models::SportsDbEvent;

/// Separators used in event names like "US Open Sinner vs Alcaraz".
const VS_SEPARATORS: &[&str] = &[" vs ", " VS ", " v ", " V "];

/// Status substrings that indicate a match in progress.
const IN_PLAY_PATTERNS: &[&str] = &[
    "live", "playing", "in play", "in progress", "1st set", "2nd set", "3rd set", "final set",
    "set 1", "set 2", "set 3", "tie break",
];

/// Status substrings that indicate a completed match.
const FINISHED_PATTERNS: &[&str] = &["finished", "ft", "final", "completed", "ended", "won", "lost"];

/// Map a raw event into the internal schema. Returns `None` when the record
/// has no external event id — such rows cannot be reconciled and are skipped.
pub fn normalize_event(event: &SportsDbEvent, now: DateTime<Utc>) -> Option<NormalizedMatch> {
    let external_event_id = event.id_event.as_deref()?.trim().to_string();
    if external_event_id.is_empty() {
        return None;
    }

    Some(NormalizedMatch {
        external_event_id,
        league: extract_league(event),
        round: extract_round(event),
        home_player: extract_home_player(event),
        away_player: extract_away_player(event),
        start_time: parse_start_time(event).unwrap_or(now),
        status: map_status(event, now),
        score: extract_score(event),
        venue: non_empty(event.venue.as_deref()),
        city: non_empty(event.city.as_deref()),
    })
}

/// Normalize a batch, dropping records without an id.
pub fn normalize_events(events: &[SportsDbEvent], now: DateTime<Utc>) -> Vec<NormalizedMatch> {
    let normalized: Vec<NormalizedMatch> = events
        .iter()
        .filter_map(|e| normalize_event(e, now))
        .collect();

    tracing::debug!(
        input = events.len(),
        normalized = normalized.len(),
        "Events normalized"
    );
    normalized
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// Home player: explicit fields first, else the left side of the event name's
/// `vs` split with any two-word tournament prefix stripped.
fn extract_home_player(event: &SportsDbEvent) -> String {
    for option in [&event.home_team, &event.player] {
        if let Some(name) = non_empty(option.as_deref()) {
            return name;
        }
    }

    if let Some(event_name) = event.event_name.as_deref() {
        for sep in VS_SEPARATORS {
            if let Some((home_part, _)) = event_name.split_once(sep) {
                let words: Vec<&str> = home_part.split_whitespace().collect();
                if words.len() > 2 {
                    return words[2..].join(" ");
                }
                return home_part.trim().to_string();
            }
        }
    }

    "Unknown Player".to_string()
}

/// Away player: explicit fields first, else the right side of the `vs` split.
fn extract_away_player(event: &SportsDbEvent) -> String {
    for option in [&event.away_team, &event.opponent] {
        if let Some(name) = non_empty(option.as_deref()) {
            return name;
        }
    }

    if let Some(event_name) = event.event_name.as_deref() {
        for sep in VS_SEPARATORS {
            if let Some((_, away_part)) = event_name.split_once(sep) {
                return away_part.trim().to_string();
            }
        }
    }

    "Unknown Player".to_string()
}

/// League/tournament: the two-word prefix of the event name, else explicit
/// league fields, else the default tour.
fn extract_league(event: &SportsDbEvent) -> String {
    if let Some(event_name) = event.event_name.as_deref() {
        let words: Vec<&str> = event_name.split_whitespace().collect();
        if words.len() >= 2 {
            return words[..2].join(" ");
        }
    }

    for option in [&event.league, &event.season] {
        if let Some(league) = non_empty(option.as_deref()) {
            return league;
        }
    }

    "ATP Tour".to_string()
}

fn extract_round(event: &SportsDbEvent) -> Option<String> {
    if let Some(round) = non_empty(event.round.as_deref()) {
        return Some(round);
    }
    if let Some(value) = &event.round_number {
        let text = match value {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        if !text.is_empty() && text != "null" {
            return Some(text);
        }
    }
    non_empty(event.stage.as_deref())
}

/// First parseable of the event's timestamp/date fields. Date-only values
/// are pinned to noon UTC.
fn parse_start_time(event: &SportsDbEvent) -> Option<DateTime<Utc>> {
    let candidates = [
        event.timestamp.as_deref(),
        event.date_event.as_deref(),
        event.date.as_deref(),
        event.time.as_deref(),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Some(parsed) = parse_datetime(candidate) {
            return Some(parsed);
        }
    }
    None
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // "2026-08-07T18:00:00" without an offset.
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(12, 0, 0)?.and_utc());
    }
    None
}

/// Derive the match status from the raw status strings, falling back to a
/// date heuristic for events with no usable status. Unmapped strings yield
/// `Scheduled`.
pub fn map_status(event: &SportsDbEvent, now: DateTime<Utc>) -> MatchStatus {
    let status_fields = [
        event.status.as_deref(),
        event.progress.as_deref(),
    ];

    for status in status_fields.into_iter().flatten() {
        let status_lower = status.to_lowercase();

        if IN_PLAY_PATTERNS.iter().any(|p| status_lower.contains(p)) {
            return MatchStatus::InPlay;
        }
        if FINISHED_PATTERNS.iter().any(|p| status_lower.contains(p)) {
            return MatchStatus::Finished;
        }
    }

    // No explicit status: old events are finished, recent ones only when the
    // record carries score evidence.
    if let Some(start) = parse_start_time(event) {
        let age = now - start;
        if age.num_seconds() > 4 * 3600 {
            return MatchStatus::Finished;
        }
        if age.num_seconds() > 3600 && has_score_evidence(event) {
            return MatchStatus::Finished;
        }
    }

    MatchStatus::Scheduled
}

fn has_score_evidence(event: &SportsDbEvent) -> bool {
    event.home_goals.is_some()
        || event.away_goals.is_some()
        || event.home_score.is_some()
        || event.away_score.is_some()
        || event.result.is_some()
        || event.score.is_some()
}

/// Extract an opaque score payload: sets-won pair when numeric scores are
/// present, else the raw score/result text.
fn extract_score(event: &SportsDbEvent) -> Option<ScorePayload> {
    let progress = event
        .status
        .clone()
        .or_else(|| event.progress.clone());

    let home = numeric_score(event.home_goals.as_deref(), event.home_score.as_ref());
    let away = numeric_score(event.away_goals.as_deref(), event.away_score.as_ref());

    if let (Some(home_sets), Some(away_sets)) = (home, away) {
        return Some(ScorePayload {
            home_sets: Some(home_sets),
            away_sets: Some(away_sets),
            raw_score: None,
            match_status: progress,
        });
    }

    for raw in [event.score.as_deref(), event.result.as_deref()] {
        if let Some(raw) = non_empty(raw) {
            return Some(ScorePayload {
                home_sets: None,
                away_sets: None,
                raw_score: Some(raw),
                match_status: progress,
            });
        }
    }

    None
}

fn numeric_score(text: Option<&str>, value: Option<&serde_json::Value>) -> Option<i64> {
    if let Some(n) = text.and_then(|s| s.trim().parse::<i64>().ok()) {
        return Some(n);
    }
    match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
