//! Shared domain types for matches, alert triggers, and favorites.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a match as derived from upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    #[serde(rename = "In Play")]
    InPlay,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::InPlay => "In Play",
            Self::Finished => "Finished",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "in play" | "in_play" | "inplay" => Ok(Self::InPlay),
            "finished" => Ok(Self::Finished),
            other => Err(format!("unknown match status: {other}")),
        }
    }
}

/// Conditions under which an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    MatchStarted,
    TieBreak,
    ThirdSet,
    MatchFinished,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchStarted => "match_started",
            Self::TieBreak => "tie_break",
            Self::ThirdSet => "third_set",
            Self::MatchFinished => "match_finished",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match_started" => Ok(Self::MatchStarted),
            "tie_break" => Ok(Self::TieBreak),
            "third_set" => Ok(Self::ThirdSet),
            "match_finished" => Ok(Self::MatchFinished),
            other => Err(format!("unknown trigger: {other}")),
        }
    }
}

/// What a favorite points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteKind {
    Player,
    Match,
}

impl FavoriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Match => "match",
        }
    }
}

impl std::fmt::Display for FavoriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque score payload stored alongside a match.
///
/// Either a sets-won pair (when upstream exposes numeric scores) or the raw
/// score string, plus whatever progress text upstream reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_sets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_sets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_status: Option<String>,
}

impl ScorePayload {
    /// Total sets completed, when numeric scores are known.
    pub fn sets_completed(&self) -> i64 {
        self.home_sets.unwrap_or(0) + self.away_sets.unwrap_or(0)
    }

    /// Whether any of the textual fields mention a tie break.
    pub fn mentions_tie_break(&self) -> bool {
        let check = |s: &Option<String>| {
            s.as_deref().is_some_and(|v| {
                let v = v.to_lowercase();
                v.contains("tie break") || v.contains("tiebreak") || v.contains("tie-break")
            })
        };
        check(&self.raw_score) || check(&self.match_status)
    }
}

/// A match record in internal form, ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMatch {
    pub external_event_id: String,
    pub league: String,
    pub round: Option<String>,
    pub home_player: String,
    pub away_player: String,
    pub start_time: DateTime<Utc>,
    pub status: MatchStatus,
    pub score: Option<ScorePayload>,
    pub venue: Option<String>,
    pub city: Option<String>,
}

/// Validated filters for the match listing query.
#[derive(Debug, Clone, Copy)]
pub struct MatchFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<MatchStatus>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

/// An observed change to a stored match, reported by the reconciler and
/// consumed by the alert trigger check.
#[derive(Debug, Clone)]
pub struct MatchTransition {
    pub match_id: i64,
    pub external_event_id: String,
    pub home_player: String,
    pub away_player: String,
    pub old_status: MatchStatus,
    pub new_status: MatchStatus,
    pub old_score: Option<ScorePayload>,
    pub new_score: Option<ScorePayload>,
}

impl MatchTransition {
    /// Short human-readable label for logs and notifications.
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home_player, self.away_player)
    }
}
