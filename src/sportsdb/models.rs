//! Raw TheSportsDB response shapes.
//!
//! The upstream API is loose about types and field presence: numeric fields
//! arrive as strings or numbers depending on endpoint, and most fields can be
//! null. Everything here is `Option` and coerced at the edges.

use serde::Deserialize;

/// A raw event record as returned by the v1 and v2 event endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SportsDbEvent {
    #[serde(rename = "idEvent")]
    pub id_event: Option<String>,
    #[serde(rename = "strEvent")]
    pub event_name: Option<String>,
    #[serde(rename = "strSport")]
    pub sport: Option<String>,
    #[serde(rename = "strLeague")]
    pub league: Option<String>,
    #[serde(rename = "strSeason")]
    pub season: Option<String>,
    #[serde(rename = "strHomeTeam")]
    pub home_team: Option<String>,
    #[serde(rename = "strAwayTeam")]
    pub away_team: Option<String>,
    #[serde(rename = "strPlayer")]
    pub player: Option<String>,
    #[serde(rename = "strOpponent")]
    pub opponent: Option<String>,
    #[serde(rename = "strRound")]
    pub round: Option<String>,
    /// String or number depending on endpoint.
    #[serde(rename = "intRound")]
    pub round_number: Option<serde_json::Value>,
    #[serde(rename = "strStage")]
    pub stage: Option<String>,
    #[serde(rename = "strTimestamp")]
    pub timestamp: Option<String>,
    #[serde(rename = "dateEvent")]
    pub date_event: Option<String>,
    #[serde(rename = "strDate")]
    pub date: Option<String>,
    #[serde(rename = "strTime")]
    pub time: Option<String>,
    #[serde(rename = "strStatus")]
    pub status: Option<String>,
    #[serde(rename = "strProgress")]
    pub progress: Option<String>,
    #[serde(rename = "strHomeGoals")]
    pub home_goals: Option<String>,
    #[serde(rename = "strAwayGoals")]
    pub away_goals: Option<String>,
    /// String or number depending on endpoint.
    #[serde(rename = "intHomeScore")]
    pub home_score: Option<serde_json::Value>,
    #[serde(rename = "intAwayScore")]
    pub away_score: Option<serde_json::Value>,
    #[serde(rename = "strScore")]
    pub score: Option<String>,
    #[serde(rename = "strResult")]
    pub result: Option<String>,
    #[serde(rename = "strVenue")]
    pub venue: Option<String>,
    #[serde(rename = "strCity")]
    pub city: Option<String>,
}

impl SportsDbEvent {
    pub fn is_tennis(&self) -> bool {
        self.sport
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("tennis"))
    }
}

/// A raw player record from the v2 search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SportsDbPlayer {
    #[serde(rename = "idPlayer")]
    pub id_player: Option<String>,
    #[serde(rename = "strPlayer")]
    pub name: Option<String>,
    #[serde(rename = "strSport")]
    pub sport: Option<String>,
    #[serde(rename = "strNationality")]
    pub nationality: Option<String>,
    #[serde(rename = "strTeam")]
    pub team: Option<String>,
}

impl SportsDbPlayer {
    pub fn is_tennis(&self) -> bool {
        self.sport
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("tennis"))
    }
}

/// v1 envelope: `{"events": [...]}` with null for empty result sets.
#[derive(Debug, Default, Deserialize)]
pub struct EventsEnvelope {
    pub events: Option<Vec<SportsDbEvent>>,
}

/// v2 schedule envelope; older deployments use the `events` key.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleEnvelope {
    pub schedule: Option<Vec<SportsDbEvent>>,
    pub events: Option<Vec<SportsDbEvent>>,
}

impl ScheduleEnvelope {
    pub fn into_events(self) -> Vec<SportsDbEvent> {
        self.schedule.or(self.events).unwrap_or_default()
    }
}

/// v2 livescore envelope; older deployments use the `events` key.
#[derive(Debug, Default, Deserialize)]
pub struct LivescoreEnvelope {
    pub livescore: Option<Vec<SportsDbEvent>>,
    pub events: Option<Vec<SportsDbEvent>>,
}

impl LivescoreEnvelope {
    pub fn into_events(self) -> Vec<SportsDbEvent> {
        self.livescore.or(self.events).unwrap_or_default()
    }
}

/// v2 player search envelope.
#[derive(Debug, Default, Deserialize)]
pub struct PlayersEnvelope {
    pub player: Option<Vec<SportsDbPlayer>>,
    pub players: Option<Vec<SportsDbPlayer>>,
}

impl PlayersEnvelope {
    pub fn into_players(self) -> Vec<SportsDbPlayer> {
        self.player.or(self.players).unwrap_or_default()
    }
}
