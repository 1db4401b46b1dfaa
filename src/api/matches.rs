//! Match listing, lookup, and manual upsert.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::auth::AuthUser;
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::db::store::MatchRecord;
use crate::ingest::reconcile::reconcile;
use crate::model::{MatchFilter, MatchStatus, NormalizedMatch, ScorePayload};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub id: i64,
    pub external_event_id: String,
    pub league: String,
    pub round: Option<String>,
    pub home_player: String,
    pub away_player: String,
    pub start_time: String,
    pub status: String,
    pub score: Option<serde_json::Value>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub last_fetched_at: String,
}

impl From<MatchRecord> for MatchResponse {
    fn from(m: MatchRecord) -> Self {
        let score = m
            .score
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok());
        Self {
            id: m.id,
            external_event_id: m.external_event_id,
            league: m.league,
            round: m.round,
            home_player: m.home_player,
            away_player: m.away_player,
            start_time: m.start_time,
            status: m.status,
            score,
            venue: m.venue,
            city: m.city,
            last_fetched_at: m.last_fetched_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatchListResponse {
    pub data: Vec<MatchResponse>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    pub external_event_id: String,
    pub league: String,
    pub round: Option<String>,
    pub home_player: String,
    pub away_player: String,
    pub start_time: DateTime<Utc>,
    pub status: Option<String>,
    pub score: Option<ScorePayload>,
    pub venue: Option<String>,
    pub city: Option<String>,
}

pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<MatchStatus>()
                .map_err(|e| ApiError::bad_request(e))
        })
        .transpose()?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let filter = MatchFilter {
        date: query.date,
        status,
        page,
        limit,
    };

    let rows = state.store.list_matches(&filter).await.map_err(ApiError::from)?;
    let total = state.store.count_matches(&filter).await.map_err(ApiError::from)?;

    Ok(Json(MatchListResponse {
        data: rows.into_iter().map(Into::into).collect(),
        page,
        limit,
        total,
    }))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MatchResponse>, ApiError> {
    let m = state
        .store
        .get_match(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("match not found"))?;
    Ok(Json(m.into()))
}

/// Manual upsert path: same semantics as the ingest reconciler, keyed by
/// external event id.
pub async fn create_match(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<MatchResponse>), ApiError> {
    let external_event_id = req.external_event_id.trim().to_string();
    if external_event_id.is_empty() {
        return Err(ApiError::bad_request("external_event_id is required"));
    }
    if req.home_player.trim().is_empty() || req.away_player.trim().is_empty() {
        return Err(ApiError::bad_request("both player names are required"));
    }

    let status = req
        .status
        .as_deref()
        .map(|s| {
            s.parse::<MatchStatus>()
                .map_err(|e| ApiError::bad_request(e))
        })
        .transpose()?
        .unwrap_or(MatchStatus::Scheduled);

    let normalized = NormalizedMatch {
        external_event_id: external_event_id.clone(),
        league: req.league.trim().to_string(),
        round: req.round,
        home_player: req.home_player.trim().to_string(),
        away_player: req.away_player.trim().to_string(),
        start_time: req.start_time,
        status,
        score: req.score,
        venue: req.venue,
        city: req.city,
    };

    let outcome = reconcile(&state.store, std::slice::from_ref(&normalized))
        .await
        .map_err(ApiError::from)?;

    let row = state
        .store
        .get_match_by_external_id(&external_event_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::internal("upserted match not found"))?;

    let code = if outcome.summary.inserted > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((code, Json(row.into())))
}
