//! Player search and event lookup, proxied to the upstream provider.
//!
//! The only routes that talk to the external API inline; upstream failures
//! surface as a per-request 502 rather than touching stored data.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::matches::MatchResponse;
use crate::api::AppState;
use crate::ingest::normalize::normalize_event;
use crate::sportsdb::models::SportsDbPlayer;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerResponse {
    pub external_player_id: Option<String>,
    pub name: Option<String>,
    pub nationality: Option<String>,
    pub team: Option<String>,
}

impl From<SportsDbPlayer> for PlayerResponse {
    fn from(p: SportsDbPlayer) -> Self {
        Self {
            external_player_id: p.id_player,
            name: p.name,
            nationality: p.nationality,
            team: p.team,
        }
    }
}

pub async fn search_players(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PlayerResponse>>, ApiError> {
    let name = query.query.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let players = state
        .client
        .search_players(name)
        .await
        .map_err(|e| ApiError::upstream(e.to_string()))?;

    Ok(Json(players.into_iter().map(Into::into).collect()))
}

/// Look up a single upstream event by its external id. Stored state is
/// preferred; an unknown id falls through to a live upstream lookup.
pub async fn lookup_event(
    State(state): State<AppState>,
    Path(external_event_id): Path<String>,
) -> Result<Json<MatchResponse>, ApiError> {
    if let Some(stored) = state
        .store
        .get_match_by_external_id(&external_event_id)
        .await
        .map_err(ApiError::from)?
    {
        return Ok(Json(stored.into()));
    }

    let event = state
        .client
        .event_by_id(&external_event_id)
        .await
        .map_err(|e| ApiError::upstream(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("event not found"))?;

    let normalized = normalize_event(&event, Utc::now())
        .ok_or_else(|| ApiError::upstream("upstream event is missing its id"))?;

    // Seed storage so the poller keeps this event fresh from now on.
    crate::ingest::reconcile::reconcile(&state.store, std::slice::from_ref(&normalized))
        .await
        .map_err(ApiError::from)?;

    let row = state
        .store
        .get_match_by_external_id(&normalized.external_event_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::internal("reconciled event not found"))?;
    Ok(Json(row.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{test_match, test_state, AppState};
    use crate::config::{RateLimitConfig, SportsDbConfig};
    use crate::sportsdb::client::SportsDbClient;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn with_mock_client(mut state: AppState, base: &str) -> AppState {
        state.client = Arc::new(
            SportsDbClient::new(
                SportsDbConfig {
                    v1_base_url: base.to_string(),
                    v2_base_url: base.to_string(),
                    api_key: "276863".to_string(),
                    sport: "Tennis".to_string(),
                    league_id: "4464".to_string(),
                    timeout_seconds: 5,
                    max_retries: 0,
                },
                RateLimitConfig {
                    requests_per_second: 50,
                    burst_size: 50,
                    backoff_base_ms: 1,
                    backoff_max_ms: 2,
                },
                None,
            )
            .unwrap(),
        );
        state
    }

    #[tokio::test]
    async fn empty_search_query_is_rejected() {
        let state = test_state().await;
        let err = search_players(
            State(state),
            Query(SearchQuery {
                query: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_502() {
        // test_state's client points at a dead address.
        let state = test_state().await;
        let err = search_players(
            State(state),
            Query(SearchQuery {
                query: "sinner".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn search_returns_mapped_players() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/players"))
            .and(query_param("query", "sinner"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"player": [{"idPlayer": "p1", "strPlayer": "Jannik Sinner",
                    "strSport": "Tennis", "strNationality": "Italy"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let state = with_mock_client(test_state().await, &server.uri());
        let players = search_players(
            State(state),
            Query(SearchQuery {
                query: "sinner".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].external_player_id.as_deref(), Some("p1"));
        assert_eq!(players[0].nationality.as_deref(), Some("Italy"));
    }

    #[tokio::test]
    async fn lookup_prefers_stored_match() {
        // Dead upstream client: the handler must not need it.
        let state = test_state().await;
        test_match(&state, "e1").await;

        let found = lookup_event(State(state), Path("e1".to_string()))
            .await
            .unwrap();
        assert_eq!(found.external_event_id, "e1");
    }

    #[tokio::test]
    async fn lookup_seeds_store_from_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookupevent.php"))
            .and(query_param("id", "2052711"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"events": [{"idEvent": "2052711", "strSport": "Tennis",
                    "strEvent": "US Open Sinner vs Alcaraz",
                    "dateEvent": "2030-01-01"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let state = with_mock_client(test_state().await, &server.uri());
        let found = lookup_event(State(state.clone()), Path("2052711".to_string()))
            .await
            .unwrap();
        assert_eq!(found.league, "US Open");

        // Now persisted for the poller to keep fresh.
        let stored = state
            .store
            .get_match_by_external_id("2052711")
            .await
            .unwrap();
        assert!(stored.is_some());
    }
}
