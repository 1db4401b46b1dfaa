//! REST API layer: router construction and the handful of handlers that
//! don't belong to a resource module.

pub mod alerts;
pub mod auth;
pub mod error;
pub mod favorites;
pub mod matches;
pub mod players;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::response::Json;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::api::auth::AuthKeys;
use crate::api::error::ApiError;
use crate::config::ServerConfig;
use crate::db::store::Store;
use crate::monitoring::health::HealthState;
use crate::sportsdb::client::SportsDbClient;

/// Shared state accessible by all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub auth: Arc<AuthKeys>,
    pub client: Arc<SportsDbClient>,
    pub health: HealthState,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/matches", get(matches::list_matches).post(matches::create_match))
        .route("/matches/{id}", get(matches::get_match))
        .route("/players/search", get(players::search_players))
        .route("/events/{id}", get(players::lookup_event))
        .route(
            "/favorites",
            get(favorites::list_favorites).post(favorites::create_favorite),
        )
        .route("/favorites/{id}", delete(favorites::delete_favorite))
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route(
            "/alerts/{id}",
            put(alerts::update_alert).delete(alerts::delete_alert),
        )
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Serve the API until the process exits.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let app = router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .await
        .context("API server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

// -- Route handlers --

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.health.to_json().await)
}

/// Read-only aggregates: active matches with favorite counts, and per-league
/// match counts by status.
async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let active = state
        .store
        .get_active_match_favorites()
        .await
        .map_err(ApiError::from)?;
    let leagues = state
        .store
        .get_league_status_counts()
        .await
        .map_err(ApiError::from)?;

    Ok(Json(serde_json::json!({
        "active_matches": active,
        "league_counts": leagues,
    })))
}

// -- Test fixtures --

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    use crate::config::{RateLimitConfig, SportsDbConfig};
    use secrecy::SecretString;

    let store = Arc::new(Store::new(":memory:").await.expect("in-memory store"));
    let auth = Arc::new(AuthKeys::new(&SecretString::from("test-secret"), 60));

    // Points at a dead address; handler tests that need upstream traffic
    // swap in a mock-backed client instead.
    let client = Arc::new(
        SportsDbClient::new(
            SportsDbConfig {
                v1_base_url: "http://127.0.0.1:9".to_string(),
                v2_base_url: "http://127.0.0.1:9".to_string(),
                api_key: "276863".to_string(),
                sport: "Tennis".to_string(),
                league_id: "4464".to_string(),
                timeout_seconds: 1,
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
        .expect("test client"),
    );

    AppState {
        store,
        auth,
        client,
        health: HealthState::new(),
    }
}

#[cfg(test)]
pub(crate) async fn test_user(state: &AppState) -> crate::db::store::UserRecord {
    state
        .store
        .insert_user("fan@example.test", "hash")
        .await
        .expect("test user")
}

#[cfg(test)]
pub(crate) async fn test_match(state: &AppState, external_event_id: &str) -> i64 {
    use crate::model::{MatchStatus, NormalizedMatch};
    state
        .store
        .insert_match(&NormalizedMatch {
            external_event_id: external_event_id.to_string(),
            league: "US Open".to_string(),
            round: None,
            home_player: "Sinner".to_string(),
            away_player: "Alcaraz".to_string(),
            start_time: chrono::Utc::now(),
            status: MatchStatus::Scheduled,
            score: None,
            venue: None,
            city: None,
        })
        .await
        .expect("test match")
}
