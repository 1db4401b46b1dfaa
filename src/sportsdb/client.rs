//! TheSportsDB API client.
//!
//! Wraps reqwest with rate limiting, bounded retry, and the quirks of the
//! upstream API: date queries live on v1 (keyed by a URL path segment),
//! schedules and livescores on v2 (keyed by the `X-API-KEY` header), and the
//! free tier answers unknown event ids with demo data.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use crate::config::{RateLimitConfig, SportsDbConfig};
use crate::sportsdb::error::FetchError;
use crate::sportsdb::models::{
    EventsEnvelope, LivescoreEnvelope, PlayersEnvelope, ScheduleEnvelope, SportsDbEvent,
    SportsDbPlayer,
};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct SportsDbClient {
    config: SportsDbConfig,
    rate_limit: RateLimitConfig,
    api_key: String,
    v1_base: String,
    v2_base: String,
    http: reqwest::Client,
    limiter: Arc<Limiter>,
}

impl SportsDbClient {
    pub fn new(
        config: SportsDbConfig,
        rate_limit: RateLimitConfig,
        api_key_override: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        let api_key = api_key_override.unwrap_or_else(|| config.api_key.clone());
        let v1_base = config.v1_base_url.trim_end_matches('/').to_string();
        let v2_base = config.v2_base_url.trim_end_matches('/').to_string();
        let limiter = create_rate_limiter(&rate_limit);

        Ok(Self {
            config,
            rate_limit,
            api_key,
            v1_base,
            v2_base,
            http,
            limiter,
        })
    }

    // === Event queries ===

    /// Events for a specific date, filtered to the configured sport.
    ///
    /// Uses the v1 API, which is the reliable path for date-based queries;
    /// falls back to the previous-events schedule when the date query fails.
    #[instrument(skip(self))]
    pub async fn events_on_day(&self, date: NaiveDate) -> Result<Vec<SportsDbEvent>, FetchError> {
        let url = format!("{}/eventsday.php", self.v1_base);
        let day = date.format("%Y-%m-%d").to_string();
        let query = [("d", day.as_str()), ("s", self.config.sport.as_str())];

        let envelope: Result<EventsEnvelope, FetchError> =
            self.with_retry(|| self.get_json(&url, &query, false)).await;

        match envelope {
            Ok(envelope) => {
                let events: Vec<SportsDbEvent> = envelope
                    .events
                    .unwrap_or_default()
                    .into_iter()
                    .filter(SportsDbEvent::is_tennis)
                    .collect();
                info!(count = events.len(), %day, "Events fetched for day");
                Ok(events)
            }
            Err(e) => {
                warn!(error = %e, %day, "Date query failed — falling back to previous events");
                self.previous_events().await
            }
        }
    }

    /// Currently live events for the configured sport (v2 API).
    #[instrument(skip(self))]
    pub async fn live_events(&self) -> Result<Vec<SportsDbEvent>, FetchError> {
        let url = format!("{}/livescore/{}", self.v2_base, self.config.sport);
        let envelope: LivescoreEnvelope =
            self.with_retry(|| self.get_json(&url, &[], true)).await?;

        let events = envelope.into_events();
        info!(count = events.len(), "Live events fetched");
        Ok(events)
    }

    /// Upcoming events for the configured league (v2 API).
    #[instrument(skip(self))]
    pub async fn next_events(&self) -> Result<Vec<SportsDbEvent>, FetchError> {
        let url = format!(
            "{}/schedule/next/league/{}",
            self.v2_base, self.config.league_id
        );
        let envelope: ScheduleEnvelope =
            self.with_retry(|| self.get_json(&url, &[], true)).await?;

        let events = envelope.into_events();
        info!(count = events.len(), "Upcoming events fetched");
        Ok(events)
    }

    /// Recently completed events for the configured league (v2 API).
    #[instrument(skip(self))]
    pub async fn previous_events(&self) -> Result<Vec<SportsDbEvent>, FetchError> {
        let url = format!(
            "{}/schedule/previous/league/{}",
            self.v2_base, self.config.league_id
        );
        let envelope: ScheduleEnvelope =
            self.with_retry(|| self.get_json(&url, &[], true)).await?;

        let events = envelope.into_events();
        info!(count = events.len(), "Previous events fetched");
        Ok(events)
    }

    /// Look up a single event by id, verifying the response actually refers
    /// to the requested event. The free tier returns demo data for unknown
    /// ids, so a mismatched id is treated as not found.
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn event_by_id(
        &self,
        event_id: &str,
    ) -> Result<Option<SportsDbEvent>, FetchError> {
        let url = format!("{}/lookupevent.php", self.v1_base);
        let query = [("id", event_id)];
        let envelope: EventsEnvelope =
            self.with_retry(|| self.get_json(&url, &query, false)).await?;

        if let Some(event) = envelope.events.unwrap_or_default().into_iter().next() {
            if event.id_event.as_deref() == Some(event_id) {
                return Ok(Some(event));
            }
            warn!(
                returned = event.id_event.as_deref().unwrap_or("unknown"),
                "Lookup returned a different event — treating as not found"
            );
            return Ok(None);
        }

        // v1 came back empty; the v2 lookup occasionally knows more.
        let url = format!("{}/lookup/event", self.v2_base);
        let envelope: EventsEnvelope =
            self.with_retry(|| self.get_json(&url, &query, true)).await?;
        Ok(envelope.events.unwrap_or_default().into_iter().next())
    }

    // === Player queries ===

    /// Search players by name, filtered to the configured sport (v2 API).
    #[instrument(skip(self))]
    pub async fn search_players(
        &self,
        name: &str,
    ) -> Result<Vec<SportsDbPlayer>, FetchError> {
        let url = format!("{}/search/players", self.v2_base);
        let query = [("query", name), ("sport", self.config.sport.as_str())];
        let envelope: PlayersEnvelope =
            self.with_retry(|| self.get_json(&url, &query, true)).await?;

        Ok(envelope
            .into_players()
            .into_iter()
            .filter(SportsDbPlayer::is_tennis)
            .collect())
    }

    // === Transport ===

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        v2: bool,
    ) -> Result<T, FetchError> {
        self.limiter.until_ready().await;

        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if v2 {
            request = request.header("X-API-KEY", &self.api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        response.json::<T>().await.map_err(FetchError::Decode)
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        let max_retries = self.config.max_retries;
        let base_ms = self.rate_limit.backoff_base_ms;
        let max_ms = self.rate_limit.backoff_max_ms;

        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;

                    if !e.is_transient() || attempt > max_retries {
                        return Err(e);
                    }

                    let backoff_ms =
                        std::cmp::min(base_ms.saturating_mul(2u64.pow(attempt - 1)), max_ms);

                    warn!(
                        attempt,
                        backoff_ms,
                        error = %e,
                        "Retrying after transient upstream failure"
                    );

                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

fn create_rate_limiter(config: &RateLimitConfig) -> Arc<Limiter> {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::new(5).unwrap());
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(10).unwrap());

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> SportsDbClient {
        let config = SportsDbConfig {
            v1_base_url: base.to_string(),
            v2_base_url: base.to_string(),
            api_key: "276863".to_string(),
            sport: "Tennis".to_string(),
            league_id: "4464".to_string(),
            timeout_seconds: 5,
            max_retries: 0,
        };
        let rate_limit = RateLimitConfig {
            requests_per_second: 50,
            burst_size: 50,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        };
        SportsDbClient::new(config, rate_limit, None).unwrap()
    }

    #[test]
    fn rate_limiter_creation() {
        let config = RateLimitConfig {
            requests_per_second: 5,
            burst_size: 10,
            backoff_base_ms: 1000,
            backoff_max_ms: 30000,
        };
        let limiter = create_rate_limiter(&config);
        assert!(limiter.check().is_ok());
    }

    #[tokio::test]
    async fn live_events_parses_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/livescore/Tennis"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"livescore": [{"idEvent": "1", "strSport": "Tennis", "strStatus": "2nd Set"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let events = client.live_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status.as_deref(), Some("2nd Set"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/livescore/Tennis"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.live_events().await.unwrap_err();
        match err {
            FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 404),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/livescore/Tennis"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("not json", "application/json"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.live_events().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn events_on_day_filters_to_tennis() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eventsday.php"))
            .and(query_param("d", "2026-08-07"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"events": [
                    {"idEvent": "1", "strSport": "Tennis"},
                    {"idEvent": "2", "strSport": "Darts"}
                ]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let events = client.events_on_day(date).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id_event.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn events_on_day_falls_back_to_previous_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eventsday.php"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/schedule/previous/league/4464"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"schedule": [{"idEvent": "9", "strSport": "Tennis"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let events = client.events_on_day(date).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id_event.as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn event_lookup_rejects_mismatched_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookupevent.php"))
            .and(query_param("id", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"events": [{"idEvent": "999", "strSport": "Tennis"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let event = client.event_by_id("42").await.unwrap();
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn player_search_filters_sport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/players"))
            .and(query_param("query", "sinner"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"player": [
                    {"idPlayer": "p1", "strPlayer": "Jannik Sinner", "strSport": "Tennis"},
                    {"idPlayer": "p2", "strPlayer": "Somebody Else", "strSport": "Soccer"}
                ]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let players = client.search_players("sinner").await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id_player.as_deref(), Some("p1"));
    }
}
