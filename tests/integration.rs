//! Integration tests for cross-module functionality.

use std::sync::Arc;

use acewatch::config::{PollerConfig, RateLimitConfig, SportsDbConfig};
use acewatch::db::store::Store;
use acewatch::ingest::normalize::{map_status, normalize_event};
use acewatch::ingest::poller::Poller;
use acewatch::ingest::reconcile::reconcile;
use acewatch::model::{
    MatchFilter, MatchStatus, NormalizedMatch, ScorePayload, TriggerKind,
};
use acewatch::monitoring::health::HealthState;
use acewatch::notify::trigger::process_transitions;
use acewatch::notify::webhook::Notifier;
use acewatch::sportsdb::client::SportsDbClient;
use acewatch::sportsdb::models::SportsDbEvent;

use chrono::{DateTime, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-08-07T18:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn sample(external_event_id: &str, status: MatchStatus) -> NormalizedMatch {
    NormalizedMatch {
        external_event_id: external_event_id.to_string(),
        league: "US Open".to_string(),
        round: Some("Final".to_string()),
        home_player: "Sinner".to_string(),
        away_player: "Alcaraz".to_string(),
        start_time: fixed_now(),
        status,
        score: None,
        venue: None,
        city: None,
    }
}

fn mock_client(base: &str) -> Arc<SportsDbClient> {
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
    Arc::new(SportsDbClient::new(config, rate_limit, None).unwrap())
}

// ──────────────────────────────────────────
// Upsert idempotency
// ──────────────────────────────────────────

#[tokio::test]
async fn upserting_same_record_twice_leaves_one_row() {
    let store = Store::new(":memory:").await.unwrap();
    let batch = vec![sample("e1", MatchStatus::Scheduled)];

    let first = reconcile(&store, &batch).await.unwrap();
    let second = reconcile(&store, &batch).await.unwrap();

    assert_eq!(first.summary.inserted, 1);
    assert_eq!(second.summary.inserted, 0);
    assert_eq!(second.summary.updated, 0);
    assert_eq!(second.summary.unchanged, 1);

    let filter = MatchFilter {
        date: None,
        status: None,
        page: 1,
        limit: 100,
    };
    assert_eq!(store.count_matches(&filter).await.unwrap(), 1);
}

// ──────────────────────────────────────────
// Cascade deletes
// ──────────────────────────────────────────

#[tokio::test]
async fn deleting_user_removes_favorites_and_alerts() {
    let store = Store::new(":memory:").await.unwrap();
    let user = store.insert_user("fan@example.test", "hash").await.unwrap();
    let match_id = store
        .insert_match(&sample("e1", MatchStatus::Scheduled))
        .await
        .unwrap();

    store
        .insert_favorite(
            user.id,
            acewatch::model::FavoriteKind::Match,
            None,
            Some("e1"),
            Some(match_id),
        )
        .await
        .unwrap();
    store
        .insert_alert(user.id, match_id, TriggerKind::MatchStarted)
        .await
        .unwrap();

    store.delete_user(user.id).await.unwrap();

    assert!(store.get_user_favorites(user.id).await.unwrap().is_empty());
    assert!(store.get_user_alerts(user.id).await.unwrap().is_empty());
    // The match itself is untouched.
    assert!(store.get_match(match_id).await.unwrap().is_some());
}

// ──────────────────────────────────────────
// Normalization
// ──────────────────────────────────────────

#[test]
fn unrecognized_status_string_yields_scheduled() {
    let event = SportsDbEvent {
        id_event: Some("1".to_string()),
        status: Some("Weather Delay".to_string()),
        timestamp: Some("2026-08-07T17:30:00Z".to_string()),
        ..Default::default()
    };
    assert_eq!(map_status(&event, fixed_now()), MatchStatus::Scheduled);

    let normalized = normalize_event(&event, fixed_now()).unwrap();
    assert_eq!(normalized.status, MatchStatus::Scheduled);
}

// ──────────────────────────────────────────
// Status filtering
// ──────────────────────────────────────────

#[tokio::test]
async fn finished_filter_returns_only_finished_rows() {
    let store = Store::new(":memory:").await.unwrap();
    let batch = vec![
        sample("e1", MatchStatus::Scheduled),
        sample("e2", MatchStatus::InPlay),
        sample("e3", MatchStatus::Finished),
        sample("e4", MatchStatus::Finished),
    ];
    reconcile(&store, &batch).await.unwrap();

    let filter = MatchFilter {
        date: None,
        status: Some(MatchStatus::Finished),
        page: 1,
        limit: 100,
    };
    let rows = store.list_matches(&filter).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|m| m.status == "Finished"));
}

// ──────────────────────────────────────────
// Alert triggering
// ──────────────────────────────────────────

#[tokio::test]
async fn inactive_alert_never_triggers_a_notification() {
    let server = MockServer::start().await;
    // Zero webhook deliveries expected.
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let store = Store::new(":memory:").await.unwrap();
    let user = store.insert_user("fan@example.test", "hash").await.unwrap();
    reconcile(&store, &[sample("e1", MatchStatus::Scheduled)])
        .await
        .unwrap();
    let match_id = store
        .get_match_by_external_id("e1")
        .await
        .unwrap()
        .unwrap()
        .id;

    let alert = store
        .insert_alert(user.id, match_id, TriggerKind::MatchStarted)
        .await
        .unwrap();
    store
        .update_alert(alert.id, user.id, None, Some(false))
        .await
        .unwrap();

    let outcome = reconcile(&store, &[sample("e1", MatchStatus::InPlay)])
        .await
        .unwrap();
    assert_eq!(outcome.transitions.len(), 1);

    let notifier = Notifier::new(Some(format!("{}/hook", server.uri())), true);
    let fired = process_transitions(&store, &notifier, &outcome.transitions)
        .await
        .unwrap();
    assert_eq!(fired, 0);
}

#[tokio::test]
async fn match_start_fires_active_alert_through_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = Store::new(":memory:").await.unwrap();
    let user = store.insert_user("fan@example.test", "hash").await.unwrap();
    reconcile(&store, &[sample("e1", MatchStatus::Scheduled)])
        .await
        .unwrap();
    let match_id = store
        .get_match_by_external_id("e1")
        .await
        .unwrap()
        .unwrap()
        .id;

    store
        .insert_alert(user.id, match_id, TriggerKind::MatchStarted)
        .await
        .unwrap();
    // A finished-trigger alert on the same match stays silent here.
    store
        .insert_alert(user.id, match_id, TriggerKind::MatchFinished)
        .await
        .unwrap();

    let outcome = reconcile(&store, &[sample("e1", MatchStatus::InPlay)])
        .await
        .unwrap();

    let notifier = Notifier::new(Some(format!("{}/hook", server.uri())), true);
    let fired = process_transitions(&store, &notifier, &outcome.transitions)
        .await
        .unwrap();
    assert_eq!(fired, 1);
}

#[tokio::test]
async fn third_set_alert_fires_when_score_crosses_two_sets() {
    let store = Store::new(":memory:").await.unwrap();
    let user = store.insert_user("fan@example.test", "hash").await.unwrap();

    let mut live = sample("e1", MatchStatus::InPlay);
    live.score = Some(ScorePayload {
        home_sets: Some(1),
        away_sets: Some(0),
        raw_score: None,
        match_status: Some("2nd Set".to_string()),
    });
    reconcile(&store, &[live.clone()]).await.unwrap();
    let match_id = store
        .get_match_by_external_id("e1")
        .await
        .unwrap()
        .unwrap()
        .id;
    store
        .insert_alert(user.id, match_id, TriggerKind::ThirdSet)
        .await
        .unwrap();

    live.score = Some(ScorePayload {
        home_sets: Some(1),
        away_sets: Some(1),
        raw_score: None,
        match_status: Some("3rd Set".to_string()),
    });
    let outcome = reconcile(&store, &[live]).await.unwrap();

    let notifier = Notifier::new(None, false);
    let fired = process_transitions(&store, &notifier, &outcome.transitions)
        .await
        .unwrap();
    assert_eq!(fired, 1);
}

// ──────────────────────────────────────────
// Full ingest pipeline
// ──────────────────────────────────────────

#[tokio::test]
async fn poll_cycle_ingests_upstream_events_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/eventsday.php"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"events": [
                {"idEvent": "101", "strSport": "Tennis",
                 "strEvent": "US Open Sinner vs Alcaraz",
                 "dateEvent": "2030-01-01"},
                {"idEvent": "102", "strSport": "Darts",
                 "strEvent": "World Championship"}
            ]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/schedule/next/league/4464"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                r#"{"schedule": [
                    {"idEvent": "103", "strSport": "Tennis",
                     "strHomeTeam": "Swiatek", "strAwayTeam": "Gauff",
                     "strLeague": "WTA Tour",
                     "dateEvent": "2030-01-02"}
                ]}"#,
                "application/json",
            ),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/livescore/Tennis"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"livescore": []}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let store = Arc::new(Store::new(":memory:").await.unwrap());
    let health = HealthState::new();
    let mut poller = Poller::new(
        store.clone(),
        mock_client(&server.uri()),
        Arc::new(Notifier::new(None, false)),
        health.clone(),
        PollerConfig {
            enabled: true,
            interval_seconds: 300,
        },
    );

    let report = poller.run_cycle().await.unwrap();
    // The darts event is filtered out by the client.
    assert_eq!(report.fetched, 2);
    assert_eq!(report.inserted, 2);

    let m = store.get_match_by_external_id("103").await.unwrap().unwrap();
    assert_eq!(m.home_player, "Swiatek");
    assert_eq!(m.status, "Scheduled");

    health.record_cycle(poller.cycle_number(), &report).await;
    let json = health.to_json().await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["last_cycle_fetched"], 2);
}

#[tokio::test]
async fn failed_cycle_retains_previous_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = Arc::new(Store::new(":memory:").await.unwrap());
    reconcile(&store, &[sample("e1", MatchStatus::InPlay)])
        .await
        .unwrap();

    let mut poller = Poller::new(
        store.clone(),
        mock_client(&server.uri()),
        Arc::new(Notifier::new(None, false)),
        HealthState::new(),
        PollerConfig {
            enabled: true,
            interval_seconds: 300,
        },
    );

    assert!(poller.run_cycle().await.is_err());

    // The stored match survives the failed cycle untouched.
    let m = store.get_match_by_external_id("e1").await.unwrap().unwrap();
    assert_eq!(m.status, "In Play");
}
