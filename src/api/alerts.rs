//! Alert management. All routes are scoped to the authenticated user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::auth::AuthUser;
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::db::store::AlertRecord;
use crate::model::TriggerKind;

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub match_id: i64,
    pub trigger: TriggerKind,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertRequest {
    pub trigger: Option<TriggerKind>,
    pub is_active: Option<bool>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<AlertRecord>>, ApiError> {
    let alerts = state
        .store
        .get_user_alerts(user.id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(alerts))
}

/// Create an alert on a match. A duplicate (same match, same trigger)
/// returns the existing row.
pub async fn create_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<AlertRecord>), ApiError> {
    state
        .store
        .get_match(req.match_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("match not found"))?;

    if let Some(existing) = state
        .store
        .find_alert(user.id, req.match_id, req.trigger)
        .await
        .map_err(ApiError::from)?
    {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let alert = state
        .store
        .insert_alert(user.id, req.match_id, req.trigger)
        .await
        .map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn update_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAlertRequest>,
) -> Result<Json<AlertRecord>, ApiError> {
    let updated = state
        .store
        .update_alert(id, user.id, req.trigger, req.is_active)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("alert not found"))?;
    Ok(Json(updated))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state
        .store
        .delete_alert(id, user.id)
        .await
        .map_err(ApiError::from)?;
    if !deleted {
        return Err(ApiError::not_found("alert not found"));
    }
    Ok(Json(serde_json::json!({"message": "alert deleted"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{test_match, test_state, test_user};

    #[tokio::test]
    async fn alert_requires_existing_match() {
        let state = test_state().await;
        let user = test_user(&state).await;

        let err = create_alert(
            State(state),
            AuthUser(user),
            Json(CreateAlertRequest {
                match_id: 404,
                trigger: TriggerKind::MatchStarted,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_alert_returns_existing_row() {
        let state = test_state().await;
        let user = test_user(&state).await;
        let match_id = test_match(&state, "e1").await;
        let req = || CreateAlertRequest {
            match_id,
            trigger: TriggerKind::TieBreak,
        };

        let (first, a) = create_alert(State(state.clone()), AuthUser(user.clone()), Json(req()))
            .await
            .unwrap();
        assert_eq!(first, StatusCode::CREATED);

        let (second, b) = create_alert(State(state), AuthUser(user), Json(req()))
            .await
            .unwrap();
        assert_eq!(second, StatusCode::OK);
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_deactivates_alert() {
        let state = test_state().await;
        let user = test_user(&state).await;
        let match_id = test_match(&state, "e1").await;

        let (_, alert) = create_alert(
            State(state.clone()),
            AuthUser(user.clone()),
            Json(CreateAlertRequest {
                match_id,
                trigger: TriggerKind::MatchFinished,
            }),
        )
        .await
        .unwrap();
        assert!(alert.is_active);

        let updated = update_alert(
            State(state),
            AuthUser(user),
            Path(alert.id),
            Json(UpdateAlertRequest {
                trigger: None,
                is_active: Some(false),
            }),
        )
        .await
        .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.trigger_kind, "match_finished");
    }

    #[tokio::test]
    async fn update_or_delete_of_foreign_alert_is_not_found() {
        let state = test_state().await;
        let owner = test_user(&state).await;
        let other = state
            .store
            .insert_user("other@example.test", "hash")
            .await
            .unwrap();
        let match_id = test_match(&state, "e1").await;

        let (_, alert) = create_alert(
            State(state.clone()),
            AuthUser(owner),
            Json(CreateAlertRequest {
                match_id,
                trigger: TriggerKind::ThirdSet,
            }),
        )
        .await
        .unwrap();

        let err = update_alert(
            State(state.clone()),
            AuthUser(other.clone()),
            Path(alert.id),
            Json(UpdateAlertRequest {
                trigger: None,
                is_active: Some(false),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = delete_alert(State(state), AuthUser(other), Path(alert.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
