//! Favorite management. All routes are scoped to the authenticated user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::auth::AuthUser;
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::db::store::FavoriteRecord;
use crate::model::FavoriteKind;

#[derive(Debug, Deserialize)]
pub struct CreateFavoriteRequest {
    #[serde(rename = "type")]
    pub kind: FavoriteKind,
    pub external_player_id: Option<String>,
    pub external_event_id: Option<String>,
    pub match_id: Option<i64>,
}

pub async fn list_favorites(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<FavoriteRecord>>, ApiError> {
    let favorites = state
        .store
        .get_user_favorites(user.id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(favorites))
}

/// Create a favorite. A duplicate submission returns the existing row
/// instead of a second copy.
pub async fn create_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateFavoriteRequest>,
) -> Result<(StatusCode, Json<FavoriteRecord>), ApiError> {
    let external_player_id = non_empty(req.external_player_id);
    let external_event_id = non_empty(req.external_event_id);

    match req.kind {
        FavoriteKind::Player => {
            if external_player_id.is_none() {
                return Err(ApiError::bad_request(
                    "player favorites require external_player_id",
                ));
            }
        }
        FavoriteKind::Match => {
            if external_event_id.is_none() && req.match_id.is_none() {
                return Err(ApiError::bad_request(
                    "match favorites require external_event_id or match_id",
                ));
            }
        }
    }

    // Resolve and verify the match reference when one is given.
    let match_id = match (req.kind, req.match_id, external_event_id.as_deref()) {
        (FavoriteKind::Match, Some(id), _) => {
            let m = state
                .store
                .get_match(id)
                .await
                .map_err(ApiError::from)?
                .ok_or_else(|| ApiError::not_found("match not found"))?;
            Some(m.id)
        }
        (FavoriteKind::Match, None, Some(event_id)) => state
            .store
            .get_match_by_external_id(event_id)
            .await
            .map_err(ApiError::from)?
            .map(|m| m.id),
        _ => None,
    };

    if let Some(existing) = state
        .store
        .find_favorite(
            user.id,
            req.kind,
            external_player_id.as_deref(),
            external_event_id.as_deref(),
            match_id,
        )
        .await
        .map_err(ApiError::from)?
    {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let favorite = state
        .store
        .insert_favorite(
            user.id,
            req.kind,
            external_player_id.as_deref(),
            external_event_id.as_deref(),
            match_id,
        )
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::CREATED, Json(favorite)))
}

pub async fn delete_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state
        .store
        .delete_favorite(id, user.id)
        .await
        .map_err(ApiError::from)?;
    if !deleted {
        return Err(ApiError::not_found("favorite not found"));
    }
    Ok(Json(serde_json::json!({"message": "favorite removed"})))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
