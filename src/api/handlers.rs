use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::models::{
    ActivityKind, DurationBucket, IdentityRequest, RecommendationRequest, RecommendationResponse,
};

use super::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Handler for the recommendation endpoint
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let response = state.engine.recommend(&request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct TrackSearchRequest {
    #[serde(default)]
    pub identity: IdentityRequest,
    pub city: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub duration: Option<DurationBucket>,
}

#[derive(Debug, Deserialize)]
pub struct TrackInteractionRequest {
    #[serde(default)]
    pub identity: IdentityRequest,
    pub kind: ActivityKind,
    pub place_name: String,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackAck {
    pub tracked: bool,
}

/// Handler for tracking a search; arms the session's search context
pub async fn track_search(
    State(state): State<AppState>,
    Json(request): Json<TrackSearchRequest>,
) -> AppResult<Json<TrackAck>> {
    state
        .tracker
        .track_search(
            &request.identity,
            &request.city,
            request.categories,
            request.duration,
        )
        .await?;
    Ok(Json(TrackAck { tracked: true }))
}

/// Handler for tracking a place interaction
pub async fn track_interaction(
    State(state): State<AppState>,
    Json(request): Json<TrackInteractionRequest>,
) -> AppResult<Json<TrackAck>> {
    state
        .tracker
        .track_interaction(
            &request.identity,
            request.kind,
            &request.place_name,
            request.place_id,
            request.city,
        )
        .await?;
    Ok(Json(TrackAck { tracked: true }))
}
