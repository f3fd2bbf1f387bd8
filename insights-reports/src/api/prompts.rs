//! Prompt catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::prompts::{self, PromptInfo, PromptVersion};
use crate::{ApiError, ApiResult, AppState};

pub fn prompt_routes() -> Router<AppState> {
    Router::new()
        .route("/api/prompts", get(list_prompts))
        .route("/api/prompts/:key", get(get_active_prompt))
        .route("/api/prompts/:key/versions", post(publish_prompt_version))
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub template: String,
}

/// GET /api/prompts
pub async fn list_prompts(State(state): State<AppState>) -> ApiResult<Json<Vec<PromptInfo>>> {
    Ok(Json(prompts::list_prompts(&state.db).await?))
}

/// GET /api/prompts/:key
pub async fn get_active_prompt(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<PromptVersion>> {
    prompts::active_prompt(&state.db, &key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Prompt not found: {}", key)))
}

/// POST /api/prompts/:key/versions
///
/// The new version becomes the only active one for `key`.
pub async fn publish_prompt_version(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<(StatusCode, Json<PromptVersion>)> {
    let version = prompts::publish_version(&state.db, &key, &request.template).await?;
    Ok((StatusCode::CREATED, Json(version)))
}
