use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::ApiResult;
use crate::models::MessageResponse;
use crate::routes::ApiJson;
use crate::services::auth_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AccessCodeRequest {
    #[serde(rename = "accessCode", alias = "access_code")]
    pub access_code: String,
}

#[derive(Debug, Serialize)]
pub struct DivisionAccessResponse {
    pub message: String,
    pub division: String,
}

/// POST /auth/hod
async fn hod_login(
    State(settings): State<Arc<Settings>>,
    ApiJson(req): ApiJson<AccessCodeRequest>,
) -> ApiResult<Json<MessageResponse>> {
    auth_service::check_hod_code(&settings, &req.access_code)?;
    Ok(Json(MessageResponse::new("Access granted.")))
}

/// POST /auth/division-access
async fn division_access(
    State(settings): State<Arc<Settings>>,
    ApiJson(req): ApiJson<AccessCodeRequest>,
) -> ApiResult<Json<DivisionAccessResponse>> {
    let division = auth_service::division_for_code(&settings, &req.access_code)?;
    Ok(Json(DivisionAccessResponse {
        message: format!("Access granted to Division {division}."),
        division,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/hod", post(hod_login))
        .route("/auth/division-access", post(division_access))
}
