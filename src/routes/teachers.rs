use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::error::ApiResult;
use crate::models::teacher::{LoginRequest, LoginResponse, PendingTeacher, SignupRequest, TeacherStatusResponse};
use crate::models::MessageResponse;
use crate::rbac::HodAccess;
use crate::routes::{ApiJson, ApiPath};
use crate::services::teacher_service;
use crate::AppState;

async fn signup(
    State(pool): State<SqlitePool>,
    State(settings): State<Arc<Settings>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    teacher_service::signup(&pool, req, settings.bcrypt_cost).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Signup successful! Wait for HOD approval.")),
    ))
}

async fn login(
    State(pool): State<SqlitePool>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let teacher_name = teacher_service::login(&pool, &req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        message: "Login success!".into(),
        teacher_name,
    }))
}

/// Clients poll this every `poll_interval_secs`.
async fn status(
    _hod: HodAccess,
    State(pool): State<SqlitePool>,
    State(settings): State<Arc<Settings>>,
) -> ApiResult<Json<TeacherStatusResponse>> {
    let teachers = teacher_service::statuses(&pool, settings.teacher_active_secs).await?;
    Ok(Json(TeacherStatusResponse {
        poll_interval_secs: settings.status_poll_secs,
        teachers,
    }))
}

async fn pending(_hod: HodAccess, State(pool): State<SqlitePool>) -> ApiResult<Json<Vec<PendingTeacher>>> {
    Ok(Json(teacher_service::list_pending(&pool).await?))
}

async fn verify(
    _hod: HodAccess,
    State(pool): State<SqlitePool>,
    ApiPath(teacher_id): ApiPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    teacher_service::verify(&pool, teacher_id).await?;
    Ok(Json(MessageResponse::new("Teacher verified.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/teachers/signup", post(signup))
        .route("/teachers/login", post(login))
        .route("/teachers/status", get(status))
        .route("/teachers/pending", get(pending))
        .route("/teachers/verify/:id", put(verify))
}
