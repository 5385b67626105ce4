use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::error::{ApiError, ApiResult};
use crate::models::student::{LoginRequest, LoginResponse, PendingStudent, RegistrationForm, StudentIdentity};
use crate::models::{MessageResponse, RollNo};
use crate::rbac::DivisionAccess;
use crate::routes::{ApiJson, ApiMultipart, ApiPath, ApiQuery};
use crate::services::photo_store::PhotoStore;
use crate::services::reconciliation::{DateWindow, DivisionTable};
use crate::services::student_service::{self, Photo};
use crate::services::report_service;
use crate::AppState;

/// POST /students/register, multipart with the `student_image` file.
async fn register(
    State(pool): State<SqlitePool>,
    State(settings): State<Arc<Settings>>,
    State(photos): State<PhotoStore>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let mut form = RegistrationForm::default();
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "student_image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let extension = PhotoStore::image_extension(&file_name)
                    .ok_or_else(|| ApiError::validation("Photo must be a JPG or PNG image."))?;
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    photo = Some(Photo {
                        extension,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "name" => form.name = Some(field.text().await?),
            "division" => form.division = Some(field.text().await?),
            "roll_no" => form.roll_no = Some(field.text().await?),
            "phone_no" => form.phone_no = Some(field.text().await?),
            "password" => form.password = Some(field.text().await?),
            other => tracing::debug!(field = other, "ignoring unknown registration field"),
        }
    }

    let student = student_service::validate_registration(form, &settings)?;
    let photo = photo.ok_or_else(|| ApiError::validation("Photo required."))?;
    student_service::register(&pool, &photos, student, photo, settings.bcrypt_cost).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Registered! Wait for verification.")),
    ))
}

async fn login(
    State(pool): State<SqlitePool>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(student_service::login(&pool, &req.phone_no, &req.password).await?))
}

async fn pending(
    access: DivisionAccess,
    State(pool): State<SqlitePool>,
) -> ApiResult<Json<Vec<PendingStudent>>> {
    Ok(Json(student_service::list_pending(&pool, &access.division).await?))
}

async fn verify(
    access: DivisionAccess,
    State(pool): State<SqlitePool>,
    State(photos): State<PhotoStore>,
    ApiPath(student_id): ApiPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    student_service::verify(&pool, &photos, student_id, &access.division).await?;
    Ok(Json(MessageResponse::new("Student verified.")))
}

async fn reject(
    access: DivisionAccess,
    State(pool): State<SqlitePool>,
    State(photos): State<PhotoStore>,
    ApiPath(student_id): ApiPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    student_service::reject(&pool, &photos, student_id, &access.division).await?;
    Ok(Json(MessageResponse::new("Registration rejected.")))
}

#[derive(Debug, Deserialize)]
pub struct TableQuery {
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    pub roll_no: Option<String>,
}

/// GET /students/:division, the weekly P/A/N/A table.
async fn division_table(
    State(pool): State<SqlitePool>,
    State(settings): State<Arc<Settings>>,
    ApiPath(division): ApiPath<String>,
    ApiQuery(q): ApiQuery<TableQuery>,
) -> ApiResult<Json<DivisionTable>> {
    let window = DateWindow::resolve(q.start_date.as_deref(), q.end_date.as_deref(), report_service::today());
    let viewer = match q.roll_no.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Some(StudentIdentity {
            division: division.clone(),
            roll_no: RollNo::parse(raw).map_err(ApiError::Validation)?,
        }),
        None => None,
    };
    let table = report_service::division_table(&pool, &settings, &division, window, viewer.as_ref()).await?;
    Ok(Json(table))
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/students/register",
            post(register).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/students/login", post(login))
        .route("/students/pending", get(pending))
        .route("/students/verify/:id", put(verify))
        .route("/students/reject/:id", delete(reject))
        .route("/students/:division", get(division_table))
}
