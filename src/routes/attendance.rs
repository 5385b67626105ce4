use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::error::{ApiError, ApiResult};
use crate::models::lecture::{Lecture, LectureCreated, LectureFilter, LectureForm, ManualAttendanceRequest, RemoveFineRequest};
use crate::models::MessageResponse;
use crate::rbac::HodAccess;
use crate::routes::{ApiJson, ApiMultipart, ApiPath, ApiQuery};
use crate::services::attendance_service;
use crate::services::photo_store::PhotoStore;
use crate::services::recognizer::{discard_media, FaceRecognizer, MediaKind};
use crate::AppState;

/// POST /attendance, manual entry.
async fn submit_manual(
    State(pool): State<SqlitePool>,
    State(settings): State<Arc<Settings>>,
    ApiJson(req): ApiJson<ManualAttendanceRequest>,
) -> ApiResult<(StatusCode, Json<LectureCreated>)> {
    let lecture = attendance_service::validate_lecture(req.lecture, &settings)?;
    let created = attendance_service::submit_manual(&pool, &lecture, &req.absent_roll_nos).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Text fields and saved media of an upload form.
#[derive(Default)]
struct UploadForm {
    lecture: LectureForm,
    videos: Vec<PathBuf>,
    photos: Vec<PathBuf>,
}

impl UploadForm {
    fn saved(&self) -> Vec<PathBuf> {
        self.videos.iter().chain(&self.photos).cloned().collect()
    }

    fn media(&self, max_photos: usize) -> ApiResult<MediaKind> {
        match (self.videos.len(), self.photos.len()) {
            (1, 0) => Ok(MediaKind::Video),
            (0, n) if (1..=max_photos).contains(&n) => Ok(MediaKind::Photos),
            (0, 0) => Err(ApiError::validation("Upload a video or at least one photo.")),
            (0, _) => Err(ApiError::validation(format!("At most {max_photos} photos per upload."))),
            _ => Err(ApiError::validation("Upload either one video or photos, not both.")),
        }
    }
}

async fn read_upload(multipart: &mut Multipart, photos: &PhotoStore, form: &mut UploadForm, max_photos: usize) -> ApiResult<()> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "attendance_video" | "attendance_photos" => {
                if name == "attendance_photos" && form.photos.len() >= max_photos {
                    return Err(ApiError::validation(format!("At most {max_photos} photos per upload.")));
                }
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    continue;
                }
                let path = photos.save_upload(file_name.as_deref(), &bytes).await?;
                if name == "attendance_video" {
                    form.videos.push(path);
                } else {
                    form.photos.push(path);
                }
            }
            "date" => form.lecture.date = Some(field.text().await?),
            "division" => form.lecture.division = Some(field.text().await?),
            "subject" => form.lecture.subject = Some(field.text().await?),
            "topic" => form.lecture.topic = Some(field.text().await?),
            "teacher_name" => form.lecture.teacher_name = Some(field.text().await?),
            "time_slot" => form.lecture.time_slot = Some(field.text().await?),
            "type" => form.lecture.session_type = Some(field.text().await?),
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }
    Ok(())
}

/// POST /attendance/upload: lecture fields plus one `attendance_video` or
/// several `attendance_photos`. The saved media never outlives the request.
async fn upload(
    State(pool): State<SqlitePool>,
    State(settings): State<Arc<Settings>>,
    State(photos): State<PhotoStore>,
    State(recognizer): State<Arc<dyn FaceRecognizer>>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> ApiResult<(StatusCode, Json<LectureCreated>)> {
    let mut form = UploadForm::default();
    let read = read_upload(&mut multipart, &photos, &mut form, settings.max_upload_photos).await;

    let prepared = match read.and_then(|_| form.media(settings.max_upload_photos)) {
        Ok(media) => attendance_service::validate_lecture(std::mem::take(&mut form.lecture), &settings)
            .map(|lecture| (media, lecture)),
        Err(e) => Err(e),
    };
    let (media, lecture) = match prepared {
        Ok(p) => p,
        Err(e) => {
            discard_media(&form.saved()).await;
            return Err(e);
        }
    };

    tracing::info!(
        division = %lecture.division,
        media = media.as_arg(),
        files = form.videos.len() + form.photos.len(),
        "processing attendance upload"
    );
    let created = attendance_service::submit_recognized(&pool, recognizer.as_ref(), &lecture, media, form.saved()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list(
    State(pool): State<SqlitePool>,
    ApiQuery(filter): ApiQuery<LectureFilter>,
) -> ApiResult<Json<Vec<Lecture>>> {
    Ok(Json(attendance_service::list_lectures(&pool, filter).await?))
}

/// POST /attendance/remove, waives one absence.
async fn remove_fine(
    _hod: HodAccess,
    State(pool): State<SqlitePool>,
    ApiJson(req): ApiJson<RemoveFineRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let roll_no = req.roll_no;
    attendance_service::remove_fine(&pool, req).await?;
    Ok(Json(MessageResponse::new(format!("Fine removed for roll number {roll_no}."))))
}

async fn delete_lecture(
    _hod: HodAccess,
    State(pool): State<SqlitePool>,
    ApiPath(lecture_id): ApiPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    attendance_service::delete_lecture(&pool, lecture_id).await?;
    Ok(Json(MessageResponse::new("Lecture deleted.")))
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/attendance", post(submit_manual).get(list))
        .route(
            "/attendance/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/attendance/remove", post(remove_fine))
        .route("/lectures/:id", delete(delete_lecture))
}
