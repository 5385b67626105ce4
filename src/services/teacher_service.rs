//! Teacher accounts: signup, login, HOD verification and online status.
use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::teacher::{PendingTeacher, SignupRequest, Teacher, TeacherStatus};
use crate::services::auth_service;

pub const PENDING_MESSAGE: &str = "Account pending HOD verification.";

pub async fn signup(pool: &SqlitePool, req: SignupRequest, bcrypt_cost: u32) -> ApiResult<i64> {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Name, email and password are required."));
    }
    if !email.contains('@') {
        return Err(ApiError::validation("Email address is not valid."));
    }

    let hash = auth_service::hash_password(&req.password, bcrypt_cost).await?;
    let result = sqlx::query(
        "INSERT INTO teachers (name, email, password_hash, status) VALUES (?, ?, ?, 'pending')",
    )
    .bind(name)
    .bind(&email)
    .bind(&hash)
    .execute(pool)
    .await;

    match result {
        Ok(r) => {
            tracing::info!(%email, "teacher signed up");
            Ok(r.last_insert_rowid())
        }
        Err(e) if is_unique_violation(&e) => Err(ApiError::validation("Email is already registered.")),
        Err(e) => Err(e.into()),
    }
}

/// Returns the teacher's display name on success and stamps `last_login`.
pub async fn login(pool: &SqlitePool, email: &str, password: &str) -> ApiResult<String> {
    let teacher = sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE email = ?")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    let Some(teacher) = teacher else {
        return Err(auth_service::invalid_credentials());
    };
    auth_service::check_login(&teacher.password_hash, teacher.status(), password, PENDING_MESSAGE).await?;

    sqlx::query("UPDATE teachers SET last_login = ? WHERE id = ?")
        .bind(now_epoch())
        .bind(teacher.id)
        .execute(pool)
        .await?;
    tracing::info!(teacher_id = teacher.id, "teacher logged in");
    Ok(teacher.name)
}

pub async fn list_pending(pool: &SqlitePool) -> ApiResult<Vec<PendingTeacher>> {
    let rows = sqlx::query_as::<_, PendingTeacher>(
        "SELECT id, name, email FROM teachers WHERE status = 'pending' ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// pending -> verified. There is no way back.
pub async fn verify(pool: &SqlitePool, teacher_id: i64) -> ApiResult<()> {
    let updated = sqlx::query("UPDATE teachers SET status = 'verified' WHERE id = ? AND status = 'pending'")
        .bind(teacher_id)
        .execute(pool)
        .await?;
    if updated.rows_affected() == 1 {
        tracing::info!(teacher_id, "teacher verified");
        return Ok(());
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM teachers WHERE id = ?")
        .bind(teacher_id)
        .fetch_optional(pool)
        .await?;
    match exists {
        Some(_) => Err(ApiError::validation("Teacher is already verified.")),
        None => Err(ApiError::not_found("Teacher not found.")),
    }
}

/// Verified teachers with an online flag derived from their last login.
pub async fn statuses(pool: &SqlitePool, active_secs: i64) -> ApiResult<Vec<TeacherStatus>> {
    let rows: Vec<(String, Option<i64>)> = sqlx::query_as(
        "SELECT name, last_login FROM teachers WHERE status = 'verified' ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await?;

    let now = now_epoch();
    Ok(rows
        .into_iter()
        .map(|(name, last_login)| TeacherStatus {
            is_active: last_login.is_some_and(|t| now - t < active_secs),
            name,
            last_login,
        })
        .collect())
}
