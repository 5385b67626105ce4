//! Student accounts: registration with a photo, login, and the
//! division-gated verify/reject lifecycle.
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::db::now_epoch;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::student::{
    LoginResponse, NewStudent, PendingStudent, RegistrationForm, Student, StudentSummary,
};
use crate::models::{AccountStatus, RollNo};
use crate::services::auth_service;
use crate::services::photo_store::PhotoStore;

pub const PENDING_MESSAGE: &str = "Pending verification.";

/// An uploaded registration photo.
#[derive(Debug)]
pub struct Photo {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn validate_registration(form: RegistrationForm, settings: &Settings) -> ApiResult<NewStudent> {
    fn required(v: Option<String>, field: &str) -> ApiResult<String> {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::validation(format!("{field} is required.")))
    }

    let name = required(form.name, "name")?;
    let division = required(form.division, "division")?;
    let roll_no = RollNo::parse(&required(form.roll_no, "roll_no")?).map_err(ApiError::Validation)?;
    let phone_no = required(form.phone_no, "phone_no")?;
    let password = form.password.filter(|p| !p.is_empty());
    let Some(password) = password else {
        return Err(ApiError::validation("password is required."));
    };

    if !settings.is_known_division(&division) {
        return Err(ApiError::validation(format!("Unknown division {division}.")));
    }
    if !phone_no.chars().all(|c| c.is_ascii_digit() || c == '+') || phone_no.len() > 15 {
        return Err(ApiError::validation("Phone number is not valid."));
    }
    Ok(NewStudent {
        name,
        division,
        roll_no,
        phone_no,
        password,
    })
}

pub async fn register(
    pool: &SqlitePool,
    photos: &PhotoStore,
    student: NewStudent,
    photo: Photo,
    bcrypt_cost: u32,
) -> ApiResult<i64> {
    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM students WHERE division = ? AND roll_no = ?")
        .bind(&student.division)
        .bind(student.roll_no.get())
        .fetch_optional(pool)
        .await?;
    if taken.is_some() {
        return Err(ApiError::validation("Roll Number exists."));
    }

    let hash = auth_service::hash_password(&student.password, bcrypt_cost).await?;
    let photo_path = photos.save_pending(&photo.extension, &photo.bytes).await?;

    let inserted = sqlx::query(
        "INSERT INTO students (name, division, roll_no, phone_no, password_hash, status, photo_path) \
         VALUES (?, ?, ?, ?, ?, 'pending', ?)",
    )
    .bind(&student.name)
    .bind(&student.division)
    .bind(student.roll_no.get())
    .bind(&student.phone_no)
    .bind(&hash)
    .bind(&photo_path)
    .execute(pool)
    .await;

    match inserted {
        Ok(r) => {
            tracing::info!(division = %student.division, roll_no = %student.roll_no, "student registered");
            Ok(r.last_insert_rowid())
        }
        Err(e) => {
            if let Err(io) = photos.remove(&photo_path).await {
                tracing::warn!(path = %photo_path, error = %io, "could not clean up registration photo");
            }
            if is_unique_violation(&e) {
                Err(ApiError::validation("Roll number or phone number is already registered."))
            } else {
                Err(e.into())
            }
        }
    }
}

pub async fn login(pool: &SqlitePool, phone_no: &str, password: &str) -> ApiResult<LoginResponse> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE phone_no = ?")
        .bind(phone_no.trim())
        .fetch_optional(pool)
        .await?;
    let Some(student) = student else {
        return Err(auth_service::invalid_credentials());
    };
    auth_service::check_login(&student.password_hash, student.status(), password, PENDING_MESSAGE).await?;

    sqlx::query("UPDATE students SET last_login = ? WHERE id = ?")
        .bind(now_epoch())
        .bind(student.id)
        .execute(pool)
        .await?;

    Ok(LoginResponse {
        message: "Login success!".into(),
        name: student.name,
        division: student.division,
        roll_no: student.roll_no,
        photo_path: student.photo_path,
    })
}

pub async fn list_pending(pool: &SqlitePool, division: &str) -> ApiResult<Vec<PendingStudent>> {
    let rows = sqlx::query_as::<_, PendingStudent>(
        "SELECT id, name, division, roll_no, photo_path FROM students \
         WHERE status = 'pending' AND division = ? ORDER BY id ASC",
    )
    .bind(division)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Verified students of a division ordered by roll number. An unknown
/// division simply has none.
pub async fn list_verified(pool: &SqlitePool, division: &str) -> ApiResult<Vec<StudentSummary>> {
    let rows = sqlx::query_as::<_, StudentSummary>(
        "SELECT roll_no, name, division, photo_path FROM students \
         WHERE division = ? AND status = 'verified' ORDER BY roll_no ASC",
    )
    .bind(division)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn load_for_division(
    conn: &mut sqlx::SqliteConnection,
    student_id: i64,
    granted_division: &str,
) -> ApiResult<Student> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found."))?;
    if student.division != granted_division {
        return Err(ApiError::Forbidden("Student belongs to another division.".into()));
    }
    Ok(student)
}

/// pending -> verified, moving the photo into the permanent area.
///
/// The status change commits only if the photo move succeeded, and the move
/// is reversed if the commit fails.
pub async fn verify(pool: &SqlitePool, photos: &PhotoStore, student_id: i64, granted_division: &str) -> ApiResult<()> {
    let mut tx = pool.begin().await?;
    let student = load_for_division(&mut tx, student_id, granted_division).await?;
    if student.status() == AccountStatus::Verified {
        return Err(ApiError::validation("Student is already verified."));
    }
    let Some(pending_path) = student.photo_path.as_deref() else {
        return Err(ApiError::validation("Student has no photo to verify."));
    };

    let moved = photos.promote(pending_path, &student.division, student.roll_no).await?;
    let updated = sqlx::query("UPDATE students SET status = 'verified', photo_path = ? WHERE id = ?")
        .bind(&moved.web_path)
        .bind(student.id)
        .execute(&mut *tx)
        .await;
    let committed = match updated {
        Ok(_) => tx.commit().await,
        Err(e) => Err(e),
    };
    if let Err(e) = committed {
        photos.undo(moved).await;
        return Err(e.into());
    }

    tracing::info!(student_id, division = %student.division, roll_no = student.roll_no, "student verified");
    Ok(())
}

/// Deletes a pending registration together with its photo.
pub async fn reject(pool: &SqlitePool, photos: &PhotoStore, student_id: i64, granted_division: &str) -> ApiResult<()> {
    let mut tx = pool.begin().await?;
    let student = load_for_division(&mut tx, student_id, granted_division).await?;
    if student.status() != AccountStatus::Pending {
        return Err(ApiError::validation("Only pending registrations can be rejected."));
    }

    sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(student.id)
        .execute(&mut *tx)
        .await?;

    let staged = match student.photo_path.as_deref() {
        Some(p) => photos.stage_removal(p).await?,
        None => None,
    };
    if let Err(e) = tx.commit().await {
        if let Some(mv) = staged {
            photos.undo(mv).await;
        }
        return Err(e.into());
    }
    if let Some(mv) = staged {
        photos.discard(mv).await;
    }

    tracing::info!(student_id, division = %student.division, roll_no = student.roll_no, "student registration rejected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(roll_no: &str, phone_no: &str) -> RegistrationForm {
        RegistrationForm {
            name: Some("Meera".into()),
            division: Some("A".into()),
            roll_no: Some(roll_no.into()),
            phone_no: Some(phone_no.into()),
            password: Some("pw".into()),
        }
    }

    #[test]
    fn registration_fields_are_validated() {
        let s = Settings::from_lookup(|_| None).unwrap();
        let ok = validate_registration(form(" 12", "+919876543210"), &s).unwrap();
        assert_eq!(ok.roll_no.get(), 12);

        assert!(validate_registration(form("0", "9876543210"), &s).is_err());
        assert!(validate_registration(form("12", "98765-43210"), &s).is_err());
        assert!(validate_registration(RegistrationForm { password: None, ..form("12", "9876543210") }, &s).is_err());
        assert!(validate_registration(RegistrationForm { division: Some("Z".into()), ..form("12", "9876543210") }, &s).is_err());
    }
}
