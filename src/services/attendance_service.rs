//! Lectures and their absence rows.
//!
//! The absence rows are the only record of who missed a lecture; the
//! "absent roll numbers" of a lecture are always read back from them.

use std::collections::BTreeSet;
use std::path::PathBuf;

use sqlx::SqlitePool;

use crate::config::Settings;
use crate::db::now_epoch;
use crate::error::{ApiError, ApiResult};
use crate::models::lecture::{
    Lecture, LectureCreated, LectureFilter, LectureForm, LectureRow, NewLecture, RemoveFineRequest,
    SessionType,
};
use crate::models::RollNo;
use crate::services::reconciliation::{format_date, parse_date};
use crate::services::recognizer::{FaceRecognizer, MediaKind, RecognizeError};
use crate::services::student_service;

const LECTURE_SELECT: &str = "SELECT l.id, l.date, l.division, l.subject, l.topic, l.teacher_name, \
     l.time_slot, l.session_type, \
     (SELECT json_group_array(r.student_roll_no) FROM attendance_records r WHERE r.lecture_id = l.id) \
     AS absent_roll_nos \
     FROM lectures l";

pub fn validate_lecture(form: LectureForm, settings: &Settings) -> ApiResult<NewLecture> {
    fn required(v: Option<String>, field: &str) -> ApiResult<String> {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::validation(format!("{field} is required.")))
    }

    let date_raw = required(form.date, "date")?;
    let date = parse_date(&date_raw)
        .ok_or_else(|| ApiError::validation(format!("date {date_raw:?} is not YYYY-MM-DD.")))?;
    let division = required(form.division, "division")?;
    if !settings.is_known_division(&division) {
        return Err(ApiError::validation(format!("Unknown division {division}.")));
    }
    let type_raw = required(form.session_type, "type")?;
    let session_type = SessionType::parse(&type_raw)
        .ok_or_else(|| ApiError::validation(format!("type must be Lecture or Practical, got {type_raw:?}.")))?;

    Ok(NewLecture {
        date,
        division,
        subject: required(form.subject, "subject")?,
        topic: form.topic.map(|t| t.trim().to_string()).unwrap_or_default(),
        teacher_name: required(form.teacher_name, "teacher_name")?,
        time_slot: required(form.time_slot, "time_slot")?,
        session_type,
    })
}

/// Inserts the lecture and one absence row per distinct roll number in a
/// single transaction.
pub async fn create_lecture(pool: &SqlitePool, lecture: &NewLecture, absent: &[RollNo]) -> ApiResult<(i64, usize)> {
    let absent: BTreeSet<RollNo> = absent.iter().copied().collect();
    let date = format_date(lecture.date);

    let mut tx = pool.begin().await?;
    let lecture_id: i64 = sqlx::query_scalar(
        "INSERT INTO lectures (date, division, subject, topic, teacher_name, time_slot, session_type, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&date)
    .bind(&lecture.division)
    .bind(&lecture.subject)
    .bind(&lecture.topic)
    .bind(&lecture.teacher_name)
    .bind(&lecture.time_slot)
    .bind(lecture.session_type.as_str())
    .bind(now_epoch())
    .fetch_one(&mut *tx)
    .await?;

    for roll_no in &absent {
        sqlx::query(
            "INSERT INTO attendance_records (lecture_id, student_roll_no, division, date) VALUES (?, ?, ?, ?)",
        )
        .bind(lecture_id)
        .bind(roll_no.get())
        .bind(&lecture.division)
        .bind(&date)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        lecture_id,
        division = %lecture.division,
        date = %date,
        subject = %lecture.subject,
        absent = absent.len(),
        "lecture recorded"
    );
    Ok((lecture_id, absent.len()))
}

pub async fn submit_manual(pool: &SqlitePool, lecture: &NewLecture, absent: &[RollNo]) -> ApiResult<LectureCreated> {
    let (lecture_id, absent) = create_lecture(pool, lecture, absent).await?;
    Ok(LectureCreated {
        message: format!("Attendance saved. Absent: {absent}"),
        lecture_id,
        present: None,
        absent,
    })
}

/// Runs recognition over uploaded media and records every verified student
/// it did not recognise as absent. The media files are deleted afterwards
/// whatever the outcome.
pub async fn submit_recognized(
    pool: &SqlitePool,
    recognizer: &dyn FaceRecognizer,
    lecture: &NewLecture,
    media: MediaKind,
    paths: Vec<PathBuf>,
) -> ApiResult<LectureCreated> {
    let recognized = recognizer.recognize(&lecture.division, media, &paths).await;
    crate::services::recognizer::discard_media(&paths).await;

    let recognized = recognized.map_err(|e| {
        match &e {
            RecognizeError::Failed { stderr, .. } => {
                tracing::warn!(error = %e, stderr = %stderr, "face recognition failed")
            }
            _ => tracing::warn!(error = %e, "face recognition failed"),
        }
        ApiError::Processing("AI Processing Failed.".into())
    })?;
    let recognized: BTreeSet<i64> = recognized.into_iter().map(RollNo::get).collect();

    let enrolled = student_service::list_verified(pool, &lecture.division).await?;
    let mut absent = Vec::new();
    let mut present = 0usize;
    for s in &enrolled {
        if recognized.contains(&s.roll_no) {
            present += 1;
        } else if let Ok(r) = RollNo::new(s.roll_no) {
            absent.push(r);
        }
    }
    let unknown = recognized.len() - present;
    if unknown > 0 {
        tracing::debug!(unknown, division = %lecture.division, "recognised roll numbers with no verified student");
    }

    let (lecture_id, absent) = create_lecture(pool, lecture, &absent).await?;
    Ok(LectureCreated {
        message: format!("Done! Present: {present}, Absent: {absent}"),
        lecture_id,
        present: Some(present),
        absent,
    })
}

/// Lectures newest first; `ALL` or a missing division means every division.
pub async fn list_lectures(pool: &SqlitePool, filter: LectureFilter) -> ApiResult<Vec<Lecture>> {
    let division = filter
        .division
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("ALL"));
    let date = match filter.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Some(format_date(
            parse_date(raw).ok_or_else(|| ApiError::validation(format!("date {raw:?} is not YYYY-MM-DD.")))?,
        )),
        None => None,
    };

    let sql = format!(
        "{LECTURE_SELECT} WHERE (? IS NULL OR l.division = ?) AND (? IS NULL OR l.date = ?) \
         ORDER BY l.date DESC, l.time_slot ASC, l.id ASC"
    );
    let rows = sqlx::query_as::<_, LectureRow>(&sql)
        .bind(&division)
        .bind(&division)
        .bind(&date)
        .bind(&date)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let id = row.id;
            Lecture::try_from(row).map_err(|e| {
                tracing::error!(lecture_id = id, error = %e, "unreadable absence list");
                ApiError::Processing("Could not read lecture absences.".into())
            })
        })
        .collect()
}

/// Waives one absence: deletes the single absence row of `roll_no` in the
/// lecture identified by (date, time slot, division).
pub async fn remove_fine(pool: &SqlitePool, req: RemoveFineRequest) -> ApiResult<()> {
    let date = parse_date(&req.date)
        .map(format_date)
        .ok_or_else(|| ApiError::validation(format!("date {:?} is not YYYY-MM-DD.", req.date)))?;
    let time_slot = req.time_slot.trim();
    let division = req.division.trim();

    let mut tx = pool.begin().await?;
    let matches: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM lectures WHERE date = ? AND time_slot = ? AND division = ? LIMIT 2",
    )
    .bind(&date)
    .bind(time_slot)
    .bind(division)
    .fetch_all(&mut *tx)
    .await?;

    let lecture_id = match matches.as_slice() {
        [] => return Err(ApiError::not_found("Lecture not found.")),
        [id] => *id,
        _ => {
            return Err(ApiError::validation(
                "More than one lecture matches that date, time slot and division.",
            ))
        }
    };

    let deleted = sqlx::query("DELETE FROM attendance_records WHERE lecture_id = ? AND student_roll_no = ?")
        .bind(lecture_id)
        .bind(req.roll_no.get())
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "No absence recorded for roll number {} in that lecture.",
            req.roll_no
        )));
    }
    tx.commit().await?;

    tracing::info!(lecture_id, roll_no = %req.roll_no, division, "fine removed");
    Ok(())
}

/// Deletes the lecture; its absence rows go with it through the foreign key.
pub async fn delete_lecture(pool: &SqlitePool, lecture_id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM lectures WHERE id = ?")
        .bind(lecture_id)
        .execute(pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Lecture not found."));
    }
    tracing::info!(lecture_id, "lecture deleted");
    Ok(())
}
