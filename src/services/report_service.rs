//! Loads the rows behind the attendance reports and hands them to
//! [`reconciliation`](crate::services::reconciliation).

use std::collections::HashSet;

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::error::ApiResult;
use crate::models::student::StudentIdentity;
use crate::services::reconciliation::{
    build_division_table, build_subject_report, format_date, parse_date, AbsenceFact, DateWindow,
    DivisionTable, LectureFact, SubjectReportRow,
};
use crate::services::student_service;

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Weekly P/A/N/A table of a division. With a `viewer`, only the viewer's
/// own row is returned.
pub async fn division_table(
    pool: &SqlitePool,
    settings: &Settings,
    division: &str,
    window: DateWindow,
    viewer: Option<&StudentIdentity>,
) -> ApiResult<DivisionTable> {
    let (start, end) = (format_date(window.start()), format_date(window.end()));

    let mut students = student_service::list_verified(pool, division).await?;
    if let Some(v) = viewer {
        students.retain(|s| v.matches(&s.division, s.roll_no));
    }

    let lecture_dates: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT date FROM lectures WHERE division = ? AND date BETWEEN ? AND ?",
    )
    .bind(division)
    .bind(&start)
    .bind(&end)
    .fetch_all(pool)
    .await?;
    let lecture_dates: Vec<NaiveDate> = lecture_dates.iter().filter_map(|d| parse_date(d)).collect();

    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT student_roll_no, date FROM attendance_records WHERE division = ? AND date BETWEEN ? AND ?",
    )
    .bind(division)
    .bind(&start)
    .bind(&end)
    .fetch_all(pool)
    .await?;
    let absences: Vec<AbsenceFact> = rows
        .into_iter()
        .filter_map(|(roll_no, date)| Some(AbsenceFact { roll_no, date: parse_date(&date)? }))
        .collect();

    tracing::debug!(
        division,
        %start,
        %end,
        students = students.len(),
        absences = absences.len(),
        "building division table"
    );
    Ok(build_division_table(
        division,
        &window,
        students,
        &lecture_dates,
        &absences,
        settings.fine_per_absence,
        viewer,
    ))
}

/// Per-subject attendance percentages of every verified student in
/// `division` over the window.
pub async fn subject_report(
    pool: &SqlitePool,
    settings: &Settings,
    division: &str,
    window: DateWindow,
) -> ApiResult<Vec<SubjectReportRow>> {
    let (start, end) = (format_date(window.start()), format_date(window.end()));
    let students = student_service::list_verified(pool, division).await?;

    let rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT l.subject, l.division, \
         (SELECT json_group_array(r.student_roll_no) FROM attendance_records r WHERE r.lecture_id = l.id) \
         FROM lectures l WHERE l.division = ? AND l.date BETWEEN ? AND ?",
    )
    .bind(division)
    .bind(&start)
    .bind(&end)
    .fetch_all(pool)
    .await?;

    let mut lectures = Vec::with_capacity(rows.len());
    for (subject, division, absent) in rows {
        let absent_roll_nos: HashSet<i64> = match serde_json::from_str::<Vec<i64>>(&absent) {
            Ok(v) => v.into_iter().collect(),
            Err(e) => {
                tracing::warn!(%subject, error = %e, "skipping lecture with unreadable absences");
                continue;
            }
        };
        lectures.push(LectureFact {
            subject,
            division,
            absent_roll_nos,
        });
    }

    Ok(build_subject_report(&settings.subjects, students, &lectures))
}
