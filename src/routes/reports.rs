use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::error::ApiResult;
use crate::rbac::HodAccess;
use crate::routes::ApiQuery;
use crate::services::reconciliation::{DateWindow, SubjectReportRow};
use crate::services::report_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub division: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
}

/// GET /hod/student-dashboard. Without a division there is nobody to report on.
async fn student_dashboard(
    _hod: HodAccess,
    State(pool): State<SqlitePool>,
    State(settings): State<Arc<Settings>>,
    ApiQuery(q): ApiQuery<DashboardQuery>,
) -> ApiResult<Json<Vec<SubjectReportRow>>> {
    let Some(division) = q.division.as_deref().map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(Json(Vec::new()));
    };
    let window = DateWindow::resolve(q.start_date.as_deref(), q.end_date.as_deref(), report_service::today());
    Ok(Json(report_service::subject_report(&pool, &settings, division, window).await?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/hod/student-dashboard", get(student_dashboard))
}
