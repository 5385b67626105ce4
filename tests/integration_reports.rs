mod common;

use axum::http::StatusCode;
use common::{hod, TestApp};
use serde_json::json;

const WINDOW: &str = "start_date=2026-10-01&end_date=2026-10-03";

#[tokio::test]
async fn weekly_table_marks_present_absent_and_not_applicable() {
    let app = TestApp::new().await;
    app.seed_student("A", 1, "Anil").await;
    app.seed_student("A", 2, "Bela").await;
    app.record_lecture("2026-10-01", "A", "DS", "09:00", &[1]).await;
    app.record_lecture("2026-10-01", "A", "OS", "10:00", &[1]).await;
    app.record_lecture("2026-10-03", "A", "DS", "09:00", &[]).await;
    app.record_lecture("2026-10-02", "B", "DS", "09:00", &[1]).await;

    let (status, table) = app.get(&format!("/api/students/A?{WINDOW}"), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(table["dates"], json!(["2026-10-01", "2026-10-02", "2026-10-03"]));

    let anil = &table["students"][0];
    assert_eq!(anil["roll_no"], 1);
    assert_eq!(
        anil["attendance"],
        json!({ "2026-10-01": "A", "2026-10-02": "N/A", "2026-10-03": "P" })
    );
    // Two lectures missed on one day is one absent day.
    assert_eq!(anil["absences"], 1);
    assert_eq!(anil["fine"], 100);

    let bela = &table["students"][1];
    assert_eq!(bela["attendance"]["2026-10-01"], "P");
    assert_eq!(bela["fine"], 0);
}

#[tokio::test]
async fn roll_number_narrows_the_table_to_the_caller() {
    let app = TestApp::new().await;
    app.seed_student("A", 1, "Anil").await;
    app.seed_student("A", 2, "Bela").await;
    app.seed_student("B", 1, "Chetan").await;

    let (_, table) = app.get(&format!("/api/students/A?{WINDOW}&roll_no=2"), &[]).await;
    let rows = table["students"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Bela");
    assert_eq!(rows[0]["is_self"], true);

    let (status, _) = app.get("/api/students/A?roll_no=two", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_windows_fall_back_to_the_trailing_week() {
    let app = TestApp::new().await;
    for query in ["", "?start_date=2026-10-05&end_date=2026-10-01", "?start_date=soon"] {
        let (status, table) = app.get(&format!("/api/students/A{query}"), &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(table["dates"].as_array().unwrap().len(), 7, "{query}");
    }

    let (status, table) = app.get(&format!("/api/students/Q?{WINDOW}"), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(table["students"], json!([]));
}

#[tokio::test]
async fn hod_dashboard_reports_subject_percentages() {
    let app = TestApp::new().await;
    app.seed_student("A", 1, "Anil").await;
    app.record_lecture("2026-10-01", "A", "DS", "09:00", &[1]).await;
    app.record_lecture("2026-10-02", "A", "DS", "09:00", &[]).await;
    app.record_lecture("2026-10-03", "A", "DS", "09:00", &[]).await;
    app.record_lecture("2026-10-03", "A", "OS", "10:00", &[]).await;
    app.record_lecture("2026-09-01", "A", "OS", "10:00", &[1]).await;

    let (status, _) = app
        .get("/api/hod/student-dashboard?division=A", &[])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, rows) = app
        .get(
            "/api/hod/student-dashboard?division=A&startDate=2026-10-01&endDate=2026-10-03",
            &hod(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let row = &rows[0];
    assert_eq!(row["subject_avg"]["DS"], 66.7);
    assert_eq!(row["subject_avg"]["OS"], 100.0);
    assert_eq!(row["subject_avg"]["CEP"], "N/A");
    assert_eq!(row["total_avg"], 75.0);

    let (_, rows) = app.get("/api/hod/student-dashboard", &hod()).await;
    assert_eq!(rows, json!([]));
}
