#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use attendance_hub::config::Settings;
use attendance_hub::models::RollNo;
use attendance_hub::services::recognizer::{FaceRecognizer, MediaKind, RecognizeError};
use attendance_hub::{app, db, AppState};
use axum::{
    async_trait,
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const HOD_CODE: &str = "hod-test";
pub const CODE_A: &str = "code-a";
pub const CODE_B: &str = "code-b";
const BOUNDARY: &str = "attendance-test-boundary";

/// Recogniser double: answers with a fixed outcome and remembers the files it
/// was handed.
pub struct StubRecognizer {
    outcome: Result<Vec<i64>, String>,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl StubRecognizer {
    pub fn recognizing(rolls: &[i64]) -> Self {
        Self {
            outcome: Ok(rolls.to_vec()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            outcome: Err(stderr.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FaceRecognizer for StubRecognizer {
    async fn recognize(
        &self,
        _division: &str,
        _media: MediaKind,
        paths: &[PathBuf],
    ) -> Result<Vec<RollNo>, RecognizeError> {
        for p in paths {
            assert!(p.exists(), "media {} missing during recognition", p.display());
        }
        self.seen.lock().unwrap().extend(paths.iter().cloned());
        match &self.outcome {
            Ok(rolls) => Ok(rolls.iter().map(|r| RollNo::new(*r).unwrap()).collect()),
            Err(stderr) => Err(RecognizeError::Failed {
                status: "exit status: 1".into(),
                stderr: stderr.clone(),
            }),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub settings: Settings,
    pub root: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub fn temp_root() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let root = std::env::temp_dir().join(format!("attendance-it-{nanos}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with(Arc::new(StubRecognizer::recognizing(&[])), &[]).await
    }

    pub async fn with_recognizer(recognizer: Arc<StubRecognizer>) -> Self {
        Self::with(recognizer, &[]).await
    }

    pub async fn with(recognizer: Arc<StubRecognizer>, extra_env: &[(&str, &str)]) -> Self {
        let root = temp_root();
        let mut vars: HashMap<String, String> = [
            ("DATABASE_URL", "sqlite::memory:".to_string()),
            ("BCRYPT_COST", "4".to_string()),
            ("HOD_ACCESS_CODE", HOD_CODE.to_string()),
            ("DIVISION_ACCESS_CODES", format!("A={CODE_A},B={CODE_B}")),
            ("UPLOAD_DIR", root.join("uploads").display().to_string()),
            ("PENDING_IMAGES_DIR", root.join("pending").display().to_string()),
            ("STUDENT_IMAGES_DIR", root.join("students").display().to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (k, v) in extra_env {
            vars.insert(k.to_string(), v.to_string());
        }
        let settings = Settings::from_lookup(|k| vars.get(k).cloned()).unwrap();
        for dir in settings.media_dirs() {
            std::fs::create_dir_all(dir).unwrap();
        }

        let pool = db::connect(&settings.database_url).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let router = app(AppState::new(pool.clone(), settings.clone(), recognizer));
        Self {
            router,
            pool,
            settings,
            root,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, headers, Body::empty())).await
    }

    pub async fn delete(&self, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        self.send(request(Method::DELETE, uri, headers, Body::empty())).await
    }

    pub async fn json(&self, method: Method, uri: &str, headers: &[(&str, &str)], body: Value) -> (StatusCode, Value) {
        let mut all = vec![("content-type", "application/json")];
        all.extend_from_slice(headers);
        self.send(request(method, uri, &all, Body::from(body.to_string()))).await
    }

    pub async fn multipart(&self, uri: &str, form: Multipart) -> (StatusCode, Value) {
        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
        let headers = [("content-type", content_type.as_str())];
        self.send(request(Method::POST, uri, &headers, Body::from(form.finish()))).await
    }

    /// Inserts an already verified student straight into the database.
    pub async fn seed_student(&self, division: &str, roll_no: i64, name: &str) {
        sqlx::query(
            "INSERT INTO students (name, division, roll_no, phone_no, password_hash, status) \
             VALUES (?, ?, ?, ?, 'x', 'verified')",
        )
        .bind(name)
        .bind(division)
        .bind(roll_no)
        .bind(format!("9{division}{roll_no:04}"))
        .execute(&self.pool)
        .await
        .unwrap();
    }

    /// Records a lecture through the manual endpoint and returns its id.
    pub async fn record_lecture(&self, date: &str, division: &str, subject: &str, slot: &str, absent: &[i64]) -> i64 {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/attendance",
                &[],
                serde_json::json!({
                    "date": date,
                    "division": division,
                    "subject": subject,
                    "teacher_name": "R. Iyer",
                    "time_slot": slot,
                    "type": "Lecture",
                    "absent_roll_nos": absent,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["lecture_id"].as_i64().unwrap()
    }

    pub fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn request(method: Method, uri: &str, headers: &[(&str, &str)], body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(body).unwrap()
}

pub fn hod() -> [(&'static str, &'static str); 1] {
    [("x-hod-code", HOD_CODE)]
}

pub fn division(code: &'static str) -> [(&'static str, &'static str); 1] {
    [("x-division-code", code)]
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn lecture(self, date: &str, division: &str) -> Self {
        self.text("date", date)
            .text("division", division)
            .text("subject", "DS")
            .text("topic", "Trees")
            .text("teacher_name", "R. Iyer")
            .text("time_slot", "10:00-11:00")
            .text("type", "lecture")
    }

    fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
