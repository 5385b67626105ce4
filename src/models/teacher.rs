use super::AccountStatus;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub status: String,
    pub last_login: Option<i64>,
}

impl Teacher {
    pub fn status(&self) -> AccountStatus {
        AccountStatus::parse(&self.status)
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub teacher_name: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PendingTeacher {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TeacherStatus {
    pub name: String,
    pub is_active: bool,
    pub last_login: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TeacherStatusResponse {
    pub poll_interval_secs: u64,
    pub teachers: Vec<TeacherStatus>,
}
