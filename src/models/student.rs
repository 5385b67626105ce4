use super::{AccountStatus, RollNo};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub division: String,
    pub roll_no: i64,
    pub phone_no: String,
    pub password_hash: String,
    pub status: String,
    pub photo_path: Option<String>,
    pub last_login: Option<i64>,
}

impl Student {
    pub fn status(&self) -> AccountStatus {
        AccountStatus::parse(&self.status)
    }
}

/// Columns of a verified student that the attendance tables need.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudentSummary {
    pub roll_no: i64,
    pub name: String,
    pub division: String,
    pub photo_path: Option<String>,
}

/// Who a student is. Roll numbers repeat across divisions, so both parts
/// take part in every comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentIdentity {
    pub division: String,
    pub roll_no: RollNo,
}

impl StudentIdentity {
    pub fn matches(&self, division: &str, roll_no: i64) -> bool {
        self.division == division && self.roll_no.get() == roll_no
    }
}

/// Text fields of the multipart registration form.
#[derive(Debug, Default)]
pub struct RegistrationForm {
    pub name: Option<String>,
    pub division: Option<String>,
    pub roll_no: Option<String>,
    pub phone_no: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct NewStudent {
    pub name: String,
    pub division: String,
    pub roll_no: RollNo,
    pub phone_no: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_no: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub name: String,
    pub division: String,
    pub roll_no: i64,
    pub photo_path: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PendingStudent {
    pub id: i64,
    pub name: String,
    pub division: String,
    pub roll_no: i64,
    pub photo_path: Option<String>,
}
