pub mod lecture;
pub mod roll_no;
pub mod student;
pub mod teacher;

use serde::{Deserialize, Serialize};

pub use roll_no::RollNo;

/// Lifecycle of a teacher or student account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Verified,
}

impl AccountStatus {
    /// Unknown values are treated as pending so they can never log in.
    pub fn parse(s: &str) -> Self {
        match s {
            "verified" => Self::Verified,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
        }
    }
}

/// Generic `{"message": ...}` success body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
