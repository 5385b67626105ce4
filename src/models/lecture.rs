use super::RollNo;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionType {
    Lecture,
    Practical,
}

impl SessionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lecture" => Some(Self::Lecture),
            "practical" => Some(Self::Practical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lecture => "Lecture",
            Self::Practical => "Practical",
        }
    }
}

/// A lecture row joined with its absence rows, which arrive as a JSON array
/// built by SQLite.
#[derive(Debug, FromRow)]
pub struct LectureRow {
    pub id: i64,
    pub date: String,
    pub division: String,
    pub subject: String,
    pub topic: String,
    pub teacher_name: String,
    pub time_slot: String,
    pub session_type: String,
    pub absent_roll_nos: String,
}

#[derive(Debug, Serialize)]
pub struct Lecture {
    pub id: i64,
    pub date: String,
    pub division: String,
    pub subject: String,
    pub topic: String,
    pub teacher_name: String,
    pub time_slot: String,
    #[serde(rename = "type")]
    pub session_type: String,
    pub absent_roll_nos: Vec<i64>,
}

impl TryFrom<LectureRow> for Lecture {
    type Error = serde_json::Error;

    fn try_from(row: LectureRow) -> Result<Self, Self::Error> {
        let mut absent_roll_nos: Vec<i64> = serde_json::from_str(&row.absent_roll_nos)?;
        absent_roll_nos.sort_unstable();
        Ok(Self {
            id: row.id,
            date: row.date,
            division: row.division,
            subject: row.subject,
            topic: row.topic,
            teacher_name: row.teacher_name,
            time_slot: row.time_slot,
            session_type: row.session_type,
            absent_roll_nos,
        })
    }
}

/// Lecture details as submitted by a teacher, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct LectureForm {
    pub date: Option<String>,
    pub division: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    pub teacher_name: Option<String>,
    pub time_slot: Option<String>,
    #[serde(rename = "type")]
    pub session_type: Option<String>,
}

/// Validated lecture details.
#[derive(Debug, Clone)]
pub struct NewLecture {
    pub date: chrono::NaiveDate,
    pub division: String,
    pub subject: String,
    pub topic: String,
    pub teacher_name: String,
    pub time_slot: String,
    pub session_type: SessionType,
}

#[derive(Debug, Deserialize)]
pub struct ManualAttendanceRequest {
    #[serde(flatten)]
    pub lecture: LectureForm,
    #[serde(default)]
    pub absent_roll_nos: Vec<RollNo>,
}

#[derive(Debug, Serialize)]
pub struct LectureCreated {
    pub message: String,
    pub lecture_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present: Option<usize>,
    pub absent: usize,
}

#[derive(Debug, Deserialize)]
pub struct LectureFilter {
    pub division: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFineRequest {
    pub date: String,
    pub time_slot: String,
    pub roll_no: RollNo,
    pub division: String,
}
