use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A roll number, unique only within a division.
///
/// Clients send it as a number or as a numeric string; it is always compared
/// and stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RollNo(i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRollNo {
    Int(i64),
    Text(String),
}

impl RollNo {
    pub fn new(value: i64) -> Result<Self, String> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(format!("roll number must be positive, got {value}"))
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| format!("roll number {trimmed:?} is not a number"))?;
        Self::new(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for RollNo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawRollNo::deserialize(deserializer)? {
            RawRollNo::Int(v) => Self::new(v),
            RawRollNo::Text(s) => Self::parse(&s),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

impl From<RollNo> for i64 {
    fn from(r: RollNo) -> i64 {
        r.0
    }
}

impl fmt::Display for RollNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
