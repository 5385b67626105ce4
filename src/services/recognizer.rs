//! External face-recognition step.
//!
//! The collaborator is a separate program that prints a JSON array of the
//! roll numbers it recognised. Any other outcome is a total failure: no
//! partial attendance is ever recorded from it.

use axum::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::models::RollNo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Photos,
}

impl MediaKind {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Photos => "photos",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecognizeError {
    #[error("could not start recogniser: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("recogniser exited with {status}")]
    Failed { status: String, stderr: String },
    #[error("recogniser output is not a JSON list of roll numbers")]
    BadOutput(String),
}

#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    async fn recognize(
        &self,
        division: &str,
        media: MediaKind,
        paths: &[PathBuf],
    ) -> Result<Vec<RollNo>, RecognizeError>;
}

/// Runs `<program> <script> attendance <video|photos> <division> <paths...>`.
#[derive(Debug, Clone)]
pub struct ProcessRecognizer {
    program: String,
    script: String,
}

impl ProcessRecognizer {
    pub fn new(program: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
        }
    }
}

#[async_trait]
impl FaceRecognizer for ProcessRecognizer {
    async fn recognize(
        &self,
        division: &str,
        media: MediaKind,
        paths: &[PathBuf],
    ) -> Result<Vec<RollNo>, RecognizeError> {
        let output = Command::new(&self.program)
            .arg(&self.script)
            .arg("attendance")
            .arg(media.as_arg())
            .arg(division)
            .args(paths.iter().map(PathBuf::as_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RecognizeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Accepts exactly a JSON array of integers. Duplicates are dropped.
pub fn parse_output(stdout: &str) -> Result<Vec<RollNo>, RecognizeError> {
    let values: Vec<i64> = serde_json::from_str(stdout.trim())
        .map_err(|_| RecognizeError::BadOutput(truncate(stdout, 200)))?;
    let mut rolls = values
        .into_iter()
        .map(RollNo::new)
        .collect::<Result<Vec<_>, _>>()
        .map_err(RecognizeError::BadOutput)?;
    rolls.sort();
    rolls.dedup();
    Ok(rolls)
}

fn truncate(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

/// Removes uploaded media regardless of how processing went.
pub async fn discard_media(paths: &[PathBuf]) {
    for p in paths {
        remove_quietly(p).await;
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "could not remove uploaded media");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_list_of_roll_numbers() {
        let rolls = parse_output("[3, 1, 3]\n").unwrap();
        let values: Vec<i64> = rolls.into_iter().map(RollNo::get).collect();
        assert_eq!(values, vec![1, 3]);
        assert!(parse_output("[]").unwrap().is_empty());
    }

    #[test]
    fn anything_else_is_a_failure() {
        for bad in ["", "Traceback (most recent call last)", "{\"rolls\": [1]}", "[1, \"2\"]", "[0]"] {
            assert!(
                matches!(parse_output(bad), Err(RecognizeError::BadOutput(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let r = ProcessRecognizer::new("/nonexistent/recogniser-binary", "script.py");
        let err = r
            .recognize("A", MediaKind::Photos, &[PathBuf::from("x.jpg")])
            .await
            .unwrap_err();
        assert!(matches!(err, RecognizeError::Spawn(_)));
    }
}
