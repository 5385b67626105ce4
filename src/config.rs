use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

const DEFAULT_HOD_CODE: &str = "hod123";
const DEFAULT_DIVISION_CODES: &str = "A=divA2025,B=divB2025";
const DEFAULT_SUBJECTS: &str = "DS,OOPCG,ELE DF,OS,DELD,UHV,ED,DSL,CEP";

/// Runtime settings, read once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub port: u16,
    pub hod_access_code: String,
    /// division -> access code; the keys are also the set of known divisions
    pub division_codes: BTreeMap<String, String>,
    pub subjects: Vec<String>,
    pub fine_per_absence: i64,
    pub bcrypt_cost: u32,
    pub upload_dir: PathBuf,
    pub pending_images_dir: PathBuf,
    pub student_images_dir: PathBuf,
    pub recognizer_program: String,
    pub recognizer_script: String,
    pub max_upload_photos: usize,
    pub max_upload_bytes: usize,
    pub teacher_active_secs: i64,
    pub status_poll_secs: u64,
}

/// The part of [`Settings`] that is safe to hand to any client.
#[derive(Debug, Serialize)]
pub struct PublicSettings {
    pub divisions: Vec<String>,
    pub subjects: Vec<String>,
    pub fine_per_absence: i64,
    pub status_poll_secs: u64,
    pub max_upload_photos: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hod_access_code = match get("HOD_ACCESS_CODE") {
            Some(code) => code.trim().to_string(),
            None => {
                tracing::warn!("HOD_ACCESS_CODE not set, using the built-in development code");
                DEFAULT_HOD_CODE.to_string()
            }
        };
        let division_codes = match get("DIVISION_ACCESS_CODES") {
            Some(raw) => parse_division_codes(&raw)?,
            None => {
                tracing::warn!("DIVISION_ACCESS_CODES not set, using the built-in development codes");
                parse_division_codes(DEFAULT_DIVISION_CODES)?
            }
        };
        let subjects = parse_list(&get("SUBJECTS").unwrap_or_else(|| DEFAULT_SUBJECTS.into()));
        if subjects.is_empty() {
            bail!("SUBJECTS must name at least one subject");
        }

        let bcrypt_cost: u32 = parse_num(&get, "BCRYPT_COST", 10)?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31, got {bcrypt_cost}");
        }
        let max_upload_photos: usize = parse_num(&get, "MAX_UPLOAD_PHOTOS", 10)?;
        if max_upload_photos == 0 {
            bail!("MAX_UPLOAD_PHOTOS must be at least 1");
        }
        let max_upload_mb: usize = parse_num(&get, "MAX_UPLOAD_MB", 100)?;

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://attendance.db".into()),
            port: parse_num(&get, "PORT", 3000)?,
            hod_access_code,
            division_codes,
            subjects,
            fine_per_absence: parse_num(&get, "FINE_PER_ABSENCE", 100)?,
            bcrypt_cost,
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| "uploads".into()).into(),
            pending_images_dir: get("PENDING_IMAGES_DIR")
                .unwrap_or_else(|| "pending_images".into())
                .into(),
            student_images_dir: get("STUDENT_IMAGES_DIR")
                .unwrap_or_else(|| "student_images".into())
                .into(),
            recognizer_program: get("RECOGNIZER_PROGRAM").unwrap_or_else(|| "python".into()),
            recognizer_script: get("RECOGNIZER_SCRIPT").unwrap_or_else(|| "ai_processor.py".into()),
            max_upload_photos,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            teacher_active_secs: parse_num(&get, "TEACHER_ACTIVE_SECS", 300)?,
            status_poll_secs: parse_num(&get, "STATUS_POLL_SECS", 15)?,
        })
    }

    pub fn is_known_division(&self, division: &str) -> bool {
        self.division_codes.contains_key(division)
    }

    pub fn public(&self) -> PublicSettings {
        PublicSettings {
            divisions: self.division_codes.keys().cloned().collect(),
            subjects: self.subjects.clone(),
            fine_per_absence: self.fine_per_absence,
            status_poll_secs: self.status_poll_secs,
            max_upload_photos: self.max_upload_photos,
        }
    }

    /// Every directory the service writes media into.
    pub fn media_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.upload_dir.clone(),
            self.pending_images_dir.clone(),
            self.student_images_dir.clone(),
        ];
        dirs.extend(self.division_codes.keys().map(|d| self.student_images_dir.join(d)));
        dirs
    }
}

fn parse_num<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `A=codeA,B=codeB`.
fn parse_division_codes(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for entry in parse_list(raw) {
        let Some((division, code)) = entry.split_once('=') else {
            bail!("division access entry {entry:?} is not DIVISION=CODE");
        };
        let (division, code) = (division.trim(), code.trim());
        if division.is_empty() || code.is_empty() {
            bail!("division access entry {entry:?} has an empty side");
        }
        if map.values().any(|c: &String| c == code) {
            bail!("division access code for {division} is shared with another division");
        }
        map.insert(division.to_string(), code.to_string());
    }
    if map.is_empty() {
        bail!("DIVISION_ACCESS_CODES must configure at least one division");
    }
    Ok(map)
}
