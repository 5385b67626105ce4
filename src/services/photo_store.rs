//! Student photos and uploaded attendance media on disk.
//!
//! Photo references are stored as web paths (`pending_images/<file>`,
//! `student_images/<division>/<roll>.<ext>`) that map onto the configured
//! directories and onto the static routes serving them.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::Settings;

pub const PENDING_PREFIX: &str = "pending_images";
pub const VERIFIED_PREFIX: &str = "student_images";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct PhotoStore {
    upload_dir: PathBuf,
    pending_dir: PathBuf,
    verified_dir: PathBuf,
}

/// A completed move that can still be reversed.
#[derive(Debug)]
pub struct PhotoMove {
    pub web_path: String,
    from: PathBuf,
    to: PathBuf,
}

impl PhotoStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            upload_dir: settings.upload_dir.clone(),
            pending_dir: settings.pending_images_dir.clone(),
            verified_dir: settings.student_images_dir.clone(),
        }
    }

    /// Lower-cased image extension of `file_name`, if it is one we accept.
    pub fn image_extension(file_name: &str) -> Option<String> {
        let ext = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }

    pub async fn save_pending(&self, ext: &str, bytes: &[u8]) -> io::Result<String> {
        let file_name = format!("{}.{ext}", uuid::Uuid::new_v4());
        tokio::fs::create_dir_all(&self.pending_dir).await?;
        tokio::fs::write(self.pending_dir.join(&file_name), bytes).await?;
        Ok(format!("{PENDING_PREFIX}/{file_name}"))
    }

    /// Writes uploaded attendance media under a fresh name, keeping the
    /// original extension.
    pub async fn save_upload(&self, original_name: Option<&str>, bytes: &[u8]) -> io::Result<PathBuf> {
        let ext = original_name
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(format!("{}{ext}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Maps a stored web path back to the file it names.
    pub fn resolve(&self, web_path: &str) -> Option<PathBuf> {
        let (prefix, rest) = web_path.trim_start_matches('/').split_once('/')?;
        let base = match prefix {
            PENDING_PREFIX => &self.pending_dir,
            VERIFIED_PREFIX => &self.verified_dir,
            _ => return None,
        };
        let rel = Path::new(rest);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(base.join(rel))
    }

    /// Moves a pending photo to `student_images/<division>/<roll_no>.<ext>`.
    pub async fn promote(&self, pending_web_path: &str, division: &str, roll_no: i64) -> io::Result<PhotoMove> {
        let from = self.resolve(pending_web_path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("unusable photo path {pending_web_path:?}"))
        })?;
        let ext = from
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_string();
        let dir = self.verified_dir.join(division);
        tokio::fs::create_dir_all(&dir).await?;
        let to = dir.join(format!("{roll_no}.{ext}"));
        move_file(&from, &to).await?;
        Ok(PhotoMove {
            web_path: format!("{VERIFIED_PREFIX}/{division}/{roll_no}.{ext}"),
            from,
            to,
        })
    }

    /// Puts a promoted photo back where it came from.
    pub async fn undo(&self, mv: PhotoMove) {
        if let Err(e) = move_file(&mv.to, &mv.from).await {
            tracing::error!(from = %mv.to.display(), to = %mv.from.display(), error = %e, "could not restore photo");
        }
    }

    /// Moves the photo aside so its deletion can still be rolled back with
    /// [`PhotoStore::undo`] or made final with [`PhotoStore::discard`].
    /// `None` when there is no file to remove.
    pub async fn stage_removal(&self, web_path: &str) -> io::Result<Option<PhotoMove>> {
        let Some(from) = self.resolve(web_path) else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(&from).await? {
            return Ok(None);
        }
        let mut staged = from.clone().into_os_string();
        staged.push(".removing");
        let to = PathBuf::from(staged);
        move_file(&from, &to).await?;
        Ok(Some(PhotoMove {
            web_path: web_path.to_string(),
            from,
            to,
        }))
    }

    pub async fn discard(&self, mv: PhotoMove) {
        if let Err(e) = tokio::fs::remove_file(&mv.to).await {
            tracing::warn!(path = %mv.to.display(), error = %e, "could not delete staged photo");
        }
    }

    /// Deletes the photo behind `web_path`; a file that is already gone is fine.
    pub async fn remove(&self, web_path: &str) -> io::Result<()> {
        let Some(path) = self.resolve(web_path) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Rename, falling back to copy + delete across file systems.
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(e);
    }
    Ok(())
}
