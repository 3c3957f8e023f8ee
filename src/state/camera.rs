//! Capture screen. Photos are picked up from an inbox folder (a phone sync
//! target, a scanner drop folder, ...) and handed to the add-article flow.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::{count_label, ChecklistState, Notice, Reaction, Route};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraDialog {
    #[default]
    None,
    PermissionDenied,
}

#[derive(Debug)]
pub struct CameraState {
    inbox: PathBuf,
    target_article: Option<i64>,
    pub photos: ChecklistState<PathBuf>,
    pub dialog: CameraDialog,
}

impl CameraState {
    pub fn new(inbox: PathBuf, target_article: Option<i64>) -> Self {
        Self {
            inbox,
            target_article,
            photos: ChecklistState::new(Vec::new()),
            dialog: CameraDialog::None,
        }
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    pub fn target_article(&self) -> Option<i64> {
        self.target_article
    }

    /// Re-read the inbox. A missing inbox is created; an unreadable one opens
    /// the permission dialog.
    pub fn scan(&mut self) -> Result<Reaction> {
        match list_images(&self.inbox) {
            Ok(photos) => {
                debug!(inbox = %self.inbox.display(), count = photos.len(), "scanned capture inbox");
                self.photos = ChecklistState::new(photos);
                Ok(Reaction::none())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.inbox).with_context(|| {
                    format!("failed to create capture inbox {}", self.inbox.display())
                })?;
                self.photos = ChecklistState::new(Vec::new());
                Ok(Reaction::notice(Notice::info(format!(
                    "Put photos in {} to import them.",
                    self.inbox.display()
                ))))
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                warn!(inbox = %self.inbox.display(), "capture inbox is not readable");
                self.photos = ChecklistState::new(Vec::new());
                self.dialog = CameraDialog::PermissionDenied;
                Ok(Reaction::none())
            }
            Err(err) => Err(err)
                .with_context(|| format!("failed to read capture inbox {}", self.inbox.display())),
        }
    }

    /// Hand the checked photos, or the one under the cursor when nothing is
    /// checked, to the add-article flow.
    pub fn confirm(&self) -> Reaction {
        let mut sources: Vec<PathBuf> = self.photos.checked().into_iter().cloned().collect();
        if sources.is_empty() {
            sources.extend(self.photos.current().cloned());
        }
        if sources.is_empty() {
            return Reaction::notice(Notice::error("No photos to import."));
        }
        debug!(photos = sources.len(), "starting add-article flow");
        Reaction::navigate(Route::AddArticle {
            sources,
            target_article: self.target_article,
        })
        .with_notice(Notice::info(format!(
            "Importing {}.",
            count_label(self.photos.checked_count().max(1), "photo", "photos")
        )))
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = CameraDialog::None;
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut photos = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            photos.push(path);
        }
    }
    photos.sort();
    Ok(photos)
}
