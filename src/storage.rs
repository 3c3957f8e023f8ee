//! On-disk article images.
//!
//! Every stored image is written twice under the same filename: the full
//! extraction in `images/` and a small preview in `thumbnails/`. Rows only
//! record the filename, so both paths are derived from it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::{imageops, RgbaImage};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ImageQuality, Paths};
use crate::models::{ArticleImages, ArticleWithImages, LazyImagePaths};

const MAX_THUMBNAIL_DIMENSION: u32 = 300;
const IMAGE_EXTENSION: &str = "png";

#[derive(Debug, Clone)]
pub struct ImageStore {
    images_dir: Arc<PathBuf>,
    thumbnails_dir: Arc<PathBuf>,
}

impl ImageStore {
    pub fn open(paths: &Paths) -> Result<Self> {
        Self::with_dirs(paths.images_dir(), paths.thumbnails_dir())
    }

    pub fn with_dirs(images_dir: PathBuf, thumbnails_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&images_dir).context("failed to create images directory")?;
        fs::create_dir_all(&thumbnails_dir).context("failed to create thumbnails directory")?;
        Ok(Self {
            images_dir: Arc::new(images_dir),
            thumbnails_dir: Arc::new(thumbnails_dir),
        })
    }

    pub fn image_path(&self, filename: &str) -> PathBuf {
        self.images_dir.join(filename)
    }

    pub fn thumbnail_path(&self, filename: &str) -> PathBuf {
        self.thumbnails_dir.join(filename)
    }

    /// Write `image` at the requested quality plus its thumbnail and return
    /// the new filename.
    pub fn write(&self, image: &RgbaImage, quality: ImageQuality) -> Result<String> {
        let filename = format!("{}.{IMAGE_EXTENSION}", Uuid::new_v4());

        let stored = fit_to_quality(image, quality);
        stored
            .save(self.image_path(&filename))
            .with_context(|| format!("failed to save image {filename}"))?;

        let preview = thumbnail(&stored);
        if let Err(err) = preview.save(self.thumbnail_path(&filename)) {
            // Without a thumbnail the image is unreachable from grids; undo.
            self.remove(std::slice::from_ref(&filename));
            return Err(err).with_context(|| format!("failed to save thumbnail {filename}"));
        }

        debug!(%filename, width = stored.width(), height = stored.height(), "stored article image");
        Ok(filename)
    }

    /// Best-effort removal of full images and thumbnails. Missing files are
    /// fine; other failures are logged and skipped.
    pub fn remove(&self, filenames: &[String]) {
        for filename in filenames {
            for path in [self.image_path(filename), self.thumbnail_path(filename)] {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => warn!(path = %path.display(), error = %err, "failed to remove image file"),
                }
            }
        }
    }

    pub fn images(&self, filenames: Vec<String>) -> LazyImagePaths {
        LazyImagePaths::new(Arc::clone(&self.images_dir), filenames)
    }

    pub fn thumbnails(&self, filenames: Vec<String>) -> LazyImagePaths {
        LazyImagePaths::new(Arc::clone(&self.thumbnails_dir), filenames)
    }

    /// Pair raw rows with this store's directories.
    pub fn resolve(&self, article: ArticleImages) -> ArticleWithImages {
        let filenames = article.filenames();
        ArticleWithImages {
            article_id: article.article_id,
            image_ids: article.image_ids(),
            images: self.images(filenames.clone()),
            thumbnails: self.thumbnails(filenames),
        }
    }

    /// Total bytes under both directories.
    pub fn storage_bytes(&self) -> Result<u64> {
        Ok(dir_size(&self.images_dir)? + dir_size(&self.thumbnails_dir)?)
    }
}

/// Scale an image down so it fits inside a square of the given size,
/// keeping its aspect ratio.
pub fn thumbnail(image: &RgbaImage) -> RgbaImage {
    fit_within(image, MAX_THUMBNAIL_DIMENSION)
}

/// Downscale to the longest edge allowed by `quality`.
pub fn fit_to_quality(image: &RgbaImage, quality: ImageQuality) -> RgbaImage {
    match quality.max_dimension() {
        Some(max) => fit_within(image, max),
        None => image.clone(),
    }
}

fn fit_within(image: &RgbaImage, max: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width <= max && height <= max {
        return image.clone();
    }
    let (new_width, new_height) = if width > height {
        (max, (max * height / width).max(1))
    } else {
        ((max * width / height).max(1), max)
    };
    imageops::thumbnail(image, new_width, new_height)
}

fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry.context("failed to read directory entry")?;
        let metadata = entry.metadata().context("failed to read file metadata")?;
        if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn store() -> (tempfile::TempDir, ImageStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::open(&Paths::in_dir(dir.path())).unwrap();
        (dir, store)
    }

    #[test]
    fn write_creates_image_and_thumbnail() {
        let (_dir, store) = store();
        let image = RgbaImage::from_pixel(1200, 600, Rgba([200, 10, 10, 255]));

        let filename = store.write(&image, ImageQuality::Low).unwrap();
        let full = image::open(store.image_path(&filename)).unwrap();
        let thumb = image::open(store.thumbnail_path(&filename)).unwrap();
        assert_eq!((full.width(), full.height()), (512, 256));
        assert_eq!((thumb.width(), thumb.height()), (300, 150));
        assert!(store.storage_bytes().unwrap() > 0);
    }

    #[test]
    fn very_high_quality_keeps_size() {
        let image = RgbaImage::new(3000, 10);
        assert_eq!(fit_to_quality(&image, ImageQuality::VeryHigh).dimensions(), (3000, 10));
        assert_eq!(fit_to_quality(&image, ImageQuality::High).dimensions(), (2048, 6));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let image = RgbaImage::new(40, 80);
        assert_eq!(thumbnail(&image).dimensions(), (40, 80));
    }

    #[test]
    fn remove_tolerates_missing_files() {
        let (_dir, store) = store();
        let filename = store.write(&RgbaImage::new(4, 4), ImageQuality::Standard).unwrap();
        store.remove(&[filename.clone(), "missing.png".to_string()]);
        assert!(!store.image_path(&filename).exists());
        assert!(!store.thumbnail_path(&filename).exists());
    }

    #[test]
    fn resolve_keeps_images_and_thumbnails_aligned() {
        let (_dir, store) = store();
        let article = ArticleImages {
            article_id: 3,
            images: vec![crate::models::ArticleImage {
                id: 9,
                article_id: 3,
                filename: "x.png".into(),
            }],
        };
        let resolved = store.resolve(article);
        assert_eq!(resolved.image_ids, vec![9]);
        assert_eq!(resolved.images.first(), Some(store.image_path("x.png")));
        assert_eq!(resolved.thumbnails.first(), Some(store.thumbnail_path("x.png")));
    }
}
