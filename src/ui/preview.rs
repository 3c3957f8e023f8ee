//! Terminal rendering of article images.
//!
//! Each character cell shows two vertically stacked pixels using the upper
//! half block: the foreground paints the top pixel, the background the
//! bottom one. Transparent pixels fall through to the terminal background.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tracing::debug;

use crate::state::Review;
use crate::storage::thumbnail;

const UPPER_HALF: &str = "\u{2580}";
const LOWER_HALF: &str = "\u{2584}";
const OPAQUE_CUTOFF: u8 = 128;
const MAX_CACHED_IMAGES: usize = 256;

/// Scale `image` to fit `width` x `height` cells and convert it to styled
/// lines, centered horizontally.
pub(crate) fn image_lines(image: &RgbaImage, width: u16, height: u16) -> Vec<Line<'static>> {
    let (cols, rows) = (u32::from(width), u32::from(height) * 2);
    let (src_w, src_h) = image.dimensions();
    if cols == 0 || rows == 0 || src_w == 0 || src_h == 0 {
        return Vec::new();
    }

    let scale = (cols as f32 / src_w as f32).min(rows as f32 / src_h as f32);
    let fit_w = ((src_w as f32 * scale).round() as u32).clamp(1, cols);
    let fit_h = ((src_h as f32 * scale).round() as u32).clamp(1, rows);
    let scaled = if (fit_w, fit_h) == (src_w, src_h) {
        image.clone()
    } else {
        imageops::resize(image, fit_w, fit_h, FilterType::Triangle)
    };

    let pad = " ".repeat(((cols - fit_w) / 2) as usize);
    let mut lines = Vec::with_capacity(fit_h.div_ceil(2) as usize);
    for y in (0..fit_h).step_by(2) {
        let mut spans = Vec::with_capacity(fit_w as usize + 1);
        if !pad.is_empty() {
            spans.push(Span::raw(pad.clone()));
        }
        for x in 0..fit_w {
            let top = scaled.get_pixel(x, y);
            let bottom = (y + 1 < fit_h).then(|| scaled.get_pixel(x, y + 1));
            spans.push(cell(top, bottom));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn cell(top: &Rgba<u8>, bottom: Option<&Rgba<u8>>) -> Span<'static> {
    let top = opaque(top);
    let bottom = bottom.and_then(opaque);
    match (top, bottom) {
        (Some(top), Some(bottom)) => {
            Span::styled(UPPER_HALF, Style::default().fg(top).bg(bottom))
        }
        (Some(top), None) => Span::styled(UPPER_HALF, Style::default().fg(top)),
        (None, Some(bottom)) => Span::styled(LOWER_HALF, Style::default().fg(bottom)),
        (None, None) => Span::raw(" "),
    }
}

fn opaque(pixel: &Rgba<u8>) -> Option<Color> {
    let [r, g, b, a] = pixel.0;
    (a >= OPAQUE_CUTOFF).then_some(Color::Rgb(r, g, b))
}

/// Decoded, downscaled images keyed by path. Filenames in the store are never
/// reused, so entries only go stale for inbox photos, which are dropped on
/// rescan with [`ImageCache::clear`].
#[derive(Debug, Default)]
pub(crate) struct ImageCache {
    entries: RefCell<HashMap<PathBuf, Option<Rc<RgbaImage>>>>,
}

impl ImageCache {
    /// The image at `path`, or `None` when it cannot be decoded. Failures are
    /// cached too so a broken file is not re-read every frame.
    pub(crate) fn get(&self, path: &Path) -> Option<Rc<RgbaImage>> {
        if let Some(entry) = self.entries.borrow().get(path) {
            return entry.clone();
        }

        let loaded = match image::open(path) {
            Ok(decoded) => Some(Rc::new(thumbnail(&decoded.to_rgba8()))),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "cannot preview image");
                None
            }
        };

        let mut entries = self.entries.borrow_mut();
        if entries.len() >= MAX_CACHED_IMAGES {
            entries.clear();
        }
        entries.insert(path.to_path_buf(), loaded.clone());
        loaded
    }

    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PreviewKey {
    source: PathBuf,
    subject: usize,
    rotation: u16,
    threshold: u32,
}

impl PreviewKey {
    fn of(review: &Review) -> Self {
        Self {
            source: review.segmented.source.clone(),
            subject: review.subject,
            rotation: review.rotation.degrees(),
            threshold: (review.threshold * 1000.0).round() as u32,
        }
    }
}

/// The last extracted subject preview. Extraction walks the full source
/// image, so it only reruns when the review changes.
#[derive(Debug, Default)]
pub(crate) struct PreviewCache {
    entry: RefCell<Option<(PreviewKey, Rc<RgbaImage>)>>,
}

impl PreviewCache {
    pub(crate) fn get(&self, review: &Review) -> Option<Rc<RgbaImage>> {
        let key = PreviewKey::of(review);
        if let Some((cached, image)) = self.entry.borrow().as_ref() {
            if *cached == key {
                return Some(Rc::clone(image));
            }
        }
        let image = Rc::new(thumbnail(&review.preview()?));
        *self.entry.borrow_mut() = Some((key, Rc::clone(&image)));
        Some(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_pixel_rows_share_a_line() {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        for x in 0..4 {
            image.put_pixel(x, 1, Rgba([0, 0, 255, 255]));
        }
        let lines = image_lines(&image, 4, 2);
        assert_eq!(lines.len(), 2);
        let first = &lines[0].spans[0];
        assert_eq!(first.content, UPPER_HALF);
        assert_eq!(first.style.fg, Some(Color::Rgb(255, 0, 0)));
        assert_eq!(first.style.bg, Some(Color::Rgb(0, 0, 255)));
    }

    #[test]
    fn transparent_pixels_render_blank() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let lines = image_lines(&image, 2, 1);
        assert!(lines[0].spans.iter().all(|span| span.content == " "));
    }

    #[test]
    fn narrow_image_is_centered() {
        let image = RgbaImage::from_pixel(2, 8, Rgba([10, 10, 10, 255]));
        let lines = image_lines(&image, 10, 4);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].spans[0].content, " ".repeat(4));
    }

    #[test]
    fn broken_files_are_cached_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let cache = ImageCache::default();
        assert!(cache.get(&path).is_none());
        assert_eq!(cache.entries.borrow().len(), 1);
    }
}
