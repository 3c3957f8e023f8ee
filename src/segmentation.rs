//! Subject detection for the add-article flow.
//!
//! A segmenter turns a photo into a list of subjects, each with a bounding box
//! and a per-pixel confidence mask. Extraction then crops a subject, drops the
//! pixels below the chosen threshold and applies the user's rotation.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use image::{imageops, GrayImage, ImageError, Luma, Rgba, RgbaImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use crate::config::MIN_SEGMENTATION_THRESHOLD;
use crate::error::SegmentationError;

/// Detects the subjects in a source image.
pub trait SubjectSegmenter: Send {
    fn segment(&self, path: &Path) -> Result<SegmentedImage, SegmentationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One detected subject. `mask` covers `bounds` only and stores confidence
/// scaled to `0..=255`; pixels outside the subject's region are zero.
#[derive(Debug, Clone)]
pub struct Subject {
    pub bounds: Bounds,
    pub mask: GrayImage,
}

#[derive(Debug, Clone)]
pub struct SegmentedImage {
    pub source: PathBuf,
    pub image: RgbaImage,
    pub subjects: Vec<Subject>,
}

impl SegmentedImage {
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Crop subject `index`, clear every pixel whose confidence is below
    /// `threshold` and rotate the result.
    pub fn extract(&self, index: usize, threshold: f32, rotation: Rotation) -> Option<RgbaImage> {
        let subject = self.subjects.get(index)?;
        let Bounds {
            x,
            y,
            width,
            height,
        } = subject.bounds;
        let cutoff = (threshold.clamp(0.0, 1.0) * 255.0).round() as u8;

        let cropped = RgbaImage::from_fn(width, height, |dx, dy| {
            let Luma([confidence]) = *subject.mask.get_pixel(dx, dy);
            if confidence == 0 || confidence < cutoff {
                Rgba([0, 0, 0, 0])
            } else {
                *self.image.get_pixel(x + dx, y + dy)
            }
        });
        Some(rotation.apply(&trim_transparent(cropped)))
    }
}

/// Shrink `image` to the box around its visible pixels. A fully transparent
/// image is returned unchanged.
fn trim_transparent(image: RgbaImage) -> RgbaImage {
    let mut visible: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        visible = Some(match visible {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }
    match visible {
        Some((min_x, min_y, max_x, max_y))
            if (max_x - min_x + 1, max_y - min_y + 1) != image.dimensions() =>
        {
            imageops::crop_imm(&image, min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
                .to_image()
        }
        _ => image,
    }
}

/// Quarter-turn rotation applied to an extracted subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarters,
}

impl Rotation {
    pub fn clockwise(self) -> Rotation {
        match self {
            Rotation::None => Rotation::Quarter,
            Rotation::Quarter => Rotation::Half,
            Rotation::Half => Rotation::ThreeQuarters,
            Rotation::ThreeQuarters => Rotation::None,
        }
    }

    pub fn counter_clockwise(self) -> Rotation {
        match self {
            Rotation::None => Rotation::ThreeQuarters,
            Rotation::Quarter => Rotation::None,
            Rotation::Half => Rotation::Quarter,
            Rotation::ThreeQuarters => Rotation::Half,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarters => 270,
        }
    }

    pub fn apply(self, image: &RgbaImage) -> RgbaImage {
        match self {
            Rotation::None => image.clone(),
            Rotation::Quarter => imageops::rotate90(image),
            Rotation::Half => imageops::rotate180(image),
            Rotation::ThreeQuarters => imageops::rotate270(image),
        }
    }
}

/// Decode a source image, telling a missing file apart from one that is not
/// an image.
pub fn load_image(path: &Path) -> Result<RgbaImage, SegmentationError> {
    if !path.is_file() {
        return Err(SegmentationError::NotFound(path.to_path_buf()));
    }
    match image::open(path) {
        Ok(decoded) => Ok(decoded.to_rgba8()),
        Err(ImageError::IoError(err)) if err.kind() == io::ErrorKind::NotFound => {
            Err(SegmentationError::NotFound(path.to_path_buf()))
        }
        Err(_) => Err(SegmentationError::NotRecognized(path.to_path_buf())),
    }
}

/// Separates subjects from a roughly uniform background.
///
/// The background colour is the mean of the border pixels. Each pixel's
/// confidence grows with its colour distance from that background (scaled by
/// alpha). Pixels at or above `halo_cutoff` are grouped into 8-connected
/// regions so that a broadened threshold can still reach soft edges. A region
/// counts as a subject only when its pixels above `foreground_cutoff` cover at
/// least `min_area_fraction` of the image.
#[derive(Debug, Clone)]
pub struct ThresholdSegmenter {
    pub foreground_cutoff: f32,
    pub halo_cutoff: f32,
    pub min_area_fraction: f32,
}

impl Default for ThresholdSegmenter {
    fn default() -> Self {
        Self {
            foreground_cutoff: 0.25,
            halo_cutoff: MIN_SEGMENTATION_THRESHOLD,
            min_area_fraction: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Region {
    label: u32,
    core_area: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl ThresholdSegmenter {
    pub fn segment_image(&self, source: PathBuf, image: RgbaImage) -> SegmentedImage {
        let confidence = confidence_map(&image);
        let core_cutoff = (self.foreground_cutoff * 255.0).round() as u8;
        let halo_cutoff = ((self.halo_cutoff * 255.0).round() as u8).max(1);
        let binary = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if confidence.get_pixel(x, y)[0] >= halo_cutoff {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        let mut regions: HashMap<u32, Region> = HashMap::new();
        for (x, y, Luma([label])) in labels.enumerate_pixels() {
            if *label == 0 {
                continue;
            }
            let core = u64::from(confidence.get_pixel(x, y)[0] > core_cutoff);
            regions
                .entry(*label)
                .and_modify(|region| {
                    region.core_area += core;
                    region.min_x = region.min_x.min(x);
                    region.min_y = region.min_y.min(y);
                    region.max_x = region.max_x.max(x);
                    region.max_y = region.max_y.max(y);
                })
                .or_insert(Region {
                    label: *label,
                    core_area: core,
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                });
        }

        let total = u64::from(image.width()) * u64::from(image.height());
        let min_area = ((total as f64 * f64::from(self.min_area_fraction)).ceil() as u64).max(1);
        let mut kept: Vec<Region> = regions
            .into_values()
            .filter(|region| region.core_area >= min_area)
            .collect();
        kept.sort_by(|a, b| {
            b.core_area
                .cmp(&a.core_area)
                .then(a.label.cmp(&b.label))
        });

        let subjects = kept
            .into_iter()
            .map(|region| {
                let bounds = Bounds {
                    x: region.min_x,
                    y: region.min_y,
                    width: region.max_x - region.min_x + 1,
                    height: region.max_y - region.min_y + 1,
                };
                let mask = GrayImage::from_fn(bounds.width, bounds.height, |dx, dy| {
                    let (x, y) = (bounds.x + dx, bounds.y + dy);
                    if labels.get_pixel(x, y)[0] == region.label {
                        *confidence.get_pixel(x, y)
                    } else {
                        Luma([0])
                    }
                });
                Subject { bounds, mask }
            })
            .collect::<Vec<_>>();

        debug!(source = %source.display(), subjects = subjects.len(), "segmented image");
        SegmentedImage {
            source,
            image,
            subjects,
        }
    }
}

impl SubjectSegmenter for ThresholdSegmenter {
    fn segment(&self, path: &Path) -> Result<SegmentedImage, SegmentationError> {
        let image = load_image(path)?;
        Ok(self.segment_image(path.to_path_buf(), image))
    }
}

fn confidence_map(image: &RgbaImage) -> GrayImage {
    let background = border_mean(image);
    let max_distance = 255.0 * 3f32.sqrt();
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        let distance = [r, g, b]
            .iter()
            .zip(background.iter())
            .map(|(channel, bg)| (f32::from(*channel) - bg).powi(2))
            .sum::<f32>()
            .sqrt();
        let score = (distance / max_distance * 3.0).min(1.0) * (f32::from(a) / 255.0);
        Luma([(score * 255.0).round() as u8])
    })
}

fn border_mean(image: &RgbaImage) -> [f32; 3] {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return [0.0; 3];
    }
    let mut sum = [0f64; 3];
    let mut count = 0u64;
    for (x, y, pixel) in image.enumerate_pixels() {
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            for (total, channel) in sum.iter_mut().zip(pixel.0.iter()) {
                *total += f64::from(*channel);
            }
            count += 1;
        }
    }
    sum.map(|total| (total / count as f64) as f32)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// White canvas with one solid red rectangle.
    pub(crate) fn canvas_with_rect(x: u32, y: u32, width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(100, 80, |px, py| {
            if px >= x && px < x + width && py >= y && py < y + height {
                Rgba([220, 20, 20, 255])
            } else {
                Rgba([250, 250, 250, 255])
            }
        })
    }

    /// Canned results for flow tests.
    pub(crate) struct FixedSegmenter(pub Result<SegmentedImage, SegmentationError>);

    impl SubjectSegmenter for FixedSegmenter {
        fn segment(&self, _path: &Path) -> Result<SegmentedImage, SegmentationError> {
            self.0.clone()
        }
    }
}
