//! User settings and on-disk locations.
//!
//! Settings live in a small TOML file under the platform config directory and
//! are rewritten whenever the settings screen changes a value. Every field has
//! a default so older or hand-edited files keep loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "Merlinsbag";
const APPLICATION: &str = "merlinsbag";

const SETTINGS_FILE_NAME: &str = "settings.toml";
const DB_FILE_NAME: &str = "merlinsbag.sqlite";
const LOG_FILE_NAME: &str = "merlinsbag.log";
const IMAGES_DIR_NAME: &str = "images";
const THUMBNAILS_DIR_NAME: &str = "thumbnails";
const INBOX_DIR_NAME: &str = "inbox";

pub const DEFAULT_SEGMENTATION_THRESHOLD: f32 = 0.5;
pub const MIN_SEGMENTATION_THRESHOLD: f32 = 0.1;
pub const MAX_SEGMENTATION_THRESHOLD: f32 = 0.9;
pub const DEFAULT_GRID_COLUMNS: u16 = 4;
pub const MAX_GRID_COLUMNS: u16 = 8;

/// How much detail saved article images keep. Variants are declared from
/// lowest to highest so the derived ordering answers "is this higher?".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageQuality {
    VeryLow,
    Low,
    #[default]
    Standard,
    High,
    VeryHigh,
}

impl ImageQuality {
    pub const ALL: [ImageQuality; 5] = [
        ImageQuality::VeryLow,
        ImageQuality::Low,
        ImageQuality::Standard,
        ImageQuality::High,
        ImageQuality::VeryHigh,
    ];

    /// Longest edge of a stored image. `None` keeps the extracted size.
    pub fn max_dimension(self) -> Option<u32> {
        match self {
            ImageQuality::VeryLow => Some(256),
            ImageQuality::Low => Some(512),
            ImageQuality::Standard => Some(1024),
            ImageQuality::High => Some(2048),
            ImageQuality::VeryHigh => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageQuality::VeryLow => "Very low",
            ImageQuality::Low => "Low",
            ImageQuality::Standard => "Standard",
            ImageQuality::High => "High",
            ImageQuality::VeryHigh => "Very high",
        }
    }

    pub fn higher(self) -> Option<ImageQuality> {
        let index = Self::ALL.iter().position(|q| *q == self)?;
        Self::ALL.get(index + 1).copied()
    }

    pub fn lower(self) -> Option<ImageQuality> {
        let index = Self::ALL.iter().position(|q| *q == self)?;
        index.checked_sub(1).map(|i| Self::ALL[i])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Dark => "Dark",
            Theme::Light => "Light",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub image_quality: ImageQuality,
    /// Mask confidence a pixel needs to survive extraction, `0.0..=1.0`.
    pub segmentation_threshold: f32,
    pub theme: Theme,
    pub grid_columns: u16,
    /// Folder scanned by the capture screen. Defaults to `<data>/inbox`.
    pub capture_inbox: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_quality: ImageQuality::default(),
            segmentation_threshold: DEFAULT_SEGMENTATION_THRESHOLD,
            theme: Theme::default(),
            grid_columns: DEFAULT_GRID_COLUMNS,
            capture_inbox: None,
        }
    }
}

impl Settings {
    /// Read settings from `path`, falling back to defaults when the file does
    /// not exist yet.
    pub fn load(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings in {}", path.display()))?;
        Ok(settings.sanitized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write settings to {}", path.display()))
    }

    /// Clamp values a hand-edited file could push out of range.
    pub fn sanitized(mut self) -> Settings {
        self.segmentation_threshold = clamp_threshold(self.segmentation_threshold);
        self.grid_columns = self.grid_columns.clamp(1, MAX_GRID_COLUMNS);
        self
    }

    pub fn inbox_dir(&self, paths: &Paths) -> PathBuf {
        self.capture_inbox
            .clone()
            .unwrap_or_else(|| paths.data_dir.join(INBOX_DIR_NAME))
    }
}

pub fn clamp_threshold(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_SEGMENTATION_THRESHOLD;
    }
    let clamped = value.clamp(MIN_SEGMENTATION_THRESHOLD, MAX_SEGMENTATION_THRESHOLD);
    // Keep one decimal so repeated 0.1 steps do not drift.
    (clamped * 10.0).round() / 10.0
}

/// Resolved locations of everything the application writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
}

impl Paths {
    /// Resolve platform directories, honoring explicit overrides from the
    /// command line.
    pub fn resolve(data_dir: Option<PathBuf>, config_file: Option<PathBuf>) -> Result<Paths> {
        let project = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION);
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => project
                .as_ref()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| anyhow!("could not locate a data directory"))?,
        };
        let config_file = match config_file {
            Some(file) => file,
            None => project
                .as_ref()
                .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
                .ok_or_else(|| anyhow!("could not locate a config directory"))?,
        };
        Ok(Paths {
            data_dir,
            config_file,
        })
    }

    /// Keep everything, settings included, beneath one directory.
    pub fn in_dir(dir: &Path) -> Paths {
        Paths {
            data_dir: dir.to_path_buf(),
            config_file: dir.join(SETTINGS_FILE_NAME),
        }
    }

    pub fn database_file(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_DIR_NAME)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_dir.join(THUMBNAILS_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_order_runs_low_to_high() {
        assert!(ImageQuality::VeryHigh > ImageQuality::High);
        assert!(ImageQuality::Low < ImageQuality::Standard);
        assert_eq!(ImageQuality::Standard.higher(), Some(ImageQuality::High));
        assert_eq!(ImageQuality::VeryLow.lower(), None);
        assert_eq!(ImageQuality::VeryHigh.higher(), None);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings {
            image_quality: ImageQuality::High,
            segmentation_threshold: 0.7,
            theme: Theme::Light,
            grid_columns: 3,
            capture_inbox: Some(dir.path().join("photos")),
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "image_quality = \"low\"\nsegmentation_threshold = 4.0\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.image_quality, ImageQuality::Low);
        assert_eq!(settings.segmentation_threshold, MAX_SEGMENTATION_THRESHOLD);
        assert_eq!(settings.grid_columns, DEFAULT_GRID_COLUMNS);
    }

    #[test]
    fn threshold_steps_stay_on_tenths() {
        let mut value = DEFAULT_SEGMENTATION_THRESHOLD;
        for _ in 0..3 {
            value = clamp_threshold(value + 0.1);
        }
        assert_eq!(value, 0.8);
        assert_eq!(clamp_threshold(0.0), MIN_SEGMENTATION_THRESHOLD);
    }
}
