use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::catalog::Catalog;
use crate::config::{clamp_threshold, ImageQuality, Settings, MAX_GRID_COLUMNS};

use super::{step, Notice, Reaction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SettingsDialog {
    #[default]
    None,
    /// Raising quality costs storage; holds the quality awaiting confirmation.
    ImageQualityAlert(ImageQuality),
    ConfirmDeleteAllData,
    About,
}

/// Rows on the settings screen, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ImageQuality,
    SegmentationThreshold,
    Theme,
    GridColumns,
    DeleteAllData,
    About,
}

impl SettingsField {
    pub const ALL: [SettingsField; 6] = [
        SettingsField::ImageQuality,
        SettingsField::SegmentationThreshold,
        SettingsField::Theme,
        SettingsField::GridColumns,
        SettingsField::DeleteAllData,
        SettingsField::About,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsField::ImageQuality => "Image quality",
            SettingsField::SegmentationThreshold => "Default mask threshold",
            SettingsField::Theme => "Theme",
            SettingsField::GridColumns => "Grid columns",
            SettingsField::DeleteAllData => "Delete all data",
            SettingsField::About => "About",
        }
    }
}

#[derive(Debug)]
pub struct SettingsState {
    settings: Settings,
    config_file: PathBuf,
    pub dialog: SettingsDialog,
    cursor: usize,
}

impl SettingsState {
    pub fn new(settings: Settings, config_file: PathBuf) -> Self {
        Self {
            settings,
            config_file,
            dialog: SettingsDialog::None,
            cursor: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_field(&self) -> SettingsField {
        SettingsField::ALL[self.cursor.min(SettingsField::ALL.len() - 1)]
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = step(self.cursor, SettingsField::ALL.len(), delta);
    }

    /// Choose a quality. Only a strictly higher quality asks for
    /// confirmation first.
    pub fn select_quality(&mut self, quality: ImageQuality) -> Result<Reaction> {
        if quality > self.settings.image_quality {
            self.dialog = SettingsDialog::ImageQualityAlert(quality);
            return Ok(Reaction::none());
        }
        self.apply_quality(quality)
    }

    pub fn confirm_quality_alert(&mut self) -> Result<Reaction> {
        let SettingsDialog::ImageQualityAlert(quality) = self.dialog else {
            return Ok(Reaction::none());
        };
        self.dialog = SettingsDialog::None;
        self.apply_quality(quality)
    }

    fn apply_quality(&mut self, quality: ImageQuality) -> Result<Reaction> {
        if quality == self.settings.image_quality {
            return Ok(Reaction::none());
        }
        self.settings.image_quality = quality;
        self.persist()?;
        Ok(Reaction::notice(Notice::info(format!(
            "New images are saved at {} quality.",
            quality.label().to_lowercase()
        ))))
    }

    /// Left/right on the row under the cursor.
    pub fn adjust(&mut self, delta: i8) -> Result<Reaction> {
        match self.current_field() {
            SettingsField::ImageQuality => {
                let current = self.settings.image_quality;
                let next = if delta > 0 { current.higher() } else { current.lower() };
                match next {
                    Some(quality) => self.select_quality(quality),
                    None => Ok(Reaction::none()),
                }
            }
            SettingsField::SegmentationThreshold => {
                let value = self.settings.segmentation_threshold + 0.1 * f32::from(delta);
                self.settings.segmentation_threshold = clamp_threshold(value);
                self.persist()?;
                Ok(Reaction::none())
            }
            SettingsField::Theme => {
                self.settings.theme = self.settings.theme.toggled();
                self.persist()?;
                Ok(Reaction::none())
            }
            SettingsField::GridColumns => {
                let columns = i32::from(self.settings.grid_columns) + i32::from(delta);
                self.settings.grid_columns = columns.clamp(1, i32::from(MAX_GRID_COLUMNS)) as u16;
                self.persist()?;
                Ok(Reaction::none())
            }
            SettingsField::DeleteAllData | SettingsField::About => Ok(Reaction::none()),
        }
    }

    /// Enter on the row under the cursor.
    pub fn activate(&mut self) -> Result<Reaction> {
        match self.current_field() {
            SettingsField::DeleteAllData => {
                self.dialog = SettingsDialog::ConfirmDeleteAllData;
                Ok(Reaction::none())
            }
            SettingsField::About => {
                self.dialog = SettingsDialog::About;
                Ok(Reaction::none())
            }
            _ => self.adjust(1),
        }
    }

    pub fn confirm_delete_all(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        self.dialog = SettingsDialog::None;
        catalog.delete_all_data()?;
        Ok(Reaction::notice(Notice::info("All articles and ensembles were deleted.")))
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = SettingsDialog::None;
    }

    fn persist(&self) -> Result<()> {
        self.settings.save(&self.config_file)?;
        info!(file = %self.config_file.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;

    fn state_at(quality: ImageQuality) -> (tempfile::TempDir, SettingsState) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            image_quality: quality,
            ..Settings::default()
        };
        let state = SettingsState::new(settings, dir.path().join("settings.toml"));
        (dir, state)
    }

    #[test]
    fn dialog_defaults_to_none() {
        let (_dir, state) = state_at(ImageQuality::Standard);
        assert_eq!(state.dialog, SettingsDialog::None);
    }

    #[test]
    fn lower_or_equal_quality_applies_without_alert() {
        let (_dir, mut state) = state_at(ImageQuality::Standard);
        state.select_quality(ImageQuality::Standard).unwrap();
        assert_eq!(state.dialog, SettingsDialog::None);

        state.select_quality(ImageQuality::Low).unwrap();
        assert_eq!(state.dialog, SettingsDialog::None);
        assert_eq!(state.settings().image_quality, ImageQuality::Low);
    }

    #[test]
    fn higher_quality_waits_for_confirmation() {
        let (dir, mut state) = state_at(ImageQuality::Standard);
        state.select_quality(ImageQuality::VeryHigh).unwrap();
        assert_eq!(
            state.dialog,
            SettingsDialog::ImageQualityAlert(ImageQuality::VeryHigh)
        );
        assert_eq!(state.settings().image_quality, ImageQuality::Standard);

        state.confirm_quality_alert().unwrap();
        assert_eq!(state.dialog, SettingsDialog::None);
        assert_eq!(state.settings().image_quality, ImageQuality::VeryHigh);

        let saved = Settings::load(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(saved.image_quality, ImageQuality::VeryHigh);
    }

    #[test]
    fn adjusting_rows_persists_values() {
        let (dir, mut state) = state_at(ImageQuality::Standard);
        state.move_cursor(1);
        state.adjust(1).unwrap();
        state.move_cursor(1);
        state.activate().unwrap();
        state.move_cursor(1);
        for _ in 0..20 {
            state.adjust(1).unwrap();
        }

        let saved = Settings::load(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(saved.segmentation_threshold, 0.6);
        assert_eq!(saved.theme, Theme::Light);
        assert_eq!(saved.grid_columns, MAX_GRID_COLUMNS);
    }

    #[test]
    fn about_and_delete_rows_open_dialogs() {
        let (_dir, mut state) = state_at(ImageQuality::Standard);
        state.move_cursor(4);
        state.activate().unwrap();
        assert_eq!(state.dialog, SettingsDialog::ConfirmDeleteAllData);
        state.dismiss_dialog();
        state.move_cursor(1);
        state.activate().unwrap();
        assert_eq!(state.dialog, SettingsDialog::About);
    }
}
