use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::catalog::Catalog;
use crate::models::{ArticleWithImages, Ensemble};

use super::{count_label, step, ChecklistState, EditState, Feed, Notice, Reaction, Route};

#[derive(Debug, Clone, Default)]
pub enum ArticleDetailDialog {
    #[default]
    None,
    ConfirmDelete,
    ConfirmRemoveImages,
    AddToEnsembles(ChecklistState<Ensemble>),
}

/// One article with its images and the ensembles it belongs to.
#[derive(Debug, Clone)]
pub struct ArticleDetail {
    pub article: ArticleWithImages,
    pub ensembles: Vec<Ensemble>,
}

/// Pages through an article's images. Edit mode selects image positions.
#[derive(Debug)]
pub struct ArticleDetailState {
    article_id: i64,
    feed: Feed<Option<ArticleDetail>>,
    pub edit: EditState<usize>,
    pub dialog: ArticleDetailDialog,
    page: usize,
    ensemble_cursor: usize,
}

impl ArticleDetailState {
    pub fn new(article_id: i64) -> Self {
        Self {
            article_id,
            feed: Feed::new(),
            edit: EditState::new(),
            dialog: ArticleDetailDialog::None,
            page: 0,
            ensemble_cursor: 0,
        }
    }

    pub fn article_id(&self) -> i64 {
        self.article_id
    }

    /// Reload when the catalog changed. Navigates back once the article is
    /// gone.
    pub fn refresh(&mut self, catalog: &Catalog) -> Result<Reaction> {
        let article_id = self.article_id;
        let reloaded = self.feed.refresh(catalog.generation(), || {
            let Some(article) = catalog.article(article_id)? else {
                return Ok(None);
            };
            let ensembles = catalog.ensembles_for_article(article_id)?;
            Ok(Some(ArticleDetail { article, ensembles }))
        })?;
        if !reloaded {
            return Ok(Reaction::none());
        }

        let Some((image_count, ensemble_count)) = self
            .detail()
            .map(|d| (d.article.image_count(), d.ensembles.len()))
        else {
            self.dialog = ArticleDetailDialog::None;
            self.edit.disable();
            return Ok(Reaction::back()
                .with_notice(Notice::error(format!("Article {article_id} no longer exists."))));
        };
        self.page = step(self.page, image_count, 0);
        self.ensemble_cursor = step(self.ensemble_cursor, ensemble_count, 0);
        self.edit.retain(|index| *index < image_count);
        Ok(Reaction::none())
    }

    pub fn detail(&self) -> Option<&ArticleDetail> {
        self.feed.get().and_then(Option::as_ref)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn image_count(&self) -> usize {
        self.detail().map_or(0, |d| d.article.image_count())
    }

    pub fn next_image(&mut self) {
        self.page = step(self.page, self.image_count(), 1);
    }

    pub fn previous_image(&mut self) {
        self.page = step(self.page, self.image_count(), -1);
    }

    pub fn ensemble_cursor(&self) -> usize {
        self.ensemble_cursor
    }

    pub fn move_ensemble_cursor(&mut self, delta: isize) {
        let len = self.detail().map_or(0, |d| d.ensembles.len());
        self.ensemble_cursor = step(self.ensemble_cursor, len, delta);
    }

    /// Full-size path of the image on the current page.
    pub fn current_image_path(&self) -> Option<PathBuf> {
        self.detail()?.article.images.get(self.page)
    }

    pub fn long_press_current_image(&mut self) {
        if self.page < self.image_count() {
            self.edit.long_press(self.page);
        }
    }

    pub fn tap_current_image(&mut self) {
        if self.page < self.image_count() {
            self.edit.tap(self.page);
        }
    }

    pub fn select_all_images(&mut self) {
        self.edit.select_all(0..self.image_count());
    }

    pub fn add_images(&self) -> Reaction {
        Reaction::navigate(Route::Camera {
            target_article: Some(self.article_id),
        })
    }

    pub fn request_remove_images(&mut self) -> Reaction {
        if !self.edit.has_selection() {
            return Reaction::notice(Notice::error("Select images to remove first."));
        }
        self.dialog = ArticleDetailDialog::ConfirmRemoveImages;
        Reaction::none()
    }

    /// Remove the selected images. Selecting every image deletes the article.
    pub fn confirm_remove_images(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        self.dialog = ArticleDetailDialog::None;
        let Some(detail) = self.detail() else {
            return Ok(Reaction::none());
        };
        let image_ids: Vec<i64> = self
            .edit
            .selected()
            .into_iter()
            .filter_map(|index| detail.article.image_ids.get(index).copied())
            .collect();
        let removal = catalog.delete_article_images(self.article_id, &image_ids)?;
        self.edit.disable();
        if removal.article_deleted {
            info!(article_id = self.article_id, "last images removed, article deleted");
            return Ok(Reaction::back().with_notice(Notice::info("Article deleted.")));
        }
        Ok(Reaction::notice(Notice::info(format!(
            "Removed {}.",
            count_label(removal.filenames.len(), "image", "images")
        ))))
    }

    pub fn request_delete(&mut self) {
        self.dialog = ArticleDetailDialog::ConfirmDelete;
    }

    pub fn confirm_delete(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        self.dialog = ArticleDetailDialog::None;
        catalog.delete_articles(&[self.article_id])?;
        Ok(Reaction::back().with_notice(Notice::info("Article deleted.")))
    }

    pub fn open_add_to_ensembles(&mut self, catalog: &Catalog) -> Result<Reaction> {
        let ensembles = catalog.ensembles_without_article(self.article_id)?;
        if ensembles.is_empty() {
            return Ok(Reaction::notice(Notice::error(
                "No other ensembles to add this article to.",
            )));
        }
        self.dialog = ArticleDetailDialog::AddToEnsembles(ChecklistState::new(ensembles));
        Ok(Reaction::none())
    }

    pub fn confirm_add_to_ensembles(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        let ArticleDetailDialog::AddToEnsembles(list) = &self.dialog else {
            return Ok(Reaction::none());
        };
        let ensemble_ids: Vec<i64> = list.checked().into_iter().map(|e| e.id).collect();
        if ensemble_ids.is_empty() {
            return Ok(Reaction::notice(Notice::error("Choose at least one ensemble.")));
        }
        let linked = catalog.add_article_to_ensembles(self.article_id, &ensemble_ids)?;
        self.dialog = ArticleDetailDialog::None;
        Ok(Reaction::notice(Notice::info(format!(
            "Added to {}.",
            count_label(linked, "ensemble", "ensembles")
        ))))
    }

    /// Unlink the article from the ensemble under the ensemble cursor.
    pub fn remove_from_current_ensemble(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        let Some(ensemble) = self
            .detail()
            .and_then(|d| d.ensembles.get(self.ensemble_cursor))
            .cloned()
        else {
            return Ok(Reaction::none());
        };
        catalog.remove_articles_from_ensemble(ensemble.id, &[self.article_id])?;
        Ok(Reaction::notice(Notice::info(format!(
            "Removed from \"{}\".",
            ensemble.title
        ))))
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = ArticleDetailDialog::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{catalog, swatch};
    use crate::config::ImageQuality;
    use crate::state::{EditMode, Navigation};

    fn article_with_images(catalog: &mut Catalog, images: usize) -> i64 {
        let id = catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        for _ in 1..images {
            catalog
                .add_article_image(id, &swatch(), ImageQuality::Low)
                .unwrap();
        }
        id
    }

    #[test]
    fn dialog_defaults_to_none() {
        assert!(matches!(
            ArticleDetailState::new(1).dialog,
            ArticleDetailDialog::None
        ));
    }

    #[test]
    fn deselecting_last_image_returns_to_general() {
        let (_dir, mut catalog) = catalog();
        let id = article_with_images(&mut catalog, 2);
        let mut state = ArticleDetailState::new(id);
        state.refresh(&catalog).unwrap();

        state.long_press_current_image();
        state.tap_current_image();
        assert_eq!(state.edit.mode(), EditMode::EnabledGeneral);
    }

    #[test]
    fn removing_some_images_keeps_article() {
        let (_dir, mut catalog) = catalog();
        let id = article_with_images(&mut catalog, 3);
        let mut state = ArticleDetailState::new(id);
        state.refresh(&catalog).unwrap();

        state.next_image();
        state.long_press_current_image();
        state.request_remove_images();
        let reaction = state.confirm_remove_images(&mut catalog).unwrap();
        assert!(reaction.navigation.is_none());

        state.refresh(&catalog).unwrap();
        assert_eq!(state.image_count(), 2);
        assert_eq!(state.edit.mode(), EditMode::Disabled);
    }

    #[test]
    fn removing_all_images_deletes_article() {
        let (_dir, mut catalog) = catalog();
        let id = article_with_images(&mut catalog, 2);
        let mut state = ArticleDetailState::new(id);
        state.refresh(&catalog).unwrap();

        state.select_all_images();
        state.request_remove_images();
        assert!(matches!(state.dialog, ArticleDetailDialog::ConfirmRemoveImages));
        let reaction = state.confirm_remove_images(&mut catalog).unwrap();
        assert_eq!(reaction.navigation, Some(Navigation::Back));
        assert!(catalog.article(id).unwrap().is_none());
    }

    #[test]
    fn vanished_article_navigates_back() {
        let (_dir, mut catalog) = catalog();
        let id = article_with_images(&mut catalog, 1);
        let mut state = ArticleDetailState::new(id);
        state.refresh(&catalog).unwrap();

        catalog.delete_articles(&[id]).unwrap();
        let reaction = state.refresh(&catalog).unwrap();
        assert_eq!(reaction.navigation, Some(Navigation::Back));
        assert!(reaction.notice.is_some());
    }

    #[test]
    fn ensemble_membership_round_trip() {
        let (_dir, mut catalog) = catalog();
        let id = article_with_images(&mut catalog, 1);
        catalog.create_ensemble("Gym", &[]).unwrap();
        let mut state = ArticleDetailState::new(id);
        state.refresh(&catalog).unwrap();

        state.open_add_to_ensembles(&catalog).unwrap();
        if let ArticleDetailDialog::AddToEnsembles(list) = &mut state.dialog {
            list.toggle();
        }
        state.confirm_add_to_ensembles(&mut catalog).unwrap();
        state.refresh(&catalog).unwrap();
        assert_eq!(state.detail().unwrap().ensembles.len(), 1);

        let reaction = state.open_add_to_ensembles(&catalog).unwrap();
        assert!(reaction.notice.is_some());

        state.remove_from_current_ensemble(&mut catalog).unwrap();
        state.refresh(&catalog).unwrap();
        assert!(state.detail().unwrap().ensembles.is_empty());
    }
}
