use anyhow::Result;
use tracing::debug;

use crate::catalog::Catalog;
use crate::models::{ArticleWithImages, Ensemble};

use super::{count_label, step, ChecklistState, EditState, Feed, Notice, Reaction, Route};

#[derive(Debug, Clone, Default)]
pub enum ArticlesDialog {
    #[default]
    None,
    ConfirmDelete,
    AddToEnsembles(ChecklistState<Ensemble>),
}

/// The article grid, newest first.
#[derive(Debug, Default)]
pub struct ArticlesState {
    feed: Feed<Vec<ArticleWithImages>>,
    pub edit: EditState<i64>,
    pub dialog: ArticlesDialog,
    cursor: usize,
}

impl ArticlesState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, catalog: &Catalog) -> Result<()> {
        if self.feed.refresh(catalog.generation(), || catalog.articles())? {
            let articles = self.articles();
            let ids: Vec<i64> = articles.iter().map(|a| a.article_id).collect();
            self.cursor = step(self.cursor, ids.len(), 0);
            self.edit.retain(|id| ids.contains(id));
            debug!(count = ids.len(), "articles feed reloaded");
        }
        Ok(())
    }

    pub fn articles(&self) -> &[ArticleWithImages] {
        self.feed.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&ArticleWithImages> {
        self.articles().get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = step(self.cursor, self.articles().len(), delta);
    }

    pub fn long_press_current(&mut self) {
        if let Some(id) = self.current().map(|a| a.article_id) {
            self.edit.long_press(id);
        }
    }

    /// Toggle the article under the cursor, or open it outside edit mode.
    pub fn tap_current(&mut self) -> Reaction {
        let Some(article_id) = self.current().map(|a| a.article_id) else {
            return Reaction::none();
        };
        if self.edit.tap(article_id) {
            Reaction::none()
        } else {
            Reaction::navigate(Route::ArticleDetail { article_id })
        }
    }

    pub fn start_capture(&self) -> Reaction {
        Reaction::navigate(Route::Camera {
            target_article: None,
        })
    }

    pub fn request_delete(&mut self) -> Reaction {
        if !self.edit.has_selection() {
            return Reaction::notice(Notice::error("Select articles to delete first."));
        }
        self.dialog = ArticlesDialog::ConfirmDelete;
        Reaction::none()
    }

    pub fn confirm_delete(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        self.dialog = ArticlesDialog::None;
        let ids = self.edit.selected();
        let deleted = catalog.delete_articles(&ids)?;
        self.edit.disable();
        Ok(Reaction::notice(Notice::info(format!(
            "Deleted {}.",
            count_label(deleted, "article", "articles")
        ))))
    }

    pub fn open_add_to_ensembles(&mut self, catalog: &Catalog) -> Result<Reaction> {
        if !self.edit.has_selection() {
            return Ok(Reaction::notice(Notice::error(
                "Select articles to add to an ensemble first.",
            )));
        }
        let ensembles: Vec<Ensemble> = catalog
            .ensembles()?
            .into_iter()
            .map(|summary| summary.ensemble)
            .collect();
        if ensembles.is_empty() {
            return Ok(Reaction::notice(Notice::error("Create an ensemble first.")));
        }
        self.dialog = ArticlesDialog::AddToEnsembles(ChecklistState::new(ensembles));
        Ok(Reaction::none())
    }

    pub fn confirm_add_to_ensembles(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        let ArticlesDialog::AddToEnsembles(list) = &self.dialog else {
            return Ok(Reaction::none());
        };
        let ensemble_ids: Vec<i64> = list.checked().into_iter().map(|e| e.id).collect();
        if ensemble_ids.is_empty() {
            return Ok(Reaction::notice(Notice::error("Choose at least one ensemble.")));
        }
        let article_ids = self.edit.selected();
        for ensemble_id in &ensemble_ids {
            catalog.add_articles_to_ensemble(*ensemble_id, &article_ids)?;
        }
        self.dialog = ArticlesDialog::None;
        self.edit.disable();
        Ok(Reaction::notice(Notice::info(format!(
            "Added {} to {}.",
            count_label(article_ids.len(), "article", "articles"),
            count_label(ensemble_ids.len(), "ensemble", "ensembles")
        ))))
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = ArticlesDialog::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{catalog, swatch};
    use crate::config::ImageQuality;
    use crate::state::{EditMode, Navigation};

    fn loaded(count: usize) -> (tempfile::TempDir, Catalog, ArticlesState) {
        let (dir, mut catalog) = catalog();
        for _ in 0..count {
            catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        }
        let mut state = ArticlesState::new();
        state.refresh(&catalog).unwrap();
        (dir, catalog, state)
    }

    #[test]
    fn dialog_defaults_to_none() {
        assert!(matches!(ArticlesState::new().dialog, ArticlesDialog::None));
    }

    #[test]
    fn tap_outside_edit_mode_opens_detail() {
        let (_dir, _catalog, mut state) = loaded(1);
        let id = state.current().unwrap().article_id;
        let reaction = state.tap_current();
        assert_eq!(
            reaction.navigation,
            Some(Navigation::To(Route::ArticleDetail { article_id: id }))
        );
    }

    #[test]
    fn deselecting_last_article_keeps_edit_mode() {
        let (_dir, _catalog, mut state) = loaded(2);
        state.long_press_current();
        assert_eq!(state.edit.mode(), EditMode::EnabledSelectedItems);
        assert!(state.tap_current().is_none());
        assert_eq!(state.edit.mode(), EditMode::EnabledGeneral);
    }

    #[test]
    fn confirm_delete_removes_selected_and_leaves_edit_mode() {
        let (_dir, mut catalog, mut state) = loaded(3);
        state.long_press_current();
        state.move_cursor(1);
        state.tap_current();
        state.request_delete();
        assert!(matches!(state.dialog, ArticlesDialog::ConfirmDelete));

        state.confirm_delete(&mut catalog).unwrap();
        state.refresh(&catalog).unwrap();
        assert_eq!(state.articles().len(), 1);
        assert_eq!(state.edit.mode(), EditMode::Disabled);
        assert!(matches!(state.dialog, ArticlesDialog::None));
    }

    #[test]
    fn delete_notice_counts_only_articles_still_present() {
        let (_dir, mut catalog, mut state) = loaded(2);
        state.long_press_current();
        state.move_cursor(1);
        state.tap_current();
        let gone = state.current().unwrap().article_id;
        catalog.delete_articles(&[gone]).unwrap();

        state.request_delete();
        let reaction = state.confirm_delete(&mut catalog).unwrap();
        assert_eq!(reaction.notice.unwrap().text, "Deleted 1 article.");
    }

    #[test]
    fn delete_without_selection_is_refused() {
        let (_dir, _catalog, mut state) = loaded(1);
        let reaction = state.request_delete();
        assert!(reaction.notice.is_some());
        assert!(matches!(state.dialog, ArticlesDialog::None));
    }

    #[test]
    fn add_to_ensembles_links_every_selected_article() {
        let (_dir, mut catalog, mut state) = loaded(2);
        let first = catalog.create_ensemble("Work", &[]).unwrap();
        catalog.create_ensemble("Weekend", &[]).unwrap();
        state.refresh(&catalog).unwrap();

        let ids: Vec<i64> = state.articles().iter().map(|a| a.article_id).collect();
        state.edit.select_all(ids);
        state.open_add_to_ensembles(&catalog).unwrap();
        if let ArticlesDialog::AddToEnsembles(list) = &mut state.dialog {
            let index = list.items().iter().position(|e| e.id == first.id).unwrap();
            list.move_cursor(index as isize);
            list.toggle();
        } else {
            panic!("expected the ensemble picker");
        }
        state.confirm_add_to_ensembles(&mut catalog).unwrap();

        assert_eq!(catalog.ensemble_articles(first.id).unwrap().len(), 2);
        assert!(matches!(state.dialog, ArticlesDialog::None));
    }
}
