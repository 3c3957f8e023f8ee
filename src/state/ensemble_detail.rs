use anyhow::Result;

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::models::{ArticleWithImages, Ensemble};

use super::{
    count_label, step, ChecklistState, EditState, Feed, Notice, Reaction, Route, TitleForm,
};

#[derive(Debug, Clone, Default)]
pub enum EnsembleDetailDialog {
    #[default]
    None,
    ConfirmDelete,
    AddArticles(ChecklistState<ArticleWithImages>),
    RenameTitle(TitleForm),
}

#[derive(Debug, Clone)]
pub struct EnsembleDetail {
    pub ensemble: Ensemble,
    pub articles: Vec<ArticleWithImages>,
    /// Candidates for the add-articles dialog.
    pub other_articles: Vec<ArticleWithImages>,
}

#[derive(Debug)]
pub struct EnsembleDetailState {
    ensemble_id: i64,
    feed: Feed<Option<EnsembleDetail>>,
    pub edit: EditState<i64>,
    pub dialog: EnsembleDetailDialog,
    cursor: usize,
}

impl EnsembleDetailState {
    pub fn new(ensemble_id: i64) -> Self {
        Self {
            ensemble_id,
            feed: Feed::new(),
            edit: EditState::new(),
            dialog: EnsembleDetailDialog::None,
            cursor: 0,
        }
    }

    pub fn ensemble_id(&self) -> i64 {
        self.ensemble_id
    }

    pub fn refresh(&mut self, catalog: &Catalog) -> Result<Reaction> {
        let ensemble_id = self.ensemble_id;
        let reloaded = self.feed.refresh(catalog.generation(), || {
            let Some(ensemble) = catalog.ensemble(ensemble_id)? else {
                return Ok(None);
            };
            Ok(Some(EnsembleDetail {
                ensemble,
                articles: catalog.ensemble_articles(ensemble_id)?,
                other_articles: catalog.articles_not_in_ensemble(ensemble_id)?,
            }))
        })?;
        if !reloaded {
            return Ok(Reaction::none());
        }

        let Some(ids) = self
            .detail()
            .map(|d| d.articles.iter().map(|a| a.article_id).collect::<Vec<_>>())
        else {
            self.dialog = EnsembleDetailDialog::None;
            self.edit.disable();
            return Ok(Reaction::back().with_notice(Notice::error(format!(
                "Ensemble {ensemble_id} no longer exists."
            ))));
        };
        self.cursor = step(self.cursor, ids.len(), 0);
        self.edit.retain(|id| ids.contains(id));
        Ok(Reaction::none())
    }

    pub fn detail(&self) -> Option<&EnsembleDetail> {
        self.feed.get().and_then(Option::as_ref)
    }

    pub fn articles(&self) -> &[ArticleWithImages] {
        self.detail()
            .map(|d| d.articles.as_slice())
            .unwrap_or_default()
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

    /// Unlink the selected articles from this ensemble.
    pub fn remove_selected(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        if !self.edit.has_selection() {
            return Ok(Reaction::notice(Notice::error("Select articles to remove first.")));
        }
        let article_ids = self.edit.selected();
        let removed = catalog.remove_articles_from_ensemble(self.ensemble_id, &article_ids)?;
        self.edit.disable();
        Ok(Reaction::notice(Notice::info(format!(
            "Removed {} from the ensemble.",
            count_label(removed, "article", "articles")
        ))))
    }

    pub fn open_add_articles(&mut self) -> Reaction {
        let candidates = self
            .detail()
            .map(|d| d.other_articles.clone())
            .unwrap_or_default();
        if candidates.is_empty() {
            return Reaction::notice(Notice::error("Every article is already in this ensemble."));
        }
        self.dialog = EnsembleDetailDialog::AddArticles(ChecklistState::new(candidates));
        Reaction::none()
    }

    pub fn confirm_add_articles(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        let EnsembleDetailDialog::AddArticles(list) = &self.dialog else {
            return Ok(Reaction::none());
        };
        let article_ids: Vec<i64> = list.checked().into_iter().map(|a| a.article_id).collect();
        if article_ids.is_empty() {
            return Ok(Reaction::notice(Notice::error("Choose at least one article.")));
        }
        let linked = catalog.add_articles_to_ensemble(self.ensemble_id, &article_ids)?;
        self.dialog = EnsembleDetailDialog::None;
        Ok(Reaction::notice(Notice::info(format!(
            "Added {}.",
            count_label(linked, "article", "articles")
        ))))
    }

    pub fn open_rename(&mut self) {
        if let Some(detail) = self.detail() {
            let form = TitleForm::with_title(&detail.ensemble.title);
            self.dialog = EnsembleDetailDialog::RenameTitle(form);
        }
    }

    /// Apply the rename form. A taken or blank title stays in the form as an
    /// inline error and the stored title is left alone.
    pub fn submit_rename(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        let EnsembleDetailDialog::RenameTitle(form) = &mut self.dialog else {
            return Ok(Reaction::none());
        };
        let Some(title) = form.parse_title() else {
            return Ok(Reaction::none());
        };
        if let Err(err) = catalog.rename_ensemble(self.ensemble_id, &title) {
            return match CatalogError::find(&err) {
                Some(rule)
                    if matches!(
                        rule,
                        CatalogError::TitleNotUnique(_) | CatalogError::EmptyTitle
                    ) =>
                {
                    form.set_error(rule.to_string());
                    Ok(Reaction::none())
                }
                _ => Err(err),
            };
        }
        self.dialog = EnsembleDetailDialog::None;
        Ok(Reaction::notice(Notice::info(format!("Renamed to \"{title}\"."))))
    }

    pub fn request_delete(&mut self) {
        self.dialog = EnsembleDetailDialog::ConfirmDelete;
    }

    pub fn confirm_delete(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        self.dialog = EnsembleDetailDialog::None;
        catalog.delete_ensembles(&[self.ensemble_id])?;
        Ok(Reaction::back().with_notice(Notice::info("Ensemble deleted.")))
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = EnsembleDetailDialog::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{catalog, swatch};
    use crate::config::ImageQuality;
    use crate::state::{EditMode, Navigation};

    fn setup() -> (tempfile::TempDir, Catalog, i64, Vec<i64>) {
        let (dir, mut catalog) = catalog();
        let ids: Vec<i64> = (0..3)
            .map(|_| catalog.add_article(&swatch(), ImageQuality::Low).unwrap())
            .collect();
        let ensemble = catalog.create_ensemble("Office", &ids[..2]).unwrap();
        (dir, catalog, ensemble.id, ids)
    }

    #[test]
    fn dialog_defaults_to_none() {
        assert!(matches!(
            EnsembleDetailState::new(1).dialog,
            EnsembleDetailDialog::None
        ));
    }

    #[test]
    fn feed_splits_members_and_candidates() {
        let (_dir, catalog, ensemble_id, ids) = setup();
        let mut state = EnsembleDetailState::new(ensemble_id);
        state.refresh(&catalog).unwrap();
        let detail = state.detail().unwrap();
        assert_eq!(detail.articles.len(), 2);
        assert_eq!(detail.other_articles.len(), 1);
        assert_eq!(detail.other_articles[0].article_id, ids[2]);
    }

    #[test]
    fn rename_collision_keeps_prior_title() {
        let (_dir, mut catalog, ensemble_id, _) = setup();
        catalog.create_ensemble("Weekend", &[]).unwrap();
        let mut state = EnsembleDetailState::new(ensemble_id);
        state.refresh(&catalog).unwrap();

        state.open_rename();
        if let EnsembleDetailDialog::RenameTitle(form) = &mut state.dialog {
            *form = TitleForm::with_title("Weekend");
        }
        state.submit_rename(&mut catalog).unwrap();
        match &state.dialog {
            EnsembleDetailDialog::RenameTitle(form) => assert!(form.error.is_some()),
            other => panic!("rename form closed: {other:?}"),
        }
        assert_eq!(catalog.ensemble(ensemble_id).unwrap().unwrap().title, "Office");
    }

    #[test]
    fn rename_applies_new_title() {
        let (_dir, mut catalog, ensemble_id, _) = setup();
        let mut state = EnsembleDetailState::new(ensemble_id);
        state.refresh(&catalog).unwrap();

        state.open_rename();
        if let EnsembleDetailDialog::RenameTitle(form) = &mut state.dialog {
            form.push_char('!');
        }
        state.submit_rename(&mut catalog).unwrap();
        assert!(matches!(state.dialog, EnsembleDetailDialog::None));
        assert_eq!(catalog.ensemble(ensemble_id).unwrap().unwrap().title, "Office!");
    }

    #[test]
    fn removing_selected_members() {
        let (_dir, mut catalog, ensemble_id, _) = setup();
        let mut state = EnsembleDetailState::new(ensemble_id);
        state.refresh(&catalog).unwrap();

        state.long_press_current();
        state.move_cursor(1);
        state.tap_current();
        state.tap_current();
        assert_eq!(state.edit.mode(), EditMode::EnabledSelectedItems);
        state.remove_selected(&mut catalog).unwrap();
        state.refresh(&catalog).unwrap();
        assert_eq!(state.articles().len(), 1);
        assert_eq!(state.detail().unwrap().other_articles.len(), 2);
    }

    #[test]
    fn add_articles_and_delete() {
        let (_dir, mut catalog, ensemble_id, _) = setup();
        let mut state = EnsembleDetailState::new(ensemble_id);
        state.refresh(&catalog).unwrap();

        state.open_add_articles();
        if let EnsembleDetailDialog::AddArticles(list) = &mut state.dialog {
            list.check_all();
        }
        state.confirm_add_articles(&mut catalog).unwrap();
        state.refresh(&catalog).unwrap();
        assert_eq!(state.articles().len(), 3);
        assert!(state.open_add_articles().notice.is_some());

        state.request_delete();
        let reaction = state.confirm_delete(&mut catalog).unwrap();
        assert_eq!(reaction.navigation, Some(Navigation::Back));
        assert!(catalog.ensemble(ensemble_id).unwrap().is_none());
    }
}
