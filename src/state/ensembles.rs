use std::time::Instant;

use anyhow::Result;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::models::EnsembleSummary;

use super::{
    count_label, step, Debouncer, EditState, EnsembleForm, Feed, Notice, Reaction, Route,
};

#[derive(Debug, Clone, Default)]
pub enum EnsemblesDialog {
    #[default]
    None,
    AddEnsemble(EnsembleForm),
    ConfirmDelete,
}

/// The ensemble list, optionally narrowed by a debounced title search.
#[derive(Debug, Default)]
pub struct EnsemblesState {
    feed: Feed<Vec<EnsembleSummary>>,
    pub edit: EditState<i64>,
    pub dialog: EnsemblesDialog,
    cursor: usize,
    query: String,
    applied_query: String,
    search: Debouncer<String>,
}

impl EnsemblesState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, catalog: &Catalog) -> Result<()> {
        let query = self.applied_query.clone();
        if self
            .feed
            .refresh(catalog.generation(), || catalog.search_ensembles(&query))?
        {
            let ids: Vec<i64> = self.ensembles().iter().map(|e| e.ensemble.id).collect();
            self.cursor = step(self.cursor, ids.len(), 0);
            self.edit.retain(|id| ids.contains(id));
            debug!(count = ids.len(), query = %query, "ensembles feed reloaded");
        }
        Ok(())
    }

    pub fn ensembles(&self) -> &[EnsembleSummary] {
        self.feed.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&EnsembleSummary> {
        self.ensembles().get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = step(self.cursor, self.ensembles().len(), delta);
    }

    /// What the user has typed, applied or not.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn push_query_char(&mut self, ch: char, now: Instant) {
        if ch.is_control() {
            return;
        }
        self.query.push(ch);
        self.search.push(self.query.clone(), now);
    }

    pub fn pop_query_char(&mut self, now: Instant) {
        if self.query.pop().is_some() {
            self.search.push(self.query.clone(), now);
        }
    }

    /// Drop the search immediately, without waiting for the debounce.
    pub fn clear_query(&mut self) {
        self.query.clear();
        self.search.flush();
        self.apply_query(String::new());
    }

    /// Apply the typed query once it has been stable long enough.
    pub fn tick(&mut self, now: Instant) {
        if let Some(query) = self.search.poll(now) {
            self.apply_query(query);
        }
    }

    fn apply_query(&mut self, query: String) {
        let query = query.trim().to_string();
        if query != self.applied_query {
            self.applied_query = query;
            self.cursor = 0;
            self.feed.invalidate();
        }
    }

    pub fn long_press_current(&mut self) {
        if let Some(id) = self.current().map(|e| e.ensemble.id) {
            self.edit.long_press(id);
        }
    }

    pub fn tap_current(&mut self) -> Reaction {
        let Some(ensemble_id) = self.current().map(|e| e.ensemble.id) else {
            return Reaction::none();
        };
        if self.edit.tap(ensemble_id) {
            Reaction::none()
        } else {
            Reaction::navigate(Route::EnsembleDetail { ensemble_id })
        }
    }

    pub fn open_add_dialog(&mut self, catalog: &Catalog) -> Result<()> {
        let articles = catalog.articles()?;
        self.dialog = EnsemblesDialog::AddEnsemble(EnsembleForm::new(articles));
        Ok(())
    }

    /// Insert the ensemble from the open form. Title problems stay in the
    /// form as an inline error and nothing is written.
    pub fn submit_add(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        let EnsemblesDialog::AddEnsemble(form) = &mut self.dialog else {
            return Ok(Reaction::none());
        };
        let Some(title) = form.title.parse_title() else {
            return Ok(Reaction::none());
        };
        let article_ids = form.checked_article_ids();
        let ensemble = match catalog.create_ensemble(&title, &article_ids) {
            Ok(ensemble) => ensemble,
            Err(err) => match CatalogError::find(&err) {
                Some(rule)
                    if matches!(
                        rule,
                        CatalogError::TitleNotUnique(_) | CatalogError::EmptyTitle
                    ) =>
                {
                    form.title.set_error(rule.to_string());
                    return Ok(Reaction::none());
                }
                _ => return Err(err),
            },
        };
        self.dialog = EnsemblesDialog::None;
        Ok(Reaction::notice(Notice::info(format!(
            "Created \"{}\" with {}.",
            ensemble.title,
            count_label(article_ids.len(), "article", "articles")
        ))))
    }

    pub fn request_delete(&mut self) -> Reaction {
        if !self.edit.has_selection() {
            return Reaction::notice(Notice::error("Select ensembles to delete first."));
        }
        self.dialog = EnsemblesDialog::ConfirmDelete;
        Reaction::none()
    }

    pub fn confirm_delete(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        self.dialog = EnsemblesDialog::None;
        let deleted = catalog.delete_ensembles(&self.edit.selected())?;
        self.edit.disable();
        Ok(Reaction::notice(Notice::info(format!(
            "Deleted {}.",
            count_label(deleted, "ensemble", "ensembles")
        ))))
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = EnsemblesDialog::None;
    }
}
