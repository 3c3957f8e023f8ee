use crate::error::CatalogError;
use crate::models::ArticleWithImages;

use super::checklist::ChecklistState;

/// A single-line ensemble title input with an inline error.
#[derive(Debug, Default, Clone)]
pub struct TitleForm {
    pub title: String,
    pub error: Option<String>,
}

impl TitleForm {
    /// Seed the form with an existing title when renaming.
    pub fn with_title(title: &str) -> Self {
        Self {
            title: title.to_string(),
            error: None,
        }
    }

    /// Append a printable character. Typing clears a stale error.
    pub fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.title.push(ch);
        self.error = None;
        true
    }

    pub fn backspace(&mut self) {
        self.title.pop();
        self.error = None;
    }

    /// The trimmed title, or an inline error when it is blank.
    pub fn parse_title(&mut self) -> Option<String> {
        let title = self.title.trim();
        if title.is_empty() {
            self.error = Some(CatalogError::EmptyTitle.to_string());
            return None;
        }
        Some(title.to_string())
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn value_len(&self) -> usize {
        self.title.chars().count()
    }
}

/// Fields within the new ensemble form.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum EnsembleField {
    #[default]
    Title,
    Articles,
}

/// New ensemble: a title plus an optional initial set of articles.
#[derive(Debug, Clone)]
pub struct EnsembleForm {
    pub title: TitleForm,
    pub articles: ChecklistState<ArticleWithImages>,
    pub active: EnsembleField,
}

impl EnsembleForm {
    pub fn new(articles: Vec<ArticleWithImages>) -> Self {
        Self {
            title: TitleForm::default(),
            articles: ChecklistState::new(articles),
            active: EnsembleField::Title,
        }
    }

    /// Swap focus between the title and the article list. An empty list is
    /// skipped.
    pub fn toggle_field(&mut self) {
        self.active = match self.active {
            EnsembleField::Title if !self.articles.is_empty() => EnsembleField::Articles,
            _ => EnsembleField::Title,
        };
    }

    pub fn checked_article_ids(&self) -> Vec<i64> {
        self.articles
            .checked()
            .into_iter()
            .map(|article| article.article_id)
            .collect()
    }
}
