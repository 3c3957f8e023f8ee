//! Per-screen state holders.
//!
//! Each screen owns a feed of catalog data plus local flags (edit mode,
//! selection, the open dialog). Key handling in `ui` calls into these structs;
//! they mutate their flags directly and hand durable changes to the
//! [`Catalog`](crate::catalog::Catalog). Anything that should happen outside
//! the screen, such as moving to another screen or showing a status line, is
//! returned as a [`Reaction`].

use std::path::PathBuf;

mod add_article;
mod article_detail;
mod articles;
mod camera;
mod checklist;
mod edit;
mod ensemble_detail;
mod ensembles;
mod feed;
mod forms;
mod search;
mod settings;
mod statistics;

pub use add_article::{AddArticleDialog, AddArticleState, Review, Stage};
pub use article_detail::{ArticleDetail, ArticleDetailDialog, ArticleDetailState};
pub use articles::{ArticlesDialog, ArticlesState};
pub use camera::{is_supported_image, CameraDialog, CameraState};
pub use checklist::ChecklistState;
pub use edit::{EditMode, EditState};
pub use ensemble_detail::{EnsembleDetail, EnsembleDetailDialog, EnsembleDetailState};
pub use ensembles::{EnsemblesDialog, EnsemblesState};
pub use feed::Feed;
pub use forms::{EnsembleField, EnsembleForm, TitleForm};
pub use search::{Debouncer, SEARCH_DEBOUNCE};
pub use settings::{SettingsDialog, SettingsField, SettingsState};
pub use statistics::StatisticsState;

/// Screens that can be navigated to, with their arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Articles,
    Ensembles,
    ArticleDetail {
        article_id: i64,
    },
    EnsembleDetail {
        ensemble_id: i64,
    },
    Camera {
        target_article: Option<i64>,
    },
    AddArticle {
        sources: Vec<PathBuf>,
        target_article: Option<i64>,
    },
    Settings,
    Statistics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    To(Route),
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A one-shot message for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Info,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Error,
        }
    }
}

/// What a state holder asks of the surrounding app after handling an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reaction {
    pub navigation: Option<Navigation>,
    pub notice: Option<Notice>,
}

impl Reaction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn notice(notice: Notice) -> Self {
        Self {
            navigation: None,
            notice: Some(notice),
        }
    }

    pub fn navigate(route: Route) -> Self {
        Self {
            navigation: Some(Navigation::To(route)),
            notice: None,
        }
    }

    pub fn back() -> Self {
        Self {
            navigation: Some(Navigation::Back),
            notice: None,
        }
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    pub fn is_none(&self) -> bool {
        self.navigation.is_none() && self.notice.is_none()
    }
}

/// Move `index` by `delta` within `0..len`, clamping at both ends.
pub(crate) fn step(index: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = index as isize + delta;
    next.clamp(0, len as isize - 1) as usize
}

/// Pluralize a count for status messages.
pub(crate) fn count_label(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {plural}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_clamps_to_bounds() {
        assert_eq!(step(0, 5, -1), 0);
        assert_eq!(step(3, 5, 4), 4);
        assert_eq!(step(2, 5, 1), 3);
        assert_eq!(step(7, 0, 1), 0);
    }

    #[test]
    fn count_label_pluralizes() {
        assert_eq!(count_label(1, "image", "images"), "1 image");
        assert_eq!(count_label(3, "image", "images"), "3 images");
    }
}
