use std::mem;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::style::{Color, Style};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::{Paths, Settings};
use crate::state::{
    AddArticleDialog, AddArticleState, ArticleDetailDialog, ArticleDetailState, ArticlesDialog,
    ArticlesState, CameraDialog, CameraState, EnsembleDetailDialog, EnsembleDetailState,
    EnsemblesDialog, EnsemblesState, Navigation, Notice, NoticeKind, Reaction, Route,
    SettingsDialog, SettingsState, StatisticsState,
};
use crate::worker::SegmentationWorker;

use super::helpers::surface_error;
use super::keys;
use super::preview::{ImageCache, PreviewCache};

/// Top-level screens reachable with Tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Tab {
    Articles,
    Ensembles,
    Statistics,
    Settings,
}

impl Tab {
    pub(super) const ALL: [Tab; 4] = [Tab::Articles, Tab::Ensembles, Tab::Statistics, Tab::Settings];

    pub(super) fn label(self) -> &'static str {
        match self {
            Tab::Articles => "Articles",
            Tab::Ensembles => "Ensembles",
            Tab::Statistics => "Statistics",
            Tab::Settings => "Settings",
        }
    }

    fn route(self) -> Route {
        match self {
            Tab::Articles => Route::Articles,
            Tab::Ensembles => Route::Ensembles,
            Tab::Statistics => Route::Statistics,
            Tab::Settings => Route::Settings,
        }
    }
}

/// The active screen and its state holder.
pub(super) enum Screen {
    Articles(ArticlesState),
    Ensembles(EnsemblesState),
    ArticleDetail(ArticleDetailState),
    EnsembleDetail(EnsembleDetailState),
    Camera(CameraState),
    AddArticle(AddArticleState),
    Settings(SettingsState),
    Statistics(StatisticsState),
}

impl Screen {
    pub(super) fn tab(&self) -> Option<Tab> {
        match self {
            Screen::Articles(_) => Some(Tab::Articles),
            Screen::Ensembles(_) => Some(Tab::Ensembles),
            Screen::Statistics(_) => Some(Tab::Statistics),
            Screen::Settings(_) => Some(Tab::Settings),
            _ => None,
        }
    }

    pub(super) fn has_dialog(&self) -> bool {
        match self {
            Screen::Articles(state) => !matches!(state.dialog, ArticlesDialog::None),
            Screen::Ensembles(state) => !matches!(state.dialog, EnsemblesDialog::None),
            Screen::ArticleDetail(state) => !matches!(state.dialog, ArticleDetailDialog::None),
            Screen::EnsembleDetail(state) => !matches!(state.dialog, EnsembleDetailDialog::None),
            Screen::Camera(state) => state.dialog != CameraDialog::None,
            Screen::AddArticle(state) => !matches!(state.dialog, AddArticleDialog::None),
            Screen::Settings(state) => state.dialog != SettingsDialog::None,
            Screen::Statistics(_) => false,
        }
    }
}

/// Holds the footer message text plus its severity.
pub(super) struct StatusMessage {
    pub(super) text: String,
    pub(super) kind: StatusKind,
}

/// Severity levels shown in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    pub(super) fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

impl From<NoticeKind> for StatusKind {
    fn from(kind: NoticeKind) -> Self {
        match kind {
            NoticeKind::Info => StatusKind::Info,
            NoticeKind::Error => StatusKind::Error,
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    pub(super) catalog: Catalog,
    pub(super) paths: Paths,
    pub(super) settings: Settings,
    worker: SegmentationWorker,
    pub(super) screen: Screen,
    history: Vec<Screen>,
    /// Typing goes to the ensemble search box.
    pub(super) searching: bool,
    pub(super) status: Option<StatusMessage>,
    pub(super) images: ImageCache,
    pub(super) previews: PreviewCache,
}

impl App {
    pub fn new(
        catalog: Catalog,
        paths: Paths,
        settings: Settings,
        worker: SegmentationWorker,
    ) -> Self {
        Self {
            catalog,
            paths,
            settings,
            worker,
            screen: Screen::Articles(ArticlesState::new()),
            history: Vec::new(),
            searching: false,
            status: None,
            images: ImageCache::default(),
            previews: PreviewCache::default(),
        }
    }

    /// Open `route` on top of the current screen.
    pub fn open(&mut self, route: Route) -> Result<()> {
        self.apply(Reaction::navigate(route))
    }

    /// Number of screens below the active one.
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let result = match self.dispatch_key(code, &mut exit) {
            Ok(reaction) => self.apply(reaction),
            Err(err) => Err(err),
        };
        self.report(result);
        Ok(exit)
    }

    /// Periodic work between key presses: apply debounced searches, feed the
    /// segmentation worker and reload stale feeds.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if let Screen::Ensembles(state) = &mut self.screen {
            state.tick(now);
        }
        let result = self.pump_segmentation().and_then(|()| self.refresh_screen());
        self.report(result);
        Ok(())
    }

    fn dispatch_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Reaction> {
        let in_flow = matches!(self.screen, Screen::AddArticle(_));
        if !self.screen.has_dialog() && !self.searching && !in_flow {
            match code {
                KeyCode::Char('q') => {
                    *exit = true;
                    return Ok(Reaction::none());
                }
                KeyCode::Tab => return self.switch_tab(1),
                KeyCode::BackTab => return self.switch_tab(-1),
                _ => {}
            }
        }

        let columns = self.settings.grid_columns.max(1) as isize;
        let catalog = &mut self.catalog;
        match &mut self.screen {
            Screen::Articles(state) => keys::articles(state, catalog, columns, code),
            Screen::Ensembles(state) => {
                keys::ensembles(state, catalog, &mut self.searching, Instant::now(), code)
            }
            Screen::ArticleDetail(state) => keys::article_detail(state, catalog, code),
            Screen::EnsembleDetail(state) => keys::ensemble_detail(state, catalog, columns, code),
            Screen::Camera(state) => {
                let mut rescanned = false;
                let reaction = keys::camera(state, &mut rescanned, code);
                if rescanned {
                    self.images.clear();
                }
                reaction
            }
            Screen::AddArticle(state) => keys::add_article(state, catalog, code),
            Screen::Settings(state) => {
                let reaction = keys::settings(state, catalog, code);
                self.settings = state.settings().clone();
                reaction
            }
            Screen::Statistics(_) => Ok(Reaction::none()),
        }
    }

    /// Act on what a state holder asked for. The holder's own notice is shown
    /// last so it wins over notices raised while arriving at a screen.
    fn apply(&mut self, reaction: Reaction) -> Result<()> {
        let Reaction { navigation, notice } = reaction;
        match navigation {
            Some(Navigation::To(route)) => self.push_screen(route)?,
            Some(Navigation::Back) => self.pop_screen()?,
            None => {}
        }
        self.refresh_screen()?;
        if let Some(notice) = notice {
            self.show(notice);
        }
        Ok(())
    }

    fn switch_tab(&mut self, delta: isize) -> Result<Reaction> {
        let current = self
            .screen
            .tab()
            .or_else(|| self.history.first().and_then(Screen::tab))
            .unwrap_or(Tab::Articles);
        let index = Tab::ALL.iter().position(|tab| *tab == current).unwrap_or(0) as isize;
        let count = Tab::ALL.len() as isize;
        let next = Tab::ALL[(index + delta).rem_euclid(count) as usize];

        self.clear_status();
        self.searching = false;
        self.history.clear();
        let (screen, arrival) = self.build_screen(next.route())?;
        self.screen = screen;
        debug!(tab = next.label(), "switched tab");
        Ok(arrival)
    }

    fn push_screen(&mut self, route: Route) -> Result<()> {
        let (screen, arrival) = self.build_screen(route)?;
        self.searching = false;
        let previous = mem::replace(&mut self.screen, screen);
        self.history.push(previous);
        if let Some(notice) = arrival.notice {
            self.show(notice);
        }
        Ok(())
    }

    fn pop_screen(&mut self) -> Result<()> {
        self.searching = false;
        self.screen = self
            .history
            .pop()
            .unwrap_or_else(|| Screen::Articles(ArticlesState::new()));
        if let Screen::Camera(state) = &mut self.screen {
            self.images.clear();
            let arrival = state.scan()?;
            if let Some(notice) = arrival.notice {
                self.show(notice);
            }
        }
        Ok(())
    }

    fn build_screen(&self, route: Route) -> Result<(Screen, Reaction)> {
        let screen = match route {
            Route::Articles => Screen::Articles(ArticlesState::new()),
            Route::Ensembles => Screen::Ensembles(EnsemblesState::new()),
            Route::ArticleDetail { article_id } => {
                Screen::ArticleDetail(ArticleDetailState::new(article_id))
            }
            Route::EnsembleDetail { ensemble_id } => {
                Screen::EnsembleDetail(EnsembleDetailState::new(ensemble_id))
            }
            Route::Camera { target_article } => {
                let mut state =
                    CameraState::new(self.settings.inbox_dir(&self.paths), target_article);
                let arrival = state.scan()?;
                return Ok((Screen::Camera(state), arrival));
            }
            Route::AddArticle {
                sources,
                target_article,
            } => Screen::AddArticle(AddArticleState::new(sources, target_article, &self.settings)),
            Route::Settings => Screen::Settings(SettingsState::new(
                self.settings.clone(),
                self.paths.config_file.clone(),
            )),
            Route::Statistics => Screen::Statistics(StatisticsState::new()),
        };
        Ok((screen, Reaction::none()))
    }

    /// Reload the active screen's feed if the catalog moved on. A detail
    /// screen whose subject vanished pops itself, and the screen below gets
    /// the same treatment.
    fn refresh_screen(&mut self) -> Result<()> {
        loop {
            let catalog = &self.catalog;
            let reaction = match &mut self.screen {
                Screen::Articles(state) => {
                    state.refresh(catalog)?;
                    Reaction::none()
                }
                Screen::Ensembles(state) => {
                    state.refresh(catalog)?;
                    Reaction::none()
                }
                Screen::ArticleDetail(state) => state.refresh(catalog)?,
                Screen::EnsembleDetail(state) => state.refresh(catalog)?,
                Screen::Statistics(state) => {
                    state.refresh(catalog)?;
                    Reaction::none()
                }
                Screen::Camera(_) | Screen::AddArticle(_) | Screen::Settings(_) => {
                    Reaction::none()
                }
            };

            let Reaction { navigation, notice } = reaction;
            if let Some(notice) = notice {
                self.show(notice);
            }
            match navigation {
                Some(Navigation::Back) => self.pop_screen()?,
                Some(Navigation::To(route)) => self.push_screen(route)?,
                None => return Ok(()),
            }
        }
    }

    /// Hand pending photos to the worker and route finished jobs to the
    /// add-article flow. Results nobody waits for any more are dropped.
    fn pump_segmentation(&mut self) -> Result<()> {
        while let Some(result) = self.worker.try_result() {
            let reaction = match &mut self.screen {
                Screen::AddArticle(state) => state.accept_result(result.job_id, result.outcome),
                _ => {
                    debug!(job_id = result.job_id, "no add-article flow waiting for result");
                    Reaction::none()
                }
            };
            self.apply(reaction)?;
        }

        if let Screen::AddArticle(state) = &mut self.screen {
            if let Some(path) = state.pending_source().map(Path::to_path_buf) {
                let job_id = self.worker.submit(path);
                state.mark_submitted(job_id);
            }
        }
        Ok(())
    }

    fn report(&mut self, result: Result<()>) {
        if let Err(err) = result {
            warn!("action failed: {err:#}");
            self.set_status(surface_error(&err), StatusKind::Error);
        }
    }

    fn show(&mut self, notice: Notice) {
        self.set_status(notice.text, notice.kind.into());
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::catalog::testing::swatch;
    use crate::config::ImageQuality;
    use crate::segmentation::testing::canvas_with_rect;
    use crate::segmentation::ThresholdSegmenter;

    fn app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::in_dir(dir.path());
        let catalog = Catalog::open(&paths).unwrap();
        let worker = SegmentationWorker::spawn(Box::new(ThresholdSegmenter::default())).unwrap();
        let settings = Settings {
            image_quality: ImageQuality::Low,
            ..Settings::default()
        };
        (dir, App::new(catalog, paths, settings, worker))
    }

    fn press(app: &mut App, codes: &[KeyCode]) {
        for code in codes {
            assert!(!app.handle_key(*code).unwrap());
        }
    }

    #[test]
    fn tab_cycles_top_level_screens() {
        let (_dir, mut app) = app();
        press(&mut app, &[KeyCode::Tab]);
        assert_eq!(app.screen.tab(), Some(Tab::Ensembles));
        press(&mut app, &[KeyCode::BackTab, KeyCode::BackTab]);
        assert_eq!(app.screen.tab(), Some(Tab::Settings));
    }

    #[test]
    fn q_quits_outside_dialogs() {
        let (_dir, mut app) = app();
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
    }

    #[test]
    fn detail_screen_pops_when_its_article_is_deleted() {
        let (_dir, mut app) = app();
        let id = app.catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        app.open(Route::ArticleDetail { article_id: id }).unwrap();
        assert_eq!(app.depth(), 1);

        app.catalog.delete_articles(&[id]).unwrap();
        app.tick(Instant::now()).unwrap();
        assert_eq!(app.depth(), 0);
        assert!(matches!(app.screen, Screen::Articles(_)));
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Error);
    }

    #[test]
    fn deleting_from_detail_returns_with_notice() {
        let (_dir, mut app) = app();
        let id = app.catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        app.open(Route::ArticleDetail { article_id: id }).unwrap();
        press(&mut app, &[KeyCode::Char('d'), KeyCode::Char('y')]);

        assert!(matches!(app.screen, Screen::Articles(_)));
        assert_eq!(app.status.as_ref().unwrap().text, "Article deleted.");
    }

    #[test]
    fn add_article_flow_runs_through_the_worker() {
        let (dir, mut app) = app();
        let photo = dir.path().join("shirt.png");
        canvas_with_rect(20, 20, 40, 30).save(&photo).unwrap();
        app.open(Route::AddArticle {
            sources: vec![photo],
            target_article: None,
        })
        .unwrap();

        for _ in 0..200 {
            app.tick(Instant::now()).unwrap();
            if let Screen::AddArticle(state) = &app.screen {
                if state.review().is_some() {
                    break;
                }
            }
            thread::sleep(Duration::from_millis(10));
        }
        press(&mut app, &[KeyCode::Enter]);

        assert!(matches!(app.screen, Screen::Articles(_)));
        assert_eq!(app.catalog.articles().unwrap().len(), 1);
        assert_eq!(app.status.as_ref().unwrap().text, "Saved 1 image.");
    }

    #[test]
    fn settings_changes_reach_the_app() {
        let (_dir, mut app) = app();
        app.open(Route::Settings).unwrap();
        press(&mut app, &[KeyCode::Down, KeyCode::Down, KeyCode::Enter]);
        assert_eq!(app.settings.theme, crate::config::Theme::Light);
    }
}
