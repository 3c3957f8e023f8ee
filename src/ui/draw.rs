use std::path::{Path, PathBuf};

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;

use crate::catalog::ENSEMBLE_PREVIEW_LIMIT;
use crate::models::{ArticleWithImages, Ensemble};
use crate::state::{
    AddArticleDialog, AddArticleState, ArticleDetailDialog, ArticleDetailState, ArticlesDialog,
    ArticlesState, CameraDialog, CameraState, ChecklistState, EditMode, EditState,
    EnsembleDetailDialog, EnsembleDetailState, EnsembleField, EnsembleForm, EnsemblesDialog,
    EnsemblesState, Review, SettingsDialog, SettingsField, SettingsState, Stage,
    StatisticsState, TitleForm,
};

use super::app::{App, Screen, Tab};
use super::helpers::{
    centered_rect, checkbox, format_bytes, key_hints, scroll_offset, split_columns, Palette,
};
use super::preview::image_lines;

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
const HEADER_HEIGHT: u16 = 1;
const MIN_CARD_HEIGHT: u16 = 4;
const ENSEMBLE_ROW_HEIGHT: u16 = 7;
const SEARCH_PREFIX: &str = "Search: ";
const TITLE_PREFIX: &str = "Title: ";

impl App {
    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let palette = Palette::for_theme(self.settings.theme);
        frame.render_widget(Block::default().style(palette.base), area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT.min(area.height)),
            ])
            .split(area);
        let (header_area, content_area, footer_area) = (chunks[0], chunks[1], chunks[2]);

        self.draw_header(frame, header_area, &palette);
        match &self.screen {
            Screen::Articles(state) => self.draw_articles(frame, content_area, state, &palette),
            Screen::Ensembles(state) => self.draw_ensembles(frame, content_area, state, &palette),
            Screen::ArticleDetail(state) => {
                self.draw_article_detail(frame, content_area, state, &palette)
            }
            Screen::EnsembleDetail(state) => {
                self.draw_ensemble_detail(frame, content_area, state, &palette)
            }
            Screen::Camera(state) => self.draw_camera(frame, content_area, state, &palette),
            Screen::AddArticle(state) => {
                self.draw_add_article(frame, content_area, state, &palette)
            }
            Screen::Settings(state) => self.draw_settings(frame, content_area, state, &palette),
            Screen::Statistics(state) => self.draw_statistics(frame, content_area, state),
        }
        self.draw_footer(frame, footer_area, &palette);
        self.draw_dialog(frame, area, &palette);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        if let Some(current) = self.screen.tab() {
            let index = Tab::ALL.iter().position(|tab| *tab == current).unwrap_or(0);
            let tabs = Tabs::new(Tab::ALL.iter().map(|tab| tab.label()))
                .select(index)
                .highlight_style(palette.highlight().add_modifier(Modifier::BOLD))
                .divider("|");
            frame.render_widget(tabs, area);
            return;
        }

        let title = match &self.screen {
            Screen::ArticleDetail(state) => format!("Article #{}", state.article_id()),
            Screen::EnsembleDetail(state) => state
                .detail()
                .map(|d| format!("Ensemble \"{}\"", d.ensemble.title))
                .unwrap_or_else(|| "Ensemble".to_string()),
            Screen::Camera(state) => match state.target_article() {
                Some(id) => format!("Add images to article #{id}"),
                None => "Import photos".to_string(),
            },
            Screen::AddArticle(_) => "Add article".to_string(),
            _ => String::new(),
        };
        let line = Line::from(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_articles(&self, frame: &mut Frame, area: Rect, state: &ArticlesState, palette: &Palette) {
        self.draw_article_grid(
            frame,
            area,
            state.articles(),
            state.cursor(),
            &state.edit,
            "No articles yet. Press 'c' to import photos.",
            palette,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_article_grid(
        &self,
        frame: &mut Frame,
        area: Rect,
        articles: &[ArticleWithImages],
        cursor: usize,
        edit: &EditState<i64>,
        empty_message: &str,
        palette: &Palette,
    ) {
        if articles.is_empty() {
            let message = Paragraph::new(empty_message.to_string())
                .alignment(Alignment::Center)
                .style(palette.dim());
            frame.render_widget(message, area);
            return;
        }

        let columns = usize::from(self.settings.grid_columns.max(1));
        let cell_width = area.width / columns as u16;
        let card_height = (cell_width / 2).max(MIN_CARD_HEIGHT).min(area.height.max(1));
        let visible_rows = usize::from((area.height / card_height).max(1));
        let first_row = scroll_offset(cursor / columns, visible_rows);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(card_height); visible_rows])
            .split(area);
        for (offset, row_area) in rows.iter().enumerate() {
            let row = first_row + offset;
            for (column, cell) in split_columns(*row_area, columns as u16).into_iter().enumerate() {
                let index = row * columns + column;
                let Some(article) = articles.get(index) else {
                    break;
                };
                let mut title = article.label();
                if edit.is_enabled() {
                    title = format!("{}{title}", checkbox(edit.is_selected(&article.article_id)));
                }
                let mut block = Block::default().borders(Borders::ALL).title(title);
                if index == cursor {
                    block = block.border_style(palette.highlight());
                }
                if edit.is_selected(&article.article_id) {
                    block = block.title_style(Style::default().fg(palette.checked));
                }
                let inner = block.inner(cell);
                frame.render_widget(block, cell);
                self.draw_image(frame, inner, article.thumbnails.first().as_deref(), palette);
            }
        }
    }

    fn draw_image(&self, frame: &mut Frame, area: Rect, path: Option<&Path>, palette: &Palette) {
        let Some(image) = path.and_then(|path| self.images.get(path)) else {
            let placeholder = Paragraph::new("(no preview)")
                .alignment(Alignment::Center)
                .style(palette.dim());
            frame.render_widget(placeholder, area);
            return;
        };
        frame.render_widget(Paragraph::new(image_lines(&image, area.width, area.height)), area);
    }

    fn draw_ensembles(&self, frame: &mut Frame, area: Rect, state: &EnsemblesState, palette: &Palette) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let search_style = if self.searching {
            palette.highlight()
        } else {
            Style::default()
        };
        let search_block = Block::default()
            .borders(Borders::ALL)
            .border_style(search_style)
            .title("Search");
        let search_inner = search_block.inner(chunks[0]);
        let query = if state.query().is_empty() && !self.searching {
            Span::styled("press / to search", palette.dim())
        } else {
            Span::raw(state.query().to_string())
        };
        frame.render_widget(
            Paragraph::new(Line::from(vec![Span::raw(SEARCH_PREFIX), query])).block(search_block),
            chunks[0],
        );
        if self.searching {
            let x = search_inner.x + SEARCH_PREFIX.len() as u16 + state.query().chars().count() as u16;
            frame.set_cursor_position((x, search_inner.y));
        }

        let list_area = chunks[1];
        let ensembles = state.ensembles();
        if ensembles.is_empty() {
            let text = if state.query().trim().is_empty() {
                "No ensembles yet. Press '+' to create one."
            } else {
                "No ensembles match the search."
            };
            let message = Paragraph::new(text)
                .alignment(Alignment::Center)
                .style(palette.dim());
            frame.render_widget(message, list_area);
            return;
        }

        let row_height = ENSEMBLE_ROW_HEIGHT.min(list_area.height.max(1));
        let visible = usize::from((list_area.height / row_height).max(1));
        let first = scroll_offset(state.cursor(), visible);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(row_height); visible])
            .split(list_area);

        for (offset, row_area) in rows.iter().enumerate() {
            let index = first + offset;
            let Some(summary) = ensembles.get(index) else {
                break;
            };
            let mut title = summary.ensemble.title.clone();
            if state.edit.is_enabled() {
                title = format!("{}{title}", checkbox(state.edit.is_selected(&summary.ensemble.id)));
            }
            let mut block = Block::default().borders(Borders::ALL).title(title);
            if index == state.cursor() {
                block = block.border_style(palette.highlight());
            }
            let inner = block.inner(*row_area);
            frame.render_widget(block, *row_area);

            if summary.previews.is_empty() {
                frame.render_widget(Paragraph::new("(empty)").style(palette.dim()), inner);
                continue;
            }
            let cells = split_columns(inner, ENSEMBLE_PREVIEW_LIMIT as u16);
            for (cell, path) in cells.into_iter().zip(summary.previews.iter()) {
                self.draw_image(frame, cell, Some(path.as_path()), palette);
            }
        }
    }

    fn draw_article_detail(
        &self,
        frame: &mut Frame,
        area: Rect,
        state: &ArticleDetailState,
        palette: &Palette,
    ) {
        let Some(detail) = state.detail() else {
            return;
        };
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        let count = detail.article.image_count();
        let page = state.page();
        let mut title = format!("Image {}/{}", (page + 1).min(count), count);
        if state.edit.is_enabled() {
            title = format!("{}{title}", checkbox(state.edit.is_selected(&page)));
        }
        let mut image_block = Block::default().borders(Borders::ALL).title(title);
        if state.edit.mode() == EditMode::EnabledSelectedItems {
            image_block = image_block.title_style(Style::default().fg(palette.checked));
        }
        let image_area = image_block.inner(chunks[0]);
        frame.render_widget(image_block, chunks[0]);
        self.draw_image(frame, image_area, detail.article.thumbnails.get(page).as_deref(), palette);

        let items: Vec<ListItem> = detail
            .ensembles
            .iter()
            .map(|ensemble| ListItem::new(ensemble.title.clone()))
            .collect();
        let ensembles_block = Block::default()
            .borders(Borders::ALL)
            .title(format!("In {} ensembles", detail.ensembles.len()));
        if items.is_empty() {
            let message = Paragraph::new("Not in any ensemble yet. Press 'n' to add it to one.")
                .style(palette.dim())
                .wrap(Wrap { trim: true })
                .block(ensembles_block);
            frame.render_widget(message, chunks[1]);
            return;
        }
        let list = List::new(items)
            .block(ensembles_block)
            .highlight_style(palette.highlight().add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        let mut list_state = ListState::default().with_selected(Some(state.ensemble_cursor()));
        frame.render_stateful_widget(list, chunks[1], &mut list_state);
    }

    fn draw_ensemble_detail(
        &self,
        frame: &mut Frame,
        area: Rect,
        state: &EnsembleDetailState,
        palette: &Palette,
    ) {
        self.draw_article_grid(
            frame,
            area,
            state.articles(),
            state.cursor(),
            &state.edit,
            "This ensemble is empty. Press '+' to add articles.",
            palette,
        );
    }

    fn draw_camera(&self, frame: &mut Frame, area: Rect, state: &CameraState, palette: &Palette) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Inbox: {}", state.inbox().display()));
        if state.photos.is_empty() {
            let message = Paragraph::new(format!(
                "No photos found. Copy pictures into {} and press 'r'.",
                state.inbox().display()
            ))
            .wrap(Wrap { trim: true })
            .style(palette.dim())
            .block(block);
            frame.render_widget(message, chunks[0]);
        } else {
            let items = checklist_items(&state.photos, |path: &PathBuf| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            });
            let list = List::new(items)
                .block(block)
                .highlight_style(palette.highlight().add_modifier(Modifier::BOLD))
                .highlight_symbol("> ");
            let mut list_state = ListState::default().with_selected(Some(state.photos.cursor()));
            frame.render_stateful_widget(list, chunks[0], &mut list_state);
        }

        let preview_block = Block::default().borders(Borders::ALL).title("Preview");
        let preview_area = preview_block.inner(chunks[1]);
        frame.render_widget(preview_block, chunks[1]);
        if let Some(photo) = state.photos.current() {
            self.draw_image(frame, preview_area, Some(photo.as_path()), palette);
        }
    }

    fn draw_add_article(
        &self,
        frame: &mut Frame,
        area: Rect,
        state: &AddArticleState,
        palette: &Palette,
    ) {
        let (position, total) = state.progress();
        let source_name = state
            .current_source()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let review = match state.stage() {
            Stage::Segmenting { .. } => {
                let message = Paragraph::new(vec![
                    Line::from(format!("Finding the article in photo {position}/{total}")),
                    Line::from(Span::styled(source_name, palette.dim())),
                ])
                .alignment(Alignment::Center);
                frame.render_widget(message, centered_rect(80, 30, area));
                return;
            }
            Stage::Finished => {
                let message = Paragraph::new(format!(
                    "Done. Saved {} images. Press Esc to go back.",
                    state.saved()
                ))
                .alignment(Alignment::Center);
                frame.render_widget(message, centered_rect(80, 30, area));
                return;
            }
            Stage::Reviewing(review) => review,
        };

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        let preview_block = Block::default()
            .borders(Borders::ALL)
            .title(format!(
                "Subject {}/{}",
                review.subject + 1,
                review.segmented.subject_count()
            ))
            .border_style(palette.highlight());
        let preview_area = preview_block.inner(chunks[0]);
        frame.render_widget(preview_block, chunks[0]);
        match self.previews.get(review) {
            Some(image) => frame.render_widget(
                Paragraph::new(image_lines(&image, preview_area.width, preview_area.height)),
                preview_area,
            ),
            None => frame.render_widget(
                Paragraph::new("Nothing left at this threshold. Press '-' to broaden.")
                    .alignment(Alignment::Center)
                    .style(palette.dim()),
                preview_area,
            ),
        }

        let info = Paragraph::new(review_lines(state, review, position, total, &source_name, palette))
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: true });
        frame.render_widget(info, chunks[1]);
    }

    fn draw_settings(&self, frame: &mut Frame, area: Rect, state: &SettingsState, palette: &Palette) {
        let settings = state.settings();
        let items: Vec<ListItem> = SettingsField::ALL
            .iter()
            .map(|field| {
                let value = match field {
                    SettingsField::ImageQuality => settings.image_quality.label().to_string(),
                    SettingsField::SegmentationThreshold => {
                        format!("{:.1}", settings.segmentation_threshold)
                    }
                    SettingsField::Theme => settings.theme.label().to_string(),
                    SettingsField::GridColumns => settings.grid_columns.to_string(),
                    SettingsField::DeleteAllData | SettingsField::About => String::new(),
                };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:<24}", field.label())),
                    Span::styled(value, palette.highlight()),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Settings"))
            .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut list_state = ListState::default().with_selected(Some(state.cursor()));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_statistics(&self, frame: &mut Frame, area: Rect, state: &StatisticsState) {
        let Some(stats) = state.statistics() else {
            return;
        };
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = vec![
            Line::from(Span::styled("Catalog", bold)),
            Line::from(format!("  Articles:           {}", stats.counts.articles)),
            Line::from(format!("  Article images:     {}", stats.counts.article_images)),
            Line::from(format!("  Ensembles:          {}", stats.counts.ensembles)),
            Line::from(format!("  Ensemble links:     {}", stats.counts.ensemble_articles)),
            Line::from(format!("  Storage used:       {}", format_bytes(stats.storage_bytes))),
            Line::from(""),
            Line::from(Span::styled("Largest ensembles", bold)),
        ];
        if stats.popular_ensembles.is_empty() {
            lines.push(Line::from("  none yet"));
        }
        for ranked in &stats.popular_ensembles {
            lines.push(Line::from(format!(
                "  {} ({} articles)",
                ranked.title, ranked.article_count
            )));
        }
        lines.push(Line::from(""));
        if let Some(article) = &stats.article_with_most_images {
            lines.push(Line::from(format!(
                "Most photographed: article #{} with {} images",
                article.article_id, article.count
            )));
        }
        if let Some(article) = &stats.article_in_most_ensembles {
            lines.push(Line::from(format!(
                "Most worn: article #{} in {} ensembles",
                article.article_id, article.count
            )));
        }
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Statistics"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = key_hints(&self.footer_hints(), palette);
        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_hints(&self) -> Vec<(&'static str, &'static str)> {
        const CONFIRM: &[(&str, &str)] = &[("y", "Confirm"), ("n/Esc", "Cancel")];
        const CHECKLIST: &[(&str, &str)] = &[
            ("Up/Down", "Move"),
            ("Space", "Toggle"),
            ("*", "All"),
            ("Enter", "Confirm"),
            ("Esc", "Cancel"),
        ];
        const FORM: &[(&str, &str)] = &[("Enter", "Save"), ("Esc", "Cancel")];

        let hints: &[(&'static str, &'static str)] = match &self.screen {
            Screen::Articles(state) => match state.dialog {
                ArticlesDialog::None if state.edit.is_enabled() => &[
                    ("Space/Enter", "Select"),
                    ("*", "All"),
                    ("d", "Delete"),
                    ("n", "Add to ensembles"),
                    ("Esc", "Done"),
                ],
                ArticlesDialog::None => &[
                    ("Arrows", "Move"),
                    ("Enter", "Open"),
                    ("Space", "Select"),
                    ("e", "Edit"),
                    ("c", "Import"),
                    ("o", "View"),
                    ("Tab", "Next tab"),
                    ("q", "Quit"),
                ],
                ArticlesDialog::ConfirmDelete => CONFIRM,
                ArticlesDialog::AddToEnsembles(_) => CHECKLIST,
            },
            Screen::Ensembles(state) => match state.dialog {
                EnsemblesDialog::None if self.searching => {
                    &[("Type", "Search"), ("Enter", "Done"), ("Esc", "Clear")]
                }
                EnsemblesDialog::None if state.edit.is_enabled() => &[
                    ("Space/Enter", "Select"),
                    ("*", "All"),
                    ("d", "Delete"),
                    ("Esc", "Done"),
                ],
                EnsemblesDialog::None => &[
                    ("Up/Down", "Move"),
                    ("Enter", "Open"),
                    ("Space", "Select"),
                    ("/", "Search"),
                    ("+", "New"),
                    ("e", "Edit"),
                    ("Tab", "Next tab"),
                    ("q", "Quit"),
                ],
                EnsemblesDialog::AddEnsemble(_) => &[
                    ("Tab", "Switch field"),
                    ("Space", "Toggle article"),
                    ("Enter", "Create"),
                    ("Esc", "Cancel"),
                ],
                EnsemblesDialog::ConfirmDelete => CONFIRM,
            },
            Screen::ArticleDetail(state) => match state.dialog {
                ArticleDetailDialog::None if state.edit.is_enabled() => &[
                    ("Left/Right", "Page"),
                    ("Space/Enter", "Select"),
                    ("*", "All"),
                    ("x", "Remove images"),
                    ("Esc", "Done"),
                ],
                ArticleDetailDialog::None => &[
                    ("Left/Right", "Page"),
                    ("Enter", "View"),
                    ("Space", "Select"),
                    ("i", "Add images"),
                    ("n", "Add to ensembles"),
                    ("g", "Go to ensemble"),
                    ("r", "Remove from ensemble"),
                    ("d", "Delete"),
                    ("Esc", "Back"),
                ],
                ArticleDetailDialog::ConfirmDelete | ArticleDetailDialog::ConfirmRemoveImages => {
                    CONFIRM
                }
                ArticleDetailDialog::AddToEnsembles(_) => CHECKLIST,
            },
            Screen::EnsembleDetail(state) => match state.dialog {
                EnsembleDetailDialog::None if state.edit.is_enabled() => &[
                    ("Space/Enter", "Select"),
                    ("*", "All"),
                    ("x", "Remove from ensemble"),
                    ("Esc", "Done"),
                ],
                EnsembleDetailDialog::None => &[
                    ("Arrows", "Move"),
                    ("Enter", "Open"),
                    ("Space", "Select"),
                    ("+", "Add articles"),
                    ("r", "Rename"),
                    ("d", "Delete"),
                    ("Esc", "Back"),
                ],
                EnsembleDetailDialog::ConfirmDelete => CONFIRM,
                EnsembleDetailDialog::AddArticles(_) => CHECKLIST,
                EnsembleDetailDialog::RenameTitle(_) => FORM,
            },
            Screen::Camera(state) => match state.dialog {
                CameraDialog::None => &[
                    ("Up/Down", "Move"),
                    ("Space", "Toggle"),
                    ("Enter", "Import"),
                    ("r", "Rescan"),
                    ("o", "Open folder"),
                    ("Esc", "Back"),
                ],
                CameraDialog::PermissionDenied => &[("Enter/Esc", "Back")],
            },
            Screen::AddArticle(state) => match (&state.dialog, state.stage()) {
                (AddArticleDialog::ConfirmExit, _) => CONFIRM,
                (AddArticleDialog::AttachArticle(_), _) => &[
                    ("Up/Down", "Move"),
                    ("Enter", "Attach"),
                    ("Esc", "Cancel"),
                ],
                (AddArticleDialog::None, Stage::Reviewing(_)) => &[
                    ("Enter", "Save"),
                    ("x", "Discard"),
                    ("r/R", "Rotate"),
                    ("+/-", "Threshold"),
                    ("a", "Attach"),
                    ("Esc", "Exit"),
                ],
                (AddArticleDialog::None, _) => &[("Esc", "Exit")],
            },
            Screen::Settings(state) => match state.dialog {
                SettingsDialog::None => &[
                    ("Up/Down", "Move"),
                    ("Left/Right", "Change"),
                    ("Enter", "Select"),
                    ("Tab", "Next tab"),
                    ("q", "Quit"),
                ],
                SettingsDialog::ImageQualityAlert(_) | SettingsDialog::ConfirmDeleteAllData => {
                    CONFIRM
                }
                SettingsDialog::About => &[("Enter", "Close")],
            },
            Screen::Statistics(_) => &[("Tab", "Next tab"), ("q", "Quit")],
        };
        hints.to_vec()
    }

    fn draw_dialog(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        match &self.screen {
            Screen::Articles(state) => match &state.dialog {
                ArticlesDialog::None => {}
                ArticlesDialog::ConfirmDelete => draw_confirm(
                    frame,
                    area,
                    "Delete articles",
                    &[
                        format!("Delete {} selected articles?", state.edit.selected_count()),
                        "Their images are removed from disk.".to_string(),
                    ],
                    palette,
                ),
                ArticlesDialog::AddToEnsembles(list) => {
                    draw_checklist(frame, area, "Add to ensembles", list, ensemble_title, palette)
                }
            },
            Screen::Ensembles(state) => match &state.dialog {
                EnsemblesDialog::None => {}
                EnsemblesDialog::AddEnsemble(form) => draw_ensemble_form(frame, area, form, palette),
                EnsemblesDialog::ConfirmDelete => draw_confirm(
                    frame,
                    area,
                    "Delete ensembles",
                    &[
                        format!("Delete {} selected ensembles?", state.edit.selected_count()),
                        "Their articles are kept.".to_string(),
                    ],
                    palette,
                ),
            },
            Screen::ArticleDetail(state) => match &state.dialog {
                ArticleDetailDialog::None => {}
                ArticleDetailDialog::ConfirmDelete => draw_confirm(
                    frame,
                    area,
                    "Delete article",
                    &[format!(
                        "Delete article #{} and all of its images?",
                        state.article_id()
                    )],
                    palette,
                ),
                ArticleDetailDialog::ConfirmRemoveImages => {
                    let mut message = vec![format!(
                        "Remove {} selected images?",
                        state.edit.selected_count()
                    )];
                    if state.edit.selected_count() >= state.image_count() {
                        message.push("That is every image, so the article is deleted too.".into());
                    }
                    draw_confirm(frame, area, "Remove images", &message, palette)
                }
                ArticleDetailDialog::AddToEnsembles(list) => {
                    draw_checklist(frame, area, "Add to ensembles", list, ensemble_title, palette)
                }
            },
            Screen::EnsembleDetail(state) => match &state.dialog {
                EnsembleDetailDialog::None => {}
                EnsembleDetailDialog::ConfirmDelete => draw_confirm(
                    frame,
                    area,
                    "Delete ensemble",
                    &["Delete this ensemble? Its articles are kept.".to_string()],
                    palette,
                ),
                EnsembleDetailDialog::AddArticles(list) => {
                    draw_checklist(frame, area, "Add articles", list, article_label, palette)
                }
                EnsembleDetailDialog::RenameTitle(form) => {
                    draw_title_form(frame, area, "Rename ensemble", form, palette)
                }
            },
            Screen::Camera(state) => {
                if state.dialog == CameraDialog::PermissionDenied {
                    draw_confirm(
                        frame,
                        area,
                        "Permission denied",
                        &[format!(
                            "{} cannot be read. Check its permissions and try again.",
                            state.inbox().display()
                        )],
                        palette,
                    );
                }
            }
            Screen::AddArticle(state) => match &state.dialog {
                AddArticleDialog::None => {}
                AddArticleDialog::ConfirmExit => draw_confirm(
                    frame,
                    area,
                    "Stop adding",
                    &[
                        "Stop reviewing photos?".to_string(),
                        format!("{} images were saved so far.", state.saved()),
                    ],
                    palette,
                ),
                AddArticleDialog::AttachArticle(list) => {
                    draw_checklist(frame, area, "Attach to article", list, article_label, palette)
                }
            },
            Screen::Settings(state) => match state.dialog {
                SettingsDialog::None => {}
                SettingsDialog::ImageQualityAlert(quality) => draw_confirm(
                    frame,
                    area,
                    "Image quality",
                    &[
                        format!("Save new images at {} quality?", quality.label()),
                        "Higher quality images use more disk space.".to_string(),
                    ],
                    palette,
                ),
                SettingsDialog::ConfirmDeleteAllData => draw_confirm(
                    frame,
                    area,
                    "Delete all data",
                    &[
                        "Delete every article, ensemble and image?".to_string(),
                        "This cannot be undone.".to_string(),
                    ],
                    palette,
                ),
                SettingsDialog::About => draw_confirm(
                    frame,
                    area,
                    "About",
                    &[
                        format!("Merlinsbag {}", env!("CARGO_PKG_VERSION")),
                        format!("Data: {}", self.paths.data_dir.display()),
                        format!("Settings: {}", self.paths.config_file.display()),
                    ],
                    palette,
                ),
            },
            Screen::Statistics(_) => {}
        }
    }
}

fn review_lines(
    state: &AddArticleState,
    review: &Review,
    position: usize,
    total: usize,
    source_name: &str,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let target = match review.attach_to.or(state.target_article()) {
        Some(id) => format!("article #{id}"),
        None => "a new article".to_string(),
    };
    vec![
        Line::from(format!("Photo {position}/{total}")),
        Line::from(Span::styled(source_name.to_string(), palette.dim())),
        Line::from(""),
        Line::from(format!("Rotation:  {}\u{b0}", review.rotation.degrees())),
        Line::from(format!("Threshold: {:.1}", review.threshold)),
        Line::from(format!("Saves to:  {target}")),
        Line::from(""),
        Line::from(format!("Saved so far: {}", state.saved())),
    ]
}

fn ensemble_title(ensemble: &Ensemble) -> String {
    ensemble.title.clone()
}

fn article_label(article: &ArticleWithImages) -> String {
    format!("{} ({} images)", article.label(), article.image_count())
}

fn checklist_items<T>(list: &ChecklistState<T>, label: impl Fn(&T) -> String) -> Vec<ListItem<'static>> {
    list.items()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            ListItem::new(format!("{}{}", checkbox(list.is_checked(index)), label(item)))
        })
        .collect()
}

fn popup_block(title: &str, palette: &Palette) -> Block<'static> {
    Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .style(palette.base)
}

fn draw_confirm(frame: &mut Frame, area: Rect, title: &str, message: &[String], palette: &Palette) {
    let popup_area = centered_rect(60, 30, area);
    frame.render_widget(Clear, popup_area);

    let block = popup_block(title, palette);
    let mut lines: Vec<Line> = message.iter().map(|text| Line::from(text.clone())).collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press Y to confirm or N / Esc to cancel.",
        palette.dim(),
    )));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup_area);
}

fn draw_checklist<T>(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    list: &ChecklistState<T>,
    label: impl Fn(&T) -> String,
    palette: &Palette,
) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let title = format!("{title} ({} chosen)", list.checked_count());
    let widget = List::new(checklist_items(list, label))
        .block(popup_block(&title, palette))
        .highlight_style(palette.highlight().add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut list_state = ListState::default().with_selected(Some(list.cursor()));
    frame.render_stateful_widget(widget, popup_area, &mut list_state);
}

/// Form field line: yellow while focused, a dim placeholder while empty.
fn title_line(form: &TitleForm, active: bool, palette: &Palette) -> Line<'static> {
    let display = if form.title.is_empty() {
        "<required>".to_string()
    } else {
        form.title.clone()
    };
    let style = if active {
        palette.highlight()
    } else if form.title.is_empty() {
        palette.dim()
    } else {
        Style::default()
    };
    Line::from(vec![Span::raw(TITLE_PREFIX), Span::styled(display, style)])
}

fn form_message(error: Option<&String>, hint: &'static str, palette: &Palette) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(hint, palette.dim())),
    }
}

fn draw_title_form(frame: &mut Frame, area: Rect, title: &str, form: &TitleForm, palette: &Palette) {
    let popup_area = centered_rect(60, 30, area);
    frame.render_widget(Clear, popup_area);

    let block = popup_block(title, palette);
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let lines = vec![
        title_line(form, true, palette),
        Line::from(""),
        form_message(form.error.as_ref(), "Enter to save, Esc to cancel", palette),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
    frame.set_cursor_position((
        inner.x + TITLE_PREFIX.len() as u16 + form.value_len() as u16,
        inner.y,
    ));
}

fn draw_ensemble_form(frame: &mut Frame, area: Rect, form: &EnsembleForm, palette: &Palette) {
    let popup_area = centered_rect(70, 70, area);
    frame.render_widget(Clear, popup_area);

    let block = popup_block("New ensemble", palette);
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);

    let title_active = form.active == EnsembleField::Title;
    let lines = vec![
        title_line(&form.title, title_active, palette),
        form_message(
            form.title.error.as_ref(),
            "Tab to pick articles, Enter to create",
            palette,
        ),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), chunks[0]);

    let list_block = Block::default()
        .borders(Borders::TOP)
        .title(format!("Articles ({} chosen)", form.articles.checked_count()));
    if form.articles.is_empty() {
        frame.render_widget(
            Paragraph::new("No articles yet.").style(palette.dim()).block(list_block),
            chunks[1],
        );
    } else {
        let mut list = List::new(checklist_items(&form.articles, article_label)).block(list_block);
        if !title_active {
            list = list
                .highlight_style(palette.highlight().add_modifier(Modifier::BOLD))
                .highlight_symbol("> ");
        }
        let mut list_state = ListState::default().with_selected(Some(form.articles.cursor()));
        frame.render_stateful_widget(list, chunks[1], &mut list_state);
    }

    if title_active {
        frame.set_cursor_position((
            chunks[0].x + TITLE_PREFIX.len() as u16 + form.title.value_len() as u16,
            chunks[0].y,
        ));
    }
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::catalog::testing::swatch;
    use crate::catalog::Catalog;
    use crate::config::{ImageQuality, Paths, Settings};
    use crate::segmentation::ThresholdSegmenter;
    use crate::state::Route;
    use crate::worker::SegmentationWorker;

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::in_dir(dir.path());
        let catalog = Catalog::open(&paths).unwrap();
        let worker = SegmentationWorker::spawn(Box::new(ThresholdSegmenter::default())).unwrap();
        (dir, App::new(catalog, paths, Settings::default(), worker))
    }

    #[test]
    fn empty_catalog_shows_hint() {
        let (_dir, mut app) = app();
        app.tick(std::time::Instant::now()).unwrap();
        let screen = rendered(&app);
        assert!(screen.contains("No articles yet"));
        assert!(screen.contains("Articles"));
    }

    #[test]
    fn article_cards_are_labelled() {
        let (_dir, mut app) = app();
        let id = app.catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        app.tick(std::time::Instant::now()).unwrap();
        assert!(rendered(&app).contains(&format!("Article #{id}")));
    }

    #[test]
    fn settings_rows_show_values() {
        let (_dir, mut app) = app();
        app.open(Route::Settings).unwrap();
        let screen = rendered(&app);
        assert!(screen.contains("Image quality"));
        assert!(screen.contains("Standard"));
    }
}
