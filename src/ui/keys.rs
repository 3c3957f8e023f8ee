//! Key bindings per screen. Each handler forwards a key to the screen's state
//! holder, routing it to the open dialog first, and returns the holder's
//! [`Reaction`] for the app to apply.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use crossterm::event::KeyCode;

use crate::catalog::Catalog;
use crate::state::{
    AddArticleDialog, AddArticleState, ArticleDetailDialog, ArticleDetailState, ArticlesDialog,
    ArticlesState, CameraDialog, CameraState, ChecklistState, EditState, EnsembleDetailDialog,
    EnsembleDetailState, EnsembleField, EnsembleForm, EnsemblesDialog, EnsemblesState, Notice,
    Reaction, Route, SettingsDialog, SettingsState, Stage, TitleForm,
};

/// How a dialog took a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DialogKey {
    Confirm,
    Dismiss,
    Handled,
}

pub(super) fn confirm_key(code: KeyCode) -> DialogKey {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => DialogKey::Confirm,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => DialogKey::Dismiss,
        _ => DialogKey::Handled,
    }
}

pub(super) fn checklist_key<T>(list: &mut ChecklistState<T>, code: KeyCode) -> DialogKey {
    match code {
        KeyCode::Up => list.move_cursor(-1),
        KeyCode::Down => list.move_cursor(1),
        KeyCode::PageUp => list.move_cursor(-5),
        KeyCode::PageDown => list.move_cursor(5),
        KeyCode::Char(' ') => list.toggle(),
        KeyCode::Char('*') => list.check_all(),
        KeyCode::Enter => return DialogKey::Confirm,
        KeyCode::Esc => return DialogKey::Dismiss,
        _ => {}
    }
    DialogKey::Handled
}

pub(super) fn title_key(form: &mut TitleForm, code: KeyCode) -> DialogKey {
    match code {
        KeyCode::Enter => return DialogKey::Confirm,
        KeyCode::Esc => return DialogKey::Dismiss,
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(ch) => {
            form.push_char(ch);
        }
        _ => {}
    }
    DialogKey::Handled
}

fn ensemble_form_key(form: &mut EnsembleForm, code: KeyCode) -> DialogKey {
    match (code, form.active) {
        (KeyCode::Tab | KeyCode::BackTab, _) => {
            form.toggle_field();
            DialogKey::Handled
        }
        (_, EnsembleField::Title) => title_key(&mut form.title, code),
        (_, EnsembleField::Articles) => checklist_key(&mut form.articles, code),
    }
}

/// Edit button: toggles edit mode without selecting anything.
fn toggle_edit<K: Ord + Copy>(edit: &mut EditState<K>) {
    if edit.is_enabled() {
        edit.disable();
    } else {
        edit.enable();
    }
}

/// Hand a file or folder to the system viewer.
pub(super) fn open_path(path: &Path) -> Reaction {
    match open::that(path) {
        Ok(()) => Reaction::notice(Notice::info(format!("Opened {}.", path.display()))),
        Err(err) => Reaction::notice(Notice::error(format!(
            "Failed to open {}: {err}",
            path.display()
        ))),
    }
}

pub(super) fn articles(
    state: &mut ArticlesState,
    catalog: &mut Catalog,
    columns: isize,
    code: KeyCode,
) -> Result<Reaction> {
    match &mut state.dialog {
        ArticlesDialog::None => {}
        ArticlesDialog::ConfirmDelete => {
            return match confirm_key(code) {
                DialogKey::Confirm => state.confirm_delete(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        ArticlesDialog::AddToEnsembles(list) => {
            return match checklist_key(list, code) {
                DialogKey::Confirm => state.confirm_add_to_ensembles(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
    }

    match code {
        KeyCode::Left => state.move_cursor(-1),
        KeyCode::Right => state.move_cursor(1),
        KeyCode::Up => state.move_cursor(-columns),
        KeyCode::Down => state.move_cursor(columns),
        KeyCode::Enter => return Ok(state.tap_current()),
        KeyCode::Char(' ') => state.long_press_current(),
        KeyCode::Char('e') => toggle_edit(&mut state.edit),
        KeyCode::Char('*') => {
            let ids: Vec<i64> = state.articles().iter().map(|a| a.article_id).collect();
            state.edit.select_all(ids);
        }
        KeyCode::Char('c') => return Ok(state.start_capture()),
        KeyCode::Char('d') | KeyCode::Delete => return Ok(state.request_delete()),
        KeyCode::Char('n') => return state.open_add_to_ensembles(catalog),
        KeyCode::Char('o') => {
            if let Some(path) = state.current().and_then(|a| a.images.first()) {
                return Ok(open_path(&path));
            }
        }
        KeyCode::Esc => state.edit.disable(),
        _ => {}
    }
    Ok(Reaction::none())
}

pub(super) fn ensembles(
    state: &mut EnsemblesState,
    catalog: &mut Catalog,
    searching: &mut bool,
    now: Instant,
    code: KeyCode,
) -> Result<Reaction> {
    match &mut state.dialog {
        EnsemblesDialog::None => {}
        EnsemblesDialog::AddEnsemble(form) => {
            return match ensemble_form_key(form, code) {
                DialogKey::Confirm => state.submit_add(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        EnsemblesDialog::ConfirmDelete => {
            return match confirm_key(code) {
                DialogKey::Confirm => state.confirm_delete(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
    }

    if *searching {
        match code {
            KeyCode::Char(ch) => state.push_query_char(ch, now),
            KeyCode::Backspace => state.pop_query_char(now),
            KeyCode::Up => state.move_cursor(-1),
            KeyCode::Down => state.move_cursor(1),
            KeyCode::Enter => *searching = false,
            KeyCode::Esc => {
                state.clear_query();
                *searching = false;
            }
            _ => {}
        }
        return Ok(Reaction::none());
    }

    match code {
        KeyCode::Up | KeyCode::Left => state.move_cursor(-1),
        KeyCode::Down | KeyCode::Right => state.move_cursor(1),
        KeyCode::Enter => return Ok(state.tap_current()),
        KeyCode::Char(' ') => state.long_press_current(),
        KeyCode::Char('/') | KeyCode::Char('f') => *searching = true,
        KeyCode::Char('e') => toggle_edit(&mut state.edit),
        KeyCode::Char('*') => {
            let ids: Vec<i64> = state.ensembles().iter().map(|e| e.ensemble.id).collect();
            state.edit.select_all(ids);
        }
        KeyCode::Char('+') | KeyCode::Char('n') => state.open_add_dialog(catalog)?,
        KeyCode::Char('d') | KeyCode::Delete => return Ok(state.request_delete()),
        KeyCode::Esc => {
            if state.edit.is_enabled() {
                state.edit.disable();
            } else {
                state.clear_query();
            }
        }
        _ => {}
    }
    Ok(Reaction::none())
}

pub(super) fn article_detail(
    state: &mut ArticleDetailState,
    catalog: &mut Catalog,
    code: KeyCode,
) -> Result<Reaction> {
    match &mut state.dialog {
        ArticleDetailDialog::None => {}
        ArticleDetailDialog::ConfirmDelete => {
            return match confirm_key(code) {
                DialogKey::Confirm => state.confirm_delete(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        ArticleDetailDialog::ConfirmRemoveImages => {
            return match confirm_key(code) {
                DialogKey::Confirm => state.confirm_remove_images(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        ArticleDetailDialog::AddToEnsembles(list) => {
            return match checklist_key(list, code) {
                DialogKey::Confirm => state.confirm_add_to_ensembles(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
    }

    match code {
        KeyCode::Left => state.previous_image(),
        KeyCode::Right => state.next_image(),
        KeyCode::Up => state.move_ensemble_cursor(-1),
        KeyCode::Down => state.move_ensemble_cursor(1),
        KeyCode::Char(' ') => state.long_press_current_image(),
        KeyCode::Enter => {
            if state.edit.is_enabled() {
                state.tap_current_image();
            } else if let Some(path) = state.current_image_path() {
                return Ok(open_path(&path));
            }
        }
        KeyCode::Char('e') => toggle_edit(&mut state.edit),
        KeyCode::Char('*') => state.select_all_images(),
        KeyCode::Char('i') => return Ok(state.add_images()),
        KeyCode::Char('x') => return Ok(state.request_remove_images()),
        KeyCode::Char('d') | KeyCode::Delete => state.request_delete(),
        KeyCode::Char('n') => return state.open_add_to_ensembles(catalog),
        KeyCode::Char('r') => return state.remove_from_current_ensemble(catalog),
        KeyCode::Char('g') => {
            let cursor = state.ensemble_cursor();
            if let Some(ensemble) = state.detail().and_then(|d| d.ensembles.get(cursor)) {
                return Ok(Reaction::navigate(Route::EnsembleDetail {
                    ensemble_id: ensemble.id,
                }));
            }
        }
        KeyCode::Esc => {
            if state.edit.is_enabled() {
                state.edit.disable();
            } else {
                return Ok(Reaction::back());
            }
        }
        _ => {}
    }
    Ok(Reaction::none())
}

pub(super) fn ensemble_detail(
    state: &mut EnsembleDetailState,
    catalog: &mut Catalog,
    columns: isize,
    code: KeyCode,
) -> Result<Reaction> {
    match &mut state.dialog {
        EnsembleDetailDialog::None => {}
        EnsembleDetailDialog::ConfirmDelete => {
            return match confirm_key(code) {
                DialogKey::Confirm => state.confirm_delete(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        EnsembleDetailDialog::AddArticles(list) => {
            return match checklist_key(list, code) {
                DialogKey::Confirm => state.confirm_add_articles(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        EnsembleDetailDialog::RenameTitle(form) => {
            return match title_key(form, code) {
                DialogKey::Confirm => state.submit_rename(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
    }

    match code {
        KeyCode::Left => state.move_cursor(-1),
        KeyCode::Right => state.move_cursor(1),
        KeyCode::Up => state.move_cursor(-columns),
        KeyCode::Down => state.move_cursor(columns),
        KeyCode::Enter => return Ok(state.tap_current()),
        KeyCode::Char(' ') => state.long_press_current(),
        KeyCode::Char('e') => toggle_edit(&mut state.edit),
        KeyCode::Char('*') => {
            let ids: Vec<i64> = state.articles().iter().map(|a| a.article_id).collect();
            state.edit.select_all(ids);
        }
        KeyCode::Char('+') | KeyCode::Char('n') => return Ok(state.open_add_articles()),
        KeyCode::Char('x') => return state.remove_selected(catalog),
        KeyCode::Char('r') => state.open_rename(),
        KeyCode::Char('d') | KeyCode::Delete => state.request_delete(),
        KeyCode::Esc => {
            if state.edit.is_enabled() {
                state.edit.disable();
            } else {
                return Ok(Reaction::back());
            }
        }
        _ => {}
    }
    Ok(Reaction::none())
}

/// `rescanned` is set when the inbox listing was reloaded so cached previews
/// can be dropped.
pub(super) fn camera(
    state: &mut CameraState,
    rescanned: &mut bool,
    code: KeyCode,
) -> Result<Reaction> {
    if state.dialog == CameraDialog::PermissionDenied {
        if matches!(code, KeyCode::Enter | KeyCode::Esc) {
            state.dismiss_dialog();
            return Ok(Reaction::back());
        }
        return Ok(Reaction::none());
    }

    match code {
        KeyCode::Up => state.photos.move_cursor(-1),
        KeyCode::Down => state.photos.move_cursor(1),
        KeyCode::PageUp => state.photos.move_cursor(-5),
        KeyCode::PageDown => state.photos.move_cursor(5),
        KeyCode::Char(' ') => state.photos.toggle(),
        KeyCode::Char('*') => state.photos.check_all(),
        KeyCode::Enter => return Ok(state.confirm()),
        KeyCode::Char('r') => {
            *rescanned = true;
            return state.scan();
        }
        KeyCode::Char('o') => return Ok(open_path(state.inbox())),
        KeyCode::Esc => return Ok(Reaction::back()),
        _ => {}
    }
    Ok(Reaction::none())
}

pub(super) fn add_article(
    state: &mut AddArticleState,
    catalog: &mut Catalog,
    code: KeyCode,
) -> Result<Reaction> {
    match &mut state.dialog {
        AddArticleDialog::None => {}
        AddArticleDialog::ConfirmExit => {
            return Ok(match confirm_key(code) {
                DialogKey::Confirm => state.confirm_exit(),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Reaction::none()
                }
                DialogKey::Handled => Reaction::none(),
            });
        }
        AddArticleDialog::AttachArticle(list) => {
            return Ok(match checklist_key(list, code) {
                DialogKey::Confirm => state.confirm_attach(),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Reaction::none()
                }
                DialogKey::Handled => Reaction::none(),
            });
        }
    }

    if code == KeyCode::Esc {
        if state.is_finished() {
            return Ok(Reaction::back());
        }
        state.request_exit();
        return Ok(Reaction::none());
    }
    if !matches!(state.stage(), Stage::Reviewing(_)) {
        return Ok(Reaction::none());
    }

    match code {
        KeyCode::Enter | KeyCode::Char('s') => return state.save(catalog),
        KeyCode::Char('x') | KeyCode::Delete => return Ok(state.discard()),
        KeyCode::Char('r') => state.rotate_clockwise(),
        KeyCode::Char('R') => state.rotate_counter_clockwise(),
        KeyCode::Char('+') | KeyCode::Char('=') => state.tighten(),
        KeyCode::Char('-') => state.broaden(),
        KeyCode::Char('a') => return state.open_attach(catalog),
        KeyCode::Char('n') => state.clear_attach(),
        _ => {}
    }
    Ok(Reaction::none())
}

pub(super) fn settings(
    state: &mut SettingsState,
    catalog: &mut Catalog,
    code: KeyCode,
) -> Result<Reaction> {
    match state.dialog {
        SettingsDialog::None => {}
        SettingsDialog::ImageQualityAlert(_) => {
            return match confirm_key(code) {
                DialogKey::Confirm => state.confirm_quality_alert(),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        SettingsDialog::ConfirmDeleteAllData => {
            return match confirm_key(code) {
                DialogKey::Confirm => state.confirm_delete_all(catalog),
                DialogKey::Dismiss => {
                    state.dismiss_dialog();
                    Ok(Reaction::none())
                }
                DialogKey::Handled => Ok(Reaction::none()),
            };
        }
        SettingsDialog::About => {
            if matches!(code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                state.dismiss_dialog();
            }
            return Ok(Reaction::none());
        }
    }

    match code {
        KeyCode::Up => state.move_cursor(-1),
        KeyCode::Down => state.move_cursor(1),
        KeyCode::Left => return state.adjust(-1),
        KeyCode::Right => return state.adjust(1),
        KeyCode::Enter => return state.activate(),
        _ => {}
    }
    Ok(Reaction::none())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::testing::{catalog, swatch};
    use crate::config::ImageQuality;
    use crate::state::{EditMode, Navigation, SEARCH_DEBOUNCE};

    #[test]
    fn confirm_keys() {
        assert_eq!(confirm_key(KeyCode::Char('y')), DialogKey::Confirm);
        assert_eq!(confirm_key(KeyCode::Esc), DialogKey::Dismiss);
        assert_eq!(confirm_key(KeyCode::Char('z')), DialogKey::Handled);
    }

    #[test]
    fn title_form_takes_typing() {
        let mut form = TitleForm::default();
        for ch in "Gym".chars() {
            assert_eq!(title_key(&mut form, KeyCode::Char(ch)), DialogKey::Handled);
        }
        title_key(&mut form, KeyCode::Backspace);
        assert_eq!(form.title, "Gy");
        assert_eq!(title_key(&mut form, KeyCode::Enter), DialogKey::Confirm);
    }

    #[test]
    fn space_then_delete_removes_article() {
        let (_dir, mut catalog) = catalog();
        catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        let mut state = ArticlesState::new();
        state.refresh(&catalog).unwrap();

        articles(&mut state, &mut catalog, 4, KeyCode::Char(' ')).unwrap();
        assert_eq!(state.edit.mode(), EditMode::EnabledSelectedItems);
        articles(&mut state, &mut catalog, 4, KeyCode::Char('d')).unwrap();
        assert!(matches!(state.dialog, ArticlesDialog::ConfirmDelete));
        articles(&mut state, &mut catalog, 4, KeyCode::Char('y')).unwrap();

        state.refresh(&catalog).unwrap();
        assert!(state.articles().is_empty());
        assert_eq!(state.edit.mode(), EditMode::Disabled);
    }

    #[test]
    fn enter_opens_article_outside_edit_mode() {
        let (_dir, mut catalog) = catalog();
        let id = catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        let mut state = ArticlesState::new();
        state.refresh(&catalog).unwrap();

        let reaction = articles(&mut state, &mut catalog, 4, KeyCode::Enter).unwrap();
        assert_eq!(
            reaction.navigation,
            Some(Navigation::To(Route::ArticleDetail { article_id: id }))
        );
    }

    #[test]
    fn search_mode_captures_typing() {
        let (_dir, mut catalog) = catalog();
        catalog.create_ensemble("Rainy day", &[]).unwrap();
        catalog.create_ensemble("Beach", &[]).unwrap();
        let mut state = EnsemblesState::new();
        state.refresh(&catalog).unwrap();
        let mut searching = false;
        let start = Instant::now();

        ensembles(&mut state, &mut catalog, &mut searching, start, KeyCode::Char('/')).unwrap();
        assert!(searching);
        for ch in "rain".chars() {
            ensembles(&mut state, &mut catalog, &mut searching, start, KeyCode::Char(ch))
                .unwrap();
        }
        assert_eq!(state.query(), "rain");

        state.tick(start + SEARCH_DEBOUNCE + Duration::from_millis(1));
        state.refresh(&catalog).unwrap();
        assert_eq!(state.ensembles().len(), 1);

        ensembles(&mut state, &mut catalog, &mut searching, start, KeyCode::Esc).unwrap();
        assert!(!searching);
        assert_eq!(state.query(), "");
    }

    #[test]
    fn ensemble_form_switches_focus_with_tab() {
        let (_dir, mut catalog) = catalog();
        let article = catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        let mut state = EnsemblesState::new();
        state.refresh(&catalog).unwrap();
        let mut searching = false;
        let now = Instant::now();

        for code in [
            KeyCode::Char('+'),
            KeyCode::Char('W'),
            KeyCode::Tab,
            KeyCode::Char(' '),
            KeyCode::Enter,
        ] {
            ensembles(&mut state, &mut catalog, &mut searching, now, code).unwrap();
        }

        assert!(matches!(state.dialog, EnsemblesDialog::None));
        let created = catalog.search_ensembles("W").unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(
            catalog.ensemble_articles(created[0].ensemble.id).unwrap()[0].article_id,
            article
        );
    }

    #[test]
    fn detail_escape_leaves_edit_mode_before_navigating() {
        let (_dir, mut catalog) = catalog();
        let id = catalog.add_article(&swatch(), ImageQuality::Low).unwrap();
        let mut state = ArticleDetailState::new(id);
        state.refresh(&catalog).unwrap();

        article_detail(&mut state, &mut catalog, KeyCode::Char(' ')).unwrap();
        let first = article_detail(&mut state, &mut catalog, KeyCode::Esc).unwrap();
        assert!(first.navigation.is_none());
        let second = article_detail(&mut state, &mut catalog, KeyCode::Esc).unwrap();
        assert_eq!(second.navigation, Some(Navigation::Back));
    }
}
