//! Edit mode shared by every multi-select screen.
//!
//! `Disabled` is plain browsing. `EnabledGeneral` shows edit controls with
//! nothing selected. `EnabledSelectedItems` always has at least one selected
//! key; removing the last one falls back to `EnabledGeneral`, never to
//! `Disabled`.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Disabled,
    EnabledGeneral,
    EnabledSelectedItems,
}

#[derive(Debug, Clone)]
pub struct EditState<K: Ord + Copy> {
    mode: EditMode,
    selected: BTreeSet<K>,
}

impl<K: Ord + Copy> Default for EditState<K> {
    fn default() -> Self {
        Self {
            mode: EditMode::Disabled,
            selected: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Copy> EditState<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != EditMode::Disabled
    }

    pub fn is_selected(&self, key: &K) -> bool {
        self.selected.contains(key)
    }

    /// Selected keys in ascending order.
    pub fn selected(&self) -> Vec<K> {
        self.selected.iter().copied().collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Start selecting with exactly `key`. While already selecting this
    /// behaves like [`tap`](Self::tap).
    pub fn long_press(&mut self, key: K) {
        if self.mode == EditMode::EnabledSelectedItems {
            self.tap(key);
            return;
        }
        self.selected.clear();
        self.selected.insert(key);
        self.mode = EditMode::EnabledSelectedItems;
    }

    /// The edit button: show edit controls without selecting anything.
    pub fn enable(&mut self) {
        self.selected.clear();
        self.mode = EditMode::EnabledGeneral;
    }

    /// Toggle `key` in edit mode. Returns `false` when edit mode is off and the
    /// tap should be treated as navigation instead.
    pub fn tap(&mut self, key: K) -> bool {
        match self.mode {
            EditMode::Disabled => false,
            EditMode::EnabledGeneral => {
                self.selected.insert(key);
                self.mode = EditMode::EnabledSelectedItems;
                true
            }
            EditMode::EnabledSelectedItems => {
                if !self.selected.remove(&key) {
                    self.selected.insert(key);
                }
                self.settle();
                true
            }
        }
    }

    /// Select every key at once; an empty iterator changes nothing.
    pub fn select_all(&mut self, keys: impl IntoIterator<Item = K>) {
        let keys: BTreeSet<K> = keys.into_iter().collect();
        if keys.is_empty() {
            return;
        }
        self.selected = keys;
        self.mode = EditMode::EnabledSelectedItems;
    }

    /// Cancel the selection but stay in edit mode.
    pub fn clear_selection(&mut self) {
        if self.mode == EditMode::Disabled {
            return;
        }
        self.selected.clear();
        self.mode = EditMode::EnabledGeneral;
    }

    /// Leave edit mode entirely.
    pub fn disable(&mut self) {
        self.selected.clear();
        self.mode = EditMode::Disabled;
    }

    /// Forget selected keys that no longer exist.
    pub fn retain(&mut self, exists: impl Fn(&K) -> bool) {
        self.selected.retain(|key| exists(key));
        self.settle();
    }

    fn settle(&mut self) {
        if self.mode == EditMode::EnabledSelectedItems && self.selected.is_empty() {
            self.mode = EditMode::EnabledGeneral;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disabled_and_taps_are_not_consumed() {
        let mut edit = EditState::<i64>::new();
        assert_eq!(edit.mode(), EditMode::Disabled);
        assert!(!edit.tap(1));
        assert!(!edit.has_selection());
    }

    #[test]
    fn long_press_selects_exactly_one() {
        let mut edit = EditState::new();
        edit.long_press(7);
        assert_eq!(edit.mode(), EditMode::EnabledSelectedItems);
        assert_eq!(edit.selected(), vec![7]);

        edit.long_press(9);
        assert_eq!(edit.selected(), vec![7, 9]);
    }

    #[test]
    fn deselecting_last_item_returns_to_general() {
        let mut edit = EditState::new();
        edit.long_press(3);
        assert!(edit.tap(3));
        assert_eq!(edit.mode(), EditMode::EnabledGeneral);
        assert!(!edit.has_selection());
    }

    #[test]
    fn tap_in_general_mode_starts_selection() {
        let mut edit = EditState::new();
        edit.enable();
        assert_eq!(edit.mode(), EditMode::EnabledGeneral);
        assert!(edit.tap(4));
        assert_eq!(edit.mode(), EditMode::EnabledSelectedItems);
    }

    #[test]
    fn clear_and_disable() {
        let mut edit = EditState::new();
        edit.select_all([1, 2, 3]);
        edit.clear_selection();
        assert_eq!(edit.mode(), EditMode::EnabledGeneral);
        edit.disable();
        assert_eq!(edit.mode(), EditMode::Disabled);

        edit.clear_selection();
        assert_eq!(edit.mode(), EditMode::Disabled);
    }

    #[test]
    fn retain_drops_missing_keys() {
        let mut edit = EditState::new();
        edit.select_all([1, 2]);
        edit.retain(|k| *k == 2);
        assert_eq!(edit.selected(), vec![2]);
        edit.retain(|_| false);
        assert_eq!(edit.mode(), EditMode::EnabledGeneral);
    }
}
