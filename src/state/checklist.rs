use std::collections::BTreeSet;

use super::step;

/// A cursor plus checked rows over a fixed list, used by picker dialogs.
#[derive(Debug, Clone)]
pub struct ChecklistState<T> {
    items: Vec<T>,
    checked: BTreeSet<usize>,
    cursor: usize,
}

impl<T> ChecklistState<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            checked: BTreeSet::new(),
            cursor: 0,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&T> {
        self.items.get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = step(self.cursor, self.items.len(), delta);
    }

    pub fn toggle(&mut self) {
        if self.cursor >= self.items.len() {
            return;
        }
        if !self.checked.remove(&self.cursor) {
            self.checked.insert(self.cursor);
        }
    }

    pub fn check_all(&mut self) {
        self.checked = (0..self.items.len()).collect();
    }

    pub fn is_checked(&self, index: usize) -> bool {
        self.checked.contains(&index)
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }

    /// Checked items in list order.
    pub fn checked(&self) -> Vec<&T> {
        self.checked
            .iter()
            .filter_map(|index| self.items.get(*index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_follow_the_cursor() {
        let mut list = ChecklistState::new(vec!["a", "b", "c"]);
        list.toggle();
        list.move_cursor(2);
        list.toggle();
        assert_eq!(list.checked(), vec![&"a", &"c"]);

        list.toggle();
        assert_eq!(list.checked(), vec![&"a"]);
        list.move_cursor(10);
        assert_eq!(list.current(), Some(&"c"));
    }

    #[test]
    fn empty_list_ignores_toggles() {
        let mut list: ChecklistState<u8> = ChecklistState::new(Vec::new());
        list.toggle();
        list.move_cursor(1);
        assert_eq!(list.checked_count(), 0);
        assert!(list.current().is_none());
    }
}
