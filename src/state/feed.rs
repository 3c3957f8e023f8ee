use anyhow::Result;

/// The latest snapshot of some catalog query, tagged with the catalog
/// generation it was loaded at.
#[derive(Debug, Clone)]
pub struct Feed<T> {
    value: Option<T>,
    generation: Option<u64>,
}

impl<T> Default for Feed<T> {
    fn default() -> Self {
        Self {
            value: None,
            generation: None,
        }
    }
}

impl<T> Feed<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_stale(&self, generation: u64) -> bool {
        self.generation != Some(generation)
    }

    /// Reload through `load` when the snapshot predates `generation`. Returns
    /// whether a reload happened. A failed load keeps the old snapshot and
    /// stays stale.
    pub fn refresh(&mut self, generation: u64, load: impl FnOnce() -> Result<T>) -> Result<bool> {
        if !self.is_stale(generation) {
            return Ok(false);
        }
        let value = load()?;
        self.value = Some(value);
        self.generation = Some(generation);
        Ok(true)
    }

    /// Force the next refresh to reload, e.g. after the query itself changed.
    pub fn invalidate(&mut self) {
        self.generation = None;
    }
}
