use anyhow::Result;

use crate::catalog::Catalog;
use crate::models::CatalogStatistics;

use super::Feed;

/// Read-only catalog summary. No dialogs.
#[derive(Debug, Default)]
pub struct StatisticsState {
    feed: Feed<CatalogStatistics>,
}

impl StatisticsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, catalog: &Catalog) -> Result<()> {
        self.feed
            .refresh(catalog.generation(), || catalog.statistics())?;
        Ok(())
    }

    pub fn statistics(&self) -> Option<&CatalogStatistics> {
        self.feed.get()
    }
}
