//! The repository the screens talk to. It pairs the SQLite connection with
//! the image store, turns rows into read models, and counts writes so that
//! screens can tell when their snapshot is out of date.

use anyhow::{Context, Result};
use chrono::Utc;
use image::RgbaImage;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::{ImageQuality, Paths};
use crate::db::{self, ImageRemoval};
use crate::models::{ArticleWithImages, CatalogStatistics, Ensemble, EnsembleSummary};
use crate::storage::ImageStore;

/// How many article thumbnails an ensemble card previews.
pub const ENSEMBLE_PREVIEW_LIMIT: usize = 4;
/// How many ensembles the statistics screen ranks.
pub const POPULAR_ENSEMBLE_LIMIT: usize = 3;

pub struct Catalog {
    conn: Connection,
    store: ImageStore,
    generation: u64,
}

impl Catalog {
    pub fn open(paths: &Paths) -> Result<Self> {
        let conn = db::open_database(&paths.database_file())?;
        let store = ImageStore::open(paths)?;
        Ok(Self::from_parts(conn, store))
    }

    /// Wrap an existing connection (schema already ensured) and store.
    pub fn from_parts(conn: Connection, store: ImageStore) -> Self {
        Self {
            conn,
            store,
            generation: 0,
        }
    }

    /// Bumped by every write. Snapshots taken at an older generation may be
    /// stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    // Reads.

    pub fn articles(&self) -> Result<Vec<ArticleWithImages>> {
        let rows = db::fetch_articles_with_images(&self.conn)?;
        Ok(rows.into_iter().map(|row| self.store.resolve(row)).collect())
    }

    pub fn article(&self, article_id: i64) -> Result<Option<ArticleWithImages>> {
        let row = db::fetch_article_with_images(&self.conn, article_id)?;
        Ok(row.map(|row| self.store.resolve(row)))
    }

    pub fn ensembles(&self) -> Result<Vec<EnsembleSummary>> {
        let ensembles = db::fetch_ensembles(&self.conn)?;
        self.summarize(ensembles)
    }

    /// Ensembles whose title matches `query`; a blank query lists them all.
    pub fn search_ensembles(&self, query: &str) -> Result<Vec<EnsembleSummary>> {
        if query.trim().is_empty() {
            return self.ensembles();
        }
        let ensembles = db::search_ensembles(&self.conn, query)?;
        self.summarize(ensembles)
    }

    pub fn ensemble(&self, ensemble_id: i64) -> Result<Option<Ensemble>> {
        db::fetch_ensemble(&self.conn, ensemble_id)
    }

    pub fn ensemble_articles(&self, ensemble_id: i64) -> Result<Vec<ArticleWithImages>> {
        let rows = db::fetch_articles_in_ensemble(&self.conn, ensemble_id)?;
        Ok(rows.into_iter().map(|row| self.store.resolve(row)).collect())
    }

    pub fn articles_not_in_ensemble(&self, ensemble_id: i64) -> Result<Vec<ArticleWithImages>> {
        let rows = db::fetch_articles_not_in_ensemble(&self.conn, ensemble_id)?;
        Ok(rows.into_iter().map(|row| self.store.resolve(row)).collect())
    }

    pub fn ensembles_for_article(&self, article_id: i64) -> Result<Vec<Ensemble>> {
        db::fetch_ensembles_for_article(&self.conn, article_id)
    }

    pub fn ensembles_without_article(&self, article_id: i64) -> Result<Vec<Ensemble>> {
        db::fetch_ensembles_without_article(&self.conn, article_id)
    }

    pub fn statistics(&self) -> Result<CatalogStatistics> {
        let counts = db::fetch_counts(&self.conn)?;
        let popular_ensembles = db::fetch_popular_ensembles(&self.conn, POPULAR_ENSEMBLE_LIMIT)?;
        let article_with_most_images = db::fetch_article_with_most_images(&self.conn)?;
        let article_in_most_ensembles = db::fetch_article_in_most_ensembles(&self.conn)?;
        let storage_bytes = self.store.storage_bytes()?;
        Ok(CatalogStatistics {
            counts,
            popular_ensembles,
            article_with_most_images,
            article_in_most_ensembles,
            storage_bytes,
        })
    }

    fn summarize(&self, ensembles: Vec<Ensemble>) -> Result<Vec<EnsembleSummary>> {
        let mut previews =
            db::fetch_ensemble_preview_filenames(&self.conn, ENSEMBLE_PREVIEW_LIMIT)?;
        Ok(ensembles
            .into_iter()
            .map(|ensemble| {
                let filenames = previews.remove(&ensemble.id).unwrap_or_default();
                EnsembleSummary {
                    ensemble,
                    previews: self.store.thumbnails(filenames),
                }
            })
            .collect())
    }

    // Writes.

    /// Store `image` as the first image of a brand new article.
    pub fn add_article(&mut self, image: &RgbaImage, quality: ImageQuality) -> Result<i64> {
        let filename = self.store.write(image, quality)?;
        match db::insert_article(&self.conn, &filename, now()) {
            Ok((article_id, _)) => {
                self.touch();
                info!(article_id, %filename, "article created");
                Ok(article_id)
            }
            Err(err) => {
                self.store.remove(&[filename]);
                Err(err)
            }
        }
    }

    /// Store `image` as an additional image of an existing article.
    pub fn add_article_image(
        &mut self,
        article_id: i64,
        image: &RgbaImage,
        quality: ImageQuality,
    ) -> Result<i64> {
        let filename = self.store.write(image, quality)?;
        match db::insert_article_image(&self.conn, article_id, &filename, now()) {
            Ok(image_id) => {
                self.touch();
                info!(article_id, image_id, %filename, "article image added");
                Ok(image_id)
            }
            Err(err) => {
                self.store.remove(&[filename]);
                Err(err)
            }
        }
    }

    pub fn delete_articles(&mut self, article_ids: &[i64]) -> Result<usize> {
        let removal = db::delete_articles(&self.conn, article_ids)?;
        self.touch();
        self.store.remove(&removal.filenames);
        info!(
            deleted = removal.deleted,
            files = removal.filenames.len(),
            "articles deleted"
        );
        Ok(removal.deleted)
    }

    /// Remove images from an article; removing all of them deletes it.
    pub fn delete_article_images(
        &mut self,
        article_id: i64,
        image_ids: &[i64],
    ) -> Result<ImageRemoval> {
        let removal = db::delete_article_images(&self.conn, article_id, image_ids, now())?;
        self.touch();
        self.store.remove(&removal.filenames);
        info!(
            article_id,
            removed = removal.filenames.len(),
            article_deleted = removal.article_deleted,
            "article images removed"
        );
        Ok(removal)
    }

    pub fn create_ensemble(&mut self, title: &str, article_ids: &[i64]) -> Result<Ensemble> {
        let ensemble = db::insert_ensemble(&self.conn, title, article_ids, now())?;
        self.touch();
        info!(ensemble_id = ensemble.id, title = %ensemble.title, articles = article_ids.len(), "ensemble created");
        Ok(ensemble)
    }

    pub fn rename_ensemble(&mut self, ensemble_id: i64, title: &str) -> Result<()> {
        db::update_ensemble_title(&self.conn, ensemble_id, title, now())?;
        self.touch();
        info!(ensemble_id, "ensemble renamed");
        Ok(())
    }

    pub fn delete_ensembles(&mut self, ensemble_ids: &[i64]) -> Result<usize> {
        let deleted = db::delete_ensembles(&self.conn, ensemble_ids)?;
        self.touch();
        info!(deleted, "ensembles deleted");
        Ok(deleted)
    }

    pub fn add_articles_to_ensemble(&mut self, ensemble_id: i64, article_ids: &[i64]) -> Result<usize> {
        let linked = db::add_articles_to_ensemble(&self.conn, ensemble_id, article_ids, now())?;
        self.touch();
        Ok(linked)
    }

    pub fn add_article_to_ensembles(&mut self, article_id: i64, ensemble_ids: &[i64]) -> Result<usize> {
        let linked = db::add_article_to_ensembles(&self.conn, article_id, ensemble_ids, now())?;
        self.touch();
        Ok(linked)
    }

    pub fn remove_articles_from_ensemble(
        &mut self,
        ensemble_id: i64,
        article_ids: &[i64],
    ) -> Result<usize> {
        let removed = db::remove_articles_from_ensemble(&self.conn, ensemble_id, article_ids, now())?;
        self.touch();
        Ok(removed)
    }

    /// Wipe every row and every stored image.
    pub fn delete_all_data(&mut self) -> Result<()> {
        let filenames = db::fetch_all_filenames(&self.conn)?;
        db::delete_everything(&self.conn).context("failed to wipe catalog")?;
        self.touch();
        self.store.remove(&filenames);
        warn!(files = filenames.len(), "all catalog data deleted");
        Ok(())
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A catalog on an in-memory database with images under a temp dir.
    pub(crate) fn catalog() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ImageStore::open(&Paths::in_dir(dir.path())).expect("image store");
        (dir, Catalog::from_parts(db::test_connection(), store))
    }

    pub(crate) fn swatch() -> RgbaImage {
        RgbaImage::from_pixel(8, 8, image::Rgba([40, 90, 160, 255]))
    }
}
