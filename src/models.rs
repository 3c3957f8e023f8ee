//! Domain models that mirror the SQLite schema and the read models the
//! screens consume. Rows coming out of the `db` layer only know filenames;
//! the catalog pairs them with the image store directories through
//! `LazyImagePaths` so full paths are built on demand.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// One extracted image belonging to an article. The filename is shared by
/// the full-resolution file and its thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleImage {
    pub id: i64,
    pub article_id: i64,
    pub filename: String,
}

/// Raw grouping of an article and its images as returned by the queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleImages {
    pub article_id: i64,
    pub images: Vec<ArticleImage>,
}

impl ArticleImages {
    pub fn filenames(&self) -> Vec<String> {
        self.images.iter().map(|image| image.filename.clone()).collect()
    }

    pub fn image_ids(&self) -> Vec<i64> {
        self.images.iter().map(|image| image.id).collect()
    }
}

/// A user-named collection of articles (an outfit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensemble {
    pub id: i64,
    pub title: String,
    pub created: i64,
    pub modified: i64,
}

impl fmt::Display for Ensemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Image paths that are only materialized when indexed. Cloning is cheap:
/// the directory is shared and the list holds filenames, not paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LazyImagePaths {
    dir: Arc<PathBuf>,
    filenames: Vec<String>,
}

impl LazyImagePaths {
    pub fn new(dir: Arc<PathBuf>, filenames: Vec<String>) -> Self {
        Self { dir, filenames }
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<PathBuf> {
        self.filenames.get(index).map(|name| self.dir.join(name))
    }

    pub fn first(&self) -> Option<PathBuf> {
        self.get(0)
    }

    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.filenames.iter().map(|name| self.dir.join(name))
    }
}

/// An article ready for display: image ids plus lazily resolved full images
/// and thumbnails, index-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleWithImages {
    pub article_id: i64,
    pub image_ids: Vec<i64>,
    pub images: LazyImagePaths,
    pub thumbnails: LazyImagePaths,
}

impl ArticleWithImages {
    pub fn image_count(&self) -> usize {
        self.image_ids.len()
    }

    pub fn label(&self) -> String {
        format!("Article #{}", self.article_id)
    }
}

/// An ensemble with the thumbnails of a few of its articles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsembleSummary {
    pub ensemble: Ensemble,
    pub previews: LazyImagePaths,
}

/// Table sizes shown on the statistics screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub articles: i64,
    pub article_images: i64,
    pub ensembles: i64,
    pub ensemble_articles: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEnsemble {
    pub ensemble_id: i64,
    pub title: String,
    pub article_count: i64,
}

/// An article singled out by a ranking query together with the count it won
/// with and its first image filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedArticle {
    pub article_id: i64,
    pub count: i64,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStatistics {
    pub counts: CatalogCounts,
    pub popular_ensembles: Vec<RankedEnsemble>,
    pub article_with_most_images: Option<RankedArticle>,
    pub article_in_most_ensembles: Option<RankedArticle>,
    /// Bytes used by full images and thumbnails on disk.
    pub storage_bytes: u64,
}
