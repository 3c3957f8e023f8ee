//! Domain errors the UI needs to tell apart. Everything else travels as a
//! plain `anyhow::Error` with context attached at the failing call site.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by catalog rules rather than by SQLite or the filesystem.
/// They are wrapped into `anyhow::Error` by the `db` layer and recovered with
/// `downcast_ref` where a form needs to show them inline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("An ensemble titled \"{0}\" already exists.")]
    TitleNotUnique(String),
    #[error("Ensemble title is required.")]
    EmptyTitle,
    #[error("Article {0} no longer exists.")]
    ArticleNotFound(i64),
    #[error("Ensemble {0} no longer exists.")]
    EnsembleNotFound(i64),
}

impl CatalogError {
    /// Look for a `CatalogError` anywhere in an `anyhow` chain.
    pub fn find(err: &anyhow::Error) -> Option<&CatalogError> {
        err.chain().find_map(|cause| cause.downcast_ref::<CatalogError>())
    }
}

/// Why a source image produced no subjects to review.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("Image not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Image not recognized: {}", .0.display())]
    NotRecognized(PathBuf),
    #[error("Segmentation is not ready yet.")]
    ModuleNotReady,
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn find_sees_through_context() {
        let result: anyhow::Result<()> = Err(CatalogError::EmptyTitle.into());
        let err = result.context("failed to rename ensemble").unwrap_err();
        assert_eq!(CatalogError::find(&err), Some(&CatalogError::EmptyTitle));
    }

    #[test]
    fn find_ignores_foreign_errors() {
        let err = anyhow::anyhow!("disk full");
        assert!(CatalogError::find(&err).is_none());
    }
}
