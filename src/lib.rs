//! Core library for Merlinsbag, a terminal catalog of clothing articles and
//! the ensembles (outfits) they are grouped into.
//!
//! Photos are segmented into articles by a [`SubjectSegmenter`], stored as
//! PNG files beside an SQLite catalog, and browsed through a Ratatui
//! front-end whose screens are driven by the holders in [`state`].
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod segmentation;
pub mod state;
pub mod storage;
pub mod ui;
pub mod worker;

pub use catalog::Catalog;
pub use config::{Paths, Settings};
pub use error::{CatalogError, SegmentationError};
pub use models::{ArticleWithImages, Ensemble, EnsembleSummary};
pub use segmentation::{SubjectSegmenter, ThresholdSegmenter};
pub use worker::SegmentationWorker;

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
