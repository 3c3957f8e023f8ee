//! Persistence module split across logical submodules. Each function wraps
//! one query or one transaction over a borrowed connection.

mod articles;
mod connection;
mod ensembles;
mod statistics;

pub use articles::{
    delete_article_images, delete_articles, delete_everything, fetch_all_filenames,
    fetch_article_with_images, fetch_articles_in_ensemble, fetch_articles_not_in_ensemble,
    fetch_articles_with_images, insert_article, insert_article_image, ArticleRemoval,
    ImageRemoval,
};
pub use connection::{ensure_schema, open_database};
pub use ensembles::{
    add_article_to_ensembles, add_articles_to_ensemble, delete_ensembles, ensemble_title_exists,
    fetch_ensemble, fetch_ensemble_preview_filenames, fetch_ensembles,
    fetch_ensembles_for_article, fetch_ensembles_without_article, fts_match_expression,
    insert_ensemble, remove_articles_from_ensemble, search_ensembles, update_ensemble_title,
};
pub use statistics::{
    fetch_article_in_most_ensembles, fetch_article_with_most_images, fetch_counts,
    fetch_popular_ensembles,
};

#[cfg(test)]
pub(crate) use connection::test_connection;
