use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{CatalogCounts, RankedArticle, RankedEnsemble};

pub fn fetch_counts(conn: &Connection) -> Result<CatalogCounts> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM article),
            (SELECT COUNT(*) FROM article_image),
            (SELECT COUNT(*) FROM ensemble),
            (SELECT COUNT(*) FROM ensemble_article)",
        [],
        |row| {
            Ok(CatalogCounts {
                articles: row.get(0)?,
                article_images: row.get(1)?,
                ensembles: row.get(2)?,
                ensemble_articles: row.get(3)?,
            })
        },
    )
    .context("failed to count catalog rows")
}

/// Top `limit` ensembles by number of articles. Empty ensembles are left out.
pub fn fetch_popular_ensembles(conn: &Connection, limit: usize) -> Result<Vec<RankedEnsemble>> {
    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.title, COUNT(ea.article_id) AS article_count
             FROM ensemble e
             INNER JOIN ensemble_article ea ON ea.ensemble_id = e.id
             GROUP BY e.id
             ORDER BY article_count DESC, e.title COLLATE NOCASE, e.id
             LIMIT ?1",
        )
        .context("failed to prepare popular ensembles query")?;

    let ranked = stmt
        .query_map([limit as i64], |row| {
            Ok(RankedEnsemble {
                ensemble_id: row.get(0)?,
                title: row.get(1)?,
                article_count: row.get(2)?,
            })
        })
        .context("failed to load popular ensembles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect popular ensembles")?;

    Ok(ranked)
}

/// The article with the most images. Ties go to the older article.
pub fn fetch_article_with_most_images(conn: &Connection) -> Result<Option<RankedArticle>> {
    conn.query_row(
        "SELECT i.article_id, COUNT(*) AS image_count,
                (SELECT img.filename FROM article_image img
                 WHERE img.article_id = i.article_id ORDER BY img.id LIMIT 1)
         FROM article_image i
         GROUP BY i.article_id
         ORDER BY image_count DESC, i.article_id
         LIMIT 1",
        [],
        |row| {
            Ok(RankedArticle {
                article_id: row.get(0)?,
                count: row.get(1)?,
                filename: row.get(2)?,
            })
        },
    )
    .optional()
    .context("failed to rank articles by image count")
}

/// The article that appears in the most ensembles, if any is in one.
pub fn fetch_article_in_most_ensembles(conn: &Connection) -> Result<Option<RankedArticle>> {
    conn.query_row(
        "SELECT ea.article_id, COUNT(*) AS ensemble_count,
                (SELECT i.filename FROM article_image i
                 WHERE i.article_id = ea.article_id ORDER BY i.id LIMIT 1)
         FROM ensemble_article ea
         GROUP BY ea.article_id
         ORDER BY ensemble_count DESC, ea.article_id
         LIMIT 1",
        [],
        |row| {
            Ok(RankedArticle {
                article_id: row.get(0)?,
                count: row.get(1)?,
                filename: row.get(2)?,
            })
        },
    )
    .optional()
    .context("failed to rank articles by ensemble count")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::articles::{insert_article, insert_article_image};
    use crate::db::connection::test_connection;
    use crate::db::ensembles::insert_ensemble;

    #[test]
    fn empty_catalog_has_no_rankings() {
        let conn = test_connection();
        assert_eq!(fetch_counts(&conn).unwrap(), CatalogCounts::default());
        assert!(fetch_popular_ensembles(&conn, 3).unwrap().is_empty());
        assert!(fetch_article_with_most_images(&conn).unwrap().is_none());
        assert!(fetch_article_in_most_ensembles(&conn).unwrap().is_none());
    }

    #[test]
    fn rankings_follow_counts() {
        let conn = test_connection();
        let (a, _) = insert_article(&conn, "a1.png", 1).unwrap();
        let (b, _) = insert_article(&conn, "b1.png", 1).unwrap();
        insert_article_image(&conn, b, "b2.png", 2).unwrap();
        insert_ensemble(&conn, "Both", &[a, b], 1).unwrap();
        insert_ensemble(&conn, "Just A", &[a], 1).unwrap();
        insert_ensemble(&conn, "Nothing", &[], 1).unwrap();

        let counts = fetch_counts(&conn).unwrap();
        assert_eq!(counts.articles, 2);
        assert_eq!(counts.article_images, 3);
        assert_eq!(counts.ensembles, 3);
        assert_eq!(counts.ensemble_articles, 3);

        let popular = fetch_popular_ensembles(&conn, 5).unwrap();
        let titles: Vec<&str> = popular.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Both", "Just A"]);
        assert_eq!(popular[0].article_count, 2);

        let most_images = fetch_article_with_most_images(&conn).unwrap().unwrap();
        assert_eq!((most_images.article_id, most_images.count), (b, 2));
        assert_eq!(most_images.filename, "b1.png");

        let most_ensembles = fetch_article_in_most_ensembles(&conn).unwrap().unwrap();
        assert_eq!((most_ensembles.article_id, most_ensembles.count), (a, 2));
        assert_eq!(most_ensembles.filename, "a1.png");
    }
}
