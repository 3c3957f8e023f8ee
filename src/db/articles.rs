use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::error::CatalogError;
use crate::models::{ArticleImage, ArticleImages};

/// What a call to [`delete_articles`] ended up doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleRemoval {
    /// Rows actually removed; stale ids are skipped.
    pub deleted: usize,
    pub filenames: Vec<String>,
}

/// What a call to [`delete_article_images`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRemoval {
    /// True when the request covered every image and the article went too.
    pub article_deleted: bool,
    /// Files that no longer have a row and can be removed from disk.
    pub filenames: Vec<String>,
}

/// Insert a new article together with its first image. Both rows land in one
/// transaction so an article never exists without an image.
pub fn insert_article(conn: &Connection, filename: &str, now: i64) -> Result<(i64, i64)> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start article transaction")?;

    tx.execute(
        "INSERT INTO article (created, modified) VALUES (?1, ?1)",
        params![now],
    )
    .context("failed to insert article")?;
    let article_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO article_image (article_id, filename, created) VALUES (?1, ?2, ?3)",
        params![article_id, filename, now],
    )
    .context("failed to insert article image")?;
    let image_id = tx.last_insert_rowid();

    tx.commit().context("failed to commit article")?;
    Ok((article_id, image_id))
}

/// Attach another image to an existing article and bump its modification
/// time.
pub fn insert_article_image(
    conn: &Connection,
    article_id: i64,
    filename: &str,
    now: i64,
) -> Result<i64> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start article image transaction")?;

    let touched = tx
        .execute(
            "UPDATE article SET modified = ?1 WHERE id = ?2",
            params![now, article_id],
        )
        .context("failed to touch article")?;
    if touched == 0 {
        return Err(CatalogError::ArticleNotFound(article_id).into());
    }

    tx.execute(
        "INSERT INTO article_image (article_id, filename, created) VALUES (?1, ?2, ?3)",
        params![article_id, filename, now],
    )
    .context("failed to insert article image")?;
    let image_id = tx.last_insert_rowid();

    tx.commit().context("failed to commit article image")?;
    Ok(image_id)
}

/// Every article with its images, most recently modified first. Images keep
/// insertion order within an article.
pub fn fetch_articles_with_images(conn: &Connection) -> Result<Vec<ArticleImages>> {
    let mut stmt = conn
        .prepare(
            "SELECT i.id, i.article_id, i.filename
             FROM article a
             INNER JOIN article_image i ON i.article_id = a.id
             ORDER BY a.modified DESC, a.id DESC, i.id",
        )
        .context("failed to prepare articles query")?;

    let rows = stmt
        .query_map([], image_from_row)
        .context("failed to load articles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect articles")?;

    Ok(group_by_article(rows))
}

/// One article with its images, or `None` if it has been deleted.
pub fn fetch_article_with_images(conn: &Connection, article_id: i64) -> Result<Option<ArticleImages>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, article_id, filename
             FROM article_image
             WHERE article_id = ?1
             ORDER BY id",
        )
        .context("failed to prepare article query")?;

    let images = stmt
        .query_map([article_id], image_from_row)
        .context("failed to load article images")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect article images")?;

    if images.is_empty() {
        Ok(None)
    } else {
        Ok(Some(ArticleImages { article_id, images }))
    }
}

/// Articles attached to an ensemble, most recently attached first.
pub fn fetch_articles_in_ensemble(conn: &Connection, ensemble_id: i64) -> Result<Vec<ArticleImages>> {
    let mut stmt = conn
        .prepare(
            "SELECT i.id, i.article_id, i.filename
             FROM ensemble_article ea
             INNER JOIN article_image i ON i.article_id = ea.article_id
             WHERE ea.ensemble_id = ?1
             ORDER BY ea.created DESC, ea.article_id, i.id",
        )
        .context("failed to prepare ensemble articles query")?;

    let rows = stmt
        .query_map([ensemble_id], image_from_row)
        .context("failed to load ensemble articles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect ensemble articles")?;

    Ok(group_by_article(rows))
}

/// Articles that could still be added to an ensemble.
pub fn fetch_articles_not_in_ensemble(
    conn: &Connection,
    ensemble_id: i64,
) -> Result<Vec<ArticleImages>> {
    let mut stmt = conn
        .prepare(
            "SELECT i.id, i.article_id, i.filename
             FROM article a
             INNER JOIN article_image i ON i.article_id = a.id
             WHERE NOT EXISTS (
                 SELECT 1 FROM ensemble_article ea
                 WHERE ea.article_id = a.id AND ea.ensemble_id = ?1
             )
             ORDER BY a.modified DESC, a.id DESC, i.id",
        )
        .context("failed to prepare available articles query")?;

    let rows = stmt
        .query_map([ensemble_id], image_from_row)
        .context("failed to load available articles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect available articles")?;

    Ok(group_by_article(rows))
}

/// Delete articles and, through the cascade, their images and ensemble
/// links. Returns the filenames whose rows are gone.
pub fn delete_articles(conn: &Connection, article_ids: &[i64]) -> Result<ArticleRemoval> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start delete transaction")?;

    let mut removal = ArticleRemoval::default();
    {
        let mut select = tx
            .prepare("SELECT filename FROM article_image WHERE article_id = ?1 ORDER BY id")
            .context("failed to prepare article filenames query")?;
        let mut delete = tx
            .prepare("DELETE FROM article WHERE id = ?1")
            .context("failed to prepare article delete")?;

        for article_id in article_ids {
            let names = select
                .query_map([article_id], |row| row.get::<_, String>(0))
                .context("failed to load article filenames")?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to collect article filenames")?;
            if delete.execute([article_id]).context("failed to delete article")? > 0 {
                removal.deleted += 1;
                removal.filenames.extend(names);
            }
        }
    }

    tx.commit().context("failed to commit article delete")?;
    Ok(removal)
}

/// Remove some images from an article. When `image_ids` covers the whole
/// image set the article itself is deleted, so an article is never left
/// without images. Ids that do not belong to the article are ignored.
pub fn delete_article_images(
    conn: &Connection,
    article_id: i64,
    image_ids: &[i64],
    now: i64,
) -> Result<ImageRemoval> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start image delete transaction")?;

    let current = {
        let mut stmt = tx
            .prepare("SELECT id, article_id, filename FROM article_image WHERE article_id = ?1")
            .context("failed to prepare article images query")?;
        let images = stmt
            .query_map([article_id], image_from_row)
            .context("failed to load article images")?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to collect article images")?;
        images
    };
    if current.is_empty() {
        return Err(CatalogError::ArticleNotFound(article_id).into());
    }

    let (doomed, kept): (Vec<ArticleImage>, Vec<ArticleImage>) = current
        .into_iter()
        .partition(|image| image_ids.contains(&image.id));

    let removal = if kept.is_empty() {
        tx.execute("DELETE FROM article WHERE id = ?1", params![article_id])
            .context("failed to delete article")?;
        ImageRemoval {
            article_deleted: true,
            filenames: doomed.into_iter().map(|image| image.filename).collect(),
        }
    } else {
        for image in &doomed {
            tx.execute("DELETE FROM article_image WHERE id = ?1", params![image.id])
                .context("failed to delete article image")?;
        }
        if !doomed.is_empty() {
            tx.execute(
                "UPDATE article SET modified = ?1 WHERE id = ?2",
                params![now, article_id],
            )
            .context("failed to touch article")?;
        }
        ImageRemoval {
            article_deleted: false,
            filenames: doomed.into_iter().map(|image| image.filename).collect(),
        }
    };

    tx.commit().context("failed to commit image delete")?;
    Ok(removal)
}

/// Every stored filename, used when wiping the catalog.
pub fn fetch_all_filenames(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT filename FROM article_image ORDER BY id")
        .context("failed to prepare filenames query")?;

    let names = stmt
        .query_map([], |row| row.get(0))
        .context("failed to load filenames")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect filenames")?;

    Ok(names)
}

/// Drop every article, image and ensemble in one go.
pub fn delete_everything(conn: &Connection) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start wipe transaction")?;
    tx.execute("DELETE FROM ensemble", [])
        .context("failed to delete ensembles")?;
    tx.execute("DELETE FROM article", [])
        .context("failed to delete articles")?;
    tx.commit().context("failed to commit wipe")?;
    Ok(())
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleImage> {
    Ok(ArticleImage {
        id: row.get(0)?,
        article_id: row.get(1)?,
        filename: row.get(2)?,
    })
}

/// Fold consecutive rows of the same article into one entry. Queries order
/// by article first, so each article's rows are contiguous.
fn group_by_article(rows: Vec<ArticleImage>) -> Vec<ArticleImages> {
    let mut grouped: Vec<ArticleImages> = Vec::new();
    for image in rows {
        match grouped.last_mut() {
            Some(last) if last.article_id == image.article_id => last.images.push(image),
            _ => grouped.push(ArticleImages {
                article_id: image.article_id,
                images: vec![image],
            }),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::test_connection;

    fn article_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM article", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn insert_article_creates_article_and_first_image() {
        let conn = test_connection();
        let (article_id, image_id) = insert_article(&conn, "one.png", 10).unwrap();

        let article = fetch_article_with_images(&conn, article_id).unwrap().unwrap();
        assert_eq!(article.image_ids(), vec![image_id]);
        assert_eq!(article.filenames(), vec!["one.png".to_string()]);
    }

    #[test]
    fn images_group_under_their_article() {
        let conn = test_connection();
        let (first, _) = insert_article(&conn, "a1.png", 10).unwrap();
        let (second, _) = insert_article(&conn, "b1.png", 20).unwrap();
        insert_article_image(&conn, first, "a2.png", 30).unwrap();

        let articles = fetch_articles_with_images(&conn).unwrap();
        assert_eq!(articles.len(), 2);
        // Adding an image bumps `first` to the top.
        assert_eq!(articles[0].article_id, first);
        assert_eq!(articles[0].filenames(), vec!["a1.png", "a2.png"]);
        assert_eq!(articles[1].article_id, second);
    }

    #[test]
    fn adding_image_to_missing_article_fails_cleanly() {
        let conn = test_connection();
        let err = insert_article_image(&conn, 99, "x.png", 1).unwrap_err();
        assert_eq!(
            CatalogError::find(&err),
            Some(&CatalogError::ArticleNotFound(99))
        );
    }

    #[test]
    fn removing_some_images_keeps_the_article() {
        let conn = test_connection();
        let (article_id, first_image) = insert_article(&conn, "a1.png", 10).unwrap();
        insert_article_image(&conn, article_id, "a2.png", 11).unwrap();

        let removal = delete_article_images(&conn, article_id, &[first_image], 12).unwrap();
        assert!(!removal.article_deleted);
        assert_eq!(removal.filenames, vec!["a1.png".to_string()]);

        let article = fetch_article_with_images(&conn, article_id).unwrap().unwrap();
        assert_eq!(article.filenames(), vec!["a2.png".to_string()]);
    }

    #[test]
    fn removing_every_image_deletes_the_article() {
        let conn = test_connection();
        let (article_id, first_image) = insert_article(&conn, "a1.png", 10).unwrap();
        let second_image = insert_article_image(&conn, article_id, "a2.png", 11).unwrap();

        let removal =
            delete_article_images(&conn, article_id, &[first_image, second_image], 12).unwrap();
        assert!(removal.article_deleted);
        assert_eq!(removal.filenames.len(), 2);
        assert_eq!(article_count(&conn), 0);
        assert!(fetch_article_with_images(&conn, article_id).unwrap().is_none());
    }

    #[test]
    fn foreign_image_ids_are_ignored() {
        let conn = test_connection();
        let (article_id, _) = insert_article(&conn, "a1.png", 10).unwrap();
        let (_, other_image) = insert_article(&conn, "b1.png", 10).unwrap();

        let removal = delete_article_images(&conn, article_id, &[other_image], 12).unwrap();
        assert!(!removal.article_deleted);
        assert!(removal.filenames.is_empty());
        assert_eq!(article_count(&conn), 2);
    }

    #[test]
    fn delete_articles_returns_their_files() {
        let conn = test_connection();
        let (first, _) = insert_article(&conn, "a1.png", 10).unwrap();
        insert_article_image(&conn, first, "a2.png", 11).unwrap();
        let (second, _) = insert_article(&conn, "b1.png", 12).unwrap();

        let removal = delete_articles(&conn, &[first, second, 404]).unwrap();
        assert_eq!(removal.deleted, 2);
        let mut files = removal.filenames;
        files.sort();
        assert_eq!(files, vec!["a1.png", "a2.png", "b1.png"]);
        assert_eq!(article_count(&conn), 0);
        let images: i64 = conn
            .query_row("SELECT COUNT(*) FROM article_image", [], |row| row.get(0))
            .unwrap();
        assert_eq!(images, 0);
    }
}
