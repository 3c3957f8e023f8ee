use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::CatalogError;
use crate::models::Ensemble;

const ENSEMBLE_COLUMNS: &str = "id, title, created, modified";

/// Every ensemble, most recently modified first.
pub fn fetch_ensembles(conn: &Connection) -> Result<Vec<Ensemble>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ENSEMBLE_COLUMNS} FROM ensemble ORDER BY modified DESC, id DESC"
        ))
        .context("failed to prepare ensembles query")?;

    let ensembles = stmt
        .query_map([], ensemble_from_row)
        .context("failed to load ensembles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect ensembles")?;

    Ok(ensembles)
}

pub fn fetch_ensemble(conn: &Connection, id: i64) -> Result<Option<Ensemble>> {
    conn.query_row(
        &format!("SELECT {ENSEMBLE_COLUMNS} FROM ensemble WHERE id = ?1"),
        [id],
        ensemble_from_row,
    )
    .optional()
    .context("failed to load ensemble")
}

/// Full-text search over titles. Each word of `query` must prefix-match a
/// word of the title. A query without any searchable characters matches
/// nothing.
pub fn search_ensembles(conn: &Connection, query: &str) -> Result<Vec<Ensemble>> {
    let Some(expression) = fts_match_expression(query) else {
        return Ok(Vec::new());
    };

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ENSEMBLE_COLUMNS} FROM ensemble
             WHERE id IN (SELECT docid FROM ensemble_fts WHERE ensemble_fts MATCH ?1)
             ORDER BY modified DESC, id DESC"
        ))
        .context("failed to prepare ensemble search")?;

    let ensembles = stmt
        .query_map([expression], ensemble_from_row)
        .context("failed to search ensembles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect ensemble search results")?;

    Ok(ensembles)
}

/// Turn free text into an FTS4 query: alphanumeric words, each with a prefix
/// wildcard, implicitly AND-ed.
pub fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|word| !word.is_empty())
        .map(|word| format!("{word}*"))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Whether `title` is already used by an ensemble other than `except`.
pub fn ensemble_title_exists(conn: &Connection, title: &str, except: Option<i64>) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM ensemble WHERE title = ?1 AND id IS NOT ?2)",
        params![title, except],
        |row| row.get(0),
    )
    .context("failed to check ensemble title")
}

/// Create an ensemble and link its initial articles. The title is trimmed
/// and must be non-empty and unused.
pub fn insert_ensemble(
    conn: &Connection,
    title: &str,
    article_ids: &[i64],
    now: i64,
) -> Result<Ensemble> {
    let title = normalize_title(title)?;
    if ensemble_title_exists(conn, &title, None)? {
        return Err(CatalogError::TitleNotUnique(title).into());
    }

    let tx = conn
        .unchecked_transaction()
        .context("failed to start ensemble transaction")?;

    tx.execute(
        "INSERT INTO ensemble (title, created, modified) VALUES (?1, ?2, ?2)",
        params![title, now],
    )
    .context("failed to insert ensemble")?;
    let id = tx.last_insert_rowid();

    {
        let mut link = tx
            .prepare(
                "INSERT OR IGNORE INTO ensemble_article (ensemble_id, article_id, created)
                 VALUES (?1, ?2, ?3)",
            )
            .context("failed to prepare ensemble link")?;
        for article_id in article_ids {
            link.execute(params![id, article_id, now])
                .context("failed to link article to ensemble")?;
        }
    }

    tx.commit().context("failed to commit ensemble")?;
    Ok(Ensemble {
        id,
        title,
        created: now,
        modified: now,
    })
}

/// Rename an ensemble. A collision leaves the stored title untouched;
/// renaming to the current title is a no-op.
pub fn update_ensemble_title(conn: &Connection, id: i64, title: &str, now: i64) -> Result<()> {
    let title = normalize_title(title)?;
    let current = fetch_ensemble(conn, id)?.ok_or(CatalogError::EnsembleNotFound(id))?;
    if current.title == title {
        return Ok(());
    }
    if ensemble_title_exists(conn, &title, Some(id))? {
        return Err(CatalogError::TitleNotUnique(title).into());
    }

    conn.execute(
        "UPDATE ensemble SET title = ?1, modified = ?2 WHERE id = ?3",
        params![title, now, id],
    )
    .context("failed to update ensemble title")?;
    Ok(())
}

/// Delete ensembles; their article links cascade. Returns how many existed.
pub fn delete_ensembles(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start ensemble delete transaction")?;
    let mut deleted = 0;
    for id in ids {
        deleted += tx
            .execute("DELETE FROM ensemble WHERE id = ?1", [id])
            .context("failed to delete ensemble")?;
    }
    tx.commit().context("failed to commit ensemble delete")?;
    Ok(deleted)
}

/// Link articles to one ensemble. Existing links are left alone; the count
/// only includes new links.
pub fn add_articles_to_ensemble(
    conn: &Connection,
    ensemble_id: i64,
    article_ids: &[i64],
    now: i64,
) -> Result<usize> {
    let pairs: Vec<(i64, i64)> = article_ids.iter().map(|&a| (ensemble_id, a)).collect();
    link_pairs(conn, &pairs, now)
}

/// Link one article to several ensembles.
pub fn add_article_to_ensembles(
    conn: &Connection,
    article_id: i64,
    ensemble_ids: &[i64],
    now: i64,
) -> Result<usize> {
    let pairs: Vec<(i64, i64)> = ensemble_ids.iter().map(|&e| (e, article_id)).collect();
    link_pairs(conn, &pairs, now)
}

/// Unlink articles from an ensemble. Returns how many links were removed.
pub fn remove_articles_from_ensemble(
    conn: &Connection,
    ensemble_id: i64,
    article_ids: &[i64],
    now: i64,
) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start unlink transaction")?;
    let mut removed = 0;
    for article_id in article_ids {
        removed += tx
            .execute(
                "DELETE FROM ensemble_article WHERE ensemble_id = ?1 AND article_id = ?2",
                params![ensemble_id, article_id],
            )
            .context("failed to unlink article from ensemble")?;
    }
    if removed > 0 {
        tx.execute(
            "UPDATE ensemble SET modified = ?1 WHERE id = ?2",
            params![now, ensemble_id],
        )
        .context("failed to touch ensemble")?;
    }
    tx.commit().context("failed to commit unlink")?;
    Ok(removed)
}

/// Ensembles an article belongs to, alphabetically.
pub fn fetch_ensembles_for_article(conn: &Connection, article_id: i64) -> Result<Vec<Ensemble>> {
    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.title, e.created, e.modified
             FROM ensemble e
             INNER JOIN ensemble_article ea ON ea.ensemble_id = e.id
             WHERE ea.article_id = ?1
             ORDER BY e.title COLLATE NOCASE, e.id",
        )
        .context("failed to prepare article ensembles query")?;

    let ensembles = stmt
        .query_map([article_id], ensemble_from_row)
        .context("failed to load article ensembles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect article ensembles")?;

    Ok(ensembles)
}

/// Ensembles an article could still be added to, alphabetically.
pub fn fetch_ensembles_without_article(
    conn: &Connection,
    article_id: i64,
) -> Result<Vec<Ensemble>> {
    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.title, e.created, e.modified
             FROM ensemble e
             WHERE NOT EXISTS (
                 SELECT 1 FROM ensemble_article ea
                 WHERE ea.ensemble_id = e.id AND ea.article_id = ?1
             )
             ORDER BY e.title COLLATE NOCASE, e.id",
        )
        .context("failed to prepare available ensembles query")?;

    let ensembles = stmt
        .query_map([article_id], ensemble_from_row)
        .context("failed to load available ensembles")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect available ensembles")?;

    Ok(ensembles)
}

/// First-image filenames of up to `limit` articles per ensemble, most
/// recently attached first. Ensembles without articles are absent.
pub fn fetch_ensemble_preview_filenames(
    conn: &Connection,
    limit: usize,
) -> Result<HashMap<i64, Vec<String>>> {
    let mut stmt = conn
        .prepare(
            "SELECT ea.ensemble_id,
                    (SELECT i.filename FROM article_image i
                     WHERE i.article_id = ea.article_id ORDER BY i.id LIMIT 1)
             FROM ensemble_article ea
             ORDER BY ea.ensemble_id, ea.created DESC, ea.article_id",
        )
        .context("failed to prepare ensemble previews query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .context("failed to load ensemble previews")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect ensemble previews")?;

    let mut previews: HashMap<i64, Vec<String>> = HashMap::new();
    for (ensemble_id, filename) in rows {
        let Some(filename) = filename else { continue };
        let entry = previews.entry(ensemble_id).or_default();
        if entry.len() < limit {
            entry.push(filename);
        }
    }
    Ok(previews)
}

fn link_pairs(conn: &Connection, pairs: &[(i64, i64)], now: i64) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start link transaction")?;
    let mut linked = 0;
    {
        let mut link = tx
            .prepare(
                "INSERT OR IGNORE INTO ensemble_article (ensemble_id, article_id, created)
                 VALUES (?1, ?2, ?3)",
            )
            .context("failed to prepare ensemble link")?;
        let mut touch = tx
            .prepare("UPDATE ensemble SET modified = ?1 WHERE id = ?2")
            .context("failed to prepare ensemble touch")?;
        for (ensemble_id, article_id) in pairs {
            let inserted = link
                .execute(params![ensemble_id, article_id, now])
                .context("failed to link article to ensemble")?;
            if inserted > 0 {
                touch
                    .execute(params![now, ensemble_id])
                    .context("failed to touch ensemble")?;
            }
            linked += inserted;
        }
    }
    tx.commit().context("failed to commit links")?;
    Ok(linked)
}

fn normalize_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::EmptyTitle.into());
    }
    Ok(trimmed.to_string())
}

fn ensemble_from_row(row: &Row<'_>) -> rusqlite::Result<Ensemble> {
    Ok(Ensemble {
        id: row.get(0)?,
        title: row.get(1)?,
        created: row.get(2)?,
        modified: row.get(3)?,
    })
}
