use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Open (or create) the catalog database at `path` and make sure the schema
/// is in place.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    ensure_schema(&conn)?;
    info!(path = %path.display(), "catalog database ready");
    Ok(conn)
}

/// Run lazy migrations on an already open connection. The function also
/// toggles `PRAGMA foreign_keys = ON` so cascades behave the same for
/// in-memory test databases and the on-disk catalog.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS article (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created INTEGER NOT NULL,
            modified INTEGER NOT NULL
        )",
        [],
    )
    .context("failed to create article table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS article_image (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id INTEGER NOT NULL,
            filename TEXT NOT NULL UNIQUE,
            created INTEGER NOT NULL,
            FOREIGN KEY(article_id) REFERENCES article(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create article_image table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_article_image_article_id
         ON article_image(article_id)",
        [],
    )
    .context("failed to create article_image index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ensemble (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            created INTEGER NOT NULL,
            modified INTEGER NOT NULL
        )",
        [],
    )
    .context("failed to create ensemble table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ensemble_article (
            ensemble_id INTEGER NOT NULL,
            article_id INTEGER NOT NULL,
            created INTEGER NOT NULL,
            PRIMARY KEY (ensemble_id, article_id),
            FOREIGN KEY(ensemble_id) REFERENCES ensemble(id) ON DELETE CASCADE,
            FOREIGN KEY(article_id) REFERENCES article(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create ensemble_article table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ensemble_article_article_id
         ON ensemble_article(article_id)",
        [],
    )
    .context("failed to create ensemble_article index")?;

    // Title search index. It reads titles from `ensemble` and the triggers
    // below keep it in step with inserts, renames and deletes.
    conn.execute(
        "CREATE VIRTUAL TABLE IF NOT EXISTS ensemble_fts USING fts4(title, content=\"ensemble\")",
        [],
    )
    .context("failed to create ensemble_fts table")?;

    let triggers = [
        "CREATE TRIGGER IF NOT EXISTS ensemble_fts_before_update BEFORE UPDATE ON ensemble BEGIN
            DELETE FROM ensemble_fts WHERE docid = OLD.rowid;
        END",
        "CREATE TRIGGER IF NOT EXISTS ensemble_fts_before_delete BEFORE DELETE ON ensemble BEGIN
            DELETE FROM ensemble_fts WHERE docid = OLD.rowid;
        END",
        "CREATE TRIGGER IF NOT EXISTS ensemble_fts_after_update AFTER UPDATE ON ensemble BEGIN
            INSERT INTO ensemble_fts(docid, title) VALUES (NEW.rowid, NEW.title);
        END",
        "CREATE TRIGGER IF NOT EXISTS ensemble_fts_after_insert AFTER INSERT ON ensemble BEGIN
            INSERT INTO ensemble_fts(docid, title) VALUES (NEW.rowid, NEW.title);
        END",
    ];
    for trigger in triggers {
        conn.execute(trigger, [])
            .context("failed to create ensemble_fts trigger")?;
    }

    Ok(())
}

/// In-memory database with the full schema, for unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory database");
    ensure_schema(&conn).expect("schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = test_connection();
        ensure_schema(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('article', 'article_image', 'ensemble', 'ensemble_article', 'ensemble_fts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn open_database_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("catalog.sqlite");
        open_database(&path).unwrap();
        assert!(path.exists());
    }
}
