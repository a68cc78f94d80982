//! Local search index backed by SQLite with an FTS4 shadow table
//!
//! Directory paths are tokenized into `dir_fts` so keyword searches run
//! offline against the local file. Triggers keep `dir` and `dir_fts` in
//! lockstep; deleting a site cascades to both.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::debug;

use crate::error::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS site (
  id INTEGER PRIMARY KEY,
  name TEXT,
  CONSTRAINT name_unique UNIQUE (name)
);
CREATE TABLE IF NOT EXISTS dir (
  id INTEGER PRIMARY KEY,
  site_id INTEGER,
  path TEXT,
  modified INTEGER,
  CONSTRAINT path_unique UNIQUE(site_id, path),
  FOREIGN KEY(site_id) REFERENCES site(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS dir_site_id_idx ON dir (site_id);
CREATE VIRTUAL TABLE IF NOT EXISTS dir_fts USING fts4(id, site_id, path);
CREATE TRIGGER IF NOT EXISTS dir_bd BEFORE DELETE ON dir BEGIN
  DELETE FROM dir_fts WHERE docid=old.rowid;
END;
CREATE TRIGGER IF NOT EXISTS dir_ai AFTER INSERT ON dir BEGIN
  INSERT INTO dir_fts(docid, id, site_id, path)
  VALUES(new.rowid, new.id, new.site_id, new.path);
END;
";

/// A crawled site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// Auto-assigned row id
    pub id: i64,
    /// Unique site name from the configuration
    pub name: String,
}

/// A directory row to persist for a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    /// Server-absolute directory path
    pub path: String,
    /// Modification time in seconds since the epoch
    pub modified: i64,
}

/// A search hit: a directory joined with its site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub site: String,
    pub path: String,
    pub modified: i64,
}

/// Handle to the index file
///
/// All operations serialize on an internal lock; SQLite allows a single
/// writer and the insert path holds the lock for the whole transaction.
pub struct Store {
    conn: Mutex<Connection>,
}

/// Parse one `column[:direction]` sort token into an ORDER BY fragment.
///
/// The direction is validated case-insensitively against `ASC`/`DESC`;
/// the column is passed through untouched, so callers must restrict it
/// to a known set before the fragment reaches SQL.
pub fn order_by_clause(expr: &str) -> Result<String> {
    let (column, direction) = match expr.split_once(':') {
        Some((column, direction)) => (column, direction),
        None => (expr, ""),
    };
    match direction.to_uppercase().as_str() {
        "" => Ok(column.to_string()),
        dir @ ("ASC" | "DESC") => Ok(format!("{column} {dir}")),
        _ => Err(Error::InvalidOrder(format!(
            "invalid direction {direction:?} in {expr:?}"
        ))),
    }
}

/// Parse and join several sort tokens with `", "`.
pub fn order_by_clauses<S: AsRef<str>>(exprs: &[S]) -> Result<String> {
    let clauses = exprs
        .iter()
        .map(|e| order_by_clause(e.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(clauses.join(", "))
}

fn select_dirs_query(site: Option<&str>, order: &str, limit: usize) -> String {
    let mut query = String::from(
        "SELECT site.name AS site, dir_fts.path, dir.modified FROM dir_fts
INNER JOIN dir ON dir_fts.id = dir.id
INNER JOIN site ON dir_fts.site_id = site.id
WHERE dir_fts.path MATCH ?1",
    );
    if site.is_some() {
        query.push_str(" AND site.name = ?2");
    }
    if !order.is_empty() {
        query.push_str(&format!(" ORDER BY {order}"));
    }
    if limit > 0 {
        query.push_str(&format!(" LIMIT {limit}"));
    }
    query
}

impl Store {
    /// Open (or create) the index at `path`.
    ///
    /// The schema is created idempotently; foreign-key enforcement is
    /// switched on for the connection so site deletes cascade.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Atomically replace every directory row of `site`.
    ///
    /// In one transaction: any existing site row with this name is
    /// deleted (cascading to its dirs and, via triggers, their FTS
    /// rows), a fresh site row is inserted, and all `dirs` are inserted
    /// under its new id. Readers never observe a partial crawl.
    pub fn insert(&self, site: &str, dirs: &[Dir]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM site WHERE name = ?1", params![site])?;
        tx.execute("INSERT INTO site (name) VALUES (?1)", params![site])?;
        let site_id = tx.last_insert_rowid();
        {
            let mut stmt =
                tx.prepare("INSERT INTO dir (site_id, path, modified) VALUES (?1, ?2, ?3)")?;
            for dir in dirs {
                stmt.execute(params![site_id, dir.path, dir.modified])?;
            }
        }
        tx.commit()?;
        debug!(site, dirs = dirs.len(), "replaced site contents");
        Ok(())
    }

    /// All sites, ordered by name.
    pub fn select_sites(&self) -> Result<Vec<Site>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name FROM site ORDER BY name ASC")?;
        let sites = stmt
            .query_map([], |row| {
                Ok(Site {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sites)
    }

    /// Delete the named sites (and, by cascade, their directories) in a
    /// single transaction.
    pub fn delete_sites<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for name in names {
            tx.execute("DELETE FROM site WHERE name = ?1", params![name.as_ref()])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Compact the database file.
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("VACUUM", [])?;
        Ok(())
    }

    /// Run the FTS4 `optimize` maintenance command.
    pub fn optimize(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO dir_fts(dir_fts) VALUES('optimize')", [])?;
        Ok(())
    }

    /// Full-text search over directory paths.
    ///
    /// `keywords` is an FTS MATCH expression; `site` restricts hits to
    /// one site; `order` is a pre-validated ORDER BY fragment (empty for
    /// none); `limit` of zero returns everything.
    pub fn select_dirs(
        &self,
        keywords: &str,
        site: Option<&str>,
        order: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.conn.lock().unwrap();
        let query = select_dirs_query(site, order, limit);
        let mut stmt = conn.prepare(&query)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(SearchResult {
                site: row.get(0)?,
                path: row.get(1)?,
                modified: row.get(2)?,
            })
        };
        let rows = match site {
            Some(site) => stmt.query_map(params![keywords, site], map_row)?,
            None => stmt.query_map(params![keywords], map_row)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
